use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::category::{ExpenseCategoryResponse, ExpenseSubcategory, IncomeCategory};
use crate::models::transaction::TransactionKind;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub const FALLBACK_COLOR: &str = "#cccccc";

/// Immutable snapshot of the category reference data. Categories only change
/// through seed migrations, so one load per process is enough.
#[derive(Debug, Clone)]
pub struct Catalog {
    expense_categories: Vec<ExpenseCategoryResponse>,
    income_categories: Vec<IncomeCategory>,
    category_colors: HashMap<String, String>,
    subcategory_colors: HashMap<String, String>,
    category_sort_orders: HashMap<String, i32>,
    income_category_ids: Vec<String>,
    subcategory_parents: HashMap<String, String>,
}

impl Catalog {
    pub fn build(
        categories: Vec<crate::models::category::ExpenseCategory>,
        subcategories: Vec<ExpenseSubcategory>,
        income_categories: Vec<IncomeCategory>,
    ) -> Self {
        let category_colors = categories.iter().map(|c| (c.id.clone(), c.color.clone())).collect();
        let subcategory_colors = subcategories.iter().map(|s| (s.id.clone(), s.sub_color.clone())).collect();
        let category_sort_orders = categories.iter().map(|c| (c.id.clone(), c.sort_order)).collect();
        let income_category_ids = income_categories.iter().map(|c| c.id.clone()).collect();
        let subcategory_parents = subcategories
            .iter()
            .map(|s| (s.id.clone(), s.category_id.clone()))
            .collect();

        let mut grouped: HashMap<String, Vec<ExpenseSubcategory>> = HashMap::new();
        for subcategory in subcategories {
            grouped.entry(subcategory.category_id.clone()).or_default().push(subcategory);
        }

        let expense_categories = categories
            .into_iter()
            .map(|category| {
                let mut subcategories = grouped.remove(&category.id).unwrap_or_default();
                subcategories.sort_by_key(|s| s.sort_order);
                ExpenseCategoryResponse {
                    id: category.id,
                    label: category.label,
                    color: category.color,
                    sort_order: category.sort_order,
                    subcategories,
                }
            })
            .collect();

        Self {
            expense_categories,
            income_categories,
            category_colors,
            subcategory_colors,
            category_sort_orders,
            income_category_ids,
            subcategory_parents,
        }
    }

    pub fn category_exists(&self, id: &str, kind: TransactionKind) -> bool {
        match kind {
            TransactionKind::Expense => self.category_colors.contains_key(id),
            TransactionKind::Income => self.income_category_ids.iter().any(|c| c == id),
        }
    }

    pub fn subcategory_exists(&self, id: &str) -> bool {
        self.subcategory_parents.contains_key(id)
    }

    pub fn expense_categories(&self) -> &[ExpenseCategoryResponse] {
        &self.expense_categories
    }

    pub fn income_categories(&self) -> &[IncomeCategory] {
        &self.income_categories
    }

    pub fn category_color(&self, id: &str) -> &str {
        self.category_colors.get(id).map(String::as_str).unwrap_or(FALLBACK_COLOR)
    }

    pub fn subcategory_color(&self, id: &str) -> &str {
        self.subcategory_colors.get(id).map(String::as_str).unwrap_or(FALLBACK_COLOR)
    }

    /// Seed order of a category, used as the aggregator's tie-breaker.
    pub fn category_sort_order(&self, id: &str) -> i32 {
        self.category_sort_orders.get(id).copied().unwrap_or(i32::MAX)
    }
}

/// Per-process read-through cache. Warmed at liftoff; if the database is not
/// reachable yet, the first request that needs the catalog loads it instead.
pub struct CatalogCache {
    cell: OnceCell<Catalog>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    pub async fn get(&self, pool: &PgPool) -> Result<&Catalog, AppError> {
        self.cell
            .get_or_try_init(|| async {
                let repo = PostgresRepository { pool: pool.clone() };
                let categories = repo.list_expense_categories().await?;
                let subcategories = repo.list_expense_subcategories().await?;
                let income_categories = repo.list_income_categories().await?;
                info!(
                    expense_categories = categories.len(),
                    income_categories = income_categories.len(),
                    "Loaded category catalog"
                );
                Ok(Catalog::build(categories, subcategories, income_categories))
            })
            .await
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stage_catalog() -> AdHoc {
    AdHoc::on_ignite("Category catalog", |rocket| async move {
        rocket.manage(CatalogCache::new()).attach(AdHoc::on_liftoff("Warm category catalog", |rocket| {
            Box::pin(async move {
                let (Some(cache), Some(pool)) = (rocket.state::<CatalogCache>(), rocket.state::<PgPool>()) else {
                    return;
                };
                if let Err(err) = cache.get(pool).await {
                    warn!("Catalog warm-up failed, will retry on first use: {err}");
                }
            })
        }))
    })
}
