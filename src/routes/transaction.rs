use crate::auth::CurrentUser;
use crate::catalog::{Catalog, CatalogCache};
use crate::database::postgres_repository::PostgresRepository;
use crate::database::profile::ProfileRepository;
use crate::database::transaction::{NewTransaction, TransactionRepository};
use crate::dates;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::models::transaction::{
    CreateExpensePayload, CreateIncomePayload, TodaySummaryResponse, Transaction, TransactionDetails, TransactionKind,
    TransactionResponse, UpdateTransactionPayload,
};
use crate::service::{experience, materializer};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, routes};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

#[allow(clippy::result_large_err)]
fn expense_details(
    catalog: &Catalog,
    category_id: String,
    subcategory_id: Option<String>,
    tag: String,
) -> Result<TransactionDetails, AppError> {
    if !catalog.category_exists(&category_id, TransactionKind::Expense) {
        return Err(AppError::CategoryNotFound(format!("Expense category '{category_id}' not found")));
    }
    if let Some(subcategory_id) = &subcategory_id
        && !catalog.subcategory_exists(subcategory_id)
    {
        return Err(AppError::CategoryNotFound(format!(
            "Expense subcategory '{subcategory_id}' not found"
        )));
    }
    if tag.trim().is_empty() {
        return Err(AppError::Validation(
            "Transaction tag is required for expense transactions".to_string(),
        ));
    }

    Ok(TransactionDetails::Expense {
        category_id,
        subcategory_id,
        tag,
    })
}

#[allow(clippy::result_large_err)]
fn income_details(catalog: &Catalog, category_id: String) -> Result<TransactionDetails, AppError> {
    if !catalog.category_exists(&category_id, TransactionKind::Income) {
        return Err(AppError::CategoryNotFound(format!("Income category '{category_id}' not found")));
    }

    Ok(TransactionDetails::Income { category_id })
}

/// Merge a partial update into an existing transaction. The kind is immutable
/// and gates which category fields may appear.
#[allow(clippy::result_large_err)]
fn apply_update(transaction: &mut Transaction, payload: &UpdateTransactionPayload, catalog: &Catalog) -> Result<(), AppError> {
    if transaction.kind() != payload.kind {
        return Err(AppError::Validation(format!(
            "Cannot change transaction kind from {} to {}",
            transaction.kind().as_db_str(),
            payload.kind.as_db_str()
        )));
    }

    if let Some(occurred_at) = &payload.occurred_at {
        transaction.occurred_at = dates::parse_date(occurred_at)?;
    }
    if let Some(amount) = payload.amount {
        transaction.amount = amount;
    }
    if let Some(notes) = &payload.notes {
        transaction.notes = Some(notes.clone());
    }

    match &mut transaction.details {
        TransactionDetails::Expense {
            category_id,
            subcategory_id,
            tag,
        } => {
            if payload.income_category_id.is_some() {
                return Err(AppError::Validation(
                    "income_category_id is not valid for an expense transaction".to_string(),
                ));
            }
            if let Some(new_category) = &payload.expense_category_id {
                if !catalog.category_exists(new_category, TransactionKind::Expense) {
                    return Err(AppError::CategoryNotFound(format!("Expense category '{new_category}' not found")));
                }
                *category_id = new_category.clone();
            }
            if let Some(new_subcategory) = &payload.expense_subcategory_id {
                if new_subcategory.is_empty() {
                    *subcategory_id = None;
                } else {
                    if !catalog.subcategory_exists(new_subcategory) {
                        return Err(AppError::CategoryNotFound(format!(
                            "Expense subcategory '{new_subcategory}' not found"
                        )));
                    }
                    *subcategory_id = Some(new_subcategory.clone());
                }
            }
            if let Some(new_tag) = &payload.transaction_tag {
                if new_tag.trim().is_empty() {
                    return Err(AppError::Validation("Transaction tag cannot be empty".to_string()));
                }
                *tag = new_tag.clone();
            }
        }
        TransactionDetails::Income { category_id } => {
            if payload.expense_category_id.is_some() || payload.expense_subcategory_id.is_some() || payload.transaction_tag.is_some() {
                return Err(AppError::Validation(
                    "Expense fields are not valid for an income transaction".to_string(),
                ));
            }
            if let Some(new_category) = &payload.income_category_id {
                if !catalog.category_exists(new_category, TransactionKind::Income) {
                    return Err(AppError::CategoryNotFound(format!("Income category '{new_category}' not found")));
                }
                *category_id = new_category.clone();
            }
        }
    }

    Ok(())
}

/// XP is a side effect of logging, never a reason for the write to fail.
async fn award_xp_best_effort(repo: &PostgresRepository, user_id: &Uuid) {
    if let Err(err) = experience::award_transaction_xp(repo, user_id).await {
        warn!(user_id = %user_id, error = ?err, "Failed to award transaction XP");
    }
}

#[rocket::post("/create-expense", data = "<payload>")]
pub async fn create_expense(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    current_user: CurrentUser,
    payload: JsonBody<CreateExpensePayload>,
) -> Result<(Status, Json<TransactionResponse>), AppError> {
    payload.validate()?;
    let occurred_at = dates::parse_date(&payload.occurred_at)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let catalog = catalog_cache.get(pool).await?;
    let details = expense_details(
        catalog,
        payload.expense_category_id.clone(),
        payload.expense_subcategory_id.clone(),
        payload.transaction_tag.clone(),
    )?;

    let transaction = repo
        .create_transaction(&NewTransaction {
            user_id: current_user.id,
            occurred_at,
            amount: payload.amount,
            notes: payload.notes.clone(),
            recurring_template_id: None,
            details,
        })
        .await?;

    award_xp_best_effort(&repo, &current_user.id).await;

    Ok((Status::Created, Json(TransactionResponse::from(&transaction))))
}

#[rocket::post("/create-income", data = "<payload>")]
pub async fn create_income(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    current_user: CurrentUser,
    payload: JsonBody<CreateIncomePayload>,
) -> Result<(Status, Json<TransactionResponse>), AppError> {
    payload.validate()?;
    let occurred_at = dates::parse_date(&payload.occurred_at)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let catalog = catalog_cache.get(pool).await?;
    let details = income_details(catalog, payload.income_category_id.clone())?;

    let transaction = repo
        .create_transaction(&NewTransaction {
            user_id: current_user.id,
            occurred_at,
            amount: payload.amount,
            notes: payload.notes.clone(),
            recurring_template_id: None,
            details,
        })
        .await?;

    award_xp_best_effort(&repo, &current_user.id).await;

    Ok((Status::Created, Json(TransactionResponse::from(&transaction))))
}

/// List transactions in a window. Recurring templates are materialized over
/// the window first, so expected occurrences show up without a writer having
/// run.
#[rocket::get("/list?<start_date>&<end_date>")]
pub async fn list_transactions(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    start_date: String,
    end_date: String,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let start = dates::parse_date(&start_date)?;
    let end = dates::parse_date(&end_date)?;
    if start > end {
        return Err(AppError::Validation("start_date must not be after end_date".to_string()));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    materializer::materialize_range(&repo, &current_user.id, start, end).await?;

    let transactions = repo.list_by_date_range(&current_user.id, start, end).await?;
    Ok(Json(transactions.iter().map(TransactionResponse::from).collect()))
}

#[rocket::get("/today-summary")]
pub async fn today_summary(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<TodaySummaryResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let profile = repo
        .get_profile(&current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let today = dates::today_in(&profile.timezone);

    materializer::materialize_range(&repo, &current_user.id, today, today).await?;

    let summary = repo.today_summary(&current_user.id, today).await?;
    Ok(Json(summary))
}

#[rocket::patch("/update/<id>", data = "<payload>")]
pub async fn update_transaction(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    current_user: CurrentUser,
    id: &str,
    payload: JsonBody<UpdateTransactionPayload>,
) -> Result<Json<TransactionResponse>, AppError> {
    payload.validate()?;
    let transaction_id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let mut transaction = repo
        .get_transaction(&transaction_id, &current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    let catalog = catalog_cache.get(pool).await?;
    apply_update(&mut transaction, &payload, catalog)?;

    let updated = repo.update_transaction(&transaction).await?;
    Ok(Json(TransactionResponse::from(&updated)))
}

#[rocket::delete("/delete/<id>")]
pub async fn delete_transaction(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    let transaction_id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    if !repo.delete_transaction(&transaction_id, &current_user.id).await? {
        return Err(AppError::NotFound("Transaction not found".to_string()));
    }

    Ok(Status::NoContent)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        create_expense,
        create_income,
        list_transactions,
        today_summary,
        update_transaction,
        delete_transaction
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::category::{ExpenseCategory, ExpenseSubcategory, IncomeCategory};
    use chrono::Utc;

    fn catalog() -> Catalog {
        Catalog::build(
            vec![ExpenseCategory {
                id: "essentials".into(),
                label: "Essentials".into(),
                color: "#f59e0b".into(),
                sort_order: 1,
            }],
            vec![ExpenseSubcategory {
                id: "groceries".into(),
                category_id: "essentials".into(),
                label: "Groceries".into(),
                sub_color: "#fef3c7".into(),
                sort_order: 1,
            }],
            vec![IncomeCategory {
                id: "salary".into(),
                label: "Salary".into(),
                color: "#2563EB".into(),
                sort_order: 1,
            }],
        )
    }

    fn expense_transaction() -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            occurred_at: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            created_at: Utc::now(),
            amount: "10.00".parse().unwrap(),
            notes: None,
            recurring_template_id: None,
            details: TransactionDetails::Expense {
                category_id: "essentials".into(),
                subcategory_id: Some("groceries".into()),
                tag: "need".into(),
            },
        }
    }

    #[test]
    fn expense_details_rejects_unknown_category() {
        let catalog = catalog();
        let err = expense_details(&catalog, "nope".into(), None, "need".into()).unwrap_err();
        assert!(matches!(err, AppError::CategoryNotFound(_)));

        let err = expense_details(&catalog, "essentials".into(), Some("nope".into()), "need".into()).unwrap_err();
        assert!(matches!(err, AppError::CategoryNotFound(_)));
    }

    #[test]
    fn expense_details_rejects_blank_tag() {
        let err = expense_details(&catalog(), "essentials".into(), None, "   ".into()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn income_details_checks_the_income_side() {
        let catalog = catalog();
        assert!(income_details(&catalog, "salary".into()).is_ok());
        // An expense category id is not an income category.
        assert!(matches!(
            income_details(&catalog, "essentials".into()),
            Err(AppError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn update_cannot_change_kind() {
        let mut tx = expense_transaction();
        let payload = UpdateTransactionPayload {
            kind: TransactionKind::Income,
            occurred_at: None,
            amount: None,
            notes: None,
            expense_category_id: None,
            expense_subcategory_id: None,
            transaction_tag: None,
            income_category_id: None,
        };

        let err = apply_update(&mut tx, &payload, &catalog()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn update_merges_partial_fields() {
        let mut tx = expense_transaction();
        let payload = UpdateTransactionPayload {
            kind: TransactionKind::Expense,
            occurred_at: Some("2024-07-02".into()),
            amount: Some("42.50".parse().unwrap()),
            notes: Some("weekly shop".into()),
            expense_category_id: None,
            expense_subcategory_id: Some(String::new()),
            transaction_tag: None,
            income_category_id: None,
        };

        apply_update(&mut tx, &payload, &catalog()).unwrap();
        assert_eq!(tx.occurred_at, chrono::NaiveDate::from_ymd_opt(2024, 7, 2).unwrap());
        assert_eq!(tx.amount, "42.50".parse().unwrap());
        assert_eq!(tx.notes.as_deref(), Some("weekly shop"));
        // An empty subcategory id clears the subcategory.
        assert!(matches!(
            &tx.details,
            TransactionDetails::Expense { subcategory_id: None, .. }
        ));
    }

    #[test]
    fn update_rejects_wrong_side_fields() {
        let mut tx = expense_transaction();
        let payload = UpdateTransactionPayload {
            kind: TransactionKind::Expense,
            occurred_at: None,
            amount: None,
            notes: None,
            expense_category_id: None,
            expense_subcategory_id: None,
            transaction_tag: None,
            income_category_id: Some("salary".into()),
        };

        let err = apply_update(&mut tx, &payload, &catalog()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn update_rejects_bad_date() {
        let mut tx = expense_transaction();
        let payload = UpdateTransactionPayload {
            kind: TransactionKind::Expense,
            occurred_at: Some("02/07/2024".into()),
            amount: None,
            notes: None,
            expense_category_id: None,
            expense_subcategory_id: None,
            transaction_tag: None,
            income_category_id: None,
        };

        let err = apply_update(&mut tx, &payload, &catalog()).unwrap_err();
        assert!(matches!(err, AppError::InvalidDateFormat(_)));
    }

    mod http {
        use crate::{Config, build_rocket};
        use rocket::http::{ContentType, Status};
        use rocket::local::asynchronous::Client;

        #[rocket::async_test]
        async fn endpoints_require_auth() {
            let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

            let response = client
                .get("/api/v1/transactions/list?start_date=2024-01-01&end_date=2024-01-31")
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Unauthorized);

            let response = client
                .post("/api/v1/transactions/create-expense")
                .header(ContentType::JSON)
                .body(r#"{"occurred_at":"2024-01-01","amount":5,"expense_category_id":"essentials","transaction_tag":"need"}"#)
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Unauthorized);

            let response = client.delete("/api/v1/transactions/delete/not-a-uuid").dispatch().await;
            assert_eq!(response.status(), Status::Unauthorized);
        }
    }
}
