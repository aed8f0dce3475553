use rocket::serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpenseCategory {
    pub id: String,
    pub label: String,
    pub color: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpenseSubcategory {
    pub id: String,
    pub category_id: String,
    pub label: String,
    pub sub_color: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IncomeCategory {
    pub id: String,
    pub label: String,
    pub color: String,
    pub sort_order: i32,
}

/// Expense category with its subcategories nested, ordered by sort_order.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseCategoryResponse {
    pub id: String,
    pub label: String,
    pub color: String,
    pub sort_order: i32,
    pub subcategories: Vec<ExpenseSubcategory>,
}
