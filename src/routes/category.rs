use crate::auth::CurrentUser;
use crate::catalog::CatalogCache;
use crate::error::app_error::AppError;
use crate::models::category::{ExpenseCategoryResponse, IncomeCategory};
use rocket::serde::json::Json;
use rocket::{State, routes};
use sqlx::PgPool;

#[rocket::get("/expense-categories/list")]
pub async fn list_expense_categories(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    _current_user: CurrentUser,
) -> Result<Json<Vec<ExpenseCategoryResponse>>, AppError> {
    let catalog = catalog_cache.get(pool).await?;
    Ok(Json(catalog.expense_categories().to_vec()))
}

#[rocket::get("/income-categories/list")]
pub async fn list_income_categories(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    _current_user: CurrentUser,
) -> Result<Json<Vec<IncomeCategory>>, AppError> {
    let catalog = catalog_cache.get(pool).await?;
    Ok(Json(catalog.income_categories().to_vec()))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list_expense_categories, list_income_categories]
}
