use crate::auth::CurrentUser;
use crate::catalog::{Catalog, CatalogCache};
use crate::database::postgres_repository::PostgresRepository;
use crate::database::recurring::{NewTemplate, RecurringTemplateRepository};
use crate::dates;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::models::recurring::{
    CreateExpenseTemplatePayload, CreateIncomeTemplatePayload, RecurringTemplate, TemplateResponse, UpdateTemplatePayload,
    validate_recurrence_fields,
};
use crate::models::transaction::{TransactionDetails, TransactionKind};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, routes};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[allow(clippy::result_large_err)]
fn checked_expense_details(
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
        return Err(AppError::Validation("Transaction tag is required for expense templates".to_string()));
    }

    Ok(TransactionDetails::Expense {
        category_id,
        subcategory_id,
        tag,
    })
}

/// Merge a partial update over a stored template. The resulting recurrence
/// pattern is validated as a whole, so an update cannot leave a monthly
/// template without a day-of-month.
#[allow(clippy::result_large_err)]
fn apply_update(template: &mut RecurringTemplate, payload: &UpdateTemplatePayload) -> Result<(), AppError> {
    if let Some(amount) = payload.amount {
        template.amount = amount;
    }
    if let Some(notes) = &payload.notes {
        template.notes = Some(notes.clone());
    }
    if let Some(frequency) = payload.frequency {
        template.frequency = frequency;
        // A frequency change invalidates the old day field.
        match frequency {
            crate::models::recurring::Frequency::Monthly => template.day_of_week = None,
            _ => template.day_of_month = None,
        }
    }
    if let Some(day_of_week) = payload.day_of_week {
        template.day_of_week = Some(day_of_week);
    }
    if let Some(day_of_month) = payload.day_of_month {
        template.day_of_month = Some(day_of_month);
    }
    if let Some(start_date) = &payload.start_date {
        template.start_date = dates::parse_date(start_date)?;
    }
    if let Some(end_date) = &payload.end_date {
        template.end_date = Some(dates::parse_date(end_date)?);
    }
    if let Some(total_occurrences) = payload.total_occurrences {
        template.total_occurrences = Some(total_occurrences);
    }
    if let Some(is_paused) = payload.is_paused {
        template.is_paused = is_paused;
    }

    validate_recurrence_fields(template.frequency, template.day_of_week, template.day_of_month).map_err(AppError::Validation)?;

    if let Some(end) = template.end_date
        && end < template.start_date
    {
        return Err(AppError::Validation("end_date must not precede start_date".to_string()));
    }

    Ok(())
}

#[rocket::post("/create", data = "<payload>")]
pub async fn create_expense_template(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    current_user: CurrentUser,
    payload: JsonBody<CreateExpenseTemplatePayload>,
) -> Result<(Status, Json<TemplateResponse>), AppError> {
    payload.validate()?;
    validate_recurrence_fields(payload.frequency, payload.day_of_week, payload.day_of_month).map_err(AppError::Validation)?;

    let start_date = dates::parse_date(&payload.start_date)?;
    let end_date = payload.end_date.as_deref().map(dates::parse_date).transpose()?;
    if let Some(end) = end_date
        && end < start_date
    {
        return Err(AppError::Validation("end_date must not precede start_date".to_string()));
    }

    let catalog = catalog_cache.get(pool).await?;
    let details = checked_expense_details(
        catalog,
        payload.expense_category_id.clone(),
        payload.expense_subcategory_id.clone(),
        payload.transaction_tag.clone(),
    )?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let template = repo
        .create_template(&NewTemplate {
            user_id: current_user.id,
            amount: payload.amount,
            notes: payload.notes.clone(),
            details,
            frequency: payload.frequency,
            day_of_week: payload.day_of_week,
            day_of_month: payload.day_of_month,
            start_date,
            end_date,
            total_occurrences: payload.total_occurrences,
        })
        .await?;

    Ok((Status::Created, Json(TemplateResponse::from(&template))))
}

#[rocket::post("/create-income", data = "<payload>")]
pub async fn create_income_template(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    current_user: CurrentUser,
    payload: JsonBody<CreateIncomeTemplatePayload>,
) -> Result<(Status, Json<TemplateResponse>), AppError> {
    payload.validate()?;
    validate_recurrence_fields(payload.frequency, payload.day_of_week, payload.day_of_month).map_err(AppError::Validation)?;

    let start_date = dates::parse_date(&payload.start_date)?;
    let end_date = payload.end_date.as_deref().map(dates::parse_date).transpose()?;
    if let Some(end) = end_date
        && end < start_date
    {
        return Err(AppError::Validation("end_date must not precede start_date".to_string()));
    }

    let catalog = catalog_cache.get(pool).await?;
    if !catalog.category_exists(&payload.income_category_id, TransactionKind::Income) {
        return Err(AppError::CategoryNotFound(format!(
            "Income category '{}' not found",
            payload.income_category_id
        )));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let template = repo
        .create_template(&NewTemplate {
            user_id: current_user.id,
            amount: payload.amount,
            notes: payload.notes.clone(),
            details: TransactionDetails::Income {
                category_id: payload.income_category_id.clone(),
            },
            frequency: payload.frequency,
            day_of_week: payload.day_of_week,
            day_of_month: payload.day_of_month,
            start_date,
            end_date,
            total_occurrences: payload.total_occurrences,
        })
        .await?;

    Ok((Status::Created, Json(TemplateResponse::from(&template))))
}

#[rocket::get("/list?<include_paused>")]
pub async fn list_templates(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    include_paused: Option<bool>,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let templates = repo.list_templates(&current_user.id, include_paused.unwrap_or(false)).await?;

    Ok(Json(templates.iter().map(TemplateResponse::from).collect()))
}

#[rocket::get("/<id>/get")]
pub async fn get_template(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TemplateResponse>, AppError> {
    let template_id = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };

    let template = repo
        .get_template(&template_id, &current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recurring template not found".to_string()))?;

    Ok(Json(TemplateResponse::from(&template)))
}

#[rocket::patch("/<id>/update", data = "<payload>")]
pub async fn update_template(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    id: &str,
    payload: JsonBody<UpdateTemplatePayload>,
) -> Result<Json<TemplateResponse>, AppError> {
    payload.validate()?;
    let template_id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let mut template = repo
        .get_template(&template_id, &current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recurring template not found".to_string()))?;

    apply_update(&mut template, &payload)?;

    let updated = repo.update_template(&template).await?;
    Ok(Json(TemplateResponse::from(&updated)))
}

#[rocket::delete("/<id>/delete")]
pub async fn delete_template(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    let template_id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    if !repo.delete_template(&template_id, &current_user.id).await? {
        return Err(AppError::NotFound("Recurring template not found".to_string()));
    }

    Ok(Status::NoContent)
}

async fn set_paused(pool: &PgPool, user_id: &Uuid, id: &str, is_paused: bool) -> Result<Json<TemplateResponse>, AppError> {
    let template_id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.clone() };
    let mut template = repo
        .get_template(&template_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recurring template not found".to_string()))?;
    template.is_paused = is_paused;

    let updated = repo.update_template(&template).await?;
    Ok(Json(TemplateResponse::from(&updated)))
}

#[rocket::patch("/<id>/pause")]
pub async fn pause_template(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TemplateResponse>, AppError> {
    set_paused(pool, &current_user.id, id, true).await
}

#[rocket::patch("/<id>/resume")]
pub async fn resume_template(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TemplateResponse>, AppError> {
    set_paused(pool, &current_user.id, id, false).await
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        create_expense_template,
        create_income_template,
        list_templates,
        get_template,
        update_template,
        delete_template,
        pause_template,
        resume_template
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recurring::Frequency;
    use chrono::{NaiveDate, Utc};

    fn monthly_template() -> RecurringTemplate {
        RecurringTemplate {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: "100.00".parse().unwrap(),
            notes: None,
            details: TransactionDetails::Income {
                category_id: "salary".into(),
            },
            frequency: Frequency::Monthly,
            day_of_week: None,
            day_of_month: Some(31),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            end_date: None,
            total_occurrences: None,
            is_paused: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn update_switches_frequency_consistently() {
        let mut template = monthly_template();
        let payload = UpdateTemplatePayload {
            frequency: Some(Frequency::Weekly),
            day_of_week: Some(4),
            ..Default::default()
        };

        apply_update(&mut template, &payload).unwrap();
        assert_eq!(template.frequency, Frequency::Weekly);
        assert_eq!(template.day_of_week, Some(4));
        assert_eq!(template.day_of_month, None);
    }

    #[test]
    fn update_rejects_inconsistent_recurrence() {
        let mut template = monthly_template();
        // Weekly without a weekday is invalid.
        let payload = UpdateTemplatePayload {
            frequency: Some(Frequency::Weekly),
            ..Default::default()
        };
        assert!(matches!(apply_update(&mut template, &payload), Err(AppError::Validation(_))));
    }

    #[test]
    fn update_rejects_end_before_start() {
        let mut template = monthly_template();
        let payload = UpdateTemplatePayload {
            end_date: Some("2023-12-01".into()),
            ..Default::default()
        };
        assert!(matches!(apply_update(&mut template, &payload), Err(AppError::Validation(_))));
    }

    #[test]
    fn update_toggles_pause() {
        let mut template = monthly_template();
        let payload = UpdateTemplatePayload {
            is_paused: Some(true),
            ..Default::default()
        };
        apply_update(&mut template, &payload).unwrap();
        assert!(template.is_paused);
    }

    mod http {
        use crate::{Config, build_rocket};
        use rocket::http::Status;
        use rocket::local::asynchronous::Client;

        #[rocket::async_test]
        async fn template_endpoints_require_auth() {
            let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

            let response = client.get("/api/v1/transactions/recurring/list").dispatch().await;
            assert_eq!(response.status(), Status::Unauthorized);
        }
    }
}
