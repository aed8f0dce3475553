use crate::models::transaction::{TransactionDetails, TransactionKind, validate_amount};
use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Days between occurrences for the fixed-interval frequencies.
    pub fn interval_days(&self) -> Option<i64> {
        match self {
            Frequency::Weekly => Some(7),
            Frequency::Biweekly => Some(14),
            Frequency::Monthly => None,
        }
    }
}

/// A recurrence specification. Holds no money of its own; the materializer
/// turns it into concrete transaction rows on demand.
#[derive(Debug, Clone)]
pub struct RecurringTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub details: TransactionDetails,
    pub frequency: Frequency,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_occurrences: Option<i32>,
    pub is_paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringTemplate {
    pub fn kind(&self) -> TransactionKind {
        self.details.kind()
    }
}

/// The frequency/day pairing mirrors the table's CHECK constraint: monthly
/// templates carry a day-of-month, weekly and biweekly ones a day-of-week.
pub fn validate_recurrence_fields(
    frequency: Frequency,
    day_of_week: Option<i32>,
    day_of_month: Option<i32>,
) -> Result<(), String> {
    match frequency {
        Frequency::Monthly => {
            let Some(day) = day_of_month else {
                return Err("day_of_month is required for monthly frequency".to_string());
            };
            if !(1..=31).contains(&day) {
                return Err("day_of_month must be between 1 and 31".to_string());
            }
            if day_of_week.is_some() {
                return Err("day_of_week should not be set for monthly frequency".to_string());
            }
        }
        Frequency::Weekly | Frequency::Biweekly => {
            let Some(day) = day_of_week else {
                return Err(format!("day_of_week is required for {} frequency", frequency.as_db_str()));
            };
            if !(0..=6).contains(&day) {
                return Err("day_of_week must be between 0 (Monday) and 6 (Sunday)".to_string());
            }
            if day_of_month.is_some() {
                return Err(format!("day_of_month should not be set for {} frequency", frequency.as_db_str()));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseTemplatePayload {
    #[validate(custom(function = "validate_amount"))]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub expense_category_id: String,
    pub expense_subcategory_id: Option<String>,
    #[validate(length(min = 1))]
    pub transaction_tag: String,
    pub notes: Option<String>,
    pub frequency: Frequency,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: String,
    pub end_date: Option<String>,
    #[validate(range(min = 1))]
    pub total_occurrences: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncomeTemplatePayload {
    #[validate(custom(function = "validate_amount"))]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub income_category_id: String,
    pub notes: Option<String>,
    pub frequency: Frequency,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: String,
    pub end_date: Option<String>,
    #[validate(range(min = 1))]
    pub total_occurrences: Option<i32>,
}

/// Partial template update. Recurrence fields are merged over the stored
/// template and the combination is re-validated as a whole.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTemplatePayload {
    #[validate(custom(function = "validate_amount"))]
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
    pub frequency: Option<Frequency>,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[validate(range(min = 1))]
    pub total_occurrences: Option<i32>,
    pub is_paused: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
pub enum TemplateResponse {
    #[serde(rename = "expense")]
    Expense {
        id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        expense_category_id: String,
        expense_subcategory_id: Option<String>,
        transaction_tag: String,
        notes: Option<String>,
        frequency: Frequency,
        day_of_week: Option<i32>,
        day_of_month: Option<i32>,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        total_occurrences: Option<i32>,
        is_paused: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    #[serde(rename = "income")]
    Income {
        id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        income_category_id: String,
        notes: Option<String>,
        frequency: Frequency,
        day_of_week: Option<i32>,
        day_of_month: Option<i32>,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        total_occurrences: Option<i32>,
        is_paused: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
}

impl From<&RecurringTemplate> for TemplateResponse {
    fn from(template: &RecurringTemplate) -> Self {
        match &template.details {
            TransactionDetails::Expense {
                category_id,
                subcategory_id,
                tag,
            } => TemplateResponse::Expense {
                id: template.id,
                user_id: template.user_id,
                amount: template.amount,
                expense_category_id: category_id.clone(),
                expense_subcategory_id: subcategory_id.clone(),
                transaction_tag: tag.clone(),
                notes: template.notes.clone(),
                frequency: template.frequency,
                day_of_week: template.day_of_week,
                day_of_month: template.day_of_month,
                start_date: template.start_date,
                end_date: template.end_date,
                total_occurrences: template.total_occurrences,
                is_paused: template.is_paused,
                created_at: template.created_at,
                updated_at: template.updated_at,
            },
            TransactionDetails::Income { category_id } => TemplateResponse::Income {
                id: template.id,
                user_id: template.user_id,
                amount: template.amount,
                income_category_id: category_id.clone(),
                notes: template.notes.clone(),
                frequency: template.frequency,
                day_of_week: template.day_of_week,
                day_of_month: template.day_of_month,
                start_date: template.start_date,
                end_date: template.end_date,
                total_occurrences: template.total_occurrences,
                is_paused: template.is_paused,
                created_at: template.created_at,
                updated_at: template.updated_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_requires_day_of_month() {
        assert!(validate_recurrence_fields(Frequency::Monthly, None, Some(15)).is_ok());
        assert!(validate_recurrence_fields(Frequency::Monthly, None, None).is_err());
        assert!(validate_recurrence_fields(Frequency::Monthly, Some(2), Some(15)).is_err());
        assert!(validate_recurrence_fields(Frequency::Monthly, None, Some(0)).is_err());
        assert!(validate_recurrence_fields(Frequency::Monthly, None, Some(32)).is_err());
    }

    #[test]
    fn weekly_requires_day_of_week() {
        assert!(validate_recurrence_fields(Frequency::Weekly, Some(0), None).is_ok());
        assert!(validate_recurrence_fields(Frequency::Biweekly, Some(6), None).is_ok());
        assert!(validate_recurrence_fields(Frequency::Weekly, None, None).is_err());
        assert!(validate_recurrence_fields(Frequency::Biweekly, Some(7), None).is_err());
        assert!(validate_recurrence_fields(Frequency::Weekly, Some(2), Some(10)).is_err());
    }

    #[test]
    fn interval_days_by_frequency() {
        assert_eq!(Frequency::Weekly.interval_days(), Some(7));
        assert_eq!(Frequency::Biweekly.interval_days(), Some(14));
        assert_eq!(Frequency::Monthly.interval_days(), None);
    }
}
