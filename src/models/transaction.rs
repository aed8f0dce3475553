use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
        }
    }
}

/// The kind-specific half of a transaction. Exactly one category side is
/// populated, matching the CHECK constraint on the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionDetails {
    Expense {
        category_id: String,
        subcategory_id: Option<String>,
        tag: String,
    },
    Income {
        category_id: String,
    },
}

impl TransactionDetails {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionDetails::Expense { .. } => TransactionKind::Expense,
            TransactionDetails::Income { .. } => TransactionKind::Income,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub occurred_at: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub recurring_template_id: Option<Uuid>,
    pub details: TransactionDetails,
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        self.details.kind()
    }
}

/// Amounts are positive fixed-point values with at most two fractional digits.
pub fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut error = ValidationError::new("amount_positive");
        error.message = Some("Amount must be greater than zero".into());
        return Err(error);
    }
    if amount.round_dp(2) != *amount {
        let mut error = ValidationError::new("amount_scale");
        error.message = Some("Amount must have at most two decimal places".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpensePayload {
    pub occurred_at: String,
    #[validate(custom(function = "validate_amount"))]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub expense_category_id: String,
    pub expense_subcategory_id: Option<String>,
    #[validate(length(min = 1))]
    pub transaction_tag: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncomePayload {
    pub occurred_at: String,
    #[validate(custom(function = "validate_amount"))]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub income_category_id: String,
    pub notes: Option<String>,
}

/// Partial update. `kind` is required and immutable: it selects which category
/// fields are legal and must match the stored row.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTransactionPayload {
    pub kind: TransactionKind,
    pub occurred_at: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
    pub expense_category_id: Option<String>,
    pub expense_subcategory_id: Option<String>,
    pub transaction_tag: Option<String>,
    pub income_category_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
pub enum TransactionResponse {
    #[serde(rename = "expense")]
    Expense {
        id: Uuid,
        user_id: Uuid,
        occurred_at: NaiveDate,
        created_at: DateTime<Utc>,
        amount: Decimal,
        expense_category_id: String,
        expense_subcategory_id: Option<String>,
        transaction_tag: String,
        notes: Option<String>,
        recurring_template_id: Option<Uuid>,
    },
    #[serde(rename = "income")]
    Income {
        id: Uuid,
        user_id: Uuid,
        occurred_at: NaiveDate,
        created_at: DateTime<Utc>,
        amount: Decimal,
        income_category_id: String,
        notes: Option<String>,
        recurring_template_id: Option<Uuid>,
    },
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        match &tx.details {
            TransactionDetails::Expense {
                category_id,
                subcategory_id,
                tag,
            } => TransactionResponse::Expense {
                id: tx.id,
                user_id: tx.user_id,
                occurred_at: tx.occurred_at,
                created_at: tx.created_at,
                amount: tx.amount,
                expense_category_id: category_id.clone(),
                expense_subcategory_id: subcategory_id.clone(),
                transaction_tag: tag.clone(),
                notes: tx.notes.clone(),
                recurring_template_id: tx.recurring_template_id,
            },
            TransactionDetails::Income { category_id } => TransactionResponse::Income {
                id: tx.id,
                user_id: tx.user_id,
                occurred_at: tx.occurred_at,
                created_at: tx.created_at,
                amount: tx.amount,
                income_category_id: category_id.clone(),
                notes: tx.notes.clone(),
                recurring_template_id: tx.recurring_template_id,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodaySummaryResponse {
    pub expense_total: Decimal,
    pub expense_count: i64,
    pub income_total: Decimal,
    pub income_count: i64,
    pub has_logged_today: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(&dec("0")).is_err());
        assert!(validate_amount(&dec("-5.00")).is_err());
        assert!(validate_amount(&dec("0.01")).is_ok());
    }

    #[test]
    fn amount_capped_at_two_decimal_places() {
        assert!(validate_amount(&dec("12.34")).is_ok());
        assert!(validate_amount(&dec("12.345")).is_err());
    }

    #[test]
    fn response_is_kind_tagged() {
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            occurred_at: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            created_at: Utc::now(),
            amount: dec("9.99"),
            notes: None,
            recurring_template_id: None,
            details: TransactionDetails::Expense {
                category_id: "essentials".to_string(),
                subcategory_id: Some("groceries".to_string()),
                tag: "need".to_string(),
            },
        };

        let json = serde_json::to_value(TransactionResponse::from(&tx)).unwrap();
        assert_eq!(json["kind"], "expense");
        assert_eq!(json["expense_category_id"], "essentials");
        assert_eq!(json["occurred_at"], "2024-06-01");
        assert!(json.get("income_category_id").is_none());
    }
}
