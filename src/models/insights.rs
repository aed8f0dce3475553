use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::Serialize;
use rust_decimal::Decimal;

/// One month's derived aggregates. Serialized camelCase — this is the shape
/// the dashboard consumes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSnapshot {
    pub key: String,
    pub label: String,
    pub current_date: DateTime<Utc>,
    pub logged_days: i64,
    pub total_days: u32,
    pub total_spent: Decimal,
    pub budget: Decimal,
    pub last_month_delta: f64,
    pub categories: Vec<CategoryBreakdown>,
    pub savings: SavingsBreakdown,
    pub weekly: Vec<WeeklySpendingPoint>,
    pub transactions: Vec<RecentTransactionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub id: String,
    pub total: Decimal,
    /// Integer share of the month total; the breakdown sums to exactly 100
    /// unless the month is empty.
    pub percent: i64,
    pub items: i64,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategories: Option<Vec<SubcategoryBreakdown>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryBreakdown {
    pub id: String,
    pub total: Decimal,
    pub percent: i64,
    pub color: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySpendingPoint {
    pub week: u32,
    pub label: String,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsBreakdown {
    pub saved: Decimal,
    pub invested: Decimal,
    pub saved_delta: Option<f64>,
    pub invested_delta: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransactionSummary {
    pub amount: Decimal,
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailableMonth {
    pub key: String,
    pub label: String,
    pub year: i32,
    pub month: u32,
}
