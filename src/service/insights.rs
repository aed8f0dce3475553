use crate::catalog::Catalog;
use crate::database::budget_plan::BudgetPlanRepository;
use crate::database::insights::{CategoryAggregate, WeekAggregate};
use crate::database::postgres_repository::PostgresRepository;
use crate::dates;
use crate::error::app_error::AppError;
use crate::models::insights::{
    AvailableMonth, CategoryBreakdown, MonthSnapshot, SavingsBreakdown, SubcategoryBreakdown, WeeklySpendingPoint,
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

const RECENT_TRANSACTION_LIMIT: i64 = 5;
const SAVINGS_CATEGORY: &str = "savings";
const INVESTMENTS_CATEGORY: &str = "investments";

const MONTH_KEYS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub fn month_key(year: i32, month: u32) -> String {
    format!("{}-{}", MONTH_KEYS[(month - 1) as usize], year)
}

pub fn month_label(year: i32, month: u32) -> String {
    format!("{} {}", MONTH_NAMES[(month - 1) as usize], year)
}

/// Relative change versus the previous month: (current - previous) / previous.
/// A previous of zero maps to 1.0 when anything was spent and 0.0 otherwise.
pub fn month_over_month_delta(current: Decimal, previous: Decimal) -> f64 {
    if previous.is_zero() {
        return if current > Decimal::ZERO { 1.0 } else { 0.0 };
    }
    ((current - previous) / previous).to_f64().unwrap_or(0.0)
}

/// Largest-remainder rounding: floor every share, then hand the leftover
/// points one by one to the entries with the biggest fractional remainder
/// (ties to the lower index). The result sums to exactly 100, or is all zero
/// when the inputs are.
pub fn round_percentages(raw: &[f64]) -> Vec<i64> {
    if raw.is_empty() {
        return Vec::new();
    }

    let total: f64 = raw.iter().sum();
    if total == 0.0 {
        return vec![0; raw.len()];
    }

    let scale = 100.0 / total;
    let scaled: Vec<f64> = raw.iter().map(|p| p * scale).collect();
    let mut rounded: Vec<i64> = scaled.iter().map(|p| p.floor() as i64).collect();
    let residual = 100 - rounded.iter().sum::<i64>();

    let mut by_remainder: Vec<(usize, f64)> = scaled
        .iter()
        .enumerate()
        .map(|(idx, p)| (idx, p - p.floor()))
        .collect();

    if residual > 0 {
        by_remainder.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        for (idx, _) in by_remainder.iter().take(residual as usize) {
            rounded[*idx] += 1;
        }
    } else if residual < 0 {
        by_remainder.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        let mut to_remove = -residual;
        for (idx, _) in by_remainder {
            if to_remove == 0 {
                break;
            }
            if rounded[idx] > 0 {
                rounded[idx] -= 1;
                to_remove -= 1;
            }
        }
    }

    rounded
}

fn percent_of(part: Decimal, total: Decimal) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (part / total * Decimal::from(100)).to_f64().unwrap_or(0.0)
}

struct CategoryBucket {
    id: String,
    total: Decimal,
    count: i64,
    subcategories: Vec<(String, Decimal)>,
}

/// Fold (category, subcategory) aggregates into the breakdown: one entry per
/// category with integer percents of the month total, subcategory percents of
/// the parent total, colors from the catalog. Ordered by percent descending;
/// ties keep catalog sort order (the aggregates arrive in that order and the
/// sort is stable).
pub fn build_category_breakdown(aggregates: &[CategoryAggregate], total_spent: Decimal, catalog: &Catalog) -> Vec<CategoryBreakdown> {
    let mut buckets: Vec<CategoryBucket> = Vec::new();
    for aggregate in aggregates {
        let index = match buckets.iter().position(|b| b.id == aggregate.category_id) {
            Some(index) => index,
            None => {
                buckets.push(CategoryBucket {
                    id: aggregate.category_id.clone(),
                    total: Decimal::ZERO,
                    count: 0,
                    subcategories: Vec::new(),
                });
                buckets.len() - 1
            }
        };
        let bucket = &mut buckets[index];
        bucket.total += aggregate.total;
        bucket.count += aggregate.count;
        if let Some(subcategory_id) = &aggregate.subcategory_id {
            bucket.subcategories.push((subcategory_id.clone(), aggregate.total));
        }
    }

    let raw_percents: Vec<f64> = buckets.iter().map(|b| percent_of(b.total, total_spent)).collect();
    let percents = round_percentages(&raw_percents);

    let mut categories: Vec<CategoryBreakdown> = buckets
        .into_iter()
        .zip(percents)
        .map(|(bucket, percent)| {
            let subcategories = if bucket.subcategories.is_empty() {
                None
            } else {
                let raw: Vec<f64> = bucket.subcategories.iter().map(|(_, total)| percent_of(*total, bucket.total)).collect();
                let sub_percents = round_percentages(&raw);
                Some(
                    bucket
                        .subcategories
                        .iter()
                        .zip(sub_percents)
                        .map(|((id, total), percent)| SubcategoryBreakdown {
                            color: catalog.subcategory_color(id).to_string(),
                            id: id.clone(),
                            total: *total,
                            percent,
                        })
                        .collect(),
                )
            };

            CategoryBreakdown {
                color: catalog.category_color(&bucket.id).to_string(),
                id: bucket.id,
                total: bucket.total,
                percent,
                items: bucket.count,
                subcategories,
            }
        })
        .collect();

    categories.sort_by(|a, b| b.percent.cmp(&a.percent));
    categories
}

/// Every week band of the month appears, missing ones with a zero total.
pub fn build_weekly_breakdown(aggregates: &[WeekAggregate], year: i32, month: u32) -> Vec<WeeklySpendingPoint> {
    let total_days = dates::days_in_month(year, month);
    let max_week = ((total_days - 1) / 7) + 1;

    (1..=max_week)
        .map(|week| {
            let total = aggregates
                .iter()
                .find(|a| a.week == week as i32)
                .map(|a| a.total)
                .unwrap_or(Decimal::ZERO);
            WeeklySpendingPoint {
                week,
                label: format!("Week {week}"),
                total,
            }
        })
        .collect()
}

#[allow(clippy::result_large_err)]
fn validate_month(year: i32, month: u32) -> Result<(), AppError> {
    if !(2000..=2100).contains(&year) {
        return Err(AppError::InsightsValidation(format!(
            "Invalid year: {year}. Must be between 2000 and 2100."
        )));
    }
    if !(1..=12).contains(&month) {
        return Err(AppError::InsightsValidation(format!("Invalid month: {month}. Must be between 1 and 12.")));
    }
    Ok(())
}

pub async fn month_snapshot(
    repo: &PostgresRepository,
    catalog: &Catalog,
    user_id: &Uuid,
    year: i32,
    month: u32,
) -> Result<MonthSnapshot, AppError> {
    validate_month(year, month)?;

    if repo.get_budget_plan(user_id).await?.is_none() {
        return Err(AppError::NotFound("Budget plan not found. Create one to view insights.".to_string()));
    }

    let (start, end) = dates::month_bounds(year, month);
    let (prev_year, prev_month) = dates::previous_month(year, month);
    let (prev_start, prev_end) = dates::month_bounds(prev_year, prev_month);

    let total_spent = repo.total_expenses(user_id, start, end).await?;
    let prev_total = repo.total_expenses(user_id, prev_start, prev_end).await?;
    let budget = repo.total_income(user_id, start, end).await?;
    let logged_days = repo.count_logged_days(user_id, start, end).await?;

    let category_aggregates = repo.aggregate_expenses_by_category(user_id, start, end).await?;
    let categories = build_category_breakdown(&category_aggregates, total_spent, catalog);

    let week_aggregates = repo.aggregate_expenses_by_week(user_id, start, end).await?;
    let weekly = build_weekly_breakdown(&week_aggregates, year, month);

    let saved = repo.total_by_category(user_id, SAVINGS_CATEGORY, start, end).await?;
    let invested = repo.total_by_category(user_id, INVESTMENTS_CATEGORY, start, end).await?;
    let prev_saved = repo.total_by_category(user_id, SAVINGS_CATEGORY, prev_start, prev_end).await?;
    let prev_invested = repo.total_by_category(user_id, INVESTMENTS_CATEGORY, prev_start, prev_end).await?;

    let savings = SavingsBreakdown {
        saved,
        invested,
        saved_delta: (!prev_saved.is_zero()).then(|| month_over_month_delta(saved, prev_saved)),
        invested_delta: (!prev_invested.is_zero()).then(|| month_over_month_delta(invested, prev_invested)),
    };

    let transactions = repo.recent_expenses(user_id, start, end, RECENT_TRANSACTION_LIMIT).await?;

    // Anchored to the middle of the requested month so clients derive ranges
    // for that month, not for the wall clock.
    let current_date = Utc
        .with_ymd_and_hms(year, month, 15, 12, 0, 0)
        .single()
        .expect("mid-month noon is unambiguous");

    Ok(MonthSnapshot {
        key: month_key(year, month),
        label: month_label(year, month),
        current_date,
        logged_days,
        total_days: dates::days_in_month(year, month),
        total_spent,
        budget,
        last_month_delta: month_over_month_delta(total_spent, prev_total),
        categories,
        savings,
        weekly,
        transactions,
    })
}

pub async fn available_months(repo: &PostgresRepository, user_id: &Uuid) -> Result<Vec<AvailableMonth>, AppError> {
    let months = repo.available_months(user_id).await?;

    Ok(months
        .into_iter()
        .map(|m| AvailableMonth {
            key: month_key(m.year, m.month as u32),
            label: month_label(m.year, m.month as u32),
            year: m.year,
            month: m.month as u32,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::models::category::{ExpenseCategory, ExpenseSubcategory, IncomeCategory};
    use proptest::prelude::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn catalog() -> Catalog {
        Catalog::build(
            vec![
                ExpenseCategory {
                    id: "essentials".into(),
                    label: "Essentials".into(),
                    color: "#f59e0b".into(),
                    sort_order: 1,
                },
                ExpenseCategory {
                    id: "lifestyle".into(),
                    label: "Lifestyle".into(),
                    color: "#f472b6".into(),
                    sort_order: 2,
                },
                ExpenseCategory {
                    id: "personal".into(),
                    label: "Personal".into(),
                    color: "#3b82f6".into(),
                    sort_order: 3,
                },
            ],
            vec![
                ExpenseSubcategory {
                    id: "groceries".into(),
                    category_id: "essentials".into(),
                    label: "Groceries".into(),
                    sub_color: "#fef3c7".into(),
                    sort_order: 1,
                },
                ExpenseSubcategory {
                    id: "transport".into(),
                    category_id: "essentials".into(),
                    label: "Transport".into(),
                    sub_color: "#fbbf24".into(),
                    sort_order: 4,
                },
            ],
            vec![IncomeCategory {
                id: "salary".into(),
                label: "Salary".into(),
                color: "#2563EB".into(),
                sort_order: 1,
            }],
        )
    }

    #[test]
    fn month_key_and_label_formats() {
        assert_eq!(month_key(2024, 6), "jun-2024");
        assert_eq!(month_label(2024, 6), "June 2024");
        assert_eq!(month_key(2023, 12), "dec-2023");
        assert_eq!(month_label(2023, 1), "January 2023");
    }

    #[test]
    fn delta_against_zero_previous() {
        assert_eq!(month_over_month_delta(dec("100"), dec("0")), 1.0);
        assert_eq!(month_over_month_delta(dec("0"), dec("0")), 0.0);
    }

    #[test]
    fn delta_regular_case() {
        assert_eq!(month_over_month_delta(dec("112"), dec("100")), 0.12);
        assert_eq!(month_over_month_delta(dec("50"), dec("100")), -0.5);
    }

    #[test]
    fn percentages_pass_through_when_exact() {
        assert_eq!(round_percentages(&[30.0, 30.0, 40.0]), vec![30, 30, 40]);
    }

    #[test]
    fn largest_remainder_prefers_lower_index_on_ties() {
        // {1,1,1} of 3 → 33.33% each; the leftover point goes to the first.
        assert_eq!(round_percentages(&[100.0 / 3.0; 3]), vec![34, 33, 33]);
    }

    #[test]
    fn zero_total_stays_all_zero() {
        assert_eq!(round_percentages(&[0.0, 0.0]), vec![0, 0]);
        assert_eq!(round_percentages(&[]), Vec::<i64>::new());
    }

    proptest! {
        #[test]
        fn rounded_percentages_sum_to_100_or_are_all_zero(raw in prop::collection::vec(0.0f64..1000.0, 1..12)) {
            let rounded = round_percentages(&raw);
            let sum: i64 = rounded.iter().sum();
            if raw.iter().sum::<f64>() == 0.0 {
                prop_assert!(rounded.iter().all(|p| *p == 0));
            } else {
                prop_assert_eq!(sum, 100);
            }
        }
    }

    #[test]
    fn category_breakdown_orders_by_percent_then_catalog_order() {
        let aggregates = vec![
            CategoryAggregate {
                category_id: "essentials".into(),
                subcategory_id: None,
                total: dec("30"),
                count: 2,
            },
            CategoryAggregate {
                category_id: "lifestyle".into(),
                subcategory_id: None,
                total: dec("30"),
                count: 1,
            },
            CategoryAggregate {
                category_id: "personal".into(),
                subcategory_id: None,
                total: dec("40"),
                count: 3,
            },
        ];

        let breakdown = build_category_breakdown(&aggregates, dec("100"), &catalog());
        let ids: Vec<_> = breakdown.iter().map(|c| c.id.as_str()).collect();
        // personal wins on percent; essentials beats lifestyle on catalog order.
        assert_eq!(ids, vec!["personal", "essentials", "lifestyle"]);
        assert_eq!(breakdown.iter().map(|c| c.percent).sum::<i64>(), 100);
        assert_eq!(breakdown[0].color, "#3b82f6");
    }

    #[test]
    fn subcategory_percents_are_of_parent_total() {
        let aggregates = vec![
            CategoryAggregate {
                category_id: "essentials".into(),
                subcategory_id: Some("groceries".into()),
                total: dec("75"),
                count: 3,
            },
            CategoryAggregate {
                category_id: "essentials".into(),
                subcategory_id: Some("transport".into()),
                total: dec("25"),
                count: 1,
            },
        ];

        let breakdown = build_category_breakdown(&aggregates, dec("200"), &catalog());
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].total, dec("100"));
        assert_eq!(breakdown[0].items, 4);

        let subcategories = breakdown[0].subcategories.as_ref().unwrap();
        assert_eq!(subcategories[0].percent, 75);
        assert_eq!(subcategories[1].percent, 25);
        assert_eq!(subcategories.iter().map(|s| s.percent).sum::<i64>(), 100);
    }

    #[test]
    fn weekly_breakdown_backfills_missing_weeks() {
        let aggregates = vec![WeekAggregate {
            week: 2,
            total: dec("55.50"),
        }];

        let weekly = build_weekly_breakdown(&aggregates, 2024, 2);
        // February 2024 has 29 days → weeks 1..=5.
        assert_eq!(weekly.len(), 5);
        assert_eq!(weekly[0].total, Decimal::ZERO);
        assert_eq!(weekly[1].total, dec("55.50"));
        assert_eq!(weekly[1].label, "Week 2");
        assert_eq!(weekly[4].week, 5);
    }

    #[test]
    fn month_validation_bounds() {
        assert!(validate_month(2024, 6).is_ok());
        assert!(matches!(validate_month(1999, 6), Err(AppError::InsightsValidation(_))));
        assert!(matches!(validate_month(2101, 6), Err(AppError::InsightsValidation(_))));
        assert!(matches!(validate_month(2024, 0), Err(AppError::InsightsValidation(_))));
        assert!(matches!(validate_month(2024, 13), Err(AppError::InsightsValidation(_))));
    }
}
