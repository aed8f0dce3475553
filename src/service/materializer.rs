use crate::dates;
use crate::database::recurring::RecurringTemplateRepository;
use crate::database::transaction::{NewTransaction, TransactionRepository};
use crate::error::app_error::AppError;
use crate::models::recurring::{Frequency, RecurringTemplate};
use chrono::{Datelike, Days, NaiveDate};
use uuid::Uuid;

/// Occurrence dates for a template within an inclusive window, ascending.
///
/// Monthly templates fire on `clamp_day(year, month, day_of_month)`, so a
/// day-31 template lands on the 28th/29th/30th in shorter months. Weekly and
/// biweekly templates fire every 7/14 days starting from the first date on or
/// after `start_date` that falls on `day_of_week`.
pub fn occurrence_dates(template: &RecurringTemplate, range_start: NaiveDate, range_end: NaiveDate) -> Vec<NaiveDate> {
    match template.frequency {
        Frequency::Monthly => monthly_occurrences(template, range_start, range_end),
        Frequency::Weekly | Frequency::Biweekly => weekly_occurrences(template, range_start, range_end),
    }
}

fn monthly_occurrences(template: &RecurringTemplate, range_start: NaiveDate, range_end: NaiveDate) -> Vec<NaiveDate> {
    let Some(day_of_month) = template.day_of_month else {
        return Vec::new();
    };
    let day_of_month = day_of_month as u32;

    let horizon = match template.end_date {
        Some(end) => range_end.min(end),
        None => range_end,
    };

    let mut occurrences = Vec::new();
    let mut year = template.start_date.year();
    let mut month = template.start_date.month();
    let mut count: i32 = 0;

    loop {
        let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).expect("valid first of month");
        if first_of_month > horizon {
            break;
        }
        if let Some(cap) = template.total_occurrences
            && count >= cap
        {
            break;
        }

        let day = dates::clamp_day(year, month, day_of_month);
        let occurrence = NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is valid");

        let within_window = occurrence >= template.start_date
            && occurrence >= range_start
            && occurrence <= range_end
            && template.end_date.is_none_or(|end| occurrence <= end);
        if within_window {
            occurrences.push(occurrence);
            count += 1;
        }

        (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    }

    occurrences
}

fn weekly_occurrences(template: &RecurringTemplate, range_start: NaiveDate, range_end: NaiveDate) -> Vec<NaiveDate> {
    let (Some(day_of_week), Some(interval)) = (template.day_of_week, template.frequency.interval_days()) else {
        return Vec::new();
    };

    // Align to the first date on or after start_date that falls on the
    // requested weekday.
    let offset = (day_of_week as u32 + 7 - dates::weekday(template.start_date)) % 7;
    let mut current = template.start_date + Days::new(offset as u64);

    let mut occurrences = Vec::new();
    let mut count: i32 = 0;

    while current <= range_end {
        if template.end_date.is_some_and(|end| current > end) {
            break;
        }
        if current >= range_start {
            if let Some(cap) = template.total_occurrences
                && count >= cap
            {
                break;
            }
            occurrences.push(current);
            count += 1;
        }
        current = current + Days::new(interval as u64);
    }

    occurrences
}

/// Ensure every occurrence of every active template in `[start, end]` exists
/// as a concrete transaction row. Existing rows are left alone; the partial
/// unique index absorbs races. Returns the number of rows created.
pub async fn materialize_range<R>(repo: &R, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<u32, AppError>
where
    R: RecurringTemplateRepository + TransactionRepository + Sync,
{
    let templates = repo.active_templates_in_range(user_id, start, end).await?;

    let mut created = 0;
    for template in &templates {
        for occurred_at in occurrence_dates(template, start, end) {
            let new = NewTransaction {
                user_id: template.user_id,
                occurred_at,
                amount: template.amount,
                notes: template.notes.clone(),
                recurring_template_id: Some(template.id),
                details: template.details.clone(),
            };
            if repo.insert_occurrence(&new).await? {
                created += 1;
            }
        }
    }

    Ok(created)
}
