use crate::error::app_error::AppError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// Today's calendar date in the given IANA timezone.
/// Unknown zone names fall back to UTC rather than failing the request.
pub fn today_in(zone: &str) -> NaiveDate {
    match zone.parse::<Tz>() {
        Ok(tz) => Utc::now().with_timezone(&tz).date_naive(),
        Err(_) => Utc::now().date_naive(),
    }
}

pub fn is_valid_zone(zone: &str) -> bool {
    zone.parse::<Tz>().is_ok()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid first of month");
    first_of_next.pred_opt().expect("valid last of month").day()
}

/// Inclusive first and last day of a month.
pub fn month_bounds(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid first of month");
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)).expect("valid last of month");
    (first, last)
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

/// Clamp a day-of-month to what the month actually has (day 31 in February
/// yields 28 or 29).
pub fn clamp_day(year: i32, month: u32, day: u32) -> u32 {
    day.min(days_in_month(year, month))
}

/// Parse a wire date. Accepts plain `YYYY-MM-DD` and RFC3339/ISO-8601
/// instants, from which only the date part is kept.
#[allow(clippy::result_large_err)]
pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    let trimmed = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.date_naive());
    }

    Err(AppError::InvalidDateFormat(format!(
        "Invalid date format: {trimmed}. Expected YYYY-MM-DD or an ISO 8601 instant"
    )))
}

/// Day of week with Monday = 0 .. Sunday = 6.
pub fn weekday(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_date() {
        assert_eq!(parse_date("2024-01-15").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn parse_iso_instant_extracts_date_part() {
        assert_eq!(
            parse_date("2024-01-15T23:00:00.000Z").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("2024-06-01T09:30:00+02:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_date("15/01/2024"), Err(AppError::InvalidDateFormat(_))));
        assert!(matches!(parse_date("not-a-date"), Err(AppError::InvalidDateFormat(_))));
        assert!(matches!(parse_date("2024-13-01"), Err(AppError::InvalidDateFormat(_))));
    }

    #[test]
    fn parse_format_round_trip() {
        let parsed = parse_date("2024-02-29").unwrap();
        assert_eq!(parse_date(&parsed.format("%Y-%m-%d").to_string()).unwrap(), parsed);
    }

    #[test]
    fn month_bounds_inclusive() {
        let (first, last) = month_bounds(2024, 2);
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (first, last) = month_bounds(2023, 12);
        assert_eq!(first, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn previous_month_wraps_over_january() {
        assert_eq!(previous_month(2024, 1), (2023, 12));
        assert_eq!(previous_month(2024, 6), (2024, 5));
    }

    #[test]
    fn clamp_day_handles_short_months() {
        assert_eq!(clamp_day(2024, 2, 31), 29);
        assert_eq!(clamp_day(2023, 2, 31), 28);
        assert_eq!(clamp_day(2024, 4, 31), 30);
        assert_eq!(clamp_day(2024, 1, 31), 31);
        assert_eq!(clamp_day(2024, 2, 15), 15);
    }

    #[test]
    fn weekday_monday_is_zero() {
        // 2024-01-01 was a Monday, 2024-01-05 a Friday.
        assert_eq!(weekday(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), 0);
        assert_eq!(weekday(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()), 4);
        assert_eq!(weekday(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()), 6);
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        assert_eq!(today_in("Not/AZone"), Utc::now().date_naive());
        assert!(is_valid_zone("America/Los_Angeles"));
        assert!(!is_valid_zone("Mars/Olympus"));
    }
}
