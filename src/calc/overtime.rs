//! Overtime payout for instructor claims.

use chrono::{Datelike, NaiveDate};

use super::calendar::days_in_month;

/// Length of a rostered working day.
pub const WORKING_HOURS_PER_DAY: f64 = 9.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct OvertimePayoutInput<'a> {
    pub salary: Option<f64>,
    pub total_duration_minutes: Option<f64>,
    /// `YYYY-MM-DD`, or an ISO timestamp starting with one.
    pub date: &'a str,
}

pub fn parse_claim_date(value: &str) -> Option<NaiveDate> {
    let day = value.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Salary earned per minute in the claim month: salary / days / 9 h / 60 min.
pub fn per_minute_rate(monthly_salary: f64, date: NaiveDate) -> Option<f64> {
    if !monthly_salary.is_finite() {
        return None;
    }
    let days = days_in_month(date.year(), date.month()).ok()?;
    Some(monthly_salary / f64::from(days) / WORKING_HOURS_PER_DAY / 60.0)
}

/// Payout for the minutes of a claim, `None` when any input is unusable.
pub fn calc_overtime_payout(input: &OvertimePayoutInput<'_>) -> Option<f64> {
    let salary = input.salary.filter(|s| s.is_finite())?;
    let minutes = input
        .total_duration_minutes
        .filter(|m| m.is_finite() && *m >= 0.0)?;
    let date = parse_claim_date(input.date)?;

    Some(per_minute_rate(salary, date)? * minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payout(salary: Option<f64>, minutes: Option<f64>, date: &str) -> Option<f64> {
        calc_overtime_payout(&OvertimePayoutInput {
            salary,
            total_duration_minutes: minutes,
            date,
        })
    }

    #[test]
    fn uses_days_of_the_claim_month() {
        let feb = payout(Some(30_000.0), Some(60.0), "2024-02-15").unwrap();
        assert!((feb - 30_000.0 / 29.0 / 9.0).abs() < 1e-9);
        assert!((feb - 114.94).abs() < 0.01);

        let hundred = payout(Some(30_000.0), Some(100.0), "2024-02-15").unwrap();
        assert!((hundred - 191.57).abs() < 0.01);

        let march = payout(Some(30_000.0), Some(60.0), "2024-03-15").unwrap();
        assert!(march < feb);
    }

    #[test]
    fn accepts_timestamps() {
        let a = payout(Some(45_000.0), Some(90.0), "2024-06-01T18:00:00.000Z");
        let b = payout(Some(45_000.0), Some(90.0), "2024-06-01");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_or_broken_inputs_yield_none() {
        assert_eq!(payout(None, Some(60.0), "2024-02-15"), None);
        assert_eq!(payout(Some(30_000.0), None, "2024-02-15"), None);
        assert_eq!(payout(Some(f64::NAN), Some(60.0), "2024-02-15"), None);
        assert_eq!(payout(Some(30_000.0), Some(f64::INFINITY), "2024-02-15"), None);
        assert_eq!(payout(Some(30_000.0), Some(-5.0), "2024-02-15"), None);
        assert_eq!(payout(Some(30_000.0), Some(60.0), "2024-02-30"), None);
        assert_eq!(payout(Some(30_000.0), Some(60.0), "yesterday"), None);
    }

    #[test]
    fn zero_minutes_pay_zero() {
        assert_eq!(payout(Some(30_000.0), Some(0.0), "2024-02-15"), Some(0.0));
    }
}
