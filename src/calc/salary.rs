//! Salary sheet totals.
//!
//! Gross salary is the monthly package; basic, house rent, utilities and medical are
//! its breakdown. Conveyance, other allowance, overtime and arrears are paid on top.
//! Income tax is the monthly share of the annual tax on twelve months of gross.

use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::{
    calendar::{CalendarError, MonthCalendar, month_calendar},
    round_currency,
    tax::compute_monthly_income_tax,
};

#[derive(Debug, Error, PartialEq)]
pub enum SalaryError {
    #[error("{0} must be a non-negative amount")]
    InvalidAmount(&'static str),

    #[error("Salary breakdown ({breakdown}) exceeds gross salary ({gross})")]
    BreakdownExceedsGross { breakdown: f64, gross: f64 },

    #[error("Absent and unpaid days ({0}) exceed days in month ({1})")]
    TooManyUnpaidDays(f64, u32),

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Numbers that drive a sheet. Everything else on the sheet is copied through.
#[derive(Debug, Clone, Default)]
pub struct SalaryInputs {
    pub year: i32,
    pub month: u32,
    pub gross_salary: f64,
    pub basic_salary: f64,
    pub house_rent: f64,
    pub utilities: f64,
    pub medical_allowance: f64,
    pub conveyance_allowance: f64,
    pub other_allowance: f64,
    pub overtime_amount: f64,
    pub arrears: f64,
    pub absent_days: f64,
    pub unpaid_leave_days: f64,
    pub advance_deduction: f64,
    pub loan_deduction: f64,
    pub eobi_deduction: f64,
    pub other_deduction: f64,
    pub off_days: Vec<Weekday>,
    pub public_holidays: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryTotals {
    pub calendar: MonthCalendar,
    pub per_day_salary: f64,
    pub unpaid_days_deduction: f64,
    pub income_tax: f64,
    pub total_earnings: f64,
    pub total_deductions: f64,
    pub net_payable: f64,
}

fn check_amount(name: &'static str, value: f64) -> Result<(), SalaryError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SalaryError::InvalidAmount(name))
    }
}

impl SalaryInputs {
    fn validate(&self) -> Result<(), SalaryError> {
        let amounts = [
            ("Gross salary", self.gross_salary),
            ("Basic salary", self.basic_salary),
            ("House rent", self.house_rent),
            ("Utilities", self.utilities),
            ("Medical allowance", self.medical_allowance),
            ("Conveyance allowance", self.conveyance_allowance),
            ("Other allowance", self.other_allowance),
            ("Overtime amount", self.overtime_amount),
            ("Arrears", self.arrears),
            ("Absent days", self.absent_days),
            ("Unpaid leave days", self.unpaid_leave_days),
            ("Advance deduction", self.advance_deduction),
            ("Loan deduction", self.loan_deduction),
            ("EOBI deduction", self.eobi_deduction),
            ("Other deduction", self.other_deduction),
        ];
        for (name, value) in amounts {
            check_amount(name, value)?;
        }

        let breakdown = self.basic_salary + self.house_rent + self.utilities + self.medical_allowance;
        // a cent of slack for client-side rounding
        if breakdown > self.gross_salary + 0.01 {
            return Err(SalaryError::BreakdownExceedsGross {
                breakdown,
                gross: self.gross_salary,
            });
        }
        Ok(())
    }
}

pub fn compute_salary(inputs: &SalaryInputs) -> Result<SalaryTotals, SalaryError> {
    inputs.validate()?;

    let calendar = month_calendar(
        inputs.year,
        inputs.month,
        &inputs.off_days,
        &inputs.public_holidays,
    )?;

    let unpaid_days = inputs.absent_days + inputs.unpaid_leave_days;
    if unpaid_days > f64::from(calendar.days_in_month) {
        return Err(SalaryError::TooManyUnpaidDays(unpaid_days, calendar.days_in_month));
    }

    let per_day_salary = inputs.gross_salary / f64::from(calendar.days_in_month);
    let unpaid_days_deduction = round_currency(per_day_salary * unpaid_days);
    let income_tax = round_currency(compute_monthly_income_tax(inputs.gross_salary * 12.0));

    let total_earnings = round_currency(
        inputs.gross_salary
            + inputs.conveyance_allowance
            + inputs.other_allowance
            + inputs.overtime_amount
            + inputs.arrears,
    );
    let total_deductions = round_currency(
        income_tax
            + unpaid_days_deduction
            + inputs.advance_deduction
            + inputs.loan_deduction
            + inputs.eobi_deduction
            + inputs.other_deduction,
    );

    Ok(SalaryTotals {
        calendar,
        per_day_salary: round_currency(per_day_salary),
        unpaid_days_deduction,
        income_tax,
        total_earnings,
        total_deductions,
        net_payable: round_currency(total_earnings - total_deductions),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::calendar::parse_off_days;

    fn base() -> SalaryInputs {
        SalaryInputs {
            year: 2024,
            month: 2,
            gross_salary: 150_000.0,
            basic_salary: 100_000.0,
            house_rent: 40_000.0,
            utilities: 10_000.0,
            off_days: parse_off_days(&["Saturday", "Sunday"]).unwrap(),
            ..SalaryInputs::default()
        }
    }

    #[test]
    fn plain_month() {
        let totals = compute_salary(&base()).unwrap();

        // 1.8M a year: 6000 + 600000 * 11% = 72000, 6000 a month
        assert_eq!(totals.income_tax, 6_000.0);
        assert_eq!(totals.total_earnings, 150_000.0);
        assert_eq!(totals.total_deductions, 6_000.0);
        assert_eq!(totals.net_payable, 144_000.0);
        assert_eq!(totals.calendar.days_in_month, 29);
        assert_eq!(totals.calendar.working_days, 21);
    }

    #[test]
    fn unpaid_days_and_extras() {
        let inputs = SalaryInputs {
            absent_days: 1.0,
            unpaid_leave_days: 0.5,
            overtime_amount: 2_500.0,
            conveyance_allowance: 3_000.0,
            loan_deduction: 5_000.0,
            eobi_deduction: 370.0,
            ..base()
        };
        let totals = compute_salary(&inputs).unwrap();

        // 150000 / 29 * 1.5
        assert_eq!(totals.unpaid_days_deduction, 7_758.62);
        assert_eq!(totals.total_earnings, 155_500.0);
        assert_eq!(totals.total_deductions, 19_128.62);
        assert_eq!(totals.net_payable, 136_371.38);
    }

    #[test]
    fn low_salary_pays_no_tax() {
        let inputs = SalaryInputs {
            gross_salary: 50_000.0,
            basic_salary: 50_000.0,
            house_rent: 0.0,
            utilities: 0.0,
            ..base()
        };
        assert_eq!(compute_salary(&inputs).unwrap().income_tax, 0.0);
    }

    #[test]
    fn rejects_inconsistent_input() {
        let over = SalaryInputs {
            basic_salary: 120_000.0,
            ..base()
        };
        assert!(matches!(
            compute_salary(&over),
            Err(SalaryError::BreakdownExceedsGross { .. })
        ));

        let negative = SalaryInputs {
            arrears: -1.0,
            ..base()
        };
        assert_eq!(
            compute_salary(&negative),
            Err(SalaryError::InvalidAmount("Arrears"))
        );

        let absent = SalaryInputs {
            absent_days: 30.0,
            ..base()
        };
        assert_eq!(
            compute_salary(&absent),
            Err(SalaryError::TooManyUnpaidDays(30.0, 29))
        );

        let month = SalaryInputs { month: 13, ..base() };
        assert!(matches!(compute_salary(&month), Err(SalaryError::Calendar(_))));
    }
}
