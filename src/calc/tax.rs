//! Annual income tax on salaried income (PKR slabs).

/// `(floor, marginal rate, tax accumulated below floor)`
const BRACKETS: [(f64, f64, f64); 6] = [
    (0.0, 0.00, 0.0),
    (600_000.0, 0.01, 0.0),
    (1_200_000.0, 0.11, 6_000.0),
    (2_200_000.0, 0.23, 116_000.0),
    (3_200_000.0, 0.30, 346_000.0),
    (4_100_000.0, 0.35, 616_000.0),
];

/// Tax due on a year of taxable income.
///
/// Only the amount above the bracket floor is taxed at the bracket rate; the tax of
/// every lower bracket is carried in as the base. Non-finite or non-positive income
/// owes nothing.
pub fn compute_annual_income_tax(annual_income: f64) -> f64 {
    if !annual_income.is_finite() || annual_income <= 0.0 {
        return 0.0;
    }

    let (floor, rate, base) = BRACKETS
        .iter()
        .rev()
        .find(|(floor, _, _)| annual_income > *floor)
        .copied()
        .unwrap_or(BRACKETS[0]);

    base + (annual_income - floor) * rate
}

/// Monthly share of the annual tax.
pub fn compute_monthly_income_tax(annual_income: f64) -> f64 {
    compute_annual_income_tax(annual_income) / 12.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn bracket_floors() {
        assert_eq!(compute_annual_income_tax(600_000.0), 0.0);
        assert!(close(compute_annual_income_tax(1_200_000.0), 6_000.0));
        assert!(close(compute_annual_income_tax(2_200_000.0), 116_000.0));
        assert!(close(compute_annual_income_tax(3_200_000.0), 346_000.0));
        assert!(close(compute_annual_income_tax(4_100_000.0), 616_000.0));
    }

    #[test]
    fn inside_brackets() {
        assert!(close(compute_annual_income_tax(900_000.0), 3_000.0));
        assert!(close(compute_annual_income_tax(1_700_000.0), 61_000.0));
        assert!(close(compute_annual_income_tax(5_100_000.0), 966_000.0));
    }

    #[test]
    fn continuous_at_every_boundary() {
        for (floor, _, _) in BRACKETS.iter().skip(1) {
            let below = compute_annual_income_tax(floor - 0.01);
            let at = compute_annual_income_tax(*floor);
            let above = compute_annual_income_tax(floor + 0.01);
            assert!((at - below).abs() < 0.01, "jump below {floor}");
            assert!((above - at).abs() < 0.01, "jump above {floor}");
        }
    }

    #[test]
    fn non_decreasing() {
        let mut previous = 0.0;
        let mut income = 0.0;
        while income <= 6_000_000.0 {
            let tax = compute_annual_income_tax(income);
            assert!(tax >= previous, "tax fell at {income}");
            previous = tax;
            income += 25_000.0;
        }
    }

    #[test]
    fn garbage_income_owes_nothing() {
        assert_eq!(compute_annual_income_tax(-1.0), 0.0);
        assert_eq!(compute_annual_income_tax(f64::NAN), 0.0);
        assert_eq!(compute_annual_income_tax(f64::INFINITY), 0.0);
    }

    #[test]
    fn monthly_is_a_twelfth() {
        assert!(close(compute_monthly_income_tax(1_200_000.0), 500.0));
        assert!(close(compute_monthly_income_tax(4_100_000.0), 616_000.0 / 12.0));
    }
}
