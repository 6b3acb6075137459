//! Pure business rules shared by the handlers.
//!
//! Nothing in here touches the database or the request; every function takes plain
//! values and returns plain values so the rules can be tested in isolation.

pub mod attendance;
pub mod calendar;
pub mod leave;
pub mod overtime;
pub mod salary;
pub mod tax;
pub mod time_slots;

/// Rounds a currency amount to two decimals.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round_currency;

    #[test]
    fn rounds_half_up_to_cents() {
        assert_eq!(round_currency(114.942_528), 114.94);
        assert_eq!(round_currency(191.570_881), 191.57);
        assert_eq!(round_currency(0.0), 0.0);
    }
}
