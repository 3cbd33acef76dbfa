/// Flat marketplace cut applied to every booking total.
pub const PLATFORM_FEE_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSplit {
    pub platform_fee: f64,
    pub freelancer_amount: f64,
}

/// Single source of the fee split, shared by booking creation and payment
/// creation so the two ledgers cannot drift.
pub fn fee_split(total_amount: f64) -> FeeSplit {
    let platform_fee = round2(total_amount * PLATFORM_FEE_RATE);
    FeeSplit {
        platform_fee,
        freelancer_amount: total_amount - platform_fee,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_round_hundred() {
        let split = fee_split(100.0);
        assert_eq!(split.platform_fee, 5.0);
        assert_eq!(split.freelancer_amount, 95.0);
    }

    #[test]
    fn fee_rounds_to_two_decimals() {
        let split = fee_split(33.33);
        assert_eq!(split.platform_fee, 1.67);
        assert!((split.freelancer_amount - 31.66).abs() < 1e-9);
    }

    #[test]
    fn split_always_sums_to_total() {
        for total in [1.0, 19.99, 250.0, 1234.56, 0.01] {
            let split = fee_split(total);
            assert!((split.platform_fee + split.freelancer_amount - total).abs() < 1e-9);
        }
    }
}
