//! Pure commission arithmetic.

use rust_decimal::Decimal;

use crate::models::CommissionType;

/// Compute the payable amount for a commission rule against a base.
///
/// Percentage rules pay `base * rate / 100`; flat rules pay the configured
/// amount and ignore the base. Missing rate or flat fields count as zero, so
/// this never fails.
pub fn calculate(
    commission_type: CommissionType,
    rate: Option<Decimal>,
    flat_amount: Option<Decimal>,
    base_amount: Decimal,
) -> Decimal {
    match commission_type {
        CommissionType::Percentage => {
            base_amount * rate.unwrap_or(Decimal::ZERO) / Decimal::ONE_HUNDRED
        }
        CommissionType::FlatAmount | CommissionType::FlatPerJob => {
            flat_amount.unwrap_or(Decimal::ZERO)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn percentage_is_rate_share_of_base() {
        let amount = calculate(
            CommissionType::Percentage,
            Some(dec("10")),
            None,
            dec("2000"),
        );
        assert_eq!(amount, dec("200"));

        let amount = calculate(
            CommissionType::Percentage,
            Some(dec("7.5")),
            None,
            dec("1000"),
        );
        assert_eq!(amount, dec("75"));
    }

    #[test]
    fn zero_rate_pays_nothing() {
        let amount = calculate(
            CommissionType::Percentage,
            Some(Decimal::ZERO),
            None,
            dec("5000"),
        );
        assert_eq!(amount, Decimal::ZERO);
    }

    #[test]
    fn missing_rate_counts_as_zero() {
        let amount = calculate(CommissionType::Percentage, None, None, dec("5000"));
        assert_eq!(amount, Decimal::ZERO);
    }

    #[test]
    fn flat_amount_ignores_base() {
        for base in ["0", "100", "250000"] {
            let amount = calculate(
                CommissionType::FlatAmount,
                None,
                Some(dec("50")),
                dec(base),
            );
            assert_eq!(amount, dec("50"));
        }
    }

    #[test]
    fn flat_per_job_behaves_like_flat_amount() {
        let amount = calculate(
            CommissionType::FlatPerJob,
            Some(dec("99")),
            Some(dec("350")),
            dec("12000"),
        );
        assert_eq!(amount, dec("350"));
    }
}
