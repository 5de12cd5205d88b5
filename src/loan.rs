use crate::error::{Result, TallyError};
use crate::models::{LoanPayment, LoanType};

/// Summed principal portions may drift from the input principal by at
/// most this much before the schedule is rejected as inconsistent.
const RESIDUAL_TOLERANCE: f64 = 0.01;

/// Compute an amortization schedule in display units. Pure; the ledger
/// engine materializes the result into Planned transactions.
pub fn schedule(
    principal: f64,
    annual_rate_percent: f64,
    months: u32,
    loan_type: LoanType,
) -> Result<Vec<LoanPayment>> {
    if months == 0 {
        return Err(TallyError::InvalidArgument("loan term must be at least one month".to_string()));
    }
    if principal <= 0.0 {
        return Err(TallyError::InvalidArgument(format!(
            "loan principal must be positive, got {principal}"
        )));
    }
    if annual_rate_percent < 0.0 {
        return Err(TallyError::InvalidArgument(format!(
            "loan rate must not be negative, got {annual_rate_percent}"
        )));
    }
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;

    let payments = match loan_type {
        LoanType::InterestFirst => interest_first(principal, monthly_rate, months),
        LoanType::EqualPrincipal => equal_principal(principal, monthly_rate, months),
        LoanType::EqualInstallment => equal_installment(principal, monthly_rate, months),
    };

    let paid: f64 = payments.iter().map(|p| p.principal).sum();
    if (paid - principal).abs() > RESIDUAL_TOLERANCE {
        return Err(TallyError::Consistency(format!(
            "amortization residual {:.4} exceeds tolerance",
            paid - principal
        )));
    }
    Ok(payments)
}

/// Interest-only until the final period, which repays the whole principal
/// plus one more interest installment.
fn interest_first(principal: f64, monthly_rate: f64, months: u32) -> Vec<LoanPayment> {
    let interest = principal * monthly_rate;
    let mut payments = Vec::with_capacity(months as usize);
    for _ in 1..months {
        payments.push(LoanPayment { principal: 0.0, interest, total: interest });
    }
    payments.push(LoanPayment {
        principal,
        interest,
        total: principal + interest,
    });
    payments
}

/// Constant principal portion; interest decreases as the balance falls.
fn equal_principal(principal: f64, monthly_rate: f64, months: u32) -> Vec<LoanPayment> {
    let per_period = principal / months as f64;
    let mut remaining = principal;
    let mut payments = Vec::with_capacity(months as usize);
    for _ in 0..months {
        let interest = remaining * monthly_rate;
        payments.push(LoanPayment {
            principal: per_period,
            interest,
            total: per_period + interest,
        });
        remaining -= per_period;
    }
    payments
}

/// Constant total payment (annuity). With a zero rate this degenerates to
/// a flat principal division.
fn equal_installment(principal: f64, monthly_rate: f64, months: u32) -> Vec<LoanPayment> {
    let n = months as f64;
    let payment = if monthly_rate > 0.0 {
        let growth = (1.0 + monthly_rate).powi(months as i32);
        principal * monthly_rate * growth / (growth - 1.0)
    } else {
        principal / n
    };
    let mut remaining = principal;
    let mut payments = Vec::with_capacity(months as usize);
    for _ in 0..months {
        let interest = remaining * monthly_rate;
        let principal_part = payment - interest;
        payments.push(LoanPayment {
            principal: principal_part,
            interest,
            total: payment,
        });
        remaining -= principal_part;
    }
    payments
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [LoanType; 3] = [
        LoanType::InterestFirst,
        LoanType::EqualPrincipal,
        LoanType::EqualInstallment,
    ];

    fn total_principal(payments: &[LoanPayment]) -> f64 {
        payments.iter().map(|p| p.principal).sum()
    }

    #[test]
    fn test_principal_conservation_across_types() {
        for loan_type in TYPES {
            for (principal, rate, months) in
                [(10_000.0, 6.0, 12), (5_000.0, 0.0, 6), (123_456.78, 18.5, 36), (999.99, 4.2, 1)]
            {
                let payments = schedule(principal, rate, months, loan_type).unwrap();
                assert_eq!(payments.len(), months as usize);
                let paid = total_principal(&payments);
                assert!(
                    (paid - principal).abs() < 0.01,
                    "{loan_type:?} {principal}/{rate}/{months}: paid {paid}"
                );
            }
        }
    }

    #[test]
    fn test_interest_first_defers_principal() {
        let payments = schedule(12_000.0, 12.0, 12, LoanType::InterestFirst).unwrap();
        for p in &payments[..11] {
            assert_eq!(p.principal, 0.0);
            assert!((p.interest - 120.0).abs() < 1e-9);
        }
        let last = payments.last().unwrap();
        assert!((last.principal - 12_000.0).abs() < 1e-9);
        assert!((last.total - 12_120.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_principal_interest_decreases() {
        let payments = schedule(12_000.0, 12.0, 12, LoanType::EqualPrincipal).unwrap();
        for p in &payments {
            assert!((p.principal - 1_000.0).abs() < 1e-9);
        }
        for pair in payments.windows(2) {
            assert!(pair[1].interest < pair[0].interest);
        }
        assert!((payments[0].interest - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_installment_total_is_constant() {
        let payments = schedule(20_000.0, 9.6, 24, LoanType::EqualInstallment).unwrap();
        let first_total = payments[0].total;
        for p in &payments {
            assert!((p.total - first_total).abs() < 1e-9);
            assert!((p.principal + p.interest - p.total).abs() < 1e-9);
        }
        for pair in payments.windows(2) {
            assert!(pair[1].principal > pair[0].principal);
        }
    }

    #[test]
    fn test_zero_rate_equal_installment_is_flat_division() {
        let payments = schedule(1_200.0, 0.0, 12, LoanType::EqualInstallment).unwrap();
        for p in &payments {
            assert!((p.total - 100.0).abs() < 1e-9);
            assert_eq!(p.interest, 0.0);
        }
    }

    #[test]
    fn test_invalid_terms_rejected() {
        assert_eq!(
            schedule(1_000.0, 5.0, 0, LoanType::EqualPrincipal).unwrap_err().code(),
            "invalid_argument"
        );
        assert_eq!(
            schedule(0.0, 5.0, 12, LoanType::EqualPrincipal).unwrap_err().code(),
            "invalid_argument"
        );
        assert_eq!(
            schedule(1_000.0, -1.0, 12, LoanType::EqualPrincipal).unwrap_err().code(),
            "invalid_argument"
        );
    }
}
