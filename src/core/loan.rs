//! Fixed-rate, fixed-term, monthly-compounding principal-and-interest loans.

use super::types::MONTHS_PER_YEAR;

pub fn loan_amount(price: f64, lvr_percent: f64) -> f64 {
    price.max(0.0) * lvr_percent.clamp(0.0, 100.0) / 100.0
}

/// Constant monthly repayment that clears `principal` over `term_years`.
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, term_years: u32) -> f64 {
    let principal = principal.max(0.0);
    if term_years == 0 || principal <= 0.0 {
        return 0.0;
    }

    let n = f64::from(term_years) * MONTHS_PER_YEAR;
    let r = monthly_rate(annual_rate_percent);
    if r.abs() < f64::EPSILON {
        return principal / n;
    }

    let growth = (1.0 + r).powf(n);
    principal * r * growth / (growth - 1.0)
}

/// Outstanding balance after `elapsed_years` of scheduled repayments.
pub fn balance_at_year(
    principal: f64,
    annual_rate_percent: f64,
    term_years: u32,
    elapsed_years: u32,
) -> f64 {
    let principal = principal.max(0.0);
    if term_years == 0 || elapsed_years >= term_years || principal <= 0.0 {
        return 0.0;
    }

    let n = f64::from(term_years) * MONTHS_PER_YEAR;
    let m = f64::from(elapsed_years) * MONTHS_PER_YEAR;
    let r = monthly_rate(annual_rate_percent);

    let balance = if r.abs() < f64::EPSILON {
        principal - principal / n * m
    } else {
        let growth_n = (1.0 + r).powf(n);
        let growth_m = (1.0 + r).powf(m);
        principal * (growth_n - growth_m) / (growth_n - 1.0)
    };
    balance.max(0.0)
}

fn monthly_rate(annual_rate_percent: f64) -> f64 {
    annual_rate_percent / 100.0 / MONTHS_PER_YEAR
}
