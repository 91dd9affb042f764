use super::loan::{balance_at_year, loan_amount, monthly_payment};
use super::types::{
    ExpenseBreakdown, InvestmentInputs, MONTHS_PER_YEAR, PROJECTION_YEARS, Projection,
    ProjectionRow, WEEKS_PER_YEAR, whole_units,
};

/// Year-0 amounts of the lines that inflate at the general rate.
#[derive(Debug, Clone, Copy)]
struct ExpenseLines {
    council: f64,
    insurance: f64,
    body_corp: f64,
    land_tax: f64,
    water: f64,
    maintenance: f64,
}

impl ExpenseLines {
    fn from_inputs(inputs: &InvestmentInputs) -> Self {
        Self {
            council: inputs.council_rates.max(0.0),
            insurance: inputs.insurance.max(0.0),
            body_corp: inputs.body_corp.max(0.0),
            land_tax: inputs.land_tax.max(0.0),
            water: inputs.water_rates.max(0.0),
            maintenance: inputs.maintenance.max(0.0),
        }
    }

    fn scaled(self, multiplier: f64) -> Self {
        Self {
            council: self.council * multiplier,
            insurance: self.insurance * multiplier,
            body_corp: self.body_corp * multiplier,
            land_tax: self.land_tax * multiplier,
            water: self.water * multiplier,
            maintenance: self.maintenance * multiplier,
        }
    }

    fn total(self) -> f64 {
        self.council + self.insurance + self.body_corp + self.land_tax + self.water + self.maintenance
    }
}

/// Runs the fixed 30-year projection over an already-resolved snapshot.
pub fn project(inputs: &InvestmentInputs) -> Projection {
    let loan = loan_amount(inputs.price, inputs.lvr);
    let monthly_repayment = monthly_payment(loan, inputs.interest_rate, inputs.loan_term_years);
    let annual_repayment = monthly_repayment * MONTHS_PER_YEAR;

    let base_rent = inputs.weekly_rent.max(0.0) * WEEKS_PER_YEAR;
    let base_expenses = ExpenseLines::from_inputs(inputs);
    let pm_share = inputs.property_manager_rate.clamp(0.0, 100.0) / 100.0;
    let capital_growth = 1.0 + inputs.capital_growth_rate / 100.0;

    let mut property_value = inputs.price.max(0.0);
    let mut rows = Vec::with_capacity(PROJECTION_YEARS as usize + 1);

    for year in 0..=PROJECTION_YEARS {
        let loan_balance = if year < inputs.loan_term_years {
            balance_at_year(loan, inputs.interest_rate, inputs.loan_term_years, year)
        } else {
            0.0
        };

        let rental_income = base_rent * compound(inputs.rental_growth_rate, year);
        let expenses = base_expenses.scaled(compound(inputs.inflation_rate, year));
        let pm_fee = rental_income * pm_share;

        let operating_expenses = expenses.total() + pm_fee;
        let net_cash_flow = rental_income - annual_repayment - operating_expenses;

        rows.push(ProjectionRow {
            year,
            property_value: whole_units(property_value),
            loan_balance: whole_units(loan_balance),
            equity: whole_units(property_value - loan_balance),
            rental_income: whole_units(rental_income),
            operating_expenses: whole_units(operating_expenses),
            total_expenses: whole_units(operating_expenses + annual_repayment),
            net_cash_flow: whole_units(net_cash_flow),
            breakdown: ExpenseBreakdown {
                council: whole_units(expenses.council),
                insurance: whole_units(expenses.insurance),
                body_corp: whole_units(expenses.body_corp),
                land_tax: whole_units(expenses.land_tax),
                water: whole_units(expenses.water),
                maintenance: whole_units(expenses.maintenance),
                pm_fee: whole_units(pm_fee),
                repayment: whole_units(annual_repayment),
            },
        });

        property_value *= capital_growth;
    }

    Projection {
        loan_amount: loan,
        monthly_repayment,
        annual_repayment,
        rows,
    }
}

fn compound(rate_percent: f64, years: u32) -> f64 {
    (1.0 + rate_percent / 100.0).powi(years as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::derive::resolve_derived_fields;
    use crate::core::types::{OverrideSet, PropertyType};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_inputs() -> InvestmentInputs {
        InvestmentInputs::default()
    }

    fn zero_growth_inputs() -> InvestmentInputs {
        let mut inputs = sample_inputs();
        inputs.capital_growth_rate = 0.0;
        inputs.inflation_rate = 0.0;
        inputs.rental_growth_rate = 0.0;
        inputs
    }

    #[test]
    fn default_projection_has_31_year_indexed_rows() {
        let projection = project(&sample_inputs());
        assert_eq!(projection.len(), 31);
        for (idx, row) in projection.rows().iter().enumerate() {
            assert_eq!(row.year as usize, idx);
        }
        assert!(projection.row(30).is_some());
        assert!(projection.row(31).is_none());
    }

    #[test]
    fn default_projection_loan_endpoints() {
        let projection = project(&sample_inputs());
        assert_approx_tol(projection.loan_amount, 680_000.0, 1e-9);
        assert_approx_tol(projection.monthly_repayment, 4_121.0, 1.0);
        assert_eq!(projection.rows[0].loan_balance, 680_000.0);
        assert_eq!(projection.rows[30].loan_balance, 0.0);
    }

    #[test]
    fn default_projection_year_zero_row() {
        let row = project(&sample_inputs()).rows[0];
        assert_eq!(row.property_value, 850_000.0);
        assert_eq!(row.equity, 170_000.0);
        assert_eq!(row.rental_income, 33_800.0);
        assert_eq!(row.operating_expenses, 12_403.0);
        assert_eq!(row.total_expenses, 61_852.0);
        assert_eq!(row.net_cash_flow, -28_052.0);
        assert_eq!(row.breakdown.pm_fee, 3_380.0);
        assert_eq!(row.breakdown.land_tax, 1_063.0);
        assert_eq!(row.breakdown.repayment, 49_449.0);
    }

    #[test]
    fn year_one_applies_one_growth_period() {
        let row = project(&sample_inputs()).rows[1];
        assert_eq!(row.rental_income, 35_659.0);
        assert_eq!(row.property_value, 884_000.0);
        assert_eq!(row.breakdown.council, 3_670.0);
        assert_eq!(row.breakdown.pm_fee, 3_566.0);
        assert_eq!(row.operating_expenses, 12_842.0);
        assert_eq!(row.net_cash_flow, -26_632.0);
    }

    #[test]
    fn repayment_is_constant_across_years() {
        let projection = project(&sample_inputs());
        let first = projection.rows[0].breakdown.repayment;
        assert!(projection.rows.iter().all(|row| row.breakdown.repayment == first));
    }

    #[test]
    fn short_term_loan_is_cleared_before_horizon() {
        let mut inputs = sample_inputs();
        inputs.loan_term_years = 10;
        let projection = project(&inputs);
        assert!(projection.rows[9].loan_balance > 0.0);
        assert!(projection.rows[10..].iter().all(|row| row.loan_balance == 0.0));
    }

    #[test]
    fn zero_lvr_means_no_repayment_and_full_equity() {
        let mut inputs = zero_growth_inputs();
        inputs.lvr = 0.0;
        let projection = project(&inputs);
        assert_eq!(projection.annual_repayment, 0.0);
        for row in projection.rows() {
            assert_eq!(row.equity, row.property_value);
            assert_eq!(row.total_expenses, row.operating_expenses);
        }
    }

    #[test]
    fn pm_fee_tracks_rent_growth_not_inflation() {
        let mut inputs = sample_inputs();
        inputs.inflation_rate = 0.0;
        inputs.rental_growth_rate = 10.0;
        inputs.property_manager_rate = 10.0;
        let row = project(&inputs).rows[2];
        assert_eq!(row.rental_income, 40_898.0);
        assert_eq!(row.breakdown.pm_fee, 4_090.0);
        assert_eq!(row.breakdown.council, 3_570.0);
    }

    #[test]
    fn negative_capital_growth_shrinks_value() {
        let mut inputs = zero_growth_inputs();
        inputs.capital_growth_rate = -2.0;
        let rows = project(&inputs).rows;
        assert_eq!(rows[1].property_value, 833_000.0);
        assert!(rows.windows(2).all(|w| w[1].property_value <= w[0].property_value));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_rows_are_consistent_for_resolved_inputs(
            price in 100_000u32..5_000_000,
            type_idx in 0usize..5,
            lvr in 0u32..101,
            rate_bp in 0u32..1_200,
            term in 1u32..41,
            weekly_rent in 0u32..3_000,
            inflation_bp in -300i32..800,
            rent_growth_bp in -300i32..900,
            pm_rate in 0u32..21
        ) {
            let mut inputs = sample_inputs();
            inputs.price = f64::from(price);
            inputs.property_type = PropertyType::ALL[type_idx];
            inputs.lvr = f64::from(lvr);
            inputs.interest_rate = f64::from(rate_bp) / 100.0;
            inputs.loan_term_years = term;
            inputs.weekly_rent = f64::from(weekly_rent);
            inputs.inflation_rate = f64::from(inflation_bp) / 100.0;
            inputs.rental_growth_rate = f64::from(rent_growth_bp) / 100.0;
            inputs.property_manager_rate = f64::from(pm_rate);
            let inputs = resolve_derived_fields(&inputs, &OverrideSet::new());

            let projection = project(&inputs);
            prop_assert_eq!(projection.len(), 31);

            for row in projection.rows() {
                prop_assert!(row.loan_balance >= 0.0);
                if row.year >= term {
                    prop_assert!(row.loan_balance == 0.0);
                }
                prop_assert!((row.equity - (row.property_value - row.loan_balance)).abs() <= 1.0);
                prop_assert!((row.breakdown.total() - row.total_expenses).abs() <= 8.0);
                prop_assert!(
                    (row.rental_income - row.total_expenses - row.net_cash_flow).abs() <= 2.0
                );
            }
        }
    }
}
