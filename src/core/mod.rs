mod derive;
mod engine;
mod error;
mod kpi;
mod land_tax;
mod loan;
mod session;
mod types;

pub use derive::{
    COUNCIL_RATES_RATIO, INSURANCE_RATIO, Resolution, STRATA_BODY_CORP_RATIO, growth_rate,
    land_value_ratio, resolve_derived_fields, resolve_with_changes,
};
pub use engine::project;
pub use error::InputError;
pub use kpi::{Frequency, PeriodCashFlow, PropertySummary, YearKpis, gross_yield_percent, year_kpis};
pub use land_tax::{LandTaxBracket, brackets, compute_land_tax};
pub use loan::{balance_at_year, loan_amount, monthly_payment};
pub use session::{InputField, RentEstimateStatus, Session};
pub use types::{
    DerivedField, ExpenseBreakdown, InvestmentInputs, Jurisdiction, MAX_LOAN_TERM_YEARS,
    MIN_GROWTH_RATE, MONTHS_PER_YEAR, OverrideSet, PROJECTION_YEARS, Projection, ProjectionRow,
    PropertyType, WEEKS_PER_YEAR, whole_units,
};
