use serde::Serialize;

use super::types::{
    InvestmentInputs, Jurisdiction, MONTHS_PER_YEAR, Projection, ProjectionRow, PropertyType,
    WEEKS_PER_YEAR, whole_units,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Annual,
}

impl Frequency {
    pub const ALL: [Self; 3] = [Self::Weekly, Self::Monthly, Self::Annual];

    pub const fn periods_per_year(self) -> f64 {
        match self {
            Self::Weekly => WEEKS_PER_YEAR,
            Self::Monthly => MONTHS_PER_YEAR,
            Self::Annual => 1.0,
        }
    }
}

/// One year's income and spending expressed per period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodCashFlow {
    pub frequency: Frequency,
    pub rental_income: f64,
    pub total_expenses: f64,
    pub net_cash_flow: f64,
}

impl PeriodCashFlow {
    fn from_row(row: &ProjectionRow, frequency: Frequency) -> Self {
        let divisor = frequency.periods_per_year();
        Self {
            frequency,
            rental_income: whole_units(row.rental_income / divisor),
            total_expenses: whole_units(row.total_expenses / divisor),
            net_cash_flow: whole_units(row.net_cash_flow / divisor),
        }
    }
}

/// Point-in-time figures for the year a caller is viewing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearKpis {
    pub year: u32,
    pub property_value: f64,
    pub loan_balance: f64,
    pub equity: f64,
    pub weekly_cash_flow: f64,
    pub gross_yield_percent: f64,
    pub periods: Vec<PeriodCashFlow>,
}

impl YearKpis {
    pub fn period(&self, frequency: Frequency) -> Option<&PeriodCashFlow> {
        self.periods.iter().find(|p| p.frequency == frequency)
    }
}

/// Gross rental yield against that year's property value, 0 for a worthless property.
pub fn gross_yield_percent(row: &ProjectionRow) -> f64 {
    if row.property_value > 0.0 {
        row.rental_income / row.property_value * 100.0
    } else {
        0.0
    }
}

pub fn year_kpis(projection: &Projection, year: u32) -> Option<YearKpis> {
    let row = projection.row(year)?;
    Some(YearKpis {
        year: row.year,
        property_value: row.property_value,
        loan_balance: row.loan_balance,
        equity: row.equity,
        weekly_cash_flow: whole_units(row.net_cash_flow / WEEKS_PER_YEAR),
        gross_yield_percent: gross_yield_percent(row),
        periods: Frequency::ALL
            .into_iter()
            .map(|frequency| PeriodCashFlow::from_row(row, frequency))
            .collect(),
    })
}

/// Year-0 snapshot handed to the external commentary service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    pub suburb: String,
    pub postcode: String,
    pub jurisdiction: Jurisdiction,
    pub property_type: PropertyType,
    pub price: f64,
    pub weekly_rent: f64,
    pub total_annual_expenses: f64,
    pub net_cash_flow: f64,
    pub gross_yield_percent: f64,
}

impl PropertySummary {
    pub fn from_year_zero(inputs: &InvestmentInputs, projection: &Projection) -> Option<Self> {
        let row = projection.row(0)?;
        Some(Self {
            suburb: inputs.suburb.clone(),
            postcode: inputs.postcode.clone(),
            jurisdiction: inputs.jurisdiction,
            property_type: inputs.property_type,
            price: inputs.price,
            weekly_rent: inputs.weekly_rent,
            total_annual_expenses: row.total_expenses,
            net_cash_flow: row.net_cash_flow,
            gross_yield_percent: gross_yield_percent(row),
        })
    }
}
