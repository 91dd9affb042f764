//! Caller-held calculator state and the edit operations a form applies to it.
//!
//! Every mutation ends with a full resolution pass, so `inputs` is always a
//! consistent snapshot ready for [`project`].

use serde::Serialize;
use tracing::{debug, warn};

use super::derive::{resolve_derived_fields, resolve_with_changes};
use super::engine::project;
use super::types::{
    DerivedField, InvestmentInputs, Jurisdiction, MAX_LOAN_TERM_YEARS, MIN_GROWTH_RATE,
    OverrideSet, Projection, PropertyType, whole_units,
};

impl Default for InvestmentInputs {
    fn default() -> Self {
        let seed = Self {
            property_type: PropertyType::House,
            jurisdiction: Jurisdiction::Vic,
            suburb: "Richmond".to_string(),
            postcode: "3121".to_string(),
            price: 850_000.0,
            interest_rate: 6.10,
            loan_term_years: 30,
            lvr: 80.0,
            weekly_rent: 650.0,
            capital_growth_rate: 0.0,
            inflation_rate: 2.8,
            rental_growth_rate: 5.5,
            land_value: 0.0,
            council_rates: 0.0,
            insurance: 0.0,
            body_corp: 0.0,
            land_tax: 0.0,
            water_rates: 840.0,
            maintenance: 1_000.0,
            property_manager_rate: 10.0,
        };
        resolve_derived_fields(&seed, &OverrideSet::new())
    }
}

/// Numeric fields a user can edit directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InputField {
    Price,
    InterestRate,
    LoanTermYears,
    Lvr,
    WeeklyRent,
    CapitalGrowth,
    InflationRate,
    RentalGrowthRate,
    LandValue,
    CouncilRates,
    Insurance,
    BodyCorp,
    LandTax,
    WaterRates,
    Maintenance,
    PropertyManagerRate,
}

impl InputField {
    /// The override flag an edit to this field sets, if any.
    pub const fn derived(self) -> Option<DerivedField> {
        match self {
            Self::LandValue => Some(DerivedField::LandValue),
            Self::CouncilRates => Some(DerivedField::CouncilRates),
            Self::Insurance => Some(DerivedField::Insurance),
            Self::BodyCorp => Some(DerivedField::BodyCorp),
            Self::LandTax => Some(DerivedField::LandTax),
            Self::CapitalGrowth => Some(DerivedField::CapitalGrowth),
            _ => None,
        }
    }

    /// Growth and inflation rates may go negative, down to [`MIN_GROWTH_RATE`].
    pub const fn allows_negative(self) -> bool {
        matches!(
            self,
            Self::CapitalGrowth | Self::InflationRate | Self::RentalGrowthRate
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "status")]
pub enum RentEstimateStatus {
    Applied { weekly_rent: f64 },
    Unavailable,
    Rejected { value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    inputs: InvestmentInputs,
    overrides: OverrideSet,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            inputs: InvestmentInputs::default(),
            overrides: OverrideSet::new(),
        }
    }

    /// Adopts an externally built snapshot, resolving it against `overrides`.
    pub fn from_parts(inputs: InvestmentInputs, overrides: OverrideSet) -> Self {
        let resolution = resolve_with_changes(&inputs, &overrides);
        debug!(changed = ?resolution.changed, "adopted input snapshot");
        Self {
            inputs: resolution.inputs,
            overrides,
        }
    }

    pub const fn inputs(&self) -> &InvestmentInputs {
        &self.inputs
    }

    pub const fn overrides(&self) -> OverrideSet {
        self.overrides
    }

    pub fn projection(&self) -> Projection {
        project(&self.inputs)
    }

    /// Applies a form edit; non-finite values are ignored.
    pub fn set(&mut self, field: InputField, value: f64) {
        if !value.is_finite() {
            warn!(?field, "ignoring non-finite edit");
            return;
        }
        let value = if field.allows_negative() {
            value.max(MIN_GROWTH_RATE)
        } else {
            value.max(0.0)
        };

        if let Some(derived) = field.derived() {
            self.overrides.insert(derived);
        }

        let inputs = &mut self.inputs;
        match field {
            InputField::Price => inputs.price = value,
            InputField::InterestRate => inputs.interest_rate = value,
            InputField::LoanTermYears => {
                let years = value.round().clamp(1.0, f64::from(MAX_LOAN_TERM_YEARS));
                inputs.loan_term_years = years as u32;
            }
            InputField::Lvr => inputs.lvr = value.min(100.0),
            InputField::WeeklyRent => inputs.weekly_rent = value,
            InputField::CapitalGrowth => inputs.capital_growth_rate = value,
            InputField::InflationRate => inputs.inflation_rate = value,
            InputField::RentalGrowthRate => inputs.rental_growth_rate = value,
            InputField::LandValue => inputs.land_value = value,
            InputField::CouncilRates => inputs.council_rates = value,
            InputField::Insurance => inputs.insurance = value,
            InputField::BodyCorp => inputs.body_corp = value,
            InputField::LandTax => inputs.land_tax = value,
            InputField::WaterRates => inputs.water_rates = value,
            InputField::Maintenance => inputs.maintenance = value,
            InputField::PropertyManagerRate => inputs.property_manager_rate = value.min(100.0),
        }
        self.resolve();
    }

    pub fn set_property_type(&mut self, property_type: PropertyType) {
        self.inputs.property_type = property_type;
        self.resolve();
    }

    pub fn set_jurisdiction(&mut self, jurisdiction: Jurisdiction) {
        self.inputs.jurisdiction = jurisdiction;
        self.resolve();
    }

    /// Applies a suburb picked from the location lookup. An unrecognised
    /// state code keeps the current jurisdiction.
    pub fn set_location(&mut self, suburb: &str, postcode: &str, state_code: &str) {
        self.inputs.suburb = suburb.to_string();
        self.inputs.postcode = postcode.to_string();
        if let Ok(jurisdiction) = state_code.parse() {
            self.inputs.jurisdiction = jurisdiction;
        }
        self.resolve();
    }

    pub fn clear_override(&mut self, field: DerivedField) {
        if self.overrides.remove(field) {
            self.resolve();
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Writes back the rent estimator's answer exactly like a manual edit.
    /// Anything unusable leaves the inputs untouched.
    pub fn apply_rent_estimate(&mut self, estimate: Option<f64>) -> RentEstimateStatus {
        match estimate {
            None => {
                warn!("rent estimate unavailable; keeping current weekly rent");
                RentEstimateStatus::Unavailable
            }
            Some(value) if !value.is_finite() || value <= 0.0 => {
                warn!(value, "rejecting rent estimate");
                RentEstimateStatus::Rejected { value }
            }
            Some(value) => {
                let weekly_rent = whole_units(value);
                self.set(InputField::WeeklyRent, weekly_rent);
                RentEstimateStatus::Applied { weekly_rent }
            }
        }
    }

    fn resolve(&mut self) {
        self.inputs = resolve_derived_fields(&self.inputs, &self.overrides);
    }
}
