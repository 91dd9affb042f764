use tracing::trace;

use super::land_tax::compute_land_tax;
use super::types::{DerivedField, InvestmentInputs, OverrideSet, PropertyType, whole_units};

pub const COUNCIL_RATES_RATIO: f64 = 0.0042;
pub const INSURANCE_RATIO: f64 = 0.003;
pub const STRATA_BODY_CORP_RATIO: f64 = 0.01;

/// Typical share of the purchase price attributable to land.
pub const fn land_value_ratio(property_type: PropertyType) -> f64 {
    match property_type {
        PropertyType::House => 0.45,
        PropertyType::Townhouse => 0.43,
        PropertyType::Apartment => 0.30,
        PropertyType::HomeAndLand => 0.65,
        PropertyType::OldHome => 0.95,
    }
}

/// Assumed capital growth, percent per annum.
pub const fn growth_rate(property_type: PropertyType) -> f64 {
    match property_type {
        PropertyType::House => 4.0,
        PropertyType::Townhouse => 3.0,
        PropertyType::Apartment => 1.0,
        PropertyType::HomeAndLand => 3.5,
        PropertyType::OldHome => 4.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub inputs: InvestmentInputs,
    pub changed: Vec<DerivedField>,
}

impl Resolution {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

pub fn resolve_derived_fields(inputs: &InvestmentInputs, overrides: &OverrideSet) -> InvestmentInputs {
    resolve_with_changes(inputs, overrides).inputs
}

/// Recomputes every non-overridden derived field and reports which moved.
pub fn resolve_with_changes(inputs: &InvestmentInputs, overrides: &OverrideSet) -> Resolution {
    let mut resolved = inputs.clone();
    let price = inputs.price.max(0.0);
    let property_type = inputs.property_type;

    // land_tax reads the land value, so land value resolves first.
    if !overrides.contains(DerivedField::LandValue) {
        resolved.land_value = whole_units(price * land_value_ratio(property_type));
    }
    if !overrides.contains(DerivedField::CapitalGrowth) {
        resolved.capital_growth_rate = growth_rate(property_type);
    }
    if !overrides.contains(DerivedField::CouncilRates) {
        resolved.council_rates = whole_units(price * COUNCIL_RATES_RATIO);
    }
    if !overrides.contains(DerivedField::Insurance) {
        resolved.insurance = whole_units(price * INSURANCE_RATIO);
    }
    if !overrides.contains(DerivedField::BodyCorp) {
        resolved.body_corp = if property_type.is_strata() {
            whole_units(price * STRATA_BODY_CORP_RATIO)
        } else {
            0.0
        };
    }
    if !overrides.contains(DerivedField::LandTax) {
        resolved.land_tax = whole_units(compute_land_tax(
            resolved.land_value,
            resolved.jurisdiction,
        ));
    }

    let changed = DerivedField::ALL
        .into_iter()
        .filter(|field| inputs.derived_value(*field) != resolved.derived_value(*field))
        .collect::<Vec<_>>();
    if !changed.is_empty() {
        trace!(?changed, overrides = overrides.len(), "derived fields updated");
    }

    Resolution {
        inputs: resolved,
        changed,
    }
}
