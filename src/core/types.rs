use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::error::InputError;

/// Last simulated year; projections hold `PROJECTION_YEARS + 1` rows.
pub const PROJECTION_YEARS: u32 = 30;
pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;
/// Longest loan term the calculator accepts, in years.
pub const MAX_LOAN_TERM_YEARS: u32 = 50;
/// Floor for growth and inflation edits; -100% would zero every later year.
pub const MIN_GROWTH_RATE: f64 = -99.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    House,
    Townhouse,
    Apartment,
    HomeAndLand,
    OldHome,
}

impl PropertyType {
    pub const ALL: [Self; 5] = [
        Self::House,
        Self::Townhouse,
        Self::Apartment,
        Self::HomeAndLand,
        Self::OldHome,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::House => "House",
            Self::Townhouse => "Townhouse",
            Self::Apartment => "Apartment",
            Self::HomeAndLand => "Home & Land",
            Self::OldHome => "Old Home",
        }
    }

    /// Strata-titled dwellings pay a body corporate levy.
    pub const fn is_strata(self) -> bool {
        matches!(self, Self::Apartment | Self::Townhouse)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PropertyType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "house" => Ok(Self::House),
            "townhouse" => Ok(Self::Townhouse),
            "apartment" | "unit" => Ok(Self::Apartment),
            "homeandland" | "homeland" => Ok(Self::HomeAndLand),
            "oldhome" => Ok(Self::OldHome),
            _ => Err(InputError::UnknownPropertyType(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Jurisdiction {
    Nsw,
    Vic,
    Qld,
    Wa,
    Sa,
    Tas,
    Act,
    Nt,
}

impl Jurisdiction {
    pub const ALL: [Self; 8] = [
        Self::Nsw,
        Self::Vic,
        Self::Qld,
        Self::Wa,
        Self::Sa,
        Self::Tas,
        Self::Act,
        Self::Nt,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::Nsw => "NSW",
            Self::Vic => "VIC",
            Self::Qld => "QLD",
            Self::Wa => "WA",
            Self::Sa => "SA",
            Self::Tas => "TAS",
            Self::Act => "ACT",
            Self::Nt => "NT",
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Jurisdiction {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|j| j.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| InputError::UnknownJurisdiction(s.to_string()))
    }
}

/// Fields the resolver derives and the user may pin with a manual value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DerivedField {
    LandValue,
    CouncilRates,
    Insurance,
    BodyCorp,
    LandTax,
    CapitalGrowth,
}

impl DerivedField {
    pub const ALL: [Self; 6] = [
        Self::LandValue,
        Self::CouncilRates,
        Self::Insurance,
        Self::BodyCorp,
        Self::LandTax,
        Self::CapitalGrowth,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::LandValue => "landValue",
            Self::CouncilRates => "councilRates",
            Self::Insurance => "insurance",
            Self::BodyCorp => "bodyCorp",
            Self::LandTax => "landTax",
            Self::CapitalGrowth => "capitalGrowth",
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DerivedField {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "landvalue" => Ok(Self::LandValue),
            "councilrates" => Ok(Self::CouncilRates),
            "insurance" => Ok(Self::Insurance),
            "bodycorp" => Ok(Self::BodyCorp),
            "landtax" => Ok(Self::LandTax),
            "capitalgrowth" | "capitalgrowthrate" => Ok(Self::CapitalGrowth),
            _ => Err(InputError::UnknownOverrideField(s.to_string())),
        }
    }
}

/// Set of manually overridden fields, stored as a bitmask.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct OverrideSet(u8);

impl OverrideSet {
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn contains(self, field: DerivedField) -> bool {
        self.0 & field.bit() != 0
    }

    /// Returns `true` if the field was not already present.
    pub fn insert(&mut self, field: DerivedField) -> bool {
        let added = !self.contains(field);
        self.0 |= field.bit();
        added
    }

    /// Returns `true` if the field was present.
    pub fn remove(&mut self, field: DerivedField) -> bool {
        let present = self.contains(field);
        self.0 &= !field.bit();
        present
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = DerivedField> {
        DerivedField::ALL
            .into_iter()
            .filter(move |field| self.contains(*field))
    }

    /// Parses field names, rejecting anything outside the override-capable set.
    pub fn parse_list<'a, I>(names: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::parse::<DerivedField>)
            .collect()
    }
}

impl FromIterator<DerivedField> for OverrideSet {
    fn from_iter<T: IntoIterator<Item = DerivedField>>(iter: T) -> Self {
        let mut set = Self::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl Serialize for OverrideSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(DerivedField::key))
    }
}

/// Input snapshot for one resolution + projection pass.
///
/// Rates are percentages (6.1 means 6.1% p.a.); amounts are whole currency
/// units per year unless the name says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentInputs {
    pub property_type: PropertyType,
    pub jurisdiction: Jurisdiction,
    pub suburb: String,
    pub postcode: String,
    pub price: f64,
    pub interest_rate: f64,
    pub loan_term_years: u32,
    pub lvr: f64,
    pub weekly_rent: f64,
    pub capital_growth_rate: f64,
    pub inflation_rate: f64,
    pub rental_growth_rate: f64,
    pub land_value: f64,
    pub council_rates: f64,
    pub insurance: f64,
    pub body_corp: f64,
    pub land_tax: f64,
    pub water_rates: f64,
    pub maintenance: f64,
    pub property_manager_rate: f64,
}

impl InvestmentInputs {
    pub(crate) fn derived_value(&self, field: DerivedField) -> f64 {
        match field {
            DerivedField::LandValue => self.land_value,
            DerivedField::CouncilRates => self.council_rates,
            DerivedField::Insurance => self.insurance,
            DerivedField::BodyCorp => self.body_corp,
            DerivedField::LandTax => self.land_tax,
            DerivedField::CapitalGrowth => self.capital_growth_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBreakdown {
    pub council: f64,
    pub insurance: f64,
    pub body_corp: f64,
    pub land_tax: f64,
    pub water: f64,
    pub maintenance: f64,
    pub pm_fee: f64,
    pub repayment: f64,
}

impl ExpenseBreakdown {
    pub fn total(&self) -> f64 {
        self.council
            + self.insurance
            + self.body_corp
            + self.land_tax
            + self.water
            + self.maintenance
            + self.pm_fee
            + self.repayment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRow {
    pub year: u32,
    pub property_value: f64,
    pub loan_balance: f64,
    pub equity: f64,
    pub rental_income: f64,
    pub operating_expenses: f64,
    pub total_expenses: f64,
    pub net_cash_flow: f64,
    pub breakdown: ExpenseBreakdown,
}

/// Year-indexed projection, `rows[y].year == y`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub loan_amount: f64,
    pub monthly_repayment: f64,
    pub annual_repayment: f64,
    pub rows: Vec<ProjectionRow>,
}

impl Projection {
    pub fn row(&self, year: u32) -> Option<&ProjectionRow> {
        self.rows.get(year as usize)
    }

    pub fn rows(&self) -> &[ProjectionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rounds to the nearest whole currency unit, halves away from zero.
pub fn whole_units(value: f64) -> f64 {
    if value.is_finite() { value.round() } else { 0.0 }
}

fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
