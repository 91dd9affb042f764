use serde::Serialize;

use super::types::Jurisdiction;

/// One band of a progressive land tax scale.
///
/// A value inside the band pays `base_amount` plus `marginal_rate` on every
/// dollar above the previous band's `upper_bound` (0 for the first band).
/// `upper_bound` is exclusive; `None` marks the open top band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandTaxBracket {
    pub upper_bound: Option<f64>,
    pub base_amount: f64,
    pub marginal_rate: f64,
}

const fn band(upper_bound: f64, base_amount: f64, marginal_rate: f64) -> LandTaxBracket {
    LandTaxBracket {
        upper_bound: Some(upper_bound),
        base_amount,
        marginal_rate,
    }
}

const fn top(base_amount: f64, marginal_rate: f64) -> LandTaxBracket {
    LandTaxBracket {
        upper_bound: None,
        base_amount,
        marginal_rate,
    }
}

// General (non-premium, single holding) scales. Surcharges and aggregation
// across holdings are not modelled.
const NSW: &[LandTaxBracket] = &[
    band(1_075_000.0, 0.0, 0.0),
    band(6_571_000.0, 100.0, 0.016),
    top(88_036.0, 0.02),
];

const VIC: &[LandTaxBracket] = &[
    band(50_000.0, 0.0, 0.0),
    band(250_000.0, 0.0, 0.002),
    band(600_000.0, 400.0, 0.005),
    band(1_000_000.0, 2_150.0, 0.008),
    band(1_800_000.0, 5_350.0, 0.013),
    band(3_000_000.0, 15_750.0, 0.018),
    top(37_350.0, 0.02),
];

const QLD: &[LandTaxBracket] = &[
    band(600_000.0, 0.0, 0.0),
    band(1_000_000.0, 500.0, 0.01),
    band(3_000_000.0, 4_500.0, 0.0165),
    band(5_000_000.0, 37_500.0, 0.0125),
    top(62_500.0, 0.0175),
];

const WA: &[LandTaxBracket] = &[
    band(300_000.0, 0.0, 0.0),
    band(420_000.0, 300.0, 0.0),
    band(1_000_000.0, 300.0, 0.0025),
    band(1_800_000.0, 1_750.0, 0.009),
    band(5_000_000.0, 8_950.0, 0.018),
    band(11_000_000.0, 66_550.0, 0.02),
    top(186_550.0, 0.0265),
];

const SA: &[LandTaxBracket] = &[
    band(534_000.0, 0.0, 0.0),
    band(801_000.0, 0.0, 0.005),
    band(1_133_000.0, 1_335.0, 0.01),
    band(1_466_000.0, 4_655.0, 0.02),
    top(11_315.0, 0.024),
];

const TAS: &[LandTaxBracket] = &[
    band(50_000.0, 0.0, 0.0),
    band(100_000.0, 0.0, 0.0055),
    band(250_000.0, 275.0, 0.0055),
    band(500_000.0, 1_100.0, 0.0125),
    top(4_225.0, 0.015),
];

/// Scale for a jurisdiction; empty when no scale is modelled.
pub const fn brackets(jurisdiction: Jurisdiction) -> &'static [LandTaxBracket] {
    match jurisdiction {
        Jurisdiction::Nsw => NSW,
        Jurisdiction::Vic => VIC,
        Jurisdiction::Qld => QLD,
        Jurisdiction::Wa => WA,
        Jurisdiction::Sa => SA,
        Jurisdiction::Tas => TAS,
        Jurisdiction::Act | Jurisdiction::Nt => &[],
    }
}

/// Annual land tax on `land_value` in `jurisdiction`, unrounded.
pub fn compute_land_tax(land_value: f64, jurisdiction: Jurisdiction) -> f64 {
    if !land_value.is_finite() || land_value <= 0.0 {
        return 0.0;
    }

    let mut lower = 0.0;
    for bracket in brackets(jurisdiction) {
        match bracket.upper_bound {
            Some(upper) if land_value >= upper => lower = upper,
            _ => return (bracket.base_amount + (land_value - lower) * bracket.marginal_rate).max(0.0),
        }
    }

    0.0
}
