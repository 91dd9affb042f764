use thiserror::Error;

/// Rejections raised while turning external input into an engine snapshot.
///
/// The engine functions themselves are total; these only surface at the
/// CLI/API boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("unknown override field: {0}")]
    UnknownOverrideField(String),

    #[error("unknown jurisdiction: {0}")]
    UnknownJurisdiction(String),

    #[error("unknown property type: {0}")]
    UnknownPropertyType(String),

    #[error("override {0} requires a value")]
    MissingOverrideValue(&'static str),

    #[error("projection has no row for year {0}")]
    MissingYear(u32),

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },
}

impl InputError {
    pub(crate) const fn out_of_range(field: &'static str, requirement: &'static str) -> Self {
        Self::OutOfRange { field, requirement }
    }
}
