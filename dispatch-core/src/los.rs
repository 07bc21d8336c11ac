//! Vehicle and trip capability classes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Space an ambulatory rider occupies in a vehicle.
pub const AMBULATORY_SPACE: f64 = 1.0;

/// Space a wheelchair rider occupies in a vehicle.
pub const WHEELCHAIR_SPACE: f64 = 1.5;

/// Level of service a trip requires or a vehicle supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum LevelOfService {
    /// Ambulatory rider (`A`).
    Ambulatory,
    /// Wheelchair rider (`W`).
    Wheelchair,
}

impl LevelOfService {
    /// Vehicle space a rider of this class occupies.
    #[must_use]
    pub const fn space(self) -> f64 {
        match self {
            Self::Ambulatory => AMBULATORY_SPACE,
            Self::Wheelchair => WHEELCHAIR_SPACE,
        }
    }

    /// Single-letter code used by input files.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ambulatory => "A",
            Self::Wheelchair => "W",
        }
    }
}

/// Error returned for an unrecognised level-of-service code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown level of service `{code}` (expected A or W)")]
pub struct UnknownLevelOfService {
    /// The offending code.
    pub code: String,
}

impl FromStr for LevelOfService {
    type Err = UnknownLevelOfService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::Ambulatory),
            "W" | "w" => Ok(Self::Wheelchair),
            other => Err(UnknownLevelOfService {
                code: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for LevelOfService {
    type Error = UnknownLevelOfService;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LevelOfService> for String {
    fn from(value: LevelOfService) -> Self {
        value.code().to_owned()
    }
}

impl fmt::Display for LevelOfService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A", LevelOfService::Ambulatory)]
    #[case(" w", LevelOfService::Wheelchair)]
    fn parses_codes(#[case] code: &str, #[case] expected: LevelOfService) {
        assert_eq!(code.parse::<LevelOfService>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_codes() {
        let err = "S".parse::<LevelOfService>().expect_err("stretcher is unsupported");
        assert_eq!(err.code, "S");
    }

    #[rstest]
    fn wheelchair_needs_more_space() {
        assert!(LevelOfService::Wheelchair.space() > LevelOfService::Ambulatory.space());
    }
}
