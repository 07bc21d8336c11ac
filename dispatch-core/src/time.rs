//! Day-fraction time values.
//!
//! All schedule arithmetic happens in fractions of a day: `0.0` is midnight
//! at the start of the service day and `1.0` is the following midnight.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One minute expressed as a fraction of a day.
pub const ONE_MINUTE: f64 = 1.0 / 1440.0;

/// One hour expressed as a fraction of a day.
pub const ONE_HOUR: f64 = 1.0 / 24.0;

/// Convert a whole number of hours and minutes into a day fraction.
///
/// # Examples
/// ```
/// use dispatch_core::time::{hours_minutes, ONE_HOUR};
///
/// assert!((hours_minutes(1, 0) - ONE_HOUR).abs() < 1e-12);
/// ```
#[must_use]
pub fn hours_minutes(hours: u32, minutes: u32) -> f64 {
    f64::from(hours) * ONE_HOUR + f64::from(minutes) * ONE_MINUTE
}

/// Convert a (possibly fractional) number of minutes into a day fraction.
#[must_use]
pub fn minutes(value: f64) -> f64 {
    value * ONE_MINUTE
}

/// A point in the service day stored as a day fraction.
///
/// `DayTime` parses either a raw fraction (`"0.375"`) or a clock reading
/// (`"9:00"`, `"09:00:30"`).
///
/// # Examples
/// ```
/// use dispatch_core::DayTime;
///
/// let nine: DayTime = "9:00".parse()?;
/// let fraction: DayTime = "0.375".parse()?;
/// assert!((nine.fraction() - fraction.fraction()).abs() < 1e-12);
/// assert_eq!(nine.to_string(), "09:00");
/// # Ok::<(), dispatch_core::TimeParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawDayTime", into = "f64")
)]
pub struct DayTime(f64);

impl DayTime {
    /// Midnight at the start of the day.
    pub const MIDNIGHT: Self = Self(0.0);

    /// Wrap a day fraction without validation.
    #[must_use]
    pub const fn from_fraction(fraction: f64) -> Self {
        Self(fraction)
    }

    /// Build a time from a clock reading.
    #[must_use]
    pub fn from_hm(hours: u32, minutes: u32) -> Self {
        Self(hours_minutes(hours, minutes))
    }

    /// The underlying day fraction.
    #[must_use]
    pub const fn fraction(self) -> f64 {
        self.0
    }

    /// Whether the value is exactly midnight, which inputs use to mean
    /// "not scheduled".
    #[must_use]
    pub fn is_unset(self) -> bool {
        self.0 == 0.0
    }
}

impl From<DayTime> for f64 {
    fn from(value: DayTime) -> Self {
        value.0
    }
}

/// Errors raised when parsing a [`DayTime`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// The text was neither a number nor an `H:MM[:SS]` clock reading.
    #[error("`{input}` is not a day fraction or H:MM[:SS] time")]
    Malformed {
        /// Text that failed to parse.
        input: String,
    },
    /// A clock component was out of range.
    #[error("`{input}` has an out-of-range clock component")]
    OutOfRange {
        /// Text that failed to parse.
        input: String,
    },
}

impl FromStr for DayTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(fraction) = trimmed.parse::<f64>() {
            return Ok(Self(fraction));
        }
        parse_clock(trimmed).map(Self)
    }
}

fn parse_clock(input: &str) -> Result<f64, TimeParseError> {
    let malformed = || TimeParseError::Malformed {
        input: input.to_owned(),
    };
    let mut parts = input.split(':');
    let hours = parts.next().ok_or_else(malformed)?;
    let mins = parts.next().ok_or_else(malformed)?;
    let secs = parts.next().unwrap_or("0");
    if parts.next().is_some() {
        return Err(malformed());
    }
    let parse = |part: &str| part.trim().parse::<u32>().map_err(|_| malformed());
    let (h, m, sec) = (parse(hours)?, parse(mins)?, parse(secs)?);
    if h > 24 || m >= 60 || sec >= 60 {
        return Err(TimeParseError::OutOfRange {
            input: input.to_owned(),
        });
    }
    Ok(hours_minutes(h, m) + f64::from(sec) * ONE_MINUTE / 60.0)
}

impl fmt::Display for DayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_minutes = (self.0 * 1440.0).round().max(0.0);
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "value is rounded and clamped to non-negative minutes"
        )]
        let total = total_minutes as u64;
        write!(f, "{:02}:{:02}", total.div_euclid(60), total.rem_euclid(60))
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawDayTime {
    Fraction(f64),
    Text(String),
}

#[cfg(feature = "serde")]
impl TryFrom<RawDayTime> for DayTime {
    type Error = TimeParseError;

    fn try_from(raw: RawDayTime) -> Result<Self, Self::Error> {
        match raw {
            RawDayTime::Fraction(fraction) => Ok(Self(fraction)),
            RawDayTime::Text(text) => text.parse(),
        }
    }
}
