//! Operator input checked before a Start command is issued.
//!
//! Neither value is part of the Session: a rejected input never reaches the
//! controller and never triggers a remote call.

use std::fmt;
use std::str::FromStr;

use sprinklr_protocol::ZoneId;
use thiserror::Error;

pub const MIN_RUN_MINUTES: u32 = 1;
pub const MAX_RUN_MINUTES: u32 = 60;

/// Fixed message shown for any non-conforming duration
pub const DURATION_HINT: &str = "Please enter duration in whole minutes only. Max 60 min.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", DURATION_HINT)]
pub struct DurationError;

/// A validated run length: a whole number of minutes in `1..=60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunMinutes(u32);

impl RunMinutes {
    pub fn new(minutes: u32) -> Result<Self, DurationError> {
        if (MIN_RUN_MINUTES..=MAX_RUN_MINUTES).contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(DurationError)
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_millis(self) -> i64 {
        i64::from(self.0) * 60_000
    }
}

impl fmt::Display for RunMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunMinutes {
    type Err = DurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let whole: i64 = input.trim().parse().map_err(|_| DurationError)?;
        let minutes = u32::try_from(whole).map_err(|_| DurationError)?;
        RunMinutes::new(minutes)
    }
}

impl TryFrom<f64> for RunMinutes {
    type Error = DurationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX)
        {
            return Err(DurationError);
        }
        RunMinutes::new(value as u32)
    }
}

/// Zone picker value: `0` means nothing is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneSelection(Option<ZoneId>);

impl ZoneSelection {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(ZoneId::new(raw))
    }

    pub fn zone(self) -> Option<ZoneId> {
        self.0
    }

    /// The duration entry is hidden until a zone is picked.
    pub fn shows_duration_entry(self) -> bool {
        self.0.is_some()
    }
}

impl From<ZoneId> for ZoneSelection {
    fn from(zone: ZoneId) -> Self {
        Self(Some(zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_and_fractional_input() {
        for input in ["0", "61", "-5", "5.5", "", "abc", "1e1"] {
            assert_eq!(input.parse::<RunMinutes>(), Err(DurationError), "{input:?}");
        }
        for value in [0.0, 61.0, -5.0, 5.5, f64::NAN] {
            assert_eq!(RunMinutes::try_from(value), Err(DurationError), "{value}");
        }
    }

    #[test]
    fn accepts_bounds() {
        assert_eq!("1".parse::<RunMinutes>().map(RunMinutes::get), Ok(1));
        assert_eq!(" 60 ".parse::<RunMinutes>().map(RunMinutes::get), Ok(60));
        assert_eq!(RunMinutes::try_from(60.0).map(RunMinutes::get), Ok(60));
        assert_eq!(RunMinutes::new(5).map(RunMinutes::as_millis), Ok(300_000));
    }

    #[test]
    fn rejection_uses_fixed_message() {
        assert_eq!(DurationError.to_string(), DURATION_HINT);
    }

    #[test]
    fn zero_selection_hides_duration_entry() {
        assert!(!ZoneSelection::from_raw(0).shows_duration_entry());
        assert!(ZoneSelection::from_raw(2).shows_duration_entry());
        assert_eq!(ZoneSelection::none().zone(), None);
    }
}
