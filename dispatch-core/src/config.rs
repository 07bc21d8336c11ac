//! Optimizer tuning parameters.

use std::time::Duration;

use thiserror::Error;

use crate::DayTime;
use crate::time::minutes;

/// Time and gap budget for one solve stage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct StageBudget {
    /// Wall-clock limit in seconds.
    pub time_limit_secs: u64,
    /// Relative optimality gap at which the stage may stop early.
    pub gap: Option<f64>,
}

impl StageBudget {
    /// Budget with a time limit and no gap target.
    #[must_use]
    pub const fn time_only(time_limit_secs: u64) -> Self {
        Self {
            time_limit_secs,
            gap: None,
        }
    }

    /// Time limit as a [`Duration`].
    #[must_use]
    pub const fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

impl Default for StageBudget {
    fn default() -> Self {
        Self::time_only(300)
    }
}

/// Parameters controlling model construction and the staged solve.
///
/// Every field has a default so configuration files only need to name what
/// they change. Window and slack values are minutes; penalties are objective
/// weights.
///
/// # Examples
/// ```
/// use dispatch_core::OptimizerConfig;
///
/// let config = OptimizerConfig {
///     max_retries: 1,
///     ..OptimizerConfig::default()
/// };
/// config.validate()?;
/// # Ok::<(), dispatch_core::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct OptimizerConfig {
    /// Only the first `max_trips` trips are considered.
    pub max_trips: Option<usize>,
    /// Only the first `max_drivers` drivers are considered.
    pub max_drivers: Option<usize>,
    /// Capacity applied to every vehicle, overriding per-driver values.
    pub driver_capacity: Option<f64>,
    /// Minutes a pickup may happen before its scheduled time.
    pub early_pickup_minutes: f64,
    /// Minutes a pickup may happen after its scheduled time.
    pub late_pickup_minutes: f64,
    /// Minutes a dropoff may happen after its scheduled time.
    pub late_dropoff_minutes: f64,
    /// Slack subtracted from an edge's opening time when testing whether
    /// the edge can be driven inside its window.
    pub edge_window_slack_minutes: f64,
    /// Weight on each driver's route duration.
    pub route_length_penalty: f64,
    /// Earliest departure for drivers without early-start duty.
    pub early_day_time: DayTime,
    /// Weight on the idle gap between merged legs, per hour.
    pub merge_penalty: f64,
    /// Weight on the spread between highest and lowest driver revenue.
    pub revenue_penalty: f64,
    /// Weight on the spread of wheelchair trips across capable drivers.
    pub wheelchair_penalty: f64,
    /// Budget for the single-rider stage.
    pub stage1: StageBudget,
    /// Budget for the relaxed stage.
    pub stage2: StageBudget,
    /// Number of full solve attempts before giving up.
    pub max_retries: u32,
    /// Seed for every stochastic choice in a run.
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_trips: None,
            max_drivers: None,
            driver_capacity: None,
            early_pickup_minutes: 30.0,
            late_pickup_minutes: 30.0,
            late_dropoff_minutes: 30.0,
            edge_window_slack_minutes: 20.0,
            route_length_penalty: 480.0,
            early_day_time: DayTime::from_hm(8, 0),
            merge_penalty: 1000.0,
            revenue_penalty: 0.5,
            wheelchair_penalty: 2.0,
            stage1: StageBudget::time_only(300),
            stage2: StageBudget {
                time_limit_secs: 600,
                gap: Some(0.01),
            },
            max_retries: 3,
            seed: 0,
        }
    }
}

/// Errors raised by [`OptimizerConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A parameter is outside its allowed range.
    #[error("invalid configuration: {field} = {value} ({reason})")]
    InvalidConfig {
        /// Offending field name.
        field: &'static str,
        /// Offending value.
        value: f64,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

impl OptimizerConfig {
    /// Check every parameter against its allowed range.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("early_pickup_minutes", self.early_pickup_minutes),
            ("late_pickup_minutes", self.late_pickup_minutes),
            ("late_dropoff_minutes", self.late_dropoff_minutes),
            ("edge_window_slack_minutes", self.edge_window_slack_minutes),
            ("route_length_penalty", self.route_length_penalty),
            ("merge_penalty", self.merge_penalty),
            ("revenue_penalty", self.revenue_penalty),
            ("wheelchair_penalty", self.wheelchair_penalty),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, value, "must be a finite non-negative number"));
            }
        }
        if let Some(capacity) = self.driver_capacity
            && (!capacity.is_finite() || capacity <= 0.0)
        {
            return Err(invalid("driver_capacity", capacity, "must be positive"));
        }
        let early = self.early_day_time.fraction();
        if !(0.0..=1.0).contains(&early) {
            return Err(invalid("early_day_time", early, "must fall within the day"));
        }
        for (field, budget) in [("stage1", &self.stage1), ("stage2", &self.stage2)] {
            if budget.time_limit_secs == 0 {
                return Err(invalid(field, 0.0, "time limit must be positive"));
            }
            if let Some(gap) = budget.gap
                && !(0.0..1.0).contains(&gap)
            {
                return Err(invalid(field, gap, "gap must lie in [0, 1)"));
            }
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries", 0.0, "at least one attempt is required"));
        }
        Ok(())
    }

    /// Early pickup slack as a day fraction.
    #[must_use]
    pub fn early_pickup_window(&self) -> f64 {
        minutes(self.early_pickup_minutes)
    }

    /// Late pickup slack as a day fraction.
    #[must_use]
    pub fn late_pickup_window(&self) -> f64 {
        minutes(self.late_pickup_minutes)
    }

    /// Late dropoff slack as a day fraction.
    #[must_use]
    pub fn late_dropoff_window(&self) -> f64 {
        minutes(self.late_dropoff_minutes)
    }

    /// Edge window slack as a day fraction.
    #[must_use]
    pub fn edge_window_slack(&self) -> f64 {
        minutes(self.edge_window_slack_minutes)
    }
}

const fn invalid(field: &'static str, value: f64, reason: &'static str) -> ConfigError {
    ConfigError::InvalidConfig {
        field,
        value,
        reason,
    }
}
