//! Daily roster selection.
//!
//! Early-start duty alternates by weekday parity: a driver whose stored
//! flag matches the parity of the run date keeps the early slot, the others
//! lose it. When nobody ends up with the early slot one driver is drafted
//! with a seeded random choice so runs stay reproducible.

use chrono::{Datelike, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::Driver;

/// Errors raised while selecting the day's roster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// A requested driver id is not in the driver table.
    #[error("driver {id} is not present in the driver table")]
    UnknownDriver {
        /// The missing driver id.
        id: u32,
    },
    /// No drivers were available for the day.
    #[error("no drivers available for {date}")]
    Empty {
        /// The run date.
        date: NaiveDate,
    },
}

/// Select the drivers working on `date` and assign early-start duty.
///
/// When `requested` is empty every driver in `pool` works. Requested ids
/// keep the order they were given in.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use dispatch_core::{Driver, roster::select_roster};
///
/// let pool = vec![Driver::new(1, "Ana", "d1"), Driver::new(2, "Ben", "d2")];
/// // 2024-01-02 is a Tuesday.
/// let date = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date");
/// let roster = select_roster(&pool, &[2], date, 7)?;
/// assert_eq!(roster.len(), 1);
/// assert!(roster[0].early_day);
/// # Ok::<(), dispatch_core::RosterError>(())
/// ```
pub fn select_roster(
    pool: &[Driver],
    requested: &[u32],
    date: NaiveDate,
    seed: u64,
) -> Result<Vec<Driver>, RosterError> {
    let mut roster = if requested.is_empty() {
        pool.to_vec()
    } else {
        requested
            .iter()
            .map(|id| {
                pool.iter()
                    .find(|driver| driver.id == *id)
                    .cloned()
                    .ok_or(RosterError::UnknownDriver { id: *id })
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    if roster.is_empty() {
        return Err(RosterError::Empty { date });
    }

    let odd_day = !date.weekday().num_days_from_monday().is_multiple_of(2);
    for driver in &mut roster {
        driver.early_day = odd_day != driver.early_day;
    }

    if !roster.iter().any(|driver| driver.early_day) {
        let mut rng = StdRng::seed_from_u64(seed);
        if let Some(drafted) = roster.choose_mut(&mut rng) {
            log::info!(
                "no driver holds early-start duty on {date}; drafting {} ({})",
                drafted.name,
                drafted.id
            );
            drafted.early_day = true;
        }
    }
    Ok(roster)
}
