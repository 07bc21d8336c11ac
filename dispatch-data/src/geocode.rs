//! Static address resolution from coordinates carried by the input files.

use std::collections::BTreeMap;

use dispatch_core::{AddressResolver, ResolveError};
use geo::Coord;
use thiserror::Error;

use crate::input::{DriverRecord, TripRecord};

/// Two records place the same address at different coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("address `{address}` is recorded at both {first:?} and {second:?}")]
pub struct ConflictingCoordinate {
    /// The address in question.
    pub address: String,
    /// Coordinate seen first.
    pub first: Coord<f64>,
    /// Coordinate seen later.
    pub second: Coord<f64>,
}

/// Address to coordinate lookup table.
///
/// # Examples
/// ```
/// use dispatch_core::AddressResolver;
/// use dispatch_data::geocode::AddressBook;
/// use geo::Coord;
///
/// let mut book = AddressBook::default();
/// book.insert("Mercy Clinic", Coord { x: -71.1, y: 42.3 })?;
/// assert_eq!(book.resolve("Mercy Clinic")?, Coord { x: -71.1, y: 42.3 });
/// assert!(book.resolve("Nowhere").is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressBook {
    entries: BTreeMap<String, Coord<f64>>,
}

impl AddressBook {
    /// Build a book from every pickup, dropoff and depot in the inputs.
    ///
    /// # Errors
    /// Returns [`ConflictingCoordinate`] when one address appears with two
    /// different coordinates.
    pub fn from_records(
        trips: &[TripRecord],
        drivers: &[DriverRecord],
    ) -> Result<Self, ConflictingCoordinate> {
        let mut book = Self::default();
        for trip in trips {
            book.insert(&trip.pickup_address, trip.pickup_coord())?;
            book.insert(&trip.dropoff_address, trip.dropoff_coord())?;
        }
        for driver in drivers {
            book.insert(&driver.address, driver.coord())?;
        }
        log::debug!("address book holds {} addresses", book.len());
        Ok(book)
    }

    /// Record `coord` for `address`. Re-inserting the same coordinate is a
    /// no-op.
    ///
    /// # Errors
    /// Returns [`ConflictingCoordinate`] when `address` is already known at
    /// a different coordinate.
    pub fn insert(
        &mut self,
        address: impl Into<String>,
        coord: Coord<f64>,
    ) -> Result<(), ConflictingCoordinate> {
        let key = address.into();
        match self.entries.get(&key) {
            Some(first) if *first != coord => Err(ConflictingCoordinate {
                address: key,
                first: *first,
                second: coord,
            }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert(key, coord);
                Ok(())
            }
        }
    }

    /// Number of known addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AddressResolver for AddressBook {
    fn resolve(&self, address: &str) -> Result<Coord<f64>, ResolveError> {
        self.entries
            .get(address)
            .copied()
            .ok_or_else(|| ResolveError::UnknownAddress {
                address: address.to_owned(),
            })
    }
}
