use geo::Coord;

/// A uniquely addressed place in the service area.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`. The
/// address string is the location's identity: two request nodes may never
/// share one.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use dispatch_core::Location;
///
/// let clinic = Location::new("12 Harbour Rd", Coord { x: -71.06, y: 42.36 });
/// assert_eq!(clinic.address, "12 Harbour Rd");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    /// Unique address string.
    pub address: String,
    /// Geospatial position.
    pub coord: Coord<f64>,
}

impl Location {
    /// Construct a location from an address and coordinate.
    pub fn new(address: impl Into<String>, coord: Coord<f64>) -> Self {
        Self {
            address: address.into(),
            coord,
        }
    }
}
