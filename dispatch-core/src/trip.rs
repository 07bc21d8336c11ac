//! Transport requests and multi-leg itinerary identifiers.

use crate::{DayTime, LevelOfService};

/// A single patient-transport request as scheduled by the broker.
///
/// # Examples
/// ```
/// use dispatch_core::{DayTime, LevelOfService, Trip};
///
/// let trip = Trip::new(
///     "1001A",
///     "4 Elm St",
///     "Mercy Clinic",
///     DayTime::from_hm(9, 0),
///     DayTime::from_hm(10, 0),
///     LevelOfService::Ambulatory,
/// )
/// .with_revenue(42.5);
/// assert_eq!(trip.leg().map(|leg| leg.base), Some("1001"));
/// assert!((trip.space() - 1.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trip {
    /// Broker-assigned identifier, optionally suffixed with a leg letter.
    pub id: String,
    /// Pickup address; must be unique across the run.
    pub pickup_address: String,
    /// Dropoff address; must be unique across the run.
    pub dropoff_address: String,
    /// Scheduled pickup time.
    pub scheduled_pickup: DayTime,
    /// Scheduled dropoff time. Midnight means "end of day".
    pub scheduled_dropoff: DayTime,
    /// Required level of service.
    pub los: LevelOfService,
    /// Whether this leg's pickup must closely follow the previous leg.
    pub is_merge: bool,
    /// Revenue credited to the driver who serves the trip.
    pub revenue: f64,
    /// Broker-quoted mileage, when known.
    pub preset_miles: Option<f64>,
}

impl Trip {
    /// Construct a trip with no merge flag and zero revenue.
    pub fn new(
        id: impl Into<String>,
        pickup_address: impl Into<String>,
        dropoff_address: impl Into<String>,
        scheduled_pickup: DayTime,
        scheduled_dropoff: DayTime,
        los: LevelOfService,
    ) -> Self {
        Self {
            id: id.into(),
            pickup_address: pickup_address.into(),
            dropoff_address: dropoff_address.into(),
            scheduled_pickup,
            scheduled_dropoff,
            los,
            is_merge: false,
            revenue: 0.0,
            preset_miles: None,
        }
    }

    /// Mark the trip as a merge leg.
    #[must_use]
    pub fn with_merge(mut self, is_merge: bool) -> Self {
        self.is_merge = is_merge;
        self
    }

    /// Set the trip revenue.
    #[must_use]
    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.revenue = revenue;
        self
    }

    /// Vehicle space the rider occupies.
    #[must_use]
    pub const fn space(&self) -> f64 {
        self.los.space()
    }

    /// Scheduled pickup clamped to the start of the day.
    #[must_use]
    pub fn pickup_fraction(&self) -> f64 {
        self.scheduled_pickup.fraction().max(0.0)
    }

    /// Scheduled dropoff, with midnight read as the end of the day.
    #[must_use]
    pub fn dropoff_fraction(&self) -> f64 {
        if self.scheduled_dropoff.is_unset() {
            1.0
        } else {
            self.scheduled_dropoff.fraction()
        }
    }

    /// Itinerary position parsed from the trip id, if it carries one.
    #[must_use]
    pub fn leg(&self) -> Option<ItineraryLeg<'_>> {
        ItineraryLeg::parse(&self.id)
    }
}

/// Position of a leg within a multi-leg itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LegSuffix {
    /// Outbound leg.
    A,
    /// Second leg, usually the return.
    B,
    /// Optional third leg.
    C,
}

impl LegSuffix {
    const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }

    /// The leg that precedes this one.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::A => None,
            Self::B => Some(Self::A),
            Self::C => Some(Self::B),
        }
    }

    /// The leg that follows this one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::A => Some(Self::B),
            Self::B => Some(Self::C),
            Self::C => None,
        }
    }
}

/// A trip id split into its itinerary base and leg suffix.
///
/// # Examples
/// ```
/// use dispatch_core::{ItineraryLeg, LegSuffix};
///
/// let leg = ItineraryLeg::parse("77B").expect("leg id");
/// assert_eq!(leg.suffix, LegSuffix::B);
/// assert_eq!(leg.previous_id().as_deref(), Some("77A"));
/// assert_eq!(leg.next_id().as_deref(), Some("77C"));
/// assert!(ItineraryLeg::parse("77").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItineraryLeg<'a> {
    /// Id shared by every leg of the itinerary.
    pub base: &'a str,
    /// This leg's position.
    pub suffix: LegSuffix,
}

impl<'a> ItineraryLeg<'a> {
    /// Split `id` into base and suffix. Ids without a non-empty base followed
    /// by `A`, `B` or `C` are not itinerary legs.
    #[must_use]
    pub fn parse(id: &'a str) -> Option<Self> {
        let mut chars = id.char_indices().rev();
        let (at, last) = chars.next()?;
        let suffix = match last {
            'A' => LegSuffix::A,
            'B' => LegSuffix::B,
            'C' => LegSuffix::C,
            _ => return None,
        };
        let base = id.get(..at)?;
        if base.is_empty() {
            return None;
        }
        Some(Self { base, suffix })
    }

    /// Id of the preceding leg.
    #[must_use]
    pub fn previous_id(&self) -> Option<String> {
        self.suffix.previous().map(|leg| self.id_for(leg))
    }

    /// Id of the following leg.
    #[must_use]
    pub fn next_id(&self) -> Option<String> {
        self.suffix.next().map(|leg| self.id_for(leg))
    }

    fn id_for(&self, suffix: LegSuffix) -> String {
        format!("{}{}", self.base, suffix.letter())
    }
}
