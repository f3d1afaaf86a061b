#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Accident record types shared across the crash stats workspace.
//!
//! An accident is described by four facets (location, time, tags and
//! description) that share one integer identifier. The store crate joins
//! the facets into a single [`Accident`]; the analytics crates group and
//! compare accidents along the dimensions these types expose.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Identifier shared by all four facets of one accident.
pub type AccidentId = i64;

/// One of the four per-accident record groups.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Facet {
    /// Street, cross street, neighborhood and coordinates.
    Location,
    /// Time-of-day bucket, day, month and year.
    Time,
    /// Boolean involvement flags plus severity.
    Tags,
    /// Crash configuration and victim/sub-crash totals.
    Description,
}

impl Facet {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Location, Self::Time, Self::Tags, Self::Description]
    }
}

/// One of the eight 3-hour windows an accident's time of day falls in.
///
/// Variants are declared in clock order so the derived `Ord` sorts them
/// chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeBucket {
    /// 00:00 to 02:59
    #[serde(rename = "00:00-02:59")]
    LateNight,
    /// 03:00 to 05:59
    #[serde(rename = "03:00-05:59")]
    EarlyMorning,
    /// 06:00 to 08:59
    #[serde(rename = "06:00-08:59")]
    Morning,
    /// 09:00 to 11:59
    #[serde(rename = "09:00-11:59")]
    LateMorning,
    /// 12:00 to 14:59
    #[serde(rename = "12:00-14:59")]
    Afternoon,
    /// 15:00 to 17:59
    #[serde(rename = "15:00-17:59")]
    LateAfternoon,
    /// 18:00 to 20:59
    #[serde(rename = "18:00-20:59")]
    Evening,
    /// 21:00 to 23:59
    #[serde(rename = "21:00-23:59")]
    Night,
}

impl TimeBucket {
    /// Returns all buckets in clock order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::LateNight,
            Self::EarlyMorning,
            Self::Morning,
            Self::LateMorning,
            Self::Afternoon,
            Self::LateAfternoon,
            Self::Evening,
            Self::Night,
        ]
    }

    /// Returns the bucket containing the given hour of day.
    ///
    /// # Errors
    ///
    /// Returns an error if `hour` is not in `0..24`.
    pub const fn from_hour(hour: u8) -> Result<Self, InvalidTimeBucketError> {
        match hour {
            0..=2 => Ok(Self::LateNight),
            3..=5 => Ok(Self::EarlyMorning),
            6..=8 => Ok(Self::Morning),
            9..=11 => Ok(Self::LateMorning),
            12..=14 => Ok(Self::Afternoon),
            15..=17 => Ok(Self::LateAfternoon),
            18..=20 => Ok(Self::Evening),
            21..=23 => Ok(Self::Night),
            _ => Err(InvalidTimeBucketError {
                value: String::new(),
            }),
        }
    }

    /// Returns the first hour covered by this bucket.
    #[must_use]
    pub const fn start_hour(self) -> u8 {
        (self as u8) * 3
    }

    /// Returns the `HH:MM-HH:MM` label for this bucket.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LateNight => "00:00-02:59",
            Self::EarlyMorning => "03:00-05:59",
            Self::Morning => "06:00-08:59",
            Self::LateMorning => "09:00-11:59",
            Self::Afternoon => "12:00-14:59",
            Self::LateAfternoon => "15:00-17:59",
            Self::Evening => "18:00-20:59",
            Self::Night => "21:00-23:59",
        }
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TimeBucket {
    type Err = InvalidTimeBucketError;

    /// Accepts either the bucket label or the bucket's starting hour.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(bucket) = Self::all().iter().find(|b| b.label() == s) {
            return Ok(*bucket);
        }
        match s.parse::<u8>() {
            Ok(hour) if hour % 3 == 0 => Self::from_hour(hour).map_err(|_| InvalidTimeBucketError {
                value: s.to_string(),
            }),
            _ => Err(InvalidTimeBucketError {
                value: s.to_string(),
            }),
        }
    }
}

/// Error returned when a string does not name a [`TimeBucket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTimeBucketError {
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidTimeBucketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid time bucket '{}': expected a label like 00:00-02:59 or a start hour (0, 3, ..., 21)",
            self.value
        )
    }
}

impl std::error::Error for InvalidTimeBucketError {}

/// Day of the week, Monday first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Returns all days, Monday first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Monday,
            Self::Tuesday,
            Self::Wednesday,
            Self::Thursday,
            Self::Friday,
            Self::Saturday,
            Self::Sunday,
        ]
    }
}

/// Calendar month.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    /// Returns all months in calendar order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::January,
            Self::February,
            Self::March,
            Self::April,
            Self::May,
            Self::June,
            Self::July,
            Self::August,
            Self::September,
            Self::October,
            Self::November,
            Self::December,
        ]
    }
}

/// Binary accident severity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    /// At least one person was hurt or killed.
    Casualty,
    /// Only property was damaged.
    #[strum(to_string = "property_damage_only", serialize = "pdo")]
    PropertyDamageOnly,
}

/// Boolean involvement flags recorded on the tags facet.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Tag {
    Animal,
    Cyclist,
    HeavyVehicle,
    IntersectionCrash,
    Motorcycle,
    ParkedVehicle,
    ParkingLot,
    Pedestrian,
    MidBlock,
}

impl Tag {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Animal,
            Self::Cyclist,
            Self::HeavyVehicle,
            Self::IntersectionCrash,
            Self::Motorcycle,
            Self::ParkedVehicle,
            Self::ParkingLot,
            Self::Pedestrian,
            Self::MidBlock,
        ]
    }
}

/// Where an accident happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFacet {
    /// Accident identifier.
    pub id: AccidentId,
    /// Primary street name.
    pub street: String,
    /// Cross street. `None` when the accident was not at an intersection.
    pub cross_street: Option<String>,
    /// Full location string as recorded (street plus cross street or block).
    pub location: String,
    /// Neighborhood label assigned during preprocessing.
    pub neighborhood: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl LocationFacet {
    /// Whether the accident happened at an intersection (has a non-empty
    /// cross street).
    #[must_use]
    pub fn is_intersection(&self) -> bool {
        self.cross_street
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// When an accident happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFacet {
    /// Accident identifier.
    pub id: AccidentId,
    /// 3-hour window of the day.
    pub time_of_day: TimeBucket,
    /// Day of the week.
    pub day: DayOfWeek,
    /// Calendar month.
    pub month: Month,
    /// Calendar year.
    pub year: u16,
}

/// Involvement flags and severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct TagFacet {
    /// Accident identifier.
    pub id: AccidentId,
    pub animal: bool,
    pub cyclist: bool,
    pub heavy_vehicle: bool,
    pub intersection_crash: bool,
    pub motorcycle: bool,
    pub parked_vehicle: bool,
    pub parking_lot: bool,
    pub pedestrian: bool,
    pub mid_block: bool,
    /// Casualty or property-damage-only.
    pub severity: Severity,
}

impl TagFacet {
    /// Returns the value of a single flag.
    #[must_use]
    pub const fn has(&self, tag: Tag) -> bool {
        match tag {
            Tag::Animal => self.animal,
            Tag::Cyclist => self.cyclist,
            Tag::HeavyVehicle => self.heavy_vehicle,
            Tag::IntersectionCrash => self.intersection_crash,
            Tag::Motorcycle => self.motorcycle,
            Tag::ParkedVehicle => self.parked_vehicle,
            Tag::ParkingLot => self.parking_lot,
            Tag::Pedestrian => self.pedestrian,
            Tag::MidBlock => self.mid_block,
        }
    }
}

/// What kind of crash it was and how many people were hurt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionFacet {
    /// Accident identifier.
    pub id: AccidentId,
    /// Crash configuration category (e.g. rear-end, side impact).
    pub crash_configuration: String,
    /// Number of sub-crashes that make up this accident.
    pub total_crashes: u32,
    /// Number of victims.
    pub total_victims: u32,
}

/// An accident with all four facets joined on its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accident {
    pub id: AccidentId,
    pub location: LocationFacet,
    pub time: TimeFacet,
    pub tags: TagFacet,
    pub description: DescriptionFacet,
}

impl Accident {
    /// Whether the accident is recorded as a casualty crash.
    #[must_use]
    pub fn is_casualty(&self) -> bool {
        self.tags.severity == Severity::Casualty
    }

    /// Checks the data-quality rule that any recorded victim implies a
    /// casualty severity.
    #[must_use]
    pub fn severity_is_consistent(&self) -> bool {
        self.description.total_victims == 0 || self.is_casualty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_bucket_from_hour_covers_the_day() {
        for hour in 0..24u8 {
            let bucket = TimeBucket::from_hour(hour).unwrap();
            assert!(
                (bucket.start_hour()..bucket.start_hour() + 3).contains(&hour),
                "hour {hour} landed in {bucket}"
            );
        }
        assert!(TimeBucket::from_hour(24).is_err());
    }

    #[test]
    fn time_bucket_parses_label_and_start_hour() {
        assert_eq!(
            "18:00-20:59".parse::<TimeBucket>().unwrap(),
            TimeBucket::Evening
        );
        assert_eq!("21".parse::<TimeBucket>().unwrap(), TimeBucket::Night);
        assert_eq!("0".parse::<TimeBucket>().unwrap(), TimeBucket::LateNight);
        assert!("4".parse::<TimeBucket>().is_err());
        assert!("noon".parse::<TimeBucket>().is_err());
    }

    #[test]
    fn time_buckets_sort_in_clock_order() {
        let mut buckets = TimeBucket::all().to_vec();
        buckets.reverse();
        buckets.sort();
        assert_eq!(buckets, TimeBucket::all());
    }

    #[test]
    fn severity_parses_aliases() {
        assert_eq!("casualty".parse::<Severity>().unwrap(), Severity::Casualty);
        assert_eq!("PDO".parse::<Severity>().unwrap(), Severity::PropertyDamageOnly);
        assert_eq!(
            Severity::PropertyDamageOnly.to_string(),
            "property_damage_only"
        );
    }

    #[test]
    fn day_and_month_parse_case_insensitively() {
        assert_eq!("friday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Friday);
        assert_eq!("MARCH".parse::<Month>().unwrap(), Month::March);
    }

    #[test]
    fn tag_names_round_trip() {
        for tag in Tag::all() {
            assert_eq!(tag.to_string().parse::<Tag>().unwrap(), *tag);
        }
        assert_eq!(Tag::HeavyVehicle.as_ref(), "heavy_vehicle");
    }

    #[test]
    fn blank_cross_street_is_not_an_intersection() {
        let mut location = LocationFacet {
            id: 1,
            street: "Main St".to_string(),
            cross_street: Some("  ".to_string()),
            location: "Main St".to_string(),
            neighborhood: "Downtown".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        };
        assert!(!location.is_intersection());
        location.cross_street = Some("1st Ave".to_string());
        assert!(location.is_intersection());
    }
}
