//! Facet CSV readers.
//!
//! Each facet file is read into a raw row type that mirrors the CSV header,
//! then converted into the typed facet from `crash_stats_accident_models`.
//! A row that cannot be deserialized or converted is skipped and returned
//! as a [`MalformedRow`]; only structural CSV failures (ragged records,
//! invalid UTF-8, I/O) abort the read.

use std::io::Read;
use std::path::Path;

use crash_stats_accident_models::{
    AccidentId, DayOfWeek, DescriptionFacet, Facet, LocationFacet, Month, Severity, TagFacet,
    TimeBucket, TimeFacet,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{MalformedRow, StoreError};
use crate::parsing::{non_empty, parse_flag};

#[derive(Debug, Deserialize)]
struct LocationRow {
    id: AccidentId,
    street: String,
    cross_street: Option<String>,
    location: String,
    neighborhood: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct TimeRow {
    id: AccidentId,
    time_of_day: String,
    day: String,
    month: String,
    year: u16,
}

#[derive(Debug, Deserialize)]
struct TagRow {
    id: AccidentId,
    animal: String,
    cyclist: String,
    heavy_vehicle: String,
    intersection_crash: String,
    motorcycle: String,
    parked_vehicle: String,
    parking_lot: String,
    pedestrian: String,
    mid_block: String,
    severity: String,
}

#[derive(Debug, Deserialize)]
struct DescriptionRow {
    id: AccidentId,
    crash_configuration: String,
    total_crashes: u32,
    total_victims: u32,
}

impl TryFrom<LocationRow> for LocationFacet {
    type Error = String;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        if row.neighborhood.trim().is_empty() {
            return Err(format!("accident {} has no neighborhood label", row.id));
        }
        Ok(Self {
            id: row.id,
            street: row.street,
            cross_street: non_empty(row.cross_street),
            location: row.location,
            neighborhood: row.neighborhood,
            latitude: row.latitude,
            longitude: row.longitude,
        })
    }
}

impl TryFrom<TimeRow> for TimeFacet {
    type Error = String;

    fn try_from(row: TimeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            time_of_day: row
                .time_of_day
                .parse::<TimeBucket>()
                .map_err(|e| e.to_string())?,
            day: row
                .day
                .parse::<DayOfWeek>()
                .map_err(|_| format!("invalid day '{}'", row.day))?,
            month: row
                .month
                .parse::<Month>()
                .map_err(|_| format!("invalid month '{}'", row.month))?,
            year: row.year,
        })
    }
}

fn flag(column: &str, value: &str) -> Result<bool, String> {
    parse_flag(value).ok_or_else(|| format!("invalid {column} flag '{value}'"))
}

impl TryFrom<TagRow> for TagFacet {
    type Error = String;

    fn try_from(row: TagRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            animal: flag("animal", &row.animal)?,
            cyclist: flag("cyclist", &row.cyclist)?,
            heavy_vehicle: flag("heavy_vehicle", &row.heavy_vehicle)?,
            intersection_crash: flag("intersection_crash", &row.intersection_crash)?,
            motorcycle: flag("motorcycle", &row.motorcycle)?,
            parked_vehicle: flag("parked_vehicle", &row.parked_vehicle)?,
            parking_lot: flag("parking_lot", &row.parking_lot)?,
            pedestrian: flag("pedestrian", &row.pedestrian)?,
            mid_block: flag("mid_block", &row.mid_block)?,
            severity: row
                .severity
                .parse::<Severity>()
                .map_err(|_| format!("invalid severity '{}'", row.severity))?,
        })
    }
}

impl From<DescriptionRow> for DescriptionFacet {
    fn from(row: DescriptionRow) -> Self {
        Self {
            id: row.id,
            crash_configuration: row.crash_configuration,
            total_crashes: row.total_crashes,
            total_victims: row.total_victims,
        }
    }
}

/// Rows read from one facet file.
#[derive(Debug)]
pub struct FacetRows<T> {
    /// Rows that converted cleanly, in file order.
    pub rows: Vec<T>,
    /// Rows that were skipped.
    pub malformed: Vec<MalformedRow>,
}

/// Reads every row of one facet, converting raw rows with `convert`.
fn read_rows<R, Raw, T>(
    rdr: R,
    facet: Facet,
    convert: impl Fn(Raw) -> Result<T, String>,
) -> Result<FacetRows<T>, StoreError>
where
    R: Read,
    Raw: DeserializeOwned,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let mut rows = Vec::new();
    let mut malformed = Vec::new();

    for (i, result) in reader.deserialize::<Raw>().enumerate() {
        // Line 1 is the header row.
        let line = i as u64 + 2;
        let converted = match result {
            Ok(raw) => convert(raw),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Deserialize { .. }) => Err(e.to_string()),
            Err(e) => {
                return Err(StoreError::Parse {
                    facet,
                    line,
                    message: e.to_string(),
                });
            }
        };
        match converted {
            Ok(row) => rows.push(row),
            Err(message) => {
                log::warn!("Skipping {facet} row at line {line}: {message}");
                malformed.push(MalformedRow { line, message });
            }
        }
    }

    log::debug!(
        "Parsed {} {facet} rows ({} skipped)",
        rows.len(),
        malformed.len()
    );

    Ok(FacetRows { rows, malformed })
}

/// Reads location facet rows.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the file is not well-formed CSV.
pub fn read_locations<R: Read>(rdr: R) -> Result<FacetRows<LocationFacet>, StoreError> {
    read_rows::<_, LocationRow, _>(rdr, Facet::Location, LocationFacet::try_from)
}

/// Reads time facet rows.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the file is not well-formed CSV.
pub fn read_times<R: Read>(rdr: R) -> Result<FacetRows<TimeFacet>, StoreError> {
    read_rows::<_, TimeRow, _>(rdr, Facet::Time, TimeFacet::try_from)
}

/// Reads tags facet rows.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the file is not well-formed CSV.
pub fn read_tags<R: Read>(rdr: R) -> Result<FacetRows<TagFacet>, StoreError> {
    read_rows::<_, TagRow, _>(rdr, Facet::Tags, TagFacet::try_from)
}

/// Reads description facet rows.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the file is not well-formed CSV.
pub fn read_descriptions<R: Read>(rdr: R) -> Result<FacetRows<DescriptionFacet>, StoreError> {
    read_rows(rdr, Facet::Description, |row: DescriptionRow| {
        Ok(DescriptionFacet::from(row))
    })
}

/// Opens a facet file, mapping a missing file to [`StoreError::MissingFacet`].
///
/// # Errors
///
/// Returns [`StoreError`] if the file does not exist or cannot be opened.
pub fn open_facet(path: &Path, facet: Facet) -> Result<std::fs::File, StoreError> {
    if !path.exists() {
        return Err(StoreError::MissingFacet {
            facet,
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_location_with_blank_cross_street() {
        let csv = "id,street,cross_street,location,neighborhood,latitude,longitude\n\
                   1,Main St,,Main St 100 block,Downtown,45.5,-73.5\n\
                   2,Main St, 1st Ave ,Main St & 1st Ave,Downtown,45.5,-73.5\n";
        let rows = read_locations(csv.as_bytes()).unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cross_street, None);
        assert!(!rows[0].is_intersection());
        assert_eq!(rows[1].cross_street.as_deref(), Some("1st Ave"));
    }

    #[test]
    fn reads_time_rows_in_both_bucket_spellings() {
        let csv = "id,time_of_day,day,month,year\n\
                   1,09:00-11:59,monday,april,2018\n\
                   2,9,Monday,April,2018\n";
        let rows = read_times(csv.as_bytes()).unwrap().rows;
        assert_eq!(rows[0].time_of_day, TimeBucket::LateMorning);
        assert_eq!(rows[1].time_of_day, TimeBucket::LateMorning);
        assert_eq!(rows[0].day, DayOfWeek::Monday);
        assert_eq!(rows[1].month, Month::April);
    }

    #[test]
    fn bad_flag_skips_row_with_line() {
        let csv = "id,animal,cyclist,heavy_vehicle,intersection_crash,motorcycle,parked_vehicle,parking_lot,pedestrian,mid_block,severity\n\
                   1,0,0,0,0,0,0,0,0,0,casualty\n\
                   2,0,maybe,0,0,0,0,0,0,0,casualty\n\
                   3,0,1,0,0,0,0,0,0,0,casualty\n";
        let read = read_tags(csv.as_bytes()).unwrap();
        let ids: Vec<AccidentId> = read.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(read.malformed.len(), 1);
        assert_eq!(read.malformed[0].line, 3);
        assert!(
            read.malformed[0].message.contains("cyclist"),
            "{}",
            read.malformed[0].message
        );
    }

    #[test]
    fn negative_victims_skip_the_row() {
        let csv = "id,crash_configuration,total_crashes,total_victims\n\
                   1,rear_end,1,-2\n\
                   2,rear_end,1,0\n";
        let read = read_descriptions(csv.as_bytes()).unwrap();
        assert_eq!(read.rows.len(), 1);
        assert_eq!(read.rows[0].id, 2);
        assert_eq!(read.malformed[0].line, 2);
    }

    #[test]
    fn ragged_record_is_an_error() {
        let csv = "id,crash_configuration,total_crashes,total_victims\n\
                   1,rear_end,1\n";
        assert!(matches!(
            read_descriptions(csv.as_bytes()),
            Err(StoreError::Parse {
                facet: Facet::Description,
                line: 2,
                ..
            })
        ));
    }
}
