#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory record store for the accident dataset.
//!
//! Loads the four facet CSV files of a dataset directory, joins them 1:1 on
//! the accident id, and keeps the joined [`Accident`]s as an immutable
//! snapshot. Facet defects (a row that cannot be parsed, an id missing from
//! a facet, or repeated within one) never abort loading: they are collected
//! in a [`JoinReport`] and the affected ids are left out of the snapshot.

pub mod facets;
pub mod parsing;
pub mod paths;
pub mod progress;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crash_stats_accident_models::{
    Accident, AccidentId, DescriptionFacet, Facet, LocationFacet, Severity, TagFacet, TimeFacet,
};
use serde::Serialize;

use crate::progress::ProgressCallback;

/// Errors that can occur while loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A facet file is not present in the dataset directory.
    #[error("Missing {facet} facet file: {}", path.display())]
    MissingFacet {
        /// The facet whose file is missing.
        facet: Facet,
        /// The path that was expected.
        path: PathBuf,
    },

    /// A facet file is not well-formed CSV.
    #[error("Parse error in {facet} facet at line {line}: {message}")]
    Parse {
        /// The facet being read.
        facet: Facet,
        /// 1-based line number in the facet file.
        line: u64,
        /// Description of what went wrong.
        message: String,
    },
}

/// A facet row that was skipped because it could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRow {
    /// 1-based line number in the facet file.
    pub line: u64,
    /// Description of what went wrong.
    pub message: String,
}

/// Facet defects found while assembling the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReport {
    /// Ids present in at least one facet but missing from others, with the
    /// facets they are missing from. These ids are excluded from the store.
    pub missing: BTreeMap<AccidentId, Vec<Facet>>,
    /// Ids that appeared more than once within a facet. The first row was
    /// kept.
    pub duplicates: BTreeMap<Facet, Vec<AccidentId>>,
    /// Rows skipped per facet. Their ids count as missing from that facet.
    pub malformed: BTreeMap<Facet, Vec<MalformedRow>>,
}

impl JoinReport {
    /// Whether every id joined cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.duplicates.is_empty() && self.malformed.is_empty()
    }

    /// Number of ids excluded from the snapshot.
    #[must_use]
    pub fn excluded_count(&self) -> usize {
        self.missing.len()
    }

    /// Number of ids missing from the given facet.
    #[must_use]
    pub fn missing_from(&self, facet: Facet) -> usize {
        self.missing
            .values()
            .filter(|facets| facets.contains(&facet))
            .count()
    }
}

/// A record that breaks the rule that any victim implies a casualty crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantViolation {
    /// The offending accident.
    pub id: AccidentId,
    /// Recorded victim count.
    pub total_victims: u32,
    /// Recorded severity.
    pub severity: Severity,
}

/// Immutable, id-joined snapshot of the accident dataset.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    accidents: Vec<Accident>,
    index: BTreeMap<AccidentId, usize>,
    join_report: JoinReport,
}

/// Moves a facet's skipped rows into `malformed` and returns the good rows.
fn keep_rows<T>(
    facet: Facet,
    read: facets::FacetRows<T>,
    malformed: &mut BTreeMap<Facet, Vec<MalformedRow>>,
) -> Vec<T> {
    if !read.malformed.is_empty() {
        malformed.insert(facet, read.malformed);
    }
    read.rows
}

/// Indexes one facet's rows by id, keeping the first row for repeated ids.
fn index_facet<T>(
    facet: Facet,
    rows: Vec<T>,
    id_of: impl Fn(&T) -> AccidentId,
    report: &mut JoinReport,
) -> BTreeMap<AccidentId, T> {
    let mut map = BTreeMap::new();
    for row in rows {
        let id = id_of(&row);
        if map.contains_key(&id) {
            report.duplicates.entry(facet).or_default().push(id);
        } else {
            map.insert(id, row);
        }
    }
    map
}

impl RecordStore {
    /// Joins already-parsed facet rows into a store.
    ///
    /// Ids that are not present in all four facets are excluded and
    /// recorded in the [`JoinReport`].
    #[must_use]
    pub fn from_facets(
        locations: Vec<LocationFacet>,
        times: Vec<TimeFacet>,
        tags: Vec<TagFacet>,
        descriptions: Vec<DescriptionFacet>,
    ) -> Self {
        let mut join_report = JoinReport::default();

        let mut locations = index_facet(Facet::Location, locations, |r| r.id, &mut join_report);
        let mut times = index_facet(Facet::Time, times, |r| r.id, &mut join_report);
        let mut tags = index_facet(Facet::Tags, tags, |r| r.id, &mut join_report);
        let mut descriptions =
            index_facet(Facet::Description, descriptions, |r| r.id, &mut join_report);

        let ids: BTreeSet<AccidentId> = locations
            .keys()
            .chain(times.keys())
            .chain(tags.keys())
            .chain(descriptions.keys())
            .copied()
            .collect();

        let mut accidents = Vec::with_capacity(ids.len());
        let mut index = BTreeMap::new();

        for id in ids {
            match (
                locations.remove(&id),
                times.remove(&id),
                tags.remove(&id),
                descriptions.remove(&id),
            ) {
                (Some(location), Some(time), Some(tag_row), Some(description)) => {
                    index.insert(id, accidents.len());
                    accidents.push(Accident {
                        id,
                        location,
                        time,
                        tags: tag_row,
                        description,
                    });
                }
                (location, time, tag_row, description) => {
                    let present = [
                        (Facet::Location, location.is_some()),
                        (Facet::Time, time.is_some()),
                        (Facet::Tags, tag_row.is_some()),
                        (Facet::Description, description.is_some()),
                    ];
                    let missing = present
                        .iter()
                        .filter(|(_, present)| !present)
                        .map(|(facet, _)| *facet)
                        .collect();
                    join_report.missing.insert(id, missing);
                }
            }
        }

        Self {
            accidents,
            index,
            join_report,
        }
    }

    /// Builds a store from complete accidents, e.g. in tests.
    #[must_use]
    pub fn from_accidents(accidents: Vec<Accident>) -> Self {
        let mut locations = Vec::with_capacity(accidents.len());
        let mut times = Vec::with_capacity(accidents.len());
        let mut tags = Vec::with_capacity(accidents.len());
        let mut descriptions = Vec::with_capacity(accidents.len());
        for accident in accidents {
            locations.push(accident.location);
            times.push(accident.time);
            tags.push(accident.tags);
            descriptions.push(accident.description);
        }
        Self::from_facets(locations, times, tags, descriptions)
    }

    /// Loads and joins the four facet files in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a facet file is missing, unreadable, or not
    /// well-formed CSV. Individual bad rows are skipped and reported.
    pub fn load_dir(dir: &Path, progress: &Arc<dyn ProgressCallback>) -> Result<Self, StoreError> {
        log::info!("Loading accident facets from {}", dir.display());

        progress.begin(Facet::all().len() as u64);

        let open = |facet: Facet| -> Result<std::fs::File, StoreError> {
            progress.step(facet.as_ref());
            facets::open_facet(&paths::facet_path(dir, facet), facet)
        };

        let mut malformed = BTreeMap::new();

        let locations = facets::read_locations(open(Facet::Location)?)?;
        let locations = keep_rows(Facet::Location, locations, &mut malformed);
        progress.step_done();
        let times = facets::read_times(open(Facet::Time)?)?;
        let times = keep_rows(Facet::Time, times, &mut malformed);
        progress.step_done();
        let tags = facets::read_tags(open(Facet::Tags)?)?;
        let tags = keep_rows(Facet::Tags, tags, &mut malformed);
        progress.step_done();
        let descriptions = facets::read_descriptions(open(Facet::Description)?)?;
        let descriptions = keep_rows(Facet::Description, descriptions, &mut malformed);
        progress.step_done();

        log::debug!(
            "Read {} location, {} time, {} tags, {} description rows",
            locations.len(),
            times.len(),
            tags.len(),
            descriptions.len()
        );

        let mut store = Self::from_facets(locations, times, tags, descriptions);
        store.join_report.malformed = malformed;

        store.log_join_report();

        let violations = store.verify();
        if !violations.is_empty() {
            log::warn!(
                "{} accidents record victims without a casualty severity",
                violations.len()
            );
        }

        progress.done(Some(format!("Loaded {} accidents", store.len())));
        log::info!("Loaded {} accidents", store.len());

        Ok(store)
    }

    fn log_join_report(&self) {
        for (facet, rows) in &self.join_report.malformed {
            log::warn!("{} malformed rows in the {facet} facet (skipped)", rows.len());
        }
        for facet in Facet::all() {
            let missing = self.join_report.missing_from(*facet);
            if missing > 0 {
                log::warn!("{missing} ids are missing from the {facet} facet");
            }
        }
        for (facet, ids) in &self.join_report.duplicates {
            log::warn!(
                "{} duplicate ids in the {facet} facet (first row kept)",
                ids.len()
            );
        }
        if self.join_report.excluded_count() > 0 {
            log::warn!(
                "Excluded {} accidents with incomplete facets",
                self.join_report.excluded_count()
            );
        }
    }

    /// Returns every joined accident, ordered by id.
    #[must_use]
    pub fn accidents(&self) -> &[Accident] {
        &self.accidents
    }

    /// Number of joined accidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accidents.len()
    }

    /// Whether the store holds no accidents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accidents.is_empty()
    }

    /// Looks up a joined accident by id.
    #[must_use]
    pub fn get(&self, id: AccidentId) -> Option<&Accident> {
        self.index.get(&id).map(|&i| &self.accidents[i])
    }

    /// Join defects found while assembling the store.
    #[must_use]
    pub const fn join_report(&self) -> &JoinReport {
        &self.join_report
    }

    /// Returns every accident that records victims without a casualty
    /// severity. An empty result means the data-quality rule holds.
    #[must_use]
    pub fn verify(&self) -> Vec<InvariantViolation> {
        self.accidents
            .iter()
            .filter(|a| !a.severity_is_consistent())
            .map(|a| InvariantViolation {
                id: a.id,
                total_victims: a.description.total_victims,
                severity: a.tags.severity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_stats_accident_models::{DayOfWeek, Month, TimeBucket};

    fn fixture_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("basic")
    }

    fn location(id: AccidentId) -> LocationFacet {
        LocationFacet {
            id,
            street: "Main St".to_string(),
            cross_street: None,
            location: "Main St".to_string(),
            neighborhood: "Downtown".to_string(),
            latitude: 45.5,
            longitude: -73.5,
        }
    }

    fn time(id: AccidentId) -> TimeFacet {
        TimeFacet {
            id,
            time_of_day: TimeBucket::Morning,
            day: DayOfWeek::Monday,
            month: Month::May,
            year: 2019,
        }
    }

    fn tags(id: AccidentId, severity: Severity) -> TagFacet {
        TagFacet {
            id,
            animal: false,
            cyclist: false,
            heavy_vehicle: false,
            intersection_crash: false,
            motorcycle: false,
            parked_vehicle: false,
            parking_lot: false,
            pedestrian: false,
            mid_block: false,
            severity,
        }
    }

    fn description(id: AccidentId, victims: u32) -> DescriptionFacet {
        DescriptionFacet {
            id,
            crash_configuration: "rear_end".to_string(),
            total_crashes: 1,
            total_victims: victims,
        }
    }

    #[test]
    fn loads_fixture_and_reports_orphans() {
        let store = RecordStore::load_dir(&fixture_dir(), &progress::null_progress()).unwrap();

        assert_eq!(store.len(), 6);
        let report = store.join_report();
        assert_eq!(report.excluded_count(), 2);
        assert_eq!(
            report.missing.get(&7),
            Some(&vec![Facet::Tags, Facet::Description])
        );
        assert_eq!(
            report.missing.get(&8),
            Some(&vec![Facet::Location, Facet::Time])
        );
        assert!(report.duplicates.is_empty());
        assert!(report.malformed.is_empty());
        assert!(store.get(7).is_none());
        assert!(store.get(8).is_none());

        let third = store.get(3).unwrap();
        assert_eq!(third.location.neighborhood, "Downtown");
        assert_eq!(third.description.total_victims, 3);
        assert!(third.tags.heavy_vehicle);

        let sixth = store.get(6).unwrap();
        assert!(sixth.tags.parking_lot);
        assert_eq!(sixth.tags.severity, Severity::PropertyDamageOnly);
    }

    #[test]
    fn fixture_satisfies_casualty_rule() {
        let store = RecordStore::load_dir(&fixture_dir(), &progress::null_progress()).unwrap();
        assert!(store.verify().is_empty());
        for accident in store.accidents() {
            if accident.description.total_victims > 0 {
                assert_eq!(accident.tags.severity, Severity::Casualty);
            }
        }
    }

    #[test]
    fn malformed_rows_are_skipped_and_reported() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("malformed");
        let store = RecordStore::load_dir(&dir, &progress::null_progress()).unwrap();

        let ids: Vec<AccidentId> = store.accidents().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 3, 5]);

        let report = store.join_report();
        let lines = |facet: Facet| -> Vec<u64> {
            report.malformed[&facet].iter().map(|r| r.line).collect()
        };
        assert_eq!(lines(Facet::Location), vec![7]);
        assert_eq!(lines(Facet::Tags), vec![3]);
        assert_eq!(lines(Facet::Description), vec![5]);
        assert!(!report.malformed.contains_key(&Facet::Time));
        assert!(report.malformed[&Facet::Location][0].message.contains("neighborhood"));

        assert_eq!(report.missing.get(&6), Some(&vec![Facet::Location]));
        assert_eq!(report.missing.get(&2), Some(&vec![Facet::Tags]));
        assert_eq!(report.missing.get(&4), Some(&vec![Facet::Description]));
        assert!(!report.is_clean());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = RecordStore::load_dir(
            Path::new("/nonexistent/crash_stats"),
            &progress::null_progress(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingFacet {
                facet: Facet::Location,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_ids_keep_first_row() {
        let mut second = location(1);
        second.neighborhood = "Riverside".to_string();
        let store = RecordStore::from_facets(
            vec![location(1), second],
            vec![time(1)],
            vec![tags(1, Severity::Casualty)],
            vec![description(1, 1)],
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().location.neighborhood, "Downtown");
        assert_eq!(
            store.join_report().duplicates.get(&Facet::Location),
            Some(&vec![1])
        );
        assert_eq!(store.join_report().excluded_count(), 0);
        assert!(!store.join_report().is_clean());
    }

    #[test]
    fn verify_flags_victims_without_casualty() {
        let store = RecordStore::from_facets(
            vec![location(1), location(2)],
            vec![time(1), time(2)],
            vec![
                tags(1, Severity::Casualty),
                tags(2, Severity::PropertyDamageOnly),
            ],
            vec![description(1, 2), description(2, 1)],
        );
        assert_eq!(
            store.verify(),
            vec![InvariantViolation {
                id: 2,
                total_victims: 1,
                severity: Severity::PropertyDamageOnly,
            }]
        );
    }

    #[test]
    fn accidents_are_ordered_by_id() {
        let store = RecordStore::from_facets(
            vec![location(3), location(1), location(2)],
            vec![time(2), time(3), time(1)],
            vec![
                tags(1, Severity::PropertyDamageOnly),
                tags(2, Severity::PropertyDamageOnly),
                tags(3, Severity::PropertyDamageOnly),
            ],
            vec![description(3, 0), description(2, 0), description(1, 0)],
        );
        let ids: Vec<AccidentId> = store.accidents().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(store.join_report().is_clean());
    }
}
