//! Archive access: locating, retrieving, and parsing snapshots.
//!
//! The RIPE NCC mirror archives every registry's daily statistics, with
//! per-registry layouts and occasional gaps. This module resolves a target
//! date to the nearest available snapshot per registry and turns each file
//! into a raw record stream for the merge.

pub mod fetcher;
pub mod locator;
pub mod parser;

// Re-export commonly used types
pub use fetcher::{decompress_snapshot, FetchError, FetchOutcome, Fetcher};
pub use parser::parse_snapshot;

use chrono::NaiveDate;
use log::{info, warn};

use crate::merge::audit::{SnapshotNote, SnapshotOutcome};
use crate::merge::RegistryStream;
use crate::record::Registry;
use crate::settings::Settings;

/// Retrieve and parse every registry's snapshot nearest to `target`.
///
/// Failures are per-registry: a registry whose snapshot cannot be found or
/// fetched contributes nothing to the merge, and the returned notes record
/// what happened to each. The merge itself runs on whatever streams remain.
pub fn collect_streams(
    fetcher: &Fetcher,
    settings: &Settings,
    target: NaiveDate,
) -> (Vec<RegistryStream>, Vec<SnapshotNote>) {
    let mut streams = Vec::new();
    let mut notes = Vec::new();

    for registry in Registry::ALL {
        if target < locator::earliest_snapshot(registry) {
            info!("{registry}: {target} predates the archive, using an empty stream");
            notes.push(SnapshotNote {
                registry,
                requested: target,
                outcome: SnapshotOutcome::BeforeArchive,
            });
            streams.push(RegistryStream {
                registry,
                resolved_date: target,
                records: Vec::new(),
            });
            continue;
        }

        match resolve_snapshot(fetcher, settings, registry, target) {
            Ok(Some((day, records))) => {
                notes.push(SnapshotNote {
                    registry,
                    requested: target,
                    outcome: SnapshotOutcome::Resolved { date: day },
                });
                streams.push(RegistryStream {
                    registry,
                    resolved_date: day,
                    records,
                });
            }
            Ok(None) => {
                notes.push(SnapshotNote {
                    registry,
                    requested: target,
                    outcome: SnapshotOutcome::NotFound {
                        window_days: settings.search_window_days,
                    },
                });
            }
            Err(err) => {
                warn!("{registry}: retrieval failed: {err}");
                notes.push(SnapshotNote {
                    registry,
                    requested: target,
                    outcome: SnapshotOutcome::Failed {
                        error: err.to_string(),
                    },
                });
            }
        }
    }

    (streams, notes)
}

/// Forward nearest-date search for one registry: try the target day, then
/// each following day within the configured window.
fn resolve_snapshot(
    fetcher: &Fetcher,
    settings: &Settings,
    registry: Registry,
    target: NaiveDate,
) -> Result<Option<(NaiveDate, Vec<crate::record::RawRecord>)>, FetchError> {
    for day in locator::candidate_days(target, settings.search_window_days) {
        let url = locator::snapshot_url(&settings.mirror_url, registry, day);
        match fetcher.get(&url)? {
            FetchOutcome::Found(bytes) => {
                if day != target {
                    info!("{registry}: {target} is missing, replacing it by {day}");
                }
                let body = decompress_snapshot(&url, bytes)?;
                let records = parse_snapshot(registry, &body);
                info!("{}: {} raw records from {}", registry, records.len(), day);
                return Ok(Some((day, records)));
            }
            FetchOutcome::Absent => continue,
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_cache(dir: &std::path::Path) -> Settings {
        Settings {
            cache_dir: Some(dir.to_path_buf()),
            offline: true,
            search_window_days: 3,
            ..Settings::default()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cached_snapshot_resolves_with_forward_fallback() {
        let dir = tempfile::tempdir().unwrap();
        // Only the day after the target is cached.
        std::fs::write(
            dir.path().join("delegated-lacnic-20200102"),
            "lacnic|BR|ipv4|200.0.0.0|256|20200101|assigned\n",
        )
        .unwrap();

        let settings = settings_with_cache(dir.path());
        let fetcher = Fetcher::new(&settings).unwrap();
        let (streams, notes) = collect_streams(&fetcher, &settings, day(2020, 1, 1));

        let lacnic = streams
            .iter()
            .find(|s| s.registry == Registry::Lacnic)
            .expect("lacnic stream present");
        assert_eq!(lacnic.resolved_date, day(2020, 1, 2));
        assert_eq!(lacnic.records.len(), 1);

        let note = notes
            .iter()
            .find(|n| n.registry == Registry::Lacnic)
            .unwrap();
        assert_eq!(
            note.outcome,
            SnapshotOutcome::Resolved {
                date: day(2020, 1, 2)
            }
        );

        // Nothing cached for the other registries: recorded as not found.
        let arin = notes.iter().find(|n| n.registry == Registry::Arin).unwrap();
        assert_eq!(arin.outcome, SnapshotOutcome::NotFound { window_days: 3 });
    }

    #[test]
    fn dates_before_the_archive_produce_empty_streams() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_cache(dir.path());
        let fetcher = Fetcher::new(&settings).unwrap();

        let (streams, notes) = collect_streams(&fetcher, &settings, day(2004, 6, 1));

        // AfriNIC's archive starts in 2005.
        let afrinic = streams
            .iter()
            .find(|s| s.registry == Registry::Afrinic)
            .unwrap();
        assert!(afrinic.records.is_empty());
        let note = notes
            .iter()
            .find(|n| n.registry == Registry::Afrinic)
            .unwrap();
        assert_eq!(note.outcome, SnapshotOutcome::BeforeArchive);
    }
}
