//! Snapshot location within the RIPE NCC statistics archive.
//!
//! Each registry publishes its daily delegation statistics under its own
//! subdirectory, naming scheme, and compression format. This module turns a
//! `(registry, date)` pair into the candidate URL, and knows each archive's
//! first available day. The layout quirks encoded here mirror the mirror's
//! actual historical structure.

use chrono::{Datelike, NaiveDate};

use crate::record::Registry;

/// First day each registry's statistics appear in the archive. Requests for
/// earlier dates resolve to an empty record stream.
pub fn earliest_snapshot(registry: Registry) -> NaiveDate {
    let (year, month, day) = match registry {
        Registry::Afrinic => (2005, 3, 3),
        Registry::Apnic => (2001, 5, 1),
        Registry::Arin => (2003, 11, 20),
        Registry::Lacnic => (2004, 1, 1),
        Registry::RipeNcc => (2003, 11, 26),
    };
    NaiveDate::from_ymd_opt(year, month, day).expect("archive start dates are valid")
}

/// Candidate URL for `registry`'s snapshot of `day` below `base_url`.
pub fn snapshot_url(base_url: &str, registry: Registry, day: NaiveDate) -> String {
    let base_url = base_url.trim_end_matches('/');
    let stamp = day.format("%Y%m%d");
    match registry {
        Registry::Afrinic => format!(
            "{}/afrinic/{}/delegated-afrinic-{}",
            base_url,
            day.year(),
            stamp
        ),
        Registry::Apnic => {
            // APNIC files changed their naming scheme on 2003-10-09.
            let cutover = NaiveDate::from_ymd_opt(2003, 10, 9).expect("valid date");
            if day < cutover {
                format!(
                    "{}/apnic/{}/apnic-{}.gz",
                    base_url,
                    day.year(),
                    day.format("%Y-%m-%d")
                )
            } else {
                format!(
                    "{}/apnic/{}/delegated-apnic-{}.gz",
                    base_url,
                    day.year(),
                    stamp
                )
            }
        }
        Registry::Arin => {
            // ARIN's layout has two cutovers: the extended file format
            // arrived on 2013-03-05, and years before 2017 live under an
            // archive/ subdirectory. Until 2007-09-30 the files are gzipped.
            let extended = NaiveDate::from_ymd_opt(2013, 3, 5).expect("valid date");
            let gzipped_until = NaiveDate::from_ymd_opt(2007, 9, 30).expect("valid date");

            let subdir = if day.year() < 2017 {
                format!("arin/archive/{}", day.year())
            } else {
                "arin".to_string()
            };
            let file_prefix = if day >= extended {
                "delegated-arin-extended"
            } else {
                "delegated-arin"
            };
            let suffix = if day <= gzipped_until { ".gz" } else { "" };

            format!("{base_url}/{subdir}/{file_prefix}-{stamp}{suffix}")
        }
        Registry::Lacnic => {
            // LACNIC keeps everything in one directory.
            format!("{base_url}/lacnic/delegated-lacnic-{stamp}")
        }
        Registry::RipeNcc => format!(
            "{}/ripencc/{}/delegated-ripencc-{}.bz2",
            base_url,
            day.year(),
            stamp
        ),
    }
}

/// Candidate days for a forward nearest-date search: the target day first,
/// then each following day up to `window_days` after it.
pub fn candidate_days(target: NaiveDate, window_days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..=i64::from(window_days)).filter_map(move |offset| {
        target.checked_add_signed(chrono::Duration::days(offset))
    })
}
