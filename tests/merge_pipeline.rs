//! End-to-end pipeline tests: snapshot bodies through parsing, merging, and
//! output emission, the way a real run drives them.

use std::fs;
use std::io::Write;

use chrono::NaiveDate;

use nromerge::archive::{self, parse_snapshot, Fetcher};
use nromerge::merge::{self, RegistryStream};
use nromerge::output;
use nromerge::record::Registry;
use nromerge::settings::Settings;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stream(registry: Registry, day: NaiveDate, body: &str) -> RegistryStream {
    RegistryStream {
        registry,
        resolved_date: day,
        records: parse_snapshot(registry, body),
    }
}

const APNIC_SNAPSHOT: &str = "\
2|apnic|20110101|4|19830613|20110101|+1000
apnic|*|ipv4|*|2|summary
apnic|*|ipv6|*|1|summary
apnic|AU|asn|64512|1|20110101|allocated
apnic|AU|ipv4|203.0.0.0|128|20110101|allocated
apnic|AU|ipv4|203.0.0.128|128|20110101|allocated
apnic|AU|ipv6|2001:db8::|32|20110101|assigned
";

const ARIN_SNAPSHOT: &str = "\
2|arin|20110101|2|19830101|20110101|+0000
arin|US|ipv4|192.0.2.0|256|20110101|assigned
arin|US|ipv4|198.51.100.0|257|20110101|allocated
";

const RIPENCC_SNAPSHOT: &str = "\
2|ripencc|20110103|2|19830101|20110103|+0100
ripencc|NL|ipv4|192.0.2.0|256|20110103|allocated
ripencc|NL|ipv6|2001:db8:1::|48|20110103|allocated
";

#[test]
fn full_pipeline_produces_aggregated_csv_output() {
    let day = date(2011, 1, 1);
    let outcome = merge::merge(vec![
        stream(Registry::Apnic, day, APNIC_SNAPSHOT),
        stream(Registry::Arin, day, ARIN_SNAPSHOT),
        stream(Registry::RipeNcc, date(2011, 1, 3), RIPENCC_SNAPSHOT),
    ]);

    let dir = tempfile::tempdir().unwrap();
    output::write_outputs(&outcome, dir.path(), day).unwrap();
    let (v4_path, v6_path, audit_path) = output::output_paths(dir.path(), day);

    let v4 = fs::read_to_string(&v4_path).unwrap();
    let v4_lines: Vec<&str> = v4.lines().collect();
    assert_eq!(
        v4_lines[0],
        "registry,country,type,start,extent,date,status"
    );
    // 192.0.2.0/24: assigned (ARIN) vs allocated (RIPE NCC) resolves to the
    // conflict marker with the more restrictive classification.
    assert_eq!(
        v4_lines[1],
        "conflict,NL,ipv4,192.0.2.0,256,20110103,allocated"
    );
    // 198.51.100.0 with 257 addresses cannot coalesce into one prefix:
    // a /24 plus a lone /32 survive.
    assert_eq!(
        v4_lines[2],
        "arin,US,ipv4,198.51.100.0,256,20110101,allocated"
    );
    assert_eq!(
        v4_lines[3],
        "arin,US,ipv4,198.51.101.0,1,20110101,allocated"
    );
    // APNIC's two adjacent /25s coalesce into one /24.
    assert_eq!(
        v4_lines[4],
        "apnic,AU,ipv4,203.0.0.0,256,20110101,allocated"
    );
    assert_eq!(v4_lines.len(), 5);

    let v6 = fs::read_to_string(&v6_path).unwrap();
    let v6_lines: Vec<&str> = v6.lines().collect();
    assert_eq!(v6_lines[1], "apnic,AU,ipv6,2001:db8::,32,20110101,assigned");
    assert_eq!(
        v6_lines[2],
        "ripencc,NL,ipv6,2001:db8:1::,48,20110103,allocated"
    );
    assert_eq!(v6_lines.len(), 3);

    let audit: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&audit_path).unwrap()).unwrap();
    let conflicts = audit["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["prefix"], "192.0.2.0/24");
}

#[test]
fn merge_output_is_byte_identical_across_runs_and_stream_order() {
    let day = date(2011, 1, 1);
    let streams = vec![
        stream(Registry::Apnic, day, APNIC_SNAPSHOT),
        stream(Registry::Arin, day, ARIN_SNAPSHOT),
        stream(Registry::RipeNcc, date(2011, 1, 3), RIPENCC_SNAPSHOT),
    ];
    let mut shuffled = streams.clone();
    shuffled.reverse();

    let first = merge::merge(streams);
    let second = merge::merge(shuffled);

    let dir = tempfile::tempdir().unwrap();
    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");
    fs::create_dir_all(&first_dir).unwrap();
    fs::create_dir_all(&second_dir).unwrap();
    output::write_outputs(&first, &first_dir, day).unwrap();
    output::write_outputs(&second, &second_dir, day).unwrap();

    for suffix in ["v4", "v6"] {
        let a = fs::read(first_dir.join(format!("nrostats-20110101-{suffix}.csv"))).unwrap();
        let b = fs::read(second_dir.join(format!("nrostats-20110101-{suffix}.csv"))).unwrap();
        assert_eq!(a, b, "{suffix} output differs between runs");
    }
}

#[test]
fn offline_run_from_cached_snapshots() {
    let cache = tempfile::tempdir().unwrap();

    // APNIC snapshots are gzipped in the archive; cache one that way.
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(APNIC_SNAPSHOT.as_bytes()).unwrap();
    fs::write(
        cache.path().join("delegated-apnic-20110101.gz"),
        encoder.finish().unwrap(),
    )
    .unwrap();

    // LACNIC has no file for the target date; the next day is cached.
    fs::write(
        cache.path().join("delegated-lacnic-20110102"),
        "lacnic|BR|ipv4|200.0.0.0|512|20110102|assigned\n",
    )
    .unwrap();

    let settings = Settings {
        cache_dir: Some(cache.path().to_path_buf()),
        offline: true,
        search_window_days: 2,
        ..Settings::default()
    };
    let fetcher = Fetcher::new(&settings).unwrap();

    let day = date(2011, 1, 1);
    let (streams, notes) = archive::collect_streams(&fetcher, &settings, day);
    let mut outcome = merge::merge(streams);
    outcome.audit.snapshots = notes;

    let out = tempfile::tempdir().unwrap();
    output::write_outputs(&outcome, out.path(), day).unwrap();

    let (v4_path, _, audit_path) = output::output_paths(out.path(), day);
    let v4 = fs::read_to_string(&v4_path).unwrap();
    assert!(v4.contains("apnic,AU,ipv4,203.0.0.0,256,20110101,allocated"));
    // LACNIC records carry their own resolved snapshot date.
    assert!(v4.contains("lacnic,BR,ipv4,200.0.0.0,512,20110102,assigned"));

    let audit: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&audit_path).unwrap()).unwrap();
    let snapshots = audit["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 5);
    let lacnic = snapshots
        .iter()
        .find(|s| s["registry"] == "lacnic")
        .unwrap();
    assert_eq!(lacnic["outcome"], "resolved");
    assert_eq!(lacnic["date"], "2011-01-02");
    // ARIN was neither cached nor reachable offline.
    let arin = snapshots.iter().find(|s| s["registry"] == "arin").unwrap();
    assert_eq!(arin["outcome"], "not_found");
}

#[test]
fn unknown_statuses_are_flagged_but_merged() {
    let day = date(2011, 1, 1);
    let body = "afrinic|ZA|ipv4|196.0.0.0|256|20110101|experimental\n";
    let outcome = merge::merge(vec![stream(Registry::Afrinic, day, body)]);

    assert_eq!(outcome.v4.node_count(), 1);
    assert_eq!(outcome.audit.unknown_statuses.len(), 1);
    assert_eq!(outcome.audit.unknown_statuses[0].status, "experimental");

    let rows = output::emit_rows(&outcome.v4);
    assert_eq!(rows[0].status, "reserved");
}
