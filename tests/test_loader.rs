//! Integration test: loading login-attempt exports

use chrono::{Datelike, Timelike};
use login_anomaly::data::{InMemorySource, RecordLoader, RecordSource};
use std::io::Write;

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn test_load_csv_with_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "logins.csv",
        "id,user_id,success,ip_address,country,city,asn,latitude,longitude,created_at\n\
         1,u1,true,192.168.1.1/32,Bulgaria,Sofia,AS8866 Vivacom,42.69,23.32,2024-03-01 10:15:00+02\n\
         2,u2,f,,Bulgaria,,AS16276 OVH,,,2024-03-02T04:00:00Z\n\
         ,u3,perhaps,10.0.0.1,,,,north,23.1,yesterday\n",
    );

    let records = RecordLoader::new().load_auto(&path).unwrap();
    assert_eq!(records.len(), 3);

    let first = &records[0];
    assert_eq!(first.id, "1");
    assert!(first.success);
    assert_eq!(first.ip_address.as_deref(), Some("192.168.1.1"));
    assert_eq!(first.latitude, Some(42.69));
    assert_eq!(first.created_at.hour(), 10);
    assert_eq!(first.created_at.offset().local_minus_utc(), 7200);

    let second = &records[1];
    assert!(!second.success);
    assert!(second.ip_address.is_none());
    assert!(second.city.is_none());
    assert!(second.latitude.is_none());

    let third = &records[2];
    assert_eq!(third.id, "row-2");
    assert!(!third.success);
    assert!(third.latitude.is_none());
    assert_eq!(third.longitude, Some(23.1));
    assert_eq!(third.created_at.year(), 1970);
}

#[test]
fn test_load_tsv() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "logins.tsv",
        "id\tsuccess\tasn\tcreated_at\n\
         a\t1\tAS8866 Vivacom\t2024-03-01T10:00:00Z\n",
    );
    let records = RecordLoader::new().load_auto(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].asn.as_deref(), Some("AS8866 Vivacom"));
    assert!(records[0].success);
}

#[test]
fn test_load_json_lines_skips_broken_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "logins.jsonl",
        "{\"id\": \"a\", \"success\": true, \"created_at\": \"2024-03-01T10:00:00Z\"}\n\
         {not json\n\
         \n\
         [1, 2]\n\
         {\"id\": 7, \"latitude\": 1.25, \"created_at\": \"2024-03-02T11:00:00+00:00\"}\n",
    );

    let records = RecordLoader::new().load_auto(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].id, "7");
    assert_eq!(records[1].latitude, Some(1.25));

    let strict = RecordLoader::new().with_strict(true).load_auto(&path);
    assert!(strict.is_err());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = RecordLoader::new().load_auto(dir.path().join("absent.csv"));
    assert!(result.is_err());
}

#[test]
fn test_source_from_path_derives_trusted_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "logins.csv",
        "id,asn,created_at\n\
         late,AS8866 Vivacom,2024-03-03T00:00:00Z\n\
         tor,AS200130 Tor-Exit,2024-03-02T00:00:00Z\n\
         none,,2024-03-01T00:00:00Z\n",
    );
    let source = InMemorySource::from_path(&path).unwrap();
    let all: Vec<String> = source.all_records().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(all, vec!["none", "tor", "late"]);
    let trusted = source.trusted_records().unwrap();
    assert_eq!(trusted.len(), 1);
    assert_eq!(trusted[0].id, "late");
}

#[test]
fn test_explicit_format_loaders() {
    let dir = tempfile::tempdir().unwrap();
    // Extensions that would not be detected as these formats
    let csv = write_file(
        &dir,
        "export.txt",
        "id,success,created_at\n\
         a,yes,2024-03-01T10:00:00Z\n",
    );
    let records = RecordLoader::new().load_csv(&csv).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);

    let jsonl = write_file(
        &dir,
        "export.log",
        "{\"id\": \"b\", \"asn\": \"AS8866 Vivacom\", \"created_at\": \"2024-03-01T10:00:00Z\"}\n",
    );
    let records = RecordLoader::new().load_json_lines(&jsonl).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "b");
    assert_eq!(records[0].asn.as_deref(), Some("AS8866 Vivacom"));
}
