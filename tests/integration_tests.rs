use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use trip_distance_report::config::{DistanceBuckets, DistanceUnit, PipelineConfig};
use trip_distance_report::error::PipelineError;
use trip_distance_report::output::{write_bucket_csv, write_json};
use trip_distance_report::pipeline::run;

const HEADER: &str =
    "ride_id,rideable_type,started_at,ended_at,start_station_name,start_lat,start_lng,end_lat,end_lng,member_casual";

// Three trips along the 87.6W meridian: ~0.5 mi in 1700 s, ~3 mi in 1900 s,
// ~15 mi in 2000 s.
const SCENARIO_ROWS: &[&str] = &[
    "R1,classic_bike,2023-08-01 07:00:00,2023-08-01 07:28:20,Clark St,41.000000,-87.6,41.007236,-87.6,member",
    "R2,electric_bike,2023-08-01 08:00:00,2023-08-01 08:31:40,\"State St, North\",41.000000,-87.6,41.043417,-87.6,casual",
    "R3,classic_bike,2023-08-01 09:00:00,2023-08-01 09:33:20,Lake St,41.000000,-87.6,41.217083,-87.6,member",
];

fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut content = format!("{HEADER}\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

fn write_gz(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    writeln!(encoder, "{HEADER}").unwrap();
    for row in rows {
        writeln!(encoder, "{row}").unwrap();
    }
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

#[test]
fn test_three_trip_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "trips.csv", SCENARIO_ROWS);

    let report = run(&[path], &PipelineConfig::default()).unwrap();
    let result = &report.result;

    assert_eq!(result.long_trip_count, 2);
    assert_eq!(result.expected_revenue, 0.40);
    assert_eq!(format!("{:.2}", result.expected_revenue), "0.40");
    let table: Vec<(&str, u64)> = result
        .bucket_counts
        .iter()
        .map(|b| (b.label.as_str(), b.count))
        .collect();
    assert_eq!(table, vec![("0-1", 1), ("2-4", 1), ("4-9", 0), ("10+", 1)]);
}

#[test]
fn test_drop_accounting_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_csv(dir.path(), "a.csv", SCENARIO_ROWS);
    let messy = write_csv(
        dir.path(),
        "b.csv",
        &[
            "R4,classic_bike,2023-08-01 10:00:00,,Clark St,41.0,-87.6,41.01,-87.6,member",
            "R5,classic_bike,2023-08-01 10:00:00,2023-08-01 10:05:00,Clark St,41.0,-87.6,,,member",
            "R6,classic_bike,2023-08-01 10:00:00,2023-08-01 10:05:00,Clark St,41.0,-87.6,41.01,-87.6,member",
            "R7,classic_bike,08-01-2023 10:00,2023-08-01 10:05:00,Clark St,41.0,-87.6,41.01,-87.6,member",
        ],
    );

    let report = run(&[good, messy], &PipelineConfig::default()).unwrap();

    assert_eq!(report.load.files, 2);
    assert_eq!(report.load.rows_read, 7);
    assert_eq!(report.load.dropped, 3);
    assert_eq!(report.load.kept(), 4);
    assert_eq!(report.result.summary.trips, 4);
}

#[test]
fn test_directory_with_gzip_input() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "2023-08-a.csv", &SCENARIO_ROWS[..1]);
    write_gz(dir.path(), "2023-08-b.csv.gz", &SCENARIO_ROWS[1..]);
    fs::write(dir.path().join("notes.txt"), "not a trip file").unwrap();

    let report = run(&[dir.path().to_path_buf()], &PipelineConfig::default()).unwrap();

    assert_eq!(report.load.files, 2);
    assert_eq!(report.result.summary.trips, 3);
    assert_eq!(report.result.long_trip_count, 2);
}

#[test]
fn test_no_valid_records_is_explicit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "empty.csv",
        &["R1,classic_bike,,,Clark St,,,,,member"],
    );

    let err = run(&[path], &PipelineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NoValidRecords {
            files: 1,
            dropped: 1
        }
    ));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&[dir.path().join("nope.csv")], &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}

#[test]
fn test_result_independent_of_thread_count() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<String> = (0..500)
        .map(|i| {
            let minutes = i % 61;
            let lat_delta = (i % 37) as f64 * 0.01;
            format!(
                "R{i},classic_bike,2023-08-01 06:00:00,2023-08-01 06:{minutes:02}:00,Dock,41.0,-87.6,{},-87.6,member",
                41.0 + lat_delta
            )
        })
        .filter(|row| !row.contains("06:60:00"))
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    let path = write_csv(dir.path(), "many.csv", &rows);

    let single = PipelineConfig {
        threads: Some(1),
        ..Default::default()
    };
    let many = PipelineConfig {
        threads: Some(8),
        ..Default::default()
    };

    let a = run(&[path.clone()], &single).unwrap().result;
    let b = run(&[path], &many).unwrap().result;

    assert_eq!(a.long_trip_count, b.long_trip_count);
    assert_eq!(a.bucket_counts, b.bucket_counts);
    assert_eq!(a.non_positive_duration_count, b.non_positive_duration_count);
    assert_eq!(a.summary.trips, b.summary.trips);
}

#[test]
fn test_kilometers_and_custom_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "trips.csv", SCENARIO_ROWS);

    let config = PipelineConfig {
        unit: DistanceUnit::Kilometers,
        long_trip_threshold_seconds: 1950,
        surcharge: 1.5,
        buckets: DistanceBuckets::from_edges(vec![2.0, 10.0]).unwrap(),
        threads: None,
    };
    let result = run(&[path], &config).unwrap().result;

    // ~0.8 km, ~4.8 km, ~24.1 km
    assert_eq!(result.long_trip_count, 1);
    assert_eq!(result.expected_revenue, 1.5);
    assert_eq!(result.labels(), vec!["0-2", "2-10", "10+"]);
    assert_eq!(result.bucket_count("0-2"), Some(1));
    assert_eq!(result.bucket_count("2-10"), Some(1));
    assert_eq!(result.bucket_count("10+"), Some(1));
}

#[test]
fn test_report_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "trips.csv", SCENARIO_ROWS);
    let report = run(&[path], &PipelineConfig::default()).unwrap();

    let csv_path = dir.path().join("out/buckets.csv");
    let json_path = dir.path().join("out/report.json");
    write_bucket_csv(&csv_path, &report).unwrap();
    write_json(&json_path, &report).unwrap();

    let csv = fs::read_to_string(&csv_path).unwrap();
    let labels: Vec<&str> = csv
        .lines()
        .skip(1)
        .filter_map(|l| l.split(',').next())
        .collect();
    assert_eq!(labels, vec!["0-1", "2-4", "4-9", "10+"]);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["result"]["long_trip_count"], 2);
}
