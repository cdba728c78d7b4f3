use postcode_centroids::centroid::CentroidOutcome;
use postcode_centroids::config::{Config, Province, ProvinceSelection};
use postcode_centroids::error::PipelineError;
use postcode_centroids::record::CentroidRow;
use postcode_centroids::{process_file, process_files};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const VALENCIA: (f64, f64) = (-0.376, 39.4699);

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "postcode_centroids_pipeline_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs_err::remove_dir_all(&dir);
    fs_err::create_dir_all(&dir).unwrap();
    dir
}

/// `count` street numbers on a 5-wide grid of 0.0001 degree steps (roughly 10 m).
fn street_numbers(
    origin: (f64, f64),
    count: usize,
    postal_code: &str,
    first_id: usize,
) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let lon = origin.0 + (i % 5) as f64 * 0.0001;
            let lat = origin.1 + (i / 5) as f64 * 0.0001;
            feature(lon, lat, postal_code, first_id + i)
        })
        .collect()
}

fn feature(lon: f64, lat: f64, postal_code: &str, id: usize) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": {
            "id_porpk": id,
            "codigo_postal": postal_code,
            "tipo_vial": "CALLE",
            "poblacion": "Valencia"
        }
    })
}

fn write_dataset(working_dir: &Path, province: Province, features: Vec<Value>) {
    let dir = working_dir.join("data").join("provinces");
    fs_err::create_dir_all(&dir).unwrap();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    fs_err::write(
        dir.join(format!("{}.geojson", province.name())),
        serde_json::to_string(&collection).unwrap(),
    )
    .unwrap();
}

fn read_table(path: &Path) -> Vec<CentroidRow> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().map(|row| row.unwrap()).collect()
}

#[test]
fn computes_one_row_per_postal_code() {
    let working_dir = scratch_dir("full");

    let mut valencia = street_numbers(VALENCIA, 25, "46001", 0);
    valencia.push(feature(VALENCIA.0 + 0.05, VALENCIA.1, "46001", 100));
    valencia.push(feature(VALENCIA.0 - 0.05, VALENCIA.1, "46001", 101));
    valencia.push(feature(VALENCIA.0, VALENCIA.1 + 0.05, "46001", 102));
    valencia.extend(street_numbers((VALENCIA.0 + 0.02, VALENCIA.1), 10, "46002", 200));
    valencia.extend(street_numbers((VALENCIA.0 + 0.01, VALENCIA.1 + 0.01), 22, "46003", 300));
    write_dataset(&working_dir, Province::Valencia, valencia);
    write_dataset(
        &working_dir,
        Province::Castellon,
        vec![feature(-0.0513, 39.9864, "12001", 400)],
    );
    // Alicante is never acquired; a corrupt partition left from elsewhere still gets a row
    let stray = working_dir.join("data").join("postcodes").join("extra");
    fs_err::create_dir_all(&stray).unwrap();
    fs_err::write(stray.join("46999.csv"), "y,codigo_postal\n1.0,46999\n").unwrap();

    let summary = process_files(Config {
        working_dir: working_dir.clone(),
        province: ProvinceSelection::All,
        force: false,
        threads: 2,
    })
    .unwrap();

    assert_eq!(summary.datasets, 2);
    assert_eq!(summary.postcodes, 5);
    assert_eq!(summary.clustered, 2);
    assert_eq!(summary.no_cluster, 2);
    assert_eq!(summary.failed, 1);

    let rows = read_table(&working_dir.join("data").join("postcodes.csv"));
    let codes: Vec<&str> = rows.iter().map(|r| r.codigo_postal.as_str()).collect();
    assert_eq!(codes, vec!["12001", "46001", "46002", "46003", "46999"]);

    let core = &rows[1];
    assert_eq!(core.status, "clustered");
    assert_eq!(core.num_points, 25);
    assert_eq!(core.pct, 89.29);
    assert!(core.x.is_some() && core.y.is_some());
    let (lon, lat) = (core.lon.unwrap(), core.lat.unwrap());
    assert!((lon - (VALENCIA.0 + 0.0002)).abs() < 1e-4, "lon = {lon}");
    assert!((lat - (VALENCIA.1 + 0.0002)).abs() < 1e-4, "lat = {lat}");

    let sparse = &rows[2];
    assert_eq!(sparse.status, "no_cluster");
    assert_eq!(sparse.num_points, 0);
    assert_eq!(sparse.pct, 0.0);
    assert_eq!((sparse.x, sparse.y, sparse.lon, sparse.lat), (None, None, None, None));
    assert_eq!(sparse.poblacion.as_deref(), Some("Valencia"));

    assert_eq!(rows[3].num_points, 22);
    assert_eq!(rows[3].pct, 100.0);
    let partition = working_dir.join("data/postcodes/valencia/46003.csv");
    match process_file(&partition).unwrap() {
        CentroidOutcome::Clustered(r) => {
            assert_eq!(r.point.x, rows[3].x);
            assert_eq!(r.point.id_porpk, rows[3].id_porpk);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let failed = &rows[4];
    assert_eq!(failed.status, "failed");
    assert_eq!((failed.num_points, failed.lon), (0, None));
}

#[test]
fn rerun_reuses_cached_datasets() {
    let working_dir = scratch_dir("rerun");
    write_dataset(&working_dir, Province::Valencia, street_numbers(VALENCIA, 20, "46001", 0));
    let config = Config {
        working_dir: working_dir.clone(),
        province: ProvinceSelection::One(Province::Valencia),
        force: true,
        threads: 1,
    };

    let first = process_files(config.clone()).unwrap();
    let second = process_files(config).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.postcodes, 1);
    assert_eq!(second.clustered, 1);
}

#[test]
fn run_without_datasets_is_fatal() {
    let working_dir = scratch_dir("empty");
    let result = process_files(Config {
        working_dir,
        ..Config::default()
    });
    assert!(matches!(result, Err(PipelineError::NoDatasets)));
}
