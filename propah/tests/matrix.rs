use geo::Coord;
use propah::{
    run_matrix, run_matrix_with, Cancel, LinkStatus, MatrixConfig, Node, Quality, ReportRow,
};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use terrain::{math::linspace, ElevationSample, TerrainError};
use tokio::time::Instant;

fn nodes(n: usize) -> Vec<Node> {
    (0..n)
        .map(|i| Node {
            id: format!("n{i}"),
            name: format!("Node {i}"),
            lat: 44.0 + i as f64 * 0.01,
            lng: -71.0,
        })
        .collect()
}

/// Flat terrain at 200 m with whatever path length was asked for.
fn flat(start: Coord<f64>, end: Coord<f64>, n: usize) -> Vec<ElevationSample> {
    let total_km = terrain::math::haversine_km(start.into(), end.into());
    linspace(0.0, total_km, n)
        .map(|distance_km| ElevationSample {
            distance_km,
            elevation_m: 200.0,
        })
        .collect()
}

fn fast() -> MatrixConfig {
    MatrixConfig {
        min_request_interval_ms: 10,
        ..MatrixConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_every_pair_once() {
    let nodes = nodes(4);
    let source = |s: Coord<f64>, e: Coord<f64>, n: usize| async move {
        Ok::<_, TerrainError>(flat(s, e, n))
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;

    assert_eq!(rows.len(), 6);
    let pairs: HashSet<(String, String)> = rows
        .iter()
        .map(|r| (r.source.clone(), r.target.clone()))
        .collect();
    assert_eq!(pairs.len(), 6);
    for row in &rows {
        assert_ne!(row.source, row.target);
        assert!(!pairs.contains(&(row.target.clone(), row.source.clone())));
        assert_eq!(row.status, LinkStatus::Good);
        assert!(row.quality.is_some());
        assert!(row.margin_db.is_some_and(|m| m > 10.0));
        assert!(row.distance_km > 1.0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_is_an_error_row() {
    let nodes = nodes(4);
    let calls = Arc::new(AtomicUsize::new(0));
    let source = {
        let calls = calls.clone();
        move |s: Coord<f64>, e: Coord<f64>, n: usize| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 2 {
                    Err(TerrainError::Upstream("Too Many Requests".into()))
                } else {
                    Ok(flat(s, e, n))
                }
            }
        }
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;

    assert_eq!(rows.len(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    let errors: Vec<&ReportRow> = rows.iter().filter(|r| r.status == LinkStatus::Error).collect();
    assert_eq!(errors.len(), 1);
    let failed = errors[0];
    assert_eq!((failed.source.as_str(), failed.target.as_str()), ("Node 0", "Node 3"));
    assert_eq!(failed.quality, None);
    assert_eq!(failed.margin_db, None);
    assert_eq!(failed.min_clearance_m, None);
    assert!(failed.to_csv_record().ends_with(",ERROR,,,"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_terrain_is_an_error_row() {
    let nodes = nodes(2);
    let source = |_s: Coord<f64>, _e: Coord<f64>, _n: usize| async move {
        Ok::<_, TerrainError>(Vec::new())
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, LinkStatus::Error);
    assert_ne!(rows[0].quality, Some(Quality::Obstructed));
}

#[tokio::test(start_paused = true)]
async fn test_requests_are_paced() {
    let nodes = nodes(4);
    let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));
    let source = {
        let stamps = stamps.clone();
        move |s: Coord<f64>, e: Coord<f64>, n: usize| {
            stamps.lock().unwrap().push(Instant::now());
            async move { Ok::<_, TerrainError>(flat(s, e, n)) }
        }
    };
    let cfg = MatrixConfig::default();
    let started = Instant::now();
    let rows = run_matrix(&nodes, &cfg, &source, &Cancel::new()).await;

    assert_eq!(rows.len(), 6);
    assert!(started.elapsed() >= cfg.min_request_interval() * 5);
    let stamps = stamps.lock().unwrap();
    assert!(stamps
        .windows(2)
        .all(|w| w[1] - w[0] >= cfg.min_request_interval()));
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out() {
    let nodes = nodes(2);
    let source = |s: Coord<f64>, e: Coord<f64>, n: usize| async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, TerrainError>(flat(s, e, n))
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, LinkStatus::Error);
    assert!(rows[0].distance_km > 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_returns_partial_rows() {
    let nodes = nodes(4);
    let cancel = Cancel::new();
    let source = {
        let cancel = cancel.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        move |s: Coord<f64>, e: Coord<f64>, n: usize| {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                cancel.cancel();
            }
            async move { Ok::<_, TerrainError>(flat(s, e, n)) }
        }
    };
    let mut seen = 0;
    let rows = run_matrix_with(&nodes, &fast(), &source, &cancel, |_| seen += 1).await;

    // The request in flight when cancelled still completes.
    assert_eq!(rows.len(), 2);
    assert_eq!(seen, 2);
    assert!(rows.iter().all(|r| r.status == LinkStatus::Good));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_node_is_skipped_without_fetch() {
    let mut nodes = nodes(3);
    nodes[1].lat = 123.0;
    let calls = Arc::new(AtomicUsize::new(0));
    let source = {
        let calls = calls.clone();
        move |s: Coord<f64>, e: Coord<f64>, n: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, TerrainError>(flat(s, e, n)) }
        }
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;

    assert_eq!(rows.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        rows.iter()
            .filter(|r| r.status == LinkStatus::Error)
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_colocated_nodes_are_an_error_row() {
    let mut nodes = nodes(2);
    nodes[1].lat = nodes[0].lat;
    let source = |s: Coord<f64>, e: Coord<f64>, n: usize| async move {
        Ok::<_, TerrainError>(flat(s, e, n))
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].distance_km, 0.0);
    assert_eq!(rows[0].status, LinkStatus::Error);
    assert_eq!(rows[0].quality, None);
    assert_eq!(rows[0].margin_db, None);
}

#[tokio::test(start_paused = true)]
async fn test_nan_elevation_is_an_error_row() {
    let nodes = nodes(2);
    let source = |s: Coord<f64>, e: Coord<f64>, n: usize| async move {
        let mut profile = flat(s, e, n);
        profile[n / 2].elevation_m = f64::NAN;
        Ok::<_, TerrainError>(profile)
    };
    let rows = run_matrix(&nodes, &fast(), &source, &Cancel::new()).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, LinkStatus::Error);
    assert_ne!(rows[0].quality, Some(Quality::Excellent));
}
