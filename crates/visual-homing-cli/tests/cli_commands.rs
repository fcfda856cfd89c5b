//! Integration tests for the train / test / route / info commands.

use std::path::Path;

use image::{Rgb, RgbImage};

use visual_homing::{write_route_points, HomingConfig};
use visual_homing_cli::commands;

// ─────────────────────── helpers ───────────────────────

/// Panorama with a bright band at `band_x`.
fn panorama(band_x: u32) -> RgbImage {
    RgbImage::from_fn(148, 38, |x, y| {
        if x >= band_x && x < band_x + 20 {
            Rgb([240, 240, 230])
        } else {
            Rgb([20, 30 + y as u8, 40])
        }
    })
}

/// Write training views named so that file-name order is band order.
fn write_views(dir: &Path, bands: &[u32]) {
    for (i, &band) in bands.iter().enumerate() {
        panorama(band)
            .save(dir.join(format!("view_{i:03}.png")))
            .unwrap();
    }
}

fn trained_memory(dir: &tempfile::TempDir, bands: &[u32]) -> std::path::PathBuf {
    let views = dir.path().join("views");
    std::fs::create_dir_all(&views).unwrap();
    write_views(&views, bands);
    let out = dir.path().join("memory.pmem");
    commands::train(&HomingConfig::default(), &views, &out).unwrap();
    out
}

// ─────────────────────── train / info ───────────────────────

#[test]
fn train_then_info() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views");
    std::fs::create_dir_all(&views).unwrap();
    write_views(&views, &[0, 40, 80]);
    std::fs::write(views.join("notes.txt"), "not an image").unwrap();

    let out = dir.path().join("out").join("memory.pmem");
    let report = commands::train(&HomingConfig::default(), &views, &out).unwrap();
    assert_eq!(report.snapshots, 3);
    assert_eq!((report.width, report.height), (36, 10));
    assert!(out.exists());

    let info = commands::info(&HomingConfig::default(), &out).unwrap();
    assert_eq!(info.snapshots, 3);
    assert_eq!(info.width, Some(36));
    assert_eq!(info.height, Some(10));
}

#[test]
fn train_empty_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("memory.pmem");
    assert!(commands::train(&HomingConfig::default(), dir.path(), &out).is_err());
    assert!(!out.exists());
}

#[test]
fn train_rejects_small_views() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::new(20, 10).save(dir.path().join("tiny.png")).unwrap();
    let out = dir.path().join("memory.pmem");
    assert!(commands::train(&HomingConfig::default(), dir.path(), &out).is_err());
}

#[test]
fn info_rejects_non_memory_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.pmem");
    std::fs::write(&path, vec![0u8; 128]).unwrap();
    assert!(commands::info(&HomingConfig::default(), &path).is_err());
}

// ─────────────────────── test ───────────────────────

#[test]
fn test_finds_training_view() {
    let dir = tempfile::tempdir().unwrap();
    let memory = trained_memory(&dir, &[0, 40, 80, 120]);

    let view = dir.path().join("query.png");
    panorama(80).save(&view).unwrap();

    let report = commands::test(&HomingConfig::default(), &memory, &view, None).unwrap();
    assert_eq!(report.result.snapshot_index, 2);
    assert_eq!(report.result.match_value, 0.0);
    assert_eq!(report.heading_degrees, 0.0);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["snapshot_index"], 2);
    assert!(json.get("heading").is_some());
}

#[test]
fn test_dump_dir_receives_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let memory = trained_memory(&dir, &[10, 90]);

    let view = dir.path().join("query.png");
    panorama(50).save(&view).unwrap();
    let dump = dir.path().join("pm_dump");

    commands::test(&HomingConfig::default(), &memory, &view, Some(&dump)).unwrap();
    assert!(dump.join("0_current.png").exists());
    let csv = std::fs::read_to_string(dump.join("0_ridf.csv")).unwrap();
    assert_eq!(csv.lines().count(), 36);
    assert_eq!(csv.lines().next().unwrap().split(", ").count(), 2);
    assert!(dump.join("0_log.txt").exists());
}

// ─────────────────────── route ───────────────────────

#[test]
fn route_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("route.bin");
    let points: Vec<[f32; 2]> = (0..=50).map(|i| [0.0, i as f32 * 0.04]).collect();
    let mut file = std::fs::File::create(&path).unwrap();
    write_route_points(&mut file, &points, 100.0).unwrap();
    drop(file);

    let config = HomingConfig::default();
    let away = commands::route(&config, &path, 0.5, 1.0).unwrap();
    assert!(away.waypoints > 2);
    assert!((away.distance.unwrap() - 0.5).abs() < 1e-4);
    assert!(!away.at_destination);

    let dest = commands::route(&config, &path, 0.0, 2.0).unwrap();
    assert!(dest.at_destination);
}

#[test]
fn route_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.bin");
    assert!(commands::route(&HomingConfig::default(), &path, 0.0, 0.0).is_err());
}

#[test]
fn route_with_single_waypoint_has_no_distance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("route.bin");
    let mut file = std::fs::File::create(&path).unwrap();
    write_route_points(&mut file, &[[1.0, 1.0]], 100.0).unwrap();
    drop(file);

    let report = commands::route(&HomingConfig::default(), &path, 1.0, 1.1).unwrap();
    assert_eq!(report.waypoints, 1);
    assert_eq!(report.distance, None);
    assert_eq!(report.segment, None);
    assert!(report.at_destination);
}

#[test]
fn info_rejects_forged_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forged.pmem");

    let mut header = vec![0u8; 64];
    header[0..4].copy_from_slice(&0x504D454Du32.to_le_bytes());
    header[4..6].copy_from_slice(&1u16.to_le_bytes());
    header[8..16].copy_from_slice(&(1u64 << 34).to_le_bytes());
    header[20..24].copy_from_slice(&5u32.to_le_bytes());
    std::fs::write(&path, &header).unwrap();

    assert!(commands::info(&HomingConfig::default(), &path).is_err());
}
