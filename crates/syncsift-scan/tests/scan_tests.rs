use std::fs;

use syncsift_scan::{
    AnalysisConfig, FingerprintKind, Fingerprinter, InventoryBuilder, StorageRoot, WarningKind,
};
use tempfile::TempDir;

#[test]
fn test_nested_root_files_belong_to_inner_root() {
    let temp = TempDir::new().unwrap();
    let drive = temp.path().join("Drive");
    let other = drive.join("OtherSync");
    fs::create_dir_all(&other).unwrap();
    fs::write(drive.join("report.pdf"), "pdf").unwrap();
    fs::write(other.join("photo.jpg"), "jpg").unwrap();

    let config = AnalysisConfig::new(vec![
        StorageRoot::new("drive", &drive),
        StorageRoot::new("other", &other),
    ]);
    let inventory = InventoryBuilder::new().build(&config).unwrap();

    assert_eq!(inventory.len(), 2);
    let photo = inventory
        .records
        .iter()
        .find(|r| r.name() == "photo.jpg")
        .unwrap();
    assert_eq!(photo.root_id, "other");
    assert_eq!(inventory.stats.per_root["drive"].files, 1);
}

#[test]
fn test_per_level_limit_truncates_directory() {
    let temp = TempDir::new().unwrap();
    for i in 0..5 {
        fs::write(temp.path().join(format!("f{i}.txt")), "x").unwrap();
    }
    let mut config = AnalysisConfig::new(vec![StorageRoot::new("r", temp.path())]);
    config.max_files_per_level = 3;

    let inventory = InventoryBuilder::new().build(&config).unwrap();
    assert_eq!(inventory.len(), 3);
    assert!(inventory.stats.level_limit_hit);
    assert!(
        inventory
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::LimitReached)
    );
}

#[test]
fn test_total_byte_budget_stops_walk() {
    let temp = TempDir::new().unwrap();
    for i in 0..4 {
        fs::write(temp.path().join(format!("f{i}.bin")), vec![1u8; 100]).unwrap();
    }
    let mut config = AnalysisConfig::new(vec![StorageRoot::new("r", temp.path())]);
    config.max_total_scan_bytes = Some(250);

    let inventory = InventoryBuilder::new().build(&config).unwrap();
    assert_eq!(inventory.len(), 2);
    assert!(inventory.stats.byte_limit_hit);
    assert!(inventory.total_bytes() <= 250);
}

#[test]
fn test_invalid_config_is_fatal() {
    let config = AnalysisConfig::new(vec![
        StorageRoot::new("dup", "/a"),
        StorageRoot::new("dup", "/b"),
    ]);
    let err = InventoryBuilder::new().build(&config).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_fingerprint_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.bin");
    fs::write(&path, vec![42u8; 3000]).unwrap();

    let f = Fingerprinter::new();
    assert_eq!(
        f.fingerprint(&path, 3000).unwrap(),
        f.fingerprint(&path, 3000).unwrap()
    );
}

#[test]
fn test_sampled_fingerprint_collides_on_middle_difference() {
    let temp = TempDir::new().unwrap();
    let mut a = vec![0u8; 8192];
    let mut b = vec![0u8; 8192];
    a[4000] = 1;
    b[4000] = 2;
    fs::write(temp.path().join("a.bin"), &a).unwrap();
    fs::write(temp.path().join("b.bin"), &b).unwrap();

    let sampled = Fingerprinter::with_threshold(4096);
    let fa = sampled.fingerprint(&temp.path().join("a.bin"), 8192).unwrap();
    let fb = sampled.fingerprint(&temp.path().join("b.bin"), 8192).unwrap();
    assert_eq!(fa.kind, FingerprintKind::Sampled);
    assert_eq!(fa, fb);

    let exact = Fingerprinter::with_threshold(1024 * 1024);
    let fa = exact.fingerprint(&temp.path().join("a.bin"), 8192).unwrap();
    let fb = exact.fingerprint(&temp.path().join("b.bin"), 8192).unwrap();
    assert_ne!(fa, fb);
}

#[test]
fn test_fingerprint_record_returns_new_record() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "abc").unwrap();
    let config = AnalysisConfig::new(vec![StorageRoot::new("r", temp.path())]);
    let inventory = InventoryBuilder::new().build(&config).unwrap();

    let record = &inventory.records[0];
    let fingerprinted = Fingerprinter::new().fingerprint_record(record).unwrap();
    assert!(record.fingerprint.is_none());
    assert!(fingerprinted.fingerprint.is_some());
}
