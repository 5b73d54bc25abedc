use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use syncsift_analyze::{
    CanonicalSelector, DuplicateGrouper, HousekeepingFinder, NestingAnalyzer, NestingGraph,
    NestingKind, Severity,
};
use syncsift_core::{AnalysisConfig, ConfidenceTier, StorageRoot};
use syncsift_scan::InventoryBuilder;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DAY: u64 = 86_400;

fn write_aged(path: &Path, content: &[u8], age: Duration) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[test]
fn test_large_copy_scenario_through_fingerprinting() {
    let temp = TempDir::new().unwrap();
    let drive = temp.path().join("Drive");
    let photo = vec![11u8; 2_000_000];
    write_aged(&drive.join("a.jpg"), &photo, Duration::from_secs(3600));
    write_aged(&drive.join("a_copy.jpg"), &photo, Duration::from_secs(40 * DAY));
    write_aged(&drive.join("a(1).jpg"), &photo, Duration::from_secs(600));

    let config = AnalysisConfig::new(vec![StorageRoot::new("drive", &drive)]);
    let inventory = InventoryBuilder::new().build(&config).unwrap();
    let report = DuplicateGrouper::new().group(&inventory.records, &CancellationToken::new());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].count(), 3);
    assert!(report.groups[0].is_sampled());

    let selection = CanonicalSelector::from_config(&config)
        .select(&report.groups[0], SystemTime::now())
        .unwrap();
    assert!(selection.sampled);
    assert!(selection.canonical.path().ends_with("a.jpg"));

    assert_eq!(selection.removals.len(), 1);
    let copy = &selection.removals[0];
    assert!(copy.file.path().ends_with("a_copy.jpg"));
    assert!(copy.confidence >= 90);
    assert_eq!(copy.tier(), ConfidenceTier::Safe);

    assert_eq!(selection.protected.len(), 1);
    assert!(selection.protected[0].path().ends_with("a(1).jpg"));
}

#[test]
fn test_inventory_to_canonical_selection() {
    let temp = TempDir::new().unwrap();
    let drive = temp.path().join("Drive");
    let dropbox = temp.path().join("Dropbox");
    let photo = vec![7u8; 4096];

    write_aged(&drive.join("Photos/beach.jpg"), &photo, Duration::from_secs(2 * DAY));
    write_aged(
        &dropbox.join("Camera/beach copy.jpg"),
        &photo,
        Duration::from_secs(90 * DAY),
    );
    write_aged(&drive.join("notes.txt"), b"unrelated", Duration::from_secs(DAY));

    let config = AnalysisConfig::new(vec![
        StorageRoot::new("drive", &drive),
        StorageRoot::new("dropbox", &dropbox),
    ]);
    let inventory = InventoryBuilder::new().build(&config).unwrap();
    assert_eq!(inventory.len(), 3);

    let report = DuplicateGrouper::new().group(&inventory.records, &CancellationToken::new());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.total_wasted_bytes(), 4096);

    let selection = CanonicalSelector::from_config(&config)
        .select(&report.groups[0], SystemTime::now())
        .unwrap();
    assert!(selection.canonical.path().ends_with("beach.jpg"));
    assert_eq!(selection.removals.len(), 1);
    assert_eq!(selection.removals[0].file.record.root_id, "dropbox");
    assert_eq!(selection.removals[0].tier(), ConfidenceTier::Safe);
}

#[test]
fn test_root_inside_root_is_critical() {
    let temp = TempDir::new().unwrap();
    let drive = temp.path().join("Cloud/Drive");
    let other = drive.join("OtherSync");
    write_aged(&other.join("a.bin"), &[1u8; 500], Duration::ZERO);
    write_aged(&other.join("b.bin"), &[2u8; 300], Duration::ZERO);

    let roots = vec![
        StorageRoot::new("drive", &drive),
        StorageRoot::new("other", &other),
    ];
    let issues = NestingAnalyzer::new().analyze(&roots, &CancellationToken::new());

    assert_eq!(issues.len(), 1);
    let issue = &issues[0];
    assert_eq!(issue.kind, NestingKind::ContainsRoot);
    assert_eq!(issue.severity, Severity::Critical);
    assert_eq!(issue.involved_roots, vec!["drive", "other"]);
    assert_eq!(issue.estimated_wasted_bytes, 800);
}

#[test]
fn test_sibling_prefix_is_not_nesting() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("Drive")).unwrap();
    fs::create_dir_all(temp.path().join("DriveBackup")).unwrap();

    let roots = vec![
        StorageRoot::new("drive", temp.path().join("Drive")),
        StorageRoot::new("copy", temp.path().join("DriveBackup")),
    ];
    let issues = NestingAnalyzer::new().analyze(&roots, &CancellationToken::new());
    assert!(issues.is_empty());
}

#[test]
fn test_cycle_reported_once_with_zero_estimate() {
    let roots = vec![
        StorageRoot::new("A", "/sync/a"),
        StorageRoot::new("B", "/sync/b"),
        StorageRoot::new("C", "/sync/c"),
    ];
    let graph = NestingGraph::from_edges(
        &roots,
        [("A".into(), "B".into()), ("B".into(), "C".into()), ("C".into(), "A".into())],
    );

    let issues = NestingAnalyzer::new().analyze_graph(&graph, &CancellationToken::new());
    let cycles: Vec<_> = issues
        .iter()
        .filter(|i| i.kind == NestingKind::Cycle)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].involved_roots, vec!["A", "B", "C"]);
    assert_eq!(cycles[0].estimated_wasted_bytes, 0);
}

#[test]
fn test_housekeeping_from_inventory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("Box");
    write_aged(&root.join("~$budget.xlsx"), b"lock", Duration::from_secs(3 * DAY));
    write_aged(&root.join("render.tmp"), b"partial", Duration::ZERO);
    write_aged(&root.join("budget.xlsx"), b"sheet", Duration::from_secs(3 * DAY));

    let config = AnalysisConfig::new(vec![StorageRoot::new("box", &root)]);
    let inventory = InventoryBuilder::new().build(&config).unwrap();
    let report = HousekeepingFinder::from_config(&config)
        .unwrap()
        .find(&inventory.records, SystemTime::now());

    assert!(report.stale.is_empty());
    assert_eq!(report.temporary.len(), 1);
    assert_eq!(report.temporary[0].len(), 2);
}
