//! Inventory walking and content fingerprinting for syncsift.
//!
//! - [`InventoryBuilder`] walks storage roots with jwalk under depth,
//!   per-directory and total-byte limits, and produces a flat list of
//!   [`FileRecord`]s. It never writes to the filesystem.
//! - [`Fingerprinter`] computes BLAKE3 fingerprints: a full-content hash
//!   below the large-file threshold, a size plus head/tail sample above it.
//!
//! # Example
//!
//! ```rust,no_run
//! use syncsift_scan::{AnalysisConfig, InventoryBuilder, StorageRoot};
//!
//! let config = AnalysisConfig::new(vec![StorageRoot::new("drive", "/cloud/drive")]);
//! let builder = InventoryBuilder::new();
//! let inventory = builder.build(&config).unwrap();
//!
//! println!("{} files, {} bytes", inventory.len(), inventory.total_bytes());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use syncsift_scan::InventoryBuilder;
//!
//! let builder = InventoryBuilder::new();
//! let mut progress_rx = builder.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("{}: {} files", progress.current_root, progress.files_scanned);
//!     }
//! });
//! ```

mod fingerprint;
mod inventory;
mod measure;
mod progress;

pub use fingerprint::{Fingerprinter, SAMPLE_BYTES};
pub use inventory::InventoryBuilder;
pub use measure::{directory_size, path_size};
pub use progress::ScanProgress;

// Re-export core types for convenience
pub use syncsift_core::{
    AnalysisConfig, FileRecord, Fingerprint, FingerprintKind, Inventory, InventoryStats,
    ScanWarning, SiftError, StorageRoot, WarningKind,
};
