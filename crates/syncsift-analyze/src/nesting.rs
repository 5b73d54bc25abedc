//! Structural overlap detection between storage roots.
//!
//! Roots form a directed graph where an edge `A -> B` means B's directory
//! lies inside A's. The graph is built once and never mutated; cycle search
//! runs over that snapshot.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use indexmap::IndexMap;
use jwalk::WalkDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use syncsift_core::{
    AnalysisConfig, NestingIssue, NestingKind, Severity, StorageRoot, format_size, is_descendant,
    normalize_lexically,
};
use syncsift_scan::directory_size;

/// User folders commonly redirected into sync services.
pub const WELL_KNOWN_FOLDERS: &[&str] = &["Desktop", "Documents", "Pictures"];

/// Folder name fragments (lowercase) that mark backup-style content.
pub const BACKUP_KEYWORDS: &[&str] = &[
    "backup",
    "bak",
    "old",
    "archive",
    "saved",
    "copy",
    "time machine",
    "backups",
    "restore",
    "recovery",
];

/// System or cache folder names that should not be synced.
pub const SYSTEM_FOLDERS: &[&str] = &[
    "Library",
    "System",
    "Applications",
    ".Trash",
    "node_modules",
    ".git",
    ".svn",
    "__pycache__",
    ".cache",
    ".tmp",
    "Temp",
];

const MIB: u64 = 1024 * 1024;

/// Immutable containment graph over storage roots.
#[derive(Debug, Clone)]
pub struct NestingGraph {
    roots: IndexMap<CompactString, StorageRoot>,
    edges: IndexMap<CompactString, Vec<CompactString>>,
}

impl NestingGraph {
    /// Build the graph from root paths.
    ///
    /// A root gets an edge from the innermost other root containing it.
    /// Containment is checked on the lexically normalized paths and again on
    /// the canonical paths, so symlinked mirrors are caught as well.
    pub fn from_roots(roots: &[StorageRoot]) -> Self {
        let lexical: Vec<PathBuf> = roots.iter().map(|r| normalize_lexically(&r.path)).collect();
        let canonical: Vec<PathBuf> = roots.iter().map(StorageRoot::normalized_path).collect();

        let mut edges: Vec<(CompactString, CompactString)> = Vec::new();
        for paths in [&lexical, &canonical] {
            for (child_idx, child) in roots.iter().enumerate() {
                let parent = roots
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != child_idx)
                    .filter(|(idx, _)| is_descendant(&paths[child_idx], &paths[*idx]))
                    .max_by_key(|(idx, _)| paths[*idx].components().count());
                if let Some((_, parent)) = parent {
                    edges.push((parent.id.clone(), child.id.clone()));
                }
            }
        }
        Self::from_edges(roots, edges)
    }

    /// Build the graph from explicit `(parent, child)` edges. Edges naming
    /// unknown roots are ignored.
    pub fn from_edges(
        roots: &[StorageRoot],
        edges: impl IntoIterator<Item = (CompactString, CompactString)>,
    ) -> Self {
        let roots: IndexMap<CompactString, StorageRoot> =
            roots.iter().map(|r| (r.id.clone(), r.clone())).collect();
        let mut adjacency: IndexMap<CompactString, Vec<CompactString>> =
            roots.keys().map(|id| (id.clone(), Vec::new())).collect();

        for (parent, child) in edges {
            if parent == child || !roots.contains_key(&child) {
                continue;
            }
            if let Some(children) = adjacency.get_mut(&parent) {
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }

        Self {
            roots,
            edges: adjacency,
        }
    }

    /// Root by id.
    pub fn root(&self, id: &str) -> Option<&StorageRoot> {
        self.roots.get(id)
    }

    /// Roots directly contained in `id`.
    pub fn children(&self, id: &str) -> &[CompactString] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `(parent, child)` edge, in root order.
    pub fn edges(&self) -> impl Iterator<Item = (&CompactString, &CompactString)> {
        self.edges
            .iter()
            .flat_map(|(parent, children)| children.iter().map(move |c| (parent, c)))
    }

    /// Find cycles with a depth-first search from every unvisited root.
    ///
    /// Each cycle is reported once, as the sequence of roots starting at the
    /// first root the search re-entered.
    pub fn find_cycles(&self) -> Vec<Vec<CompactString>> {
        let mut state: HashMap<&str, Visit> = HashMap::new();
        let mut seen: HashSet<Vec<CompactString>> = HashSet::new();
        let mut cycles = Vec::new();

        for start in self.roots.keys() {
            if state.contains_key(start.as_str()) {
                continue;
            }
            let mut path: Vec<&CompactString> = Vec::new();
            self.visit(start, &mut state, &mut path, &mut seen, &mut cycles);
        }
        cycles
    }

    fn visit<'a>(
        &'a self,
        node: &'a CompactString,
        state: &mut HashMap<&'a str, Visit>,
        path: &mut Vec<&'a CompactString>,
        seen: &mut HashSet<Vec<CompactString>>,
        cycles: &mut Vec<Vec<CompactString>>,
    ) {
        state.insert(node.as_str(), Visit::OnPath);
        path.push(node);

        for next in self.children(node) {
            match state.get(next.as_str()) {
                Some(Visit::OnPath) => {
                    if let Some(pos) = path.iter().position(|n| *n == next) {
                        let cycle: Vec<CompactString> =
                            path[pos..].iter().map(|n| (*n).clone()).collect();
                        if seen.insert(rotate_to_min(&cycle)) {
                            cycles.push(cycle);
                        }
                    }
                }
                Some(Visit::Done) => {}
                None => self.visit(next, state, path, seen, cycles),
            }
        }

        path.pop();
        state.insert(node.as_str(), Visit::Done);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnPath,
    Done,
}

fn rotate_to_min(cycle: &[CompactString]) -> Vec<CompactString> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).cloned().collect()
}

/// Detects nested roots, cycles, multiply-synced user folders and backup or
/// system folders inside roots. Never writes to the filesystem.
#[derive(Debug, Clone)]
pub struct NestingAnalyzer {
    home_dir: Option<PathBuf>,
    backup_min_bytes: u64,
    system_min_bytes: u64,
    backup_max_depth: usize,
}

impl NestingAnalyzer {
    /// Create an analyzer with the default thresholds: backups over 100 MiB
    /// within three levels, system folders over 50 MiB.
    pub fn new() -> Self {
        Self {
            home_dir: None,
            backup_min_bytes: 100 * MIB,
            system_min_bytes: 50 * MIB,
            backup_max_depth: 3,
        }
    }

    /// Create an analyzer from an analysis config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            home_dir: config.home_dir.clone(),
            ..Self::new()
        }
    }

    /// Set the home directory used for well-known folder checks.
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Override the size thresholds for backup and system folders.
    pub fn with_thresholds(mut self, backup_min_bytes: u64, system_min_bytes: u64) -> Self {
        self.backup_min_bytes = backup_min_bytes;
        self.system_min_bytes = system_min_bytes;
        self
    }

    /// Analyze `roots`.
    pub fn analyze(&self, roots: &[StorageRoot], cancel: &CancellationToken) -> Vec<NestingIssue> {
        let graph = NestingGraph::from_roots(roots);
        self.analyze_graph(&graph, cancel)
    }

    /// Analyze a prebuilt graph.
    pub fn analyze_graph(
        &self,
        graph: &NestingGraph,
        cancel: &CancellationToken,
    ) -> Vec<NestingIssue> {
        let mut issues = Vec::new();
        issues.extend(self.contained_roots(graph, cancel));
        issues.extend(self.universal_sync(graph, cancel));
        issues.extend(cycle_issues(graph));
        issues.extend(self.backups_in_roots(graph, cancel));
        issues.extend(self.system_folders(graph, cancel));

        info!(issues = issues.len(), "nesting analysis complete");
        issues
    }

    fn contained_roots(&self, graph: &NestingGraph, cancel: &CancellationToken) -> Vec<NestingIssue> {
        let mut issues = Vec::new();
        for (parent_id, child_id) in graph.edges() {
            let (Some(parent), Some(child)) = (graph.root(parent_id), graph.root(child_id)) else {
                continue;
            };
            let size = directory_size(&child.path, cancel);
            debug!(parent = %parent_id, child = %child_id, size, "root inside root");
            issues.push(
                NestingIssue::new(
                    NestingKind::ContainsRoot,
                    vec![parent_id.clone(), child_id.clone()],
                    Severity::Critical,
                    format!(
                        "{} is synced inside {} ({} stored twice)",
                        child.display_name(),
                        parent.display_name(),
                        format_size(size)
                    ),
                )
                .at(&child.path)
                .wasting(size),
            );
        }
        issues
    }

    fn universal_sync(&self, graph: &NestingGraph, cancel: &CancellationToken) -> Vec<NestingIssue> {
        let Some(home) = &self.home_dir else {
            return Vec::new();
        };
        let mut issues = Vec::new();

        for name in WELL_KNOWN_FOLDERS {
            let folder = home.join(name);
            if !folder.is_dir() {
                continue;
            }
            let folder_norm = normalize_lexically(&folder);
            let syncing: Vec<&StorageRoot> = graph
                .roots
                .values()
                .filter(|root| {
                    let root_path = normalize_lexically(&root.path);
                    folder_norm == root_path || is_descendant(&folder_norm, &root_path)
                })
                .collect();

            if syncing.len() < 2 {
                continue;
            }

            let size = directory_size(&folder, cancel);
            let copies = syncing.len() as u64;
            let names: Vec<&str> = syncing.iter().map(|r| r.display_name()).collect();
            issues.push(
                NestingIssue::new(
                    NestingKind::UniversalSync,
                    syncing.iter().map(|r| r.id.clone()).collect(),
                    Severity::High,
                    format!("{name} is synced by {copies} services: {}", names.join(", ")),
                )
                .at(folder)
                .wasting(size * (copies - 1)),
            );
        }
        issues
    }

    fn backups_in_roots(&self, graph: &NestingGraph, cancel: &CancellationToken) -> Vec<NestingIssue> {
        let other_roots: Vec<PathBuf> = graph.roots.values().map(|r| r.path.clone()).collect();
        let mut issues = Vec::new();

        for root in graph.roots.values() {
            if cancel.is_cancelled() {
                break;
            }
            let mut matched: Vec<PathBuf> = Vec::new();
            for dir in subdirectories(&root.path, self.backup_max_depth) {
                if matched.iter().any(|m| dir.starts_with(m)) {
                    continue;
                }
                if other_roots
                    .iter()
                    .any(|other| *other != root.path && dir.starts_with(other))
                {
                    continue;
                }
                let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                if !is_backup_name(&name) {
                    continue;
                }
                matched.push(dir.clone());

                let size = directory_size(&dir, cancel);
                if size <= self.backup_min_bytes {
                    continue;
                }
                issues.push(
                    NestingIssue::new(
                        NestingKind::BackupInSync,
                        vec![root.id.clone()],
                        Severity::Medium,
                        format!(
                            "Backup folder '{}' ({}) is synced in {}",
                            dir.file_name().unwrap_or_default().to_string_lossy(),
                            format_size(size),
                            root.display_name()
                        ),
                    )
                    .at(dir)
                    .wasting(size),
                );
            }
        }
        issues
    }

    fn system_folders(&self, graph: &NestingGraph, cancel: &CancellationToken) -> Vec<NestingIssue> {
        let mut issues = Vec::new();
        for root in graph.roots.values() {
            for dir in subdirectories(&root.path, 1) {
                let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !SYSTEM_FOLDERS.contains(&name) {
                    continue;
                }
                let size = directory_size(&dir, cancel);
                if size <= self.system_min_bytes {
                    continue;
                }
                issues.push(
                    NestingIssue::new(
                        NestingKind::SystemFolderInRoot,
                        vec![root.id.clone()],
                        Severity::High,
                        format!(
                            "System folder '{name}' ({}) is synced in {}",
                            format_size(size),
                            root.display_name()
                        ),
                    )
                    .at(&dir)
                    .wasting(size),
                );
            }
        }
        issues
    }
}

impl Default for NestingAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn cycle_issues(graph: &NestingGraph) -> Vec<NestingIssue> {
    graph
        .find_cycles()
        .into_iter()
        .map(|cycle| {
            let mut chain: Vec<&str> = cycle.iter().map(CompactString::as_str).collect();
            if let Some(first) = cycle.first() {
                chain.push(first.as_str());
            }
            NestingIssue::new(
                NestingKind::Cycle,
                cycle.clone(),
                Severity::Critical,
                format!("Sync cycle: {}", chain.join(" -> ")),
            )
        })
        .collect()
}

/// Directories below `root` down to `max_depth` levels, in sorted order.
/// Whether a folder name carries a backup keyword as a whole word.
/// Digits and punctuation separate words, so `Backup2019` and `old_mail`
/// match while `Folder` and `Golden` do not.
fn is_backup_name(name: &str) -> bool {
    let letters: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();
    let words = format!(" {} ", letters.split_whitespace().collect::<Vec<_>>().join(" "));
    BACKUP_KEYWORDS
        .iter()
        .any(|keyword| words.contains(&format!(" {keyword} ")))
}

fn subdirectories(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.path())
        .collect()
}
