//! Removal of superseded installer files
//!
//! After a game is downloaded again, its directory may hold several
//! generations of the same installer (`setup_foo_1.0.0.exe`,
//! `setup_foo_1.2.0.exe`, ...). The pruner groups installer files by the part
//! of the name before the version and by extension, keeps the newest file of
//! each group and deletes the rest.
//!
//! Files whose name carries no parseable version are never touched: without a
//! version there is nothing safe to compare against.
//!
//! Pruning is best-effort cleanup. Deletion failures are logged and reported,
//! never returned as errors.

use crate::utils::game_directory;
use crate::version::compare_versions;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Installer archive types considered for pruning (compared case-insensitively)
pub const INSTALLER_EXTENSIONS: &[&str] = &[
    "exe", "bin", "sh", "dmg", "pkg", "zip", "7z", "rar", "tar", "gz", "deb", "rpm",
];

#[allow(clippy::expect_used)]
static DOTTED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.+?)(?P<version>\d+(?:\.\d+)+)\.(?P<ext>[A-Za-z0-9]+)$")
        .expect("dotted version pattern compiles")
});

/// Name split into a grouping prefix and numeric version components
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedName {
    /// Everything before the version, e.g. `"Foo-"`
    pub prefix: String,
    /// Numeric version components, e.g. `[1, 2, 0]`
    pub version: Vec<u64>,
}

/// Policy for pulling a version out of an installer file name
///
/// Returning `None` marks the file as not comparable; the pruner will keep it.
pub trait VersionExtractor: Send + Sync {
    /// Split `file_name` into prefix and version, if it carries one
    fn extract(&self, file_name: &str) -> Option<VersionedName>;
}

/// Matches `<prefix><n>.<n>[.<n>...].<ext>`, e.g. `Foo-1.2.0.exe`
///
/// The prefix is the shortest leading part that lets the rest of the name
/// match, so `Foo-1.2.0.exe` yields prefix `Foo-` and version `1.2.0`.
#[derive(Clone, Debug)]
pub struct RegexVersionExtractor {
    pattern: Regex,
}

impl Default for RegexVersionExtractor {
    fn default() -> Self {
        Self {
            pattern: DOTTED_VERSION.clone(),
        }
    }
}

impl RegexVersionExtractor {
    /// Use a custom pattern with named groups `prefix` and `version`
    ///
    /// The version group is split on `.` into integer components.
    pub fn with_pattern(pattern: &str) -> crate::Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| crate::Error::Config {
            message: format!("invalid version pattern: {}", e),
            key: Some("version_pattern".to_string()),
        })?;

        let names: Vec<&str> = pattern.capture_names().flatten().collect();
        if !names.contains(&"prefix") || !names.contains(&"version") {
            return Err(crate::Error::Config {
                message: "version pattern needs named groups `prefix` and `version`".to_string(),
                key: Some("version_pattern".to_string()),
            });
        }

        Ok(Self { pattern })
    }
}

impl VersionExtractor for RegexVersionExtractor {
    fn extract(&self, file_name: &str) -> Option<VersionedName> {
        let caps = self.pattern.captures(file_name)?;
        let prefix = caps.name("prefix")?.as_str().to_string();
        let version = caps
            .name("version")?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(VersionedName { prefix, version })
    }
}

/// An installer file found on disk
#[derive(Clone, Debug)]
pub struct InstallerCandidate {
    /// Full path
    pub path: PathBuf,
    /// Last modification time, used to break version ties
    pub modified: SystemTime,
}

/// What a pruning pass did
#[derive(Clone, Debug, Default)]
pub struct PruneReport {
    /// Newest file of every version group
    pub kept: Vec<PathBuf>,
    /// Superseded files that were removed
    pub deleted: Vec<PathBuf>,
    /// Superseded files that could not be removed, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Installer files without a parseable version (left in place)
    pub unversioned: Vec<PathBuf>,
}

/// Files compete only with same-named installers of the same type in the same directory
#[derive(Debug, PartialEq, Eq, Hash)]
struct GroupKey {
    parent: PathBuf,
    prefix: String,
    extension: String,
}

/// Keeps the newest installer of each version group
#[derive(Clone)]
pub struct Pruner {
    extractor: Arc<dyn VersionExtractor>,
}

impl Default for Pruner {
    fn default() -> Self {
        Self::new(Arc::new(RegexVersionExtractor::default()))
    }
}

impl Pruner {
    /// Create a pruner with a specific version extraction policy
    pub fn new(extractor: Arc<dyn VersionExtractor>) -> Self {
        Self { extractor }
    }

    /// Delete superseded installers of `title` under `root`
    ///
    /// Looks in `root/<sanitized title>` when that directory exists, otherwise
    /// in `root` itself, recursing into subdirectories. Versions are only
    /// compared between files in the same directory.
    pub async fn prune_old_versions(&self, root: &Path, title: &str) -> PruneReport {
        let game_dir = game_directory(root, title);
        let target = if tokio::fs::metadata(&game_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            game_dir
        } else {
            root.to_path_buf()
        };

        debug!(?target, title, "scanning for superseded installers");

        let scan_dir = target.clone();
        let candidates = match tokio::task::spawn_blocking(move || collect_installers(&scan_dir))
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(?target, error = %e, "installer scan task failed");
                return PruneReport::default();
            }
        };

        let mut report = self.plan(candidates);
        let superseded = std::mem::take(&mut report.deleted);

        for file in superseded {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {
                    debug!(?file, "deleted superseded installer");
                    report.deleted.push(file);
                }
                Err(e) => {
                    warn!(?file, error = %e, "failed to delete superseded installer");
                    report.failed.push((file, e.to_string()));
                }
            }
        }

        info!(
            ?target,
            kept = report.kept.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            unversioned = report.unversioned.len(),
            "pruning complete"
        );

        report
    }

    /// Decide which candidates to keep and which are superseded, without touching disk
    ///
    /// Files are grouped by directory, version prefix and extension, so the
    /// `.exe`, `.sh` and `.dmg` builds of one release never replace each other.
    /// Superseded files are returned in `deleted`. Within a group the highest
    /// version wins; equal versions are decided by the newest modification
    /// time, then by the greatest file name.
    pub fn plan(&self, candidates: Vec<InstallerCandidate>) -> PruneReport {
        let mut report = PruneReport::default();
        let mut groups: HashMap<GroupKey, Vec<(InstallerCandidate, Vec<u64>)>> = HashMap::new();

        for candidate in candidates {
            let Some(file_name) = candidate.path.file_name().and_then(|n| n.to_str()) else {
                report.unversioned.push(candidate.path);
                continue;
            };
            let Some(parsed) = self.extractor.extract(file_name) else {
                report.unversioned.push(candidate.path);
                continue;
            };
            let key = GroupKey {
                parent: candidate
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
                prefix: parsed.prefix,
                extension: candidate
                    .path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_ascii_lowercase(),
            };
            groups
                .entry(key)
                .or_default()
                .push((candidate, parsed.version));
        }

        for (_, mut members) in groups {
            members.sort_by(|(a, va), (b, vb)| newest_first(a, va, b, vb));
            let mut members = members.into_iter();
            if let Some((best, _)) = members.next() {
                report.kept.push(best.path);
            }
            report.deleted.extend(members.map(|(c, _)| c.path));
        }

        report.kept.sort();
        report.deleted.sort();
        report.unversioned.sort();
        report
    }
}

fn newest_first(
    a: &InstallerCandidate,
    version_a: &[u64],
    b: &InstallerCandidate,
    version_b: &[u64],
) -> Ordering {
    compare_versions(version_b, version_a)
        .then_with(|| b.modified.cmp(&a.modified))
        .then_with(|| b.path.file_name().cmp(&a.path.file_name()))
}

fn is_installer(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            INSTALLER_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

/// Recursively collect installer files below `dir`
fn collect_installers(dir: &Path) -> Vec<InstallerCandidate> {
    walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "failed to read directory entry while pruning");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_installer(entry.path()))
        .map(|entry| {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            InstallerCandidate {
                path: entry.into_path(),
                modified,
            }
        })
        .collect()
}
