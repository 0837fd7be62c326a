//! Installer version snapshots and version comparison
//!
//! A version map is a flat snapshot of which installer files a game offers
//! for one language/platform selection, keyed so that base game files,
//! extras and DLC files never collide:
//!
//! | entry            | key                                  | value        |
//! |------------------|--------------------------------------|--------------|
//! | installer, patch | `<platform>\|<name>`                 | version      |
//! | extra            | `extra\|<name>`                      | empty        |
//! | DLC installer    | `dlc:<dlc title>\|<platform>\|<name>` | version      |
//! | DLC extra        | `dlc:<dlc title>\|extra\|<name>`      | empty        |
//!
//! Comparing the snapshot taken at download time with the current catalogue
//! tells whether a game has new or changed installers.

use crate::metadata::{ExtraFile, GameMetadata, LanguageDownloads, resolve_language};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Composite file key → version string (empty = unversioned)
pub type InstallerVersionMap = BTreeMap<String, String>;

/// Parse a dotted version string into numeric components
///
/// Each component contributes its leading digits; a component without
/// digits counts as 0. `"1.2.10"` → `[1, 2, 10]`, `"2.1b"` → `[2, 1]`.
pub fn parse_version(version: &str) -> Vec<u64> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Componentwise integer comparison; missing trailing components count as 0
///
/// ```
/// use gog_dl::version::{compare_versions, parse_version};
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_versions(&parse_version("1.2"), &parse_version("1.2.1")), Ordering::Less);
/// assert_eq!(compare_versions(&parse_version("1.2"), &parse_version("1.2.0")), Ordering::Equal);
/// ```
pub fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Build a version snapshot for one language/platform selection
///
/// - `language` is matched case-insensitively against the store language
///   name; short codes such as `"en"` are resolved first.
/// - `platform` is `"all"` or one of `windows`, `mac`, `linux`
///   (case-insensitive). Anything else matches no installers.
/// - Patch files are skipped unless `include_patches` is set.
/// - DLC entries are namespaced with `dlc:<title>|` when `include_dlc` is set.
/// - Extras are recorded with an empty version when `include_extras` is set.
pub fn build_version_map(
    metadata: &GameMetadata,
    language: &str,
    platform: &str,
    include_extras: bool,
    include_dlc: bool,
    include_patches: bool,
) -> InstallerVersionMap {
    let language = resolve_language(language).to_lowercase();
    let mut map = InstallerVersionMap::new();

    add_installers(
        &mut map,
        "",
        &metadata.downloads,
        &language,
        platform,
        include_patches,
    );
    if include_extras {
        add_extras(&mut map, "", &metadata.extras);
    }

    if include_dlc {
        for dlc in &metadata.dlcs {
            let namespace = format!("dlc:{}|", dlc.title);
            add_installers(
                &mut map,
                &namespace,
                &dlc.downloads,
                &language,
                platform,
                include_patches,
            );
            if include_extras {
                add_extras(&mut map, &namespace, &dlc.extras);
            }
        }
    }

    map
}

fn add_installers(
    map: &mut InstallerVersionMap,
    namespace: &str,
    downloads: &[LanguageDownloads],
    language: &str,
    platform: &str,
    include_patches: bool,
) {
    let all_platforms = platform.eq_ignore_ascii_case("all");

    for entry in downloads
        .iter()
        .filter(|entry| entry.language().to_lowercase() == language)
    {
        for (name, files) in entry.platforms().iter() {
            if !all_platforms && !platform.eq_ignore_ascii_case(name) {
                continue;
            }
            for file in files {
                if file.is_patch() && !include_patches {
                    continue;
                }
                map.insert(
                    format!("{}{}|{}", namespace, name, file.name),
                    file.version.clone().unwrap_or_default(),
                );
            }
        }
    }
}

fn add_extras(map: &mut InstallerVersionMap, namespace: &str, extras: &[ExtraFile]) {
    for extra in extras {
        map.insert(format!("{}extra|{}", namespace, extra.name), String::new());
    }
}

/// Report what `new` adds or changes relative to `old`
///
/// Entries are emitted in key order as `NEW: <key> version=<v>` or
/// `CHANGED: <key> <old> -> <new>`. Keys only present in `old` are not
/// reported: a removed installer is not an update.
pub fn diff(old: &InstallerVersionMap, new: &InstallerVersionMap) -> Vec<String> {
    new.iter()
        .filter_map(|(key, new_version)| match old.get(key) {
            None => Some(format!("NEW: {} version={}", key, new_version)),
            Some(old_version) if old_version != new_version => Some(format!(
                "CHANGED: {} {} -> {}",
                key, old_version, new_version
            )),
            Some(_) => None,
        })
        .collect()
}
