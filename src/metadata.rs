//! Installer metadata as delivered by the game store
//!
//! The store describes a game's installers as nested per-language,
//! per-platform lists, e.g.
//!
//! ```json
//! {
//!   "title": "Example Game",
//!   "downloads": [["English", {"windows": [{"manualUrl": "/downloads/example/en1installer0",
//!                                            "name": "setup_example_1.2.0.exe",
//!                                            "version": "1.2.0", "size": "1.2 GB"}]}]],
//!   "extras": [{"manualUrl": "/downloads/example/manual", "name": "Manual", "type": "manuals"}],
//!   "dlcs": []
//! }
//! ```

use crate::error::{Error, Result};
use crate::types::GameId;
use serde::{Deserialize, Serialize};

/// Full installer description for one game
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    /// Game title
    #[serde(default)]
    pub title: String,
    /// Installers grouped by language
    #[serde(default)]
    pub downloads: Vec<LanguageDownloads>,
    /// Language-independent extra content
    #[serde(default)]
    pub extras: Vec<ExtraFile>,
    /// Downloadable content, each with its own installers and extras
    #[serde(default)]
    pub dlcs: Vec<DlcMetadata>,
}

impl GameMetadata {
    /// Parse the store's JSON representation
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Metadata(format!("invalid installer metadata: {}", e)))
    }
}

/// `[language, platforms]` pair as encoded by the store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageDownloads(pub String, pub PlatformFiles);

impl LanguageDownloads {
    /// Store language name, e.g. "English"
    pub fn language(&self) -> &str {
        &self.0
    }

    /// Installers for this language
    pub fn platforms(&self) -> &PlatformFiles {
        &self.1
    }
}

/// Installers per platform
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformFiles {
    /// Windows installers
    #[serde(default)]
    pub windows: Vec<InstallerFile>,
    /// macOS installers
    #[serde(default)]
    pub mac: Vec<InstallerFile>,
    /// Linux installers
    #[serde(default)]
    pub linux: Vec<InstallerFile>,
}

impl PlatformFiles {
    /// Iterate `(platform name, installers)` in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[InstallerFile])> {
        [
            ("windows", self.windows.as_slice()),
            ("mac", self.mac.as_slice()),
            ("linux", self.linux.as_slice()),
        ]
        .into_iter()
    }
}

/// A single installer or patch file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallerFile {
    /// Store-relative download URL
    #[serde(default)]
    pub manual_url: String,
    /// File name as shown by the store
    #[serde(default)]
    pub name: String,
    /// Installer version; absent for unversioned files
    #[serde(default)]
    pub version: Option<String>,
    /// Human-readable size
    #[serde(default)]
    pub size: String,
}

impl InstallerFile {
    /// Patches are recognized by "patch" in the name or URL
    pub fn is_patch(&self) -> bool {
        self.name.to_lowercase().contains("patch") || self.manual_url.to_lowercase().contains("patch")
    }
}

/// Extra content (manuals, soundtracks, artwork)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraFile {
    /// Store-relative download URL
    #[serde(default)]
    pub manual_url: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Content category
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Human-readable size
    #[serde(default)]
    pub size: String,
}

/// A DLC with its own installers and extras
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DlcMetadata {
    /// DLC title
    #[serde(default)]
    pub title: String,
    /// Installers grouped by language
    #[serde(default)]
    pub downloads: Vec<LanguageDownloads>,
    /// Extra content
    #[serde(default)]
    pub extras: Vec<ExtraFile>,
}

/// A catalogue row as returned by the metadata store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Game id
    pub id: GameId,
    /// Game title
    pub title: String,
    /// Unparsed installer metadata (store JSON)
    pub raw_metadata: String,
}

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("fr", "français"),
    ("de", "Deutsch"),
    ("es", "español"),
    ("it", "italiano"),
    ("ru", "русский"),
    ("pl", "polski"),
    ("pt-BR", "Português do Brasil"),
    ("zh-Hans", "中文(简体)"),
    ("ja", "日本語"),
    ("ko", "한국어"),
];

/// Store language name for a short code, e.g. `"de"` → `"Deutsch"`
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// Accept either a short code or a store language name
pub fn resolve_language(language: &str) -> String {
    language_name(language)
        .map(str::to_string)
        .unwrap_or_else(|| language.to_string())
}
