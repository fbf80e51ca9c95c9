use crate::registry::Session;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata for the generated manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Version of the manifest format
    pub version: String,

    /// Timestamp when the manifest was generated
    pub generated_at: DateTime<Utc>,

    /// Number of files processed
    pub files_processed: usize,

    /// Whether static class lists were compiled into single names
    pub compiled: bool,

    /// Build mode (development or production)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_mode: Option<String>,

    /// Bundle file, when running in bundle mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    /// Preprocessor version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessor_version: Option<String>,
}

/// What the session knows about one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFileInfo {
    /// Tag names this file owns
    pub tags: Vec<String>,

    /// Number of rules in the file's composed stylesheet
    pub rules: usize,

    /// Whether base rules were emitted for the file
    pub preflight: bool,
}

/// Diagnostics snapshot of a preprocessing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub metadata: ManifestMetadata,

    /// Per-file information, in processing order
    pub files: IndexMap<String, ManifestFileInfo>,

    /// Tag name → owning file
    pub tag_owners: IndexMap<String, String>,

    /// Tokens the compiler could not resolve
    pub ignored_classes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ManifestStatistics>,
}

/// Output statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestStatistics {
    /// Total size of generated CSS in bytes
    pub css_size_bytes: usize,

    /// Processing time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    /// Files with the most rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_files: Option<Vec<FileRules>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRules {
    pub file: String,
    pub rules: usize,
}

impl Manifest {
    /// Create a new manifest with default metadata
    pub fn new() -> Self {
        Self {
            metadata: ManifestMetadata {
                version: "1.0.0".to_string(),
                generated_at: Utc::now(),
                files_processed: 0,
                compiled: false,
                build_mode: None,
                bundle: None,
                preprocessor_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            files: IndexMap::new(),
            tag_owners: IndexMap::new(),
            ignored_classes: Vec::new(),
            statistics: None,
        }
    }

    /// Snapshot registry state
    pub fn from_session(session: &Session) -> Self {
        let mut manifest = Self::new();
        for (file, entry) in session.files() {
            manifest.files.insert(
                file.clone(),
                ManifestFileInfo {
                    tags: session.owned_tags(file).into_iter().collect(),
                    rules: entry.stylesheet.len(),
                    preflight: entry.preflight_emitted,
                },
            );
        }
        manifest.tag_owners = session.tag_owners().clone();
        manifest.ignored_classes = session.ignored().iter().cloned().collect();
        manifest.metadata.files_processed = manifest.files.len();
        manifest
    }

    /// Calculate and set statistics
    pub fn calculate_statistics(&mut self, css_size: usize, processing_time_ms: Option<u64>) {
        let mut by_rules: Vec<FileRules> = self
            .files
            .iter()
            .map(|(file, info)| FileRules {
                file: file.clone(),
                rules: info.rules,
            })
            .collect();
        by_rules.sort_by(|a, b| b.rules.cmp(&a.rules));
        by_rules.truncate(10);

        self.statistics = Some(ManifestStatistics {
            css_size_bytes: css_size,
            processing_time_ms,
            largest_files: Some(by_rules),
        });
    }

    /// Convert manifest to JSON value
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Convert manifest to pretty JSON string
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builder pattern for creating manifests
pub struct ManifestBuilder {
    manifest: Manifest,
    start_time: Option<std::time::Instant>,
}

impl ManifestBuilder {
    pub fn from_session(session: &Session) -> Self {
        Self {
            manifest: Manifest::from_session(session),
            start_time: Some(std::time::Instant::now()),
        }
    }

    /// Reuse an existing start time, e.g. the start of the whole run
    pub fn started_at(mut self, start: std::time::Instant) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_build_mode(mut self, dev: bool) -> Self {
        self.manifest.metadata.build_mode =
            Some(if dev { "development" } else { "production" }.to_string());
        self
    }

    pub fn with_compilation(mut self, compiled: bool) -> Self {
        self.manifest.metadata.compiled = compiled;
        self
    }

    pub fn with_bundle(mut self, bundle: Option<String>) -> Self {
        self.manifest.metadata.bundle = bundle;
        self
    }

    /// Build the final manifest
    pub fn build(mut self, css_size: usize) -> Manifest {
        let processing_time = self.start_time.map(|start| start.elapsed().as_millis() as u64);
        self.manifest.calculate_statistics(css_size, processing_time);
        self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::{Declaration, Style, StyleSheet};

    fn session() -> Session {
        let mut session = Session::new();
        session.register_tags("A.svelte", ["div", "p"]);
        session.register_tags("B.svelte", ["div", "span"]);
        session.set_stylesheet(
            "A.svelte",
            StyleSheet::from_styles(vec![Style::new(".a", vec![Declaration::new("color", "red")])]),
        );
        session.mark_seen("B.svelte");
        session.record_ignored(vec!["card".to_string()]);
        session
    }

    #[test]
    fn test_manifest_from_session() {
        let manifest = Manifest::from_session(&session());
        assert_eq!(manifest.metadata.files_processed, 2);
        assert_eq!(manifest.files["A.svelte"].tags, vec!["div", "p"]);
        assert_eq!(manifest.files["A.svelte"].rules, 1);
        assert_eq!(manifest.files["B.svelte"].tags, vec!["span"]);
        assert_eq!(manifest.tag_owners["div"], "A.svelte");
        assert_eq!(manifest.ignored_classes, vec!["card"]);
    }

    #[test]
    fn test_manifest_builder() {
        let manifest = ManifestBuilder::from_session(&session())
            .with_build_mode(false)
            .with_compilation(true)
            .with_bundle(Some("bundle.css".to_string()))
            .build(120);

        assert_eq!(manifest.metadata.build_mode.as_deref(), Some("production"));
        assert!(manifest.metadata.compiled);
        let stats = manifest.statistics.as_ref().unwrap();
        assert_eq!(stats.css_size_bytes, 120);
        assert_eq!(stats.largest_files.as_ref().unwrap()[0].file, "A.svelte");
    }

    #[test]
    fn test_manifest_serialization() {
        let json = ManifestBuilder::from_session(&session()).build(0).to_pretty_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tag_owners"]["span"], "B.svelte");
        assert!(value["metadata"]["generated_at"].is_string());
        assert!(value["metadata"].get("bundle").is_none());
    }
}
