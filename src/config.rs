use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{PreprocessError, Result};

/// Preprocessor options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessOptions {
    /// Utility compiler configuration, inline or as a path to a config file
    pub config: Option<CompilerConfigSource>,

    /// Replace static class lists with one compiled class name
    pub compile: bool,

    /// Prefix for compiled class names
    pub prefix: String,

    /// Bundle destination. When set, styles are collected into this file
    /// instead of being injected into each component.
    pub bundle: Option<PathBuf>,

    /// Wrap preflight rules in `:global(...)` when injecting
    pub global_preflight: bool,

    /// Wrap utility rules in `:global(...)` when injecting
    pub global_utility: bool,

    /// Development mode: base rules are re-emitted on every pass
    pub dev: bool,

    /// Derive compiled class names from a content hash
    pub hash_class_names: bool,

    /// Minify injected stylesheets
    pub minify: bool,

    /// Report per-file diagnostics (unresolved classes, rule counts) at info level
    pub debug: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            config: None,
            compile: true,
            prefix: "windi-".to_string(),
            bundle: None,
            global_preflight: true,
            global_utility: true,
            dev: false,
            hash_class_names: true,
            minify: false,
            debug: false,
        }
    }
}

/// Either an inline compiler configuration or a path to one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompilerConfigSource {
    Path(PathBuf),
    Inline(CompilerConfig),
}

/// Configuration handed to the utility compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Emit base/reset rules
    pub preflight: bool,

    /// Variant names accepted as directive attributes in addition to the built-in ones
    pub variants: Vec<String>,

    /// Recognize attributify attributes
    pub attributify: bool,

    /// Attribute names never treated as attributify utilities
    pub exclude_attributes: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            preflight: true,
            variants: Vec::new(),
            attributify: true,
            exclude_attributes: Vec::new(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PreprocessError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        serde_yaml::from_str(&content)
            .map_err(|e| PreprocessError::ConfigError {
                message: format!("Failed to parse YAML config: {}", e),
            })
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PreprocessError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        serde_json::from_str(&content)
            .map_err(|e| PreprocessError::ConfigError {
                message: format!("Failed to parse JSON config: {}", e),
            })
    }

    /// Load configuration from a file (auto-detect format)
    pub fn from_file(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(PreprocessError::ConfigError {
                message: format!(
                    "Unsupported config file format: {}. Use .yaml, .yml, or .json",
                    path.display()
                ),
            }),
        }
    }

    /// Layer `other` on top: variant and deny-list entries are added, and
    /// either side can switch `preflight` or `attributify` off.
    pub fn merge(mut self, other: Self) -> Self {
        for variant in other.variants {
            if !self.variants.contains(&variant) {
                self.variants.push(variant);
            }
        }
        for attribute in other.exclude_attributes {
            if !self.exclude_attributes.contains(&attribute) {
                self.exclude_attributes.push(attribute);
            }
        }
        self.preflight &= other.preflight;
        self.attributify &= other.attributify;
        self
    }
}

impl PreprocessOptions {
    /// Load options from a file (auto-detect format)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PreprocessError::ConfigError {
                message: format!("Failed to read options file {}: {}", path.display(), e),
            })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| PreprocessError::ConfigError {
                    message: format!("Failed to parse YAML options: {}", e),
                }),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| PreprocessError::ConfigError {
                    message: format!("Failed to parse JSON options: {}", e),
                }),
            _ => Err(PreprocessError::ConfigError {
                message: format!(
                    "Unsupported options file format: {}. Use .yaml, .yml, or .json",
                    path.display()
                ),
            }),
        }
    }

    /// Resolve the compiler configuration, reading it from disk when given as a path
    pub fn compiler_config(&self) -> Result<CompilerConfig> {
        match &self.config {
            None => Ok(CompilerConfig::default()),
            Some(CompilerConfigSource::Inline(config)) => Ok(config.clone()),
            Some(CompilerConfigSource::Path(path)) => CompilerConfig::from_file(path),
        }
    }

    /// Bundle mode collects every file's styles into one shared output
    pub fn is_bundle(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.compile && self.prefix.is_empty() {
            return Err("A class prefix is required when compilation is enabled".to_string());
        }
        if self.prefix.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
            return Err(format!("Invalid class prefix '{}'", self.prefix));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn test_default_options() {
        let options = PreprocessOptions::default();
        assert!(options.compile);
        assert_eq!(options.prefix, "windi-");
        assert!(options.global_preflight);
        assert!(options.global_utility);
        assert!(!options.is_bundle());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_yaml_config_loading() {
        let yaml_content = r##"
preflight: false
variants:
  - "print"
attributify: true
excludeAttributes:
  - "tooltip"
"##;

        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(yaml_content.as_bytes()).unwrap();

        let config = CompilerConfig::from_yaml_file(file.path()).unwrap();
        assert!(!config.preflight);
        assert_eq!(config.variants, vec!["print".to_string()]);
        assert_eq!(config.exclude_attributes, vec!["tooltip".to_string()]);
    }

    #[test]
    fn test_options_with_config_path() {
        let mut config_file = NamedTempFile::with_suffix(".json").unwrap();
        config_file.write_all(br#"{"attributify": false}"#).unwrap();

        let json = format!(
            r#"{{"config": {:?}, "compile": false, "bundle": "dist/bundle.css", "globalUtility": false}}"#,
            config_file.path().display().to_string()
        );
        let mut options_file = NamedTempFile::with_suffix(".json").unwrap();
        options_file.write_all(json.as_bytes()).unwrap();

        let options = PreprocessOptions::from_file(options_file.path()).unwrap();
        assert!(!options.compile);
        assert!(options.is_bundle());
        assert!(!options.global_utility);
        assert!(options.global_preflight);

        let config = options.compiler_config().unwrap();
        assert!(!config.attributify);
        assert!(config.preflight);
    }

    #[test]
    fn test_inline_config() {
        let options: PreprocessOptions =
            serde_json::from_str(r#"{"config": {"variants": ["landscape"]}, "prefix": "w-"}"#).unwrap();
        let config = options.compiler_config().unwrap();
        assert_eq!(config.variants, vec!["landscape".to_string()]);
        assert_eq!(options.prefix, "w-");
    }

    #[test]
    fn test_unsupported_config_extension() {
        let err = CompilerConfig::from_file(Path::new("windi.config.toml")).unwrap_err();
        assert!(err.to_string().contains("Unsupported config file format"));
    }

    #[test]
    fn test_config_merge() {
        let mut base = CompilerConfig::default();
        base.variants.push("print".to_string());

        let mut other = CompilerConfig::default();
        other.variants = vec!["print".to_string(), "landscape".to_string()];
        other.preflight = false;

        let merged = base.merge(other);
        assert_eq!(merged.variants, vec!["print".to_string(), "landscape".to_string()]);
        assert!(!merged.preflight);
        assert!(merged.attributify);

        // an enabled layer does not switch a disabled feature back on
        let off = CompilerConfig {
            attributify: false,
            ..CompilerConfig::default()
        };
        assert!(!off.merge(CompilerConfig::default()).attributify);
    }

    #[test]
    fn test_invalid_prefix() {
        let mut options = PreprocessOptions::default();
        options.prefix = String::new();
        assert!(options.validate().is_err());
        options.compile = false;
        assert!(options.validate().is_ok());
        options.prefix = "a b".to_string();
        assert!(options.validate().is_err());
    }
}
