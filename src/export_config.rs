use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

pub const ARTIFACT_EXTENSION: &str = "ino";

/// What to do when the renamed artifact is already present in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Remove the old artifact and put the fresh copy in its place.
    #[default]
    Replace,
    /// Refuse to touch an existing artifact.
    Fail,
}

/// Built-in destination layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    /// `ino/jarvis-light-switch.ino`
    Ino,
    /// `jarvis-light-switch-ino/jarvis-light-switch.ino`
    Sketch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub source_relative_path: PathBuf,
    pub destination_dir_name: String,
    pub output_file_name: String,
    pub overwrite: OverwritePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            source_relative_path: PathBuf::from("src").join("main.cpp"),
            destination_dir_name: "ino".to_string(),
            output_file_name: "jarvis-light-switch".to_string(),
            overwrite: OverwritePolicy::Replace,
        }
    }
}

impl ExportConfig {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Ino => Self::default(),
            Variant::Sketch => Self {
                destination_dir_name: "jarvis-light-switch-ino".to_string(),
                ..Self::default()
            },
        }
    }

    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ExportConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        log::debug!("Loaded export config from {}: {config:?}", config_path.display());
        Ok(config)
    }

    /// Checks that every name stays a single path level below the working directory.
    pub fn validate(&self) -> Result<()> {
        check_single_component("destination_dir_name", &self.destination_dir_name)?;
        check_single_component("output_file_name", &self.output_file_name)?;

        if self.source_relative_path.as_os_str().is_empty() {
            anyhow::bail!("source_relative_path must not be empty");
        }
        if self.source_relative_path.is_absolute() {
            anyhow::bail!(
                "source_relative_path must be relative, got {}",
                self.source_relative_path.display()
            );
        }
        if self.source_relative_path.file_name().is_none() {
            anyhow::bail!(
                "source_relative_path must name a file, got {}",
                self.source_relative_path.display()
            );
        }

        Ok(())
    }

    /// `<output_file_name>.ino`, without doubling an extension the user already wrote.
    pub fn artifact_file_name(&self) -> String {
        let suffix = format!(".{ARTIFACT_EXTENSION}");
        if self.output_file_name.ends_with(&suffix) {
            self.output_file_name.clone()
        } else {
            format!("{}{suffix}", self.output_file_name)
        }
    }
}

fn check_single_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        anyhow::bail!("{field} must not be empty");
    }

    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(()),
        _ => anyhow::bail!("{field} must be a plain name without path separators, got {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_is_ino_variant() {
        let config = ExportConfig::default();
        assert_eq!(config, ExportConfig::for_variant(Variant::Ino));
        assert_eq!(config.destination_dir_name, "ino");
        assert_eq!(config.source_relative_path, Path::new("src/main.cpp"));
        assert_eq!(config.artifact_file_name(), "jarvis-light-switch.ino");
        assert_eq!(config.overwrite, OverwritePolicy::Replace);
    }

    #[test]
    fn sketch_variant_only_changes_destination() {
        let config = ExportConfig::for_variant(Variant::Sketch);
        assert_eq!(config.destination_dir_name, "jarvis-light-switch-ino");
        assert_eq!(config.artifact_file_name(), "jarvis-light-switch.ino");
    }

    #[test]
    fn extension_not_doubled() {
        let config = ExportConfig {
            output_file_name: "blink.ino".to_string(),
            ..ExportConfig::default()
        };
        assert_eq!(config.artifact_file_name(), "blink.ino");
    }

    #[test]
    fn validate_rejects_nested_and_special_names() {
        for bad in ["", ".", "..", "a/b", "a\\b", "/abs"] {
            let config = ExportConfig {
                destination_dir_name: bad.to_string(),
                ..ExportConfig::default()
            };
            assert!(config.validate().is_err(), "accepted destination {bad:?}");

            let config = ExportConfig {
                output_file_name: bad.to_string(),
                ..ExportConfig::default()
            };
            assert!(config.validate().is_err(), "accepted output name {bad:?}");
        }
    }

    #[test]
    fn validate_rejects_absolute_source() {
        let config = ExportConfig {
            source_relative_path: std::env::temp_dir().join("main.cpp"),
            ..ExportConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        fs::write(
            &path,
            r#"{ "destination_dir_name": "out", "overwrite": "fail" }"#,
        )
        .unwrap();

        let config = ExportConfig::load(&path).unwrap();
        assert_eq!(config.destination_dir_name, "out");
        assert_eq!(config.overwrite, OverwritePolicy::Fail);
        assert_eq!(config.output_file_name, "jarvis-light-switch");
    }

    #[test]
    fn load_reports_path_on_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ExportConfig::load(&path).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config file"));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        fs::write(&path, r#"{ "destination_dir_name": "../up" }"#).unwrap();

        let err = ExportConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("destination_dir_name"));
    }

    #[test]
    fn load_rejects_misspelled_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        fs::write(&path, r#"{ "destination_dir": "out" }"#).unwrap();

        let err = ExportConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("destination_dir"));
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(ExportConfig::load(&dir.path().join("nope.json")).is_err());
    }
}
