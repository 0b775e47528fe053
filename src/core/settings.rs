/// Layered runtime settings.
///
/// Sources, highest priority first:
/// 1. Command-line overrides
/// 2. `NARRATIVE_*` environment variables (`__` separates nested keys)
/// 3. `narrative.toml` in the working directory
/// 4. Built-in defaults
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::loader::RunMode;
use crate::core::rubric::{Rubric, ScoreComputationError};

pub const SETTINGS_FILE: &str = "narrative.toml";
pub const ENV_PREFIX: &str = "NARRATIVE_";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Batch collects every schema violation; fail-fast stops at the first error.
    #[serde(default)]
    pub run_mode: RunMode,
    /// Root under which `phase-N/` directories already exist.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// RON rubric replacing the built-in work-plan rubric.
    #[serde(default)]
    pub rubric_path: Option<PathBuf>,
    /// Directory of `<doc_type>.ron` template overrides.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Worker threads for per-phase parallelism; rayon's default when unset.
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Command-line values layered above every other source. Unset fields
/// leave the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
}

fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            output_root: default_output_root(),
            rubric_path: None,
            templates_dir: None,
            workers: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        Self::from_figment(Self::figment(Path::new(SETTINGS_FILE)))
    }

    /// Load with an explicit settings file instead of `narrative.toml`.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        Self::from_figment(Self::figment(path))
    }

    /// Load `path` with command-line overrides merged last, validated like
    /// any other source.
    pub fn load_with(path: &Path, overrides: Overrides) -> Result<Self, SettingsError> {
        Self::from_figment(Self::figment(path).merge(Serialized::defaults(overrides)))
    }

    /// The provider chain; public so callers can layer CLI overrides on top.
    pub fn figment(file: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, SettingsError> {
        let settings: Settings = figment.extract()?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.workers == Some(0) {
            return Err(SettingsError::InvalidValue {
                field: "workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The configured rubric, or the built-in work-plan rubric.
    pub fn rubric(&self) -> Result<Rubric, ScoreComputationError> {
        match &self.rubric_path {
            Some(path) => Rubric::load_from_ron(path),
            None => Rubric::work_plan(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load().map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.run_mode, RunMode::Batch);
            Ok(())
        });
    }

    #[test]
    fn toml_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE,
                r#"
run_mode = "fail_fast"
output_root = "docs"
workers = 2
"#,
            )?;
            jail.set_env("NARRATIVE_WORKERS", "8");

            let settings = Settings::load().map_err(|e| e.to_string())?;
            assert_eq!(settings.run_mode, RunMode::FailFast);
            assert_eq!(settings.output_root, PathBuf::from("docs"));
            assert_eq!(settings.workers, Some(8));
            Ok(())
        });
    }

    #[test]
    fn zero_workers_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("NARRATIVE_WORKERS", "0");
            let err = Settings::load().unwrap_err();
            assert!(matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "workers"));
            Ok(())
        });
    }

    #[test]
    fn command_line_overrides_win_and_are_checked() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE, "workers = 2\noutput_root = \"docs\"\n")?;
            jail.set_env("NARRATIVE_WORKERS", "4");
            let file = Path::new(SETTINGS_FILE);

            let settings = Settings::load_with(
                file,
                Overrides {
                    workers: Some(6),
                    output_root: None,
                },
            )
            .map_err(|e| e.to_string())?;
            assert_eq!(settings.workers, Some(6));
            assert_eq!(settings.output_root, PathBuf::from("docs"));

            let untouched = Settings::load_with(file, Overrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(untouched.workers, Some(4));

            let err = Settings::load_with(
                file,
                Overrides {
                    workers: Some(0),
                    output_root: None,
                },
            )
            .unwrap_err();
            assert!(matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "workers"));
            Ok(())
        });
    }

    #[test]
    fn builtin_rubric_by_default() {
        let rubric = Settings::default().rubric().unwrap();
        assert_eq!(rubric.dimensions.len(), 4);
    }
}
