use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use upstander_engine::{
    ConfigError, PersonaRoster, ScenarioDescription, StudyConfig, StudyLoader,
};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid study configuration in {}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// File-backed study inputs.
#[derive(Debug, Clone)]
pub struct SimAssets {
    pub scenario: PathBuf,
    pub personas: PathBuf,
    pub study: PathBuf,
}

impl SimAssets {
    /// Inputs bundled with this crate under `data/`.
    #[must_use]
    pub fn load_default() -> Self {
        let base = Self::data_root();
        Self {
            scenario: base.join("scenario.json"),
            personas: base.join("personas.json"),
            study: base.join("study.json"),
        }
    }

    #[must_use]
    pub fn with_overrides(
        scenario: Option<PathBuf>,
        personas: Option<PathBuf>,
        study: Option<PathBuf>,
    ) -> Self {
        let defaults = Self::load_default();
        Self {
            scenario: scenario.unwrap_or(defaults.scenario),
            personas: personas.unwrap_or(defaults.personas),
            study: study.unwrap_or(defaults.study),
        }
    }

    fn data_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
    }

    fn read(path: &Path) -> Result<String, AssetError> {
        fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AssetError> {
        let json = Self::read(path)?;
        serde_json::from_str(&json).map_err(|source| AssetError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl StudyLoader for SimAssets {
    type Error = AssetError;

    fn load_scenario(&self) -> Result<ScenarioDescription, Self::Error> {
        Self::parse(&self.scenario)
    }

    fn load_personas(&self) -> Result<PersonaRoster, Self::Error> {
        Self::parse(&self.personas)
    }

    fn load_study(&self) -> Result<StudyConfig, Self::Error> {
        let json = Self::read(&self.study)?;
        StudyConfig::from_json(&json).map_err(|source| AssetError::Config {
            path: self.study.clone(),
            source,
        })
    }
}
