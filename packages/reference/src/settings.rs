//! Startup settings loaded from a TOML file.
//!
//! Every field has a default, so a missing `wildfire_risk.toml` yields a
//! usable [`Settings`] pointing at the conventional `ml_models/` and
//! `data/` locations under the working directory. A file named with
//! `--config` or `WILDFIRE_RISK_CONFIG` must exist. Relative paths inside a settings
//! file resolve against that file's directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ReferenceError;

/// Settings file read when neither `--config` nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "wildfire_risk.toml";

/// Environment variable naming the settings file.
pub const CONFIG_ENV_VAR: &str = "WILDFIRE_RISK_CONFIG";

/// Settings file named by the caller: `explicit` if given, else
/// `WILDFIRE_RISK_CONFIG`. `None` means the implicit
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn requested_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

/// Settings file to read: `explicit` if given, else `WILDFIRE_RISK_CONFIG`,
/// else [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    requested_config_path(explicit).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Top-level service settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Model artifact locations.
    pub models: ModelPaths,
    /// Lookup table locations.
    pub data: DataPaths,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind (overridden by `BIND_ADDR`).
    pub bind_addr: String,
    /// Port to bind (overridden by `PORT`).
    pub port: u16,
    /// Allowed CORS origins. Empty means permissive.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

/// Locations of the exported model artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    /// Community-level neural network.
    pub nn_community: PathBuf,
    /// County-level neural network.
    pub nn_county: PathBuf,
    /// State-level random forest.
    pub rf_states: PathBuf,
    /// County-level random forest.
    pub rf_counties: PathBuf,
    /// Community-level random forest.
    pub rf_communities: PathBuf,
    /// Blend and aggregation weights JSON.
    pub blend_weights: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            nn_community: PathBuf::from("ml_models/community_nn.json"),
            nn_county: PathBuf::from("ml_models/county_nn.json"),
            rf_states: PathBuf::from("ml_models/rf_states.json"),
            rf_counties: PathBuf::from("ml_models/rf_counties.json"),
            rf_communities: PathBuf::from("ml_models/rf_communities.json"),
            blend_weights: PathBuf::from("ml_models/meta_estimator_weights.json"),
        }
    }
}

/// Locations of the lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Directory holding `States.csv`, `Counties.csv`, and `Communities.csv`.
    pub wrc_tables: PathBuf,
    /// Community coordinates CSV used for county maps.
    pub community_coordinates: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            wrc_tables: PathBuf::from("data/wrc"),
            community_coordinates: PathBuf::from("data/communities_with_lat_lng.csv"),
        }
    }
}

impl Settings {
    /// Loads settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::MissingFile`] if `path` does not exist, or
    /// another error if it cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        if !path.exists() {
            return Err(ReferenceError::MissingFile {
                kind: "Settings file",
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::parse(&contents).map_err(|source| ReferenceError::Settings {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            settings.resolve_relative_to(base);
        }

        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Like [`Self::load`], but a missing file yields the defaults.
    fn load_or_default(path: &Path) -> Result<Self, ReferenceError> {
        if path.exists() {
            return Self::load(path);
        }
        log::warn!(
            "Settings file {} not found, using defaults",
            path.display()
        );
        Ok(Self::default())
    }

    /// Loads settings from `explicit` if given, otherwise from
    /// `WILDFIRE_RISK_CONFIG`, otherwise from [`DEFAULT_CONFIG_PATH`], and
    /// applies `BIND_ADDR`/`PORT` overrides. Only the implicit default file
    /// may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::MissingFile`] if an explicitly named file
    /// does not exist, or another error if the file is invalid.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ReferenceError> {
        let mut settings = match requested_config_path(explicit) {
            Some(path) => Self::load(&path)?,
            None => Self::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Parses a TOML settings document without resolving paths.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the document is malformed.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Applies `BIND_ADDR` and `PORT` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind_addr) = std::env::var("BIND_ADDR") {
            self.server.bind_addr = bind_addr;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Rewrites every relative path to be relative to `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.models.nn_community);
        resolve(&mut self.models.nn_county);
        resolve(&mut self.models.rf_states);
        resolve(&mut self.models.rf_counties);
        resolve(&mut self.models.rf_communities);
        resolve(&mut self.models.blend_weights);
        resolve(&mut self.data.wrc_tables);
        resolve(&mut self.data.community_coordinates);
    }
}
