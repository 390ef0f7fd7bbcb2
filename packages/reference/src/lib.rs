#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference data for wildfire risk scoring.
//!
//! Everything the predictor reads but never writes lives here: startup
//! [`settings`], the per-level feature [`tables`] and the community
//! coordinates table, the [`scaler`]s fitted on those tables, the
//! [`regressor`] artifacts, and the blend/aggregation [`weights`]. All of it
//! is assembled once into a [`ReferenceBundle`], which is immutable and
//! shared across request handlers.
//!
//! Loading is fail-fast: a missing file, missing column, malformed weights
//! file, or invalid model shape aborts startup with a [`ReferenceError`].

pub mod bundle;
pub mod regressor;
pub mod scaler;
pub mod settings;
pub mod tables;
pub mod weights;

use std::path::PathBuf;

use thiserror::Error;

pub use bundle::{LevelEnsemble, LevelReference, ReferenceBundle};
pub use regressor::Regressor;
pub use settings::Settings;

/// Errors raised while loading reference data. All of them are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// A required input file does not exist.
    #[error("{kind} not found at {}", path.display())]
    MissingFile {
        /// What the file was supposed to contain.
        kind: &'static str,
        /// Path that was checked.
        path: PathBuf,
    },

    /// Reading a file failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for [`Settings`].
    #[error("Invalid settings file {}: {source}", path.display())]
    Settings {
        /// Settings file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A CSV table could not be read.
    #[error("CSV error in {table}: {source}")]
    Csv {
        /// Table name or path.
        table: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A table lacks columns the predictor needs.
    #[error("Table {table} is missing required columns {missing:?} (available: {available:?})")]
    MissingColumns {
        /// Table name or path.
        table: String,
        /// Columns that were not found.
        missing: Vec<String>,
        /// Columns the table does have.
        available: Vec<String>,
    },

    /// A table has no row with all features present, so its scaler cannot
    /// be fitted.
    #[error("No complete feature rows in {table} to fit a scaler")]
    EmptyScalerInput {
        /// Table name.
        table: String,
    },

    /// A JSON artifact could not be parsed.
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        /// Artifact path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A model artifact parsed but has an unusable shape.
    #[error("Invalid model {}: {message}", path.display())]
    InvalidModel {
        /// Artifact path.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The weights file parsed but violates a weight invariant.
    #[error("Invalid weights: {message}")]
    InvalidWeights {
        /// Description of the problem.
        message: String,
    },
}

/// Reads a required file to a string, distinguishing "missing" from other
/// I/O failures.
pub(crate) fn read_required(
    kind: &'static str,
    path: &std::path::Path,
) -> Result<String, ReferenceError> {
    if !path.exists() {
        return Err(ReferenceError::MissingFile {
            kind,
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
