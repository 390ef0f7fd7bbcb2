#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Community geocoder for wildfire risk county maps.
//!
//! Builds the community coordinates table consumed by the predictor's map
//! view. Communities of the requested counties are read from the
//! `Communities.csv` feature table and resolved one at a time with the
//! public Nominatim / OpenStreetMap search endpoint, which allows at most
//! **1 request per second**.
//!
//! See [`batch::run`] for the end-to-end pipeline.

pub mod batch;
pub mod nominatim;
mod retry;

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Public Nominatim search endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Delay between Nominatim requests, in milliseconds.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1100;

/// Attempts per community before it is given up on.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// `User-Agent` sent to Nominatim, which rejects anonymous clients.
pub const USER_AGENT: &str = concat!("wildfire_risk_geocoder/", env!("CARGO_PKG_VERSION"));

/// A geocoded place.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Canonical name returned by the geocoder.
    pub display_name: Option<String>,
}

/// A county whose communities should be geocoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCounty {
    /// Bare county name (e.g. `"Travis"`).
    pub county: String,
    /// Two-letter state abbreviation, upper-cased.
    pub state: String,
}

impl TargetCounty {
    /// Returns `true` if `county`/`state` name this target. Both sides are
    /// trimmed and compared case-insensitively.
    #[must_use]
    pub fn matches(&self, county: &str, state: &str) -> bool {
        self.county.eq_ignore_ascii_case(county.trim())
            && self.state.eq_ignore_ascii_case(state.trim())
    }

    /// Parses a comma-separated list such as `"Travis:TX,Los Angeles:CA"`.
    /// Blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::InvalidTarget`] for the first entry that is
    /// not `County:ST`.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, GeocodeError> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for TargetCounty {
    type Err = GeocodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GeocodeError::InvalidTarget {
            value: s.to_string(),
        };

        let (county, state) = s.split_once(':').ok_or_else(invalid)?;
        let county = county.trim();
        let state = state.trim();

        if county.is_empty() || state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(invalid());
        }

        Ok(Self {
            county: county.to_string(),
            state: state.to_ascii_uppercase(),
        })
    }
}

impl std::fmt::Display for TargetCounty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} County, {}", self.county, self.state)
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The geocoder answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// A target county entry is not `County:ST`.
    #[error("Invalid target county {value:?}, expected County:ST (e.g. Travis:TX)")]
    InvalidTarget {
        /// The rejected entry.
        value: String,
    },

    /// Reading or writing a CSV file failed.
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        /// File being read or written.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The communities table lacks columns the geocoder needs.
    #[error("{} is missing required columns {missing:?}", path.display())]
    MissingColumns {
        /// File being read.
        path: PathBuf,
        /// Columns that were not found.
        missing: Vec<String>,
    },

    /// The existing coordinates table could not be loaded for merging.
    #[error("Existing coordinates table: {0}")]
    Reference(#[from] wildfire_risk_reference::ReferenceError),

    /// A file could not be opened or created.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// File that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
