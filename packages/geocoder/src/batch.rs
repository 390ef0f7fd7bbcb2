//! Batch geocoding of the communities in a set of target counties.
//!
//! Reads `Communities.csv`, keeps the rows whose `COUNTYNAME`/`STUSPS`
//! match a [`TargetCounty`], resolves each row's `NAME` (e.g.
//! `"Austin, TX"`) with Nominatim, and merges the results into the
//! community coordinates table the predictor loads for county maps.
//! Communities Nominatim cannot resolve are logged and left out of the
//! output.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use wildfire_risk_reference::tables::{
    COORD_COMMUNITY_COLUMN, COORD_COUNTY_COLUMN, COORD_LATITUDE_COLUMN, COORD_LONGITUDE_COLUMN,
    COORD_STATE_COLUMN, CoordinateRow, CoordinateTable, NAME_COLUMN, STATE_ABBR_COLUMN,
};

use crate::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_NOMINATIM_URL, DEFAULT_RATE_LIMIT_MS, GeocodeError,
    TargetCounty, USER_AGENT, nominatim,
};

/// Column of `Communities.csv` holding the bare county name.
pub const COUNTY_NAME_COLUMN: &str = "COUNTYNAME";

/// Per-request timeout for Nominatim calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One row of the communities table, as far as the geocoder cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityRecord {
    /// Full community name used as the geocoding query (e.g. `"Austin, TX"`).
    pub name: String,
    /// Bare county name (e.g. `"Travis"`).
    pub county: String,
    /// State abbreviation.
    pub state: String,
}

impl CommunityRecord {
    /// The community name without its state suffix: everything before the
    /// first comma of [`Self::name`], trimmed.
    #[must_use]
    pub fn community(&self) -> &str {
        self.name
            .split_once(',')
            .map_or(self.name.as_str(), |(community, _)| community)
            .trim()
    }
}

/// Knobs for a geocoding run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Nominatim search endpoint.
    pub base_url: String,
    /// Minimum delay between requests.
    pub rate_limit: Duration,
    /// Attempts per community before giving up on it.
    pub max_attempts: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            rate_limit: Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Outcome of a geocoding run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Communities selected for geocoding.
    pub requested: usize,
    /// Resolved communities, in input order.
    pub resolved: Vec<CoordinateRow>,
    /// Full names of the communities that could not be resolved.
    pub unresolved: Vec<String>,
}

/// Reads the communities table from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read, or lacks the
/// `NAME`, `COUNTYNAME`, or `STUSPS` column.
pub fn read_communities(path: &Path) -> Result<Vec<CommunityRecord>, GeocodeError> {
    let file = std::fs::File::open(path).map_err(|source| GeocodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    communities_from_reader(path, file)
}

/// Parses the communities table from CSV text. `path` only labels errors.
///
/// # Errors
///
/// Returns an error if the header cannot be read or lacks a required
/// column.
pub fn communities_from_reader(
    path: &Path,
    reader: impl Read,
) -> Result<Vec<CommunityRecord>, GeocodeError> {
    let csv_error = |source| GeocodeError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers().map_err(csv_error)?.clone();

    let required = [NAME_COLUMN, COUNTY_NAME_COLUMN, STATE_ABBR_COLUMN];
    let positions = required.map(|column| headers.iter().position(|h| h == column));
    let missing: Vec<String> = required
        .iter()
        .zip(positions)
        .filter(|(_, pos)| pos.is_none())
        .map(|(column, _)| (*column).to_string())
        .collect();
    let [Some(name_pos), Some(county_pos), Some(state_pos)] = positions else {
        return Err(GeocodeError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    };

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("{}: skipping malformed row: {e}", path.display());
                continue;
            }
        };
        let text = |pos: usize| record.get(pos).unwrap_or_default().trim().to_string();

        let name = text(name_pos);
        if name.is_empty() {
            continue;
        }
        records.push(CommunityRecord {
            name,
            county: text(county_pos),
            state: text(state_pos).to_uppercase(),
        });
    }

    log::debug!("{}: loaded {} communities", path.display(), records.len());
    Ok(records)
}

/// Keeps the records that belong to any of `targets`, in input order.
/// Targets with no communities are logged.
#[must_use]
pub fn select_targets<'a>(
    records: &'a [CommunityRecord],
    targets: &[TargetCounty],
) -> Vec<&'a CommunityRecord> {
    for target in targets {
        let count = records
            .iter()
            .filter(|r| target.matches(&r.county, &r.state))
            .count();
        if count == 0 {
            log::warn!("No communities found for {target}");
        } else {
            log::info!("Found {count} communities in {target}");
        }
    }

    records
        .iter()
        .filter(|r| targets.iter().any(|t| t.matches(&r.county, &r.state)))
        .collect()
}

/// Builds the HTTP client used for Nominatim.
///
/// # Errors
///
/// Returns [`GeocodeError::Http`] if the TLS backend fails to initialize.
pub fn client() -> Result<reqwest::Client, GeocodeError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Geocodes `communities` one at a time, waiting `config.rate_limit`
/// between requests. Failures never abort the run.
pub async fn geocode_communities(
    client: &reqwest::Client,
    config: &BatchConfig,
    communities: &[&CommunityRecord],
) -> BatchSummary {
    let total = communities.len();
    let mut summary = BatchSummary {
        requested: total,
        ..BatchSummary::default()
    };

    for (i, record) in communities.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(config.rate_limit).await;
        }
        log::info!("({}/{total}) Geocoding '{}'", i + 1, record.name);

        match nominatim::geocode_freeform(client, &config.base_url, &record.name, config.max_attempts)
            .await
        {
            Ok(Some(place)) => {
                log::debug!(
                    "  {} -> ({}, {})",
                    place.display_name.as_deref().unwrap_or(&record.name),
                    place.latitude,
                    place.longitude
                );
                summary.resolved.push(CoordinateRow {
                    index: summary.resolved.len(),
                    community: record.community().to_string(),
                    county: record.county.clone(),
                    state: record.state.clone(),
                    latitude: Some(place.latitude),
                    longitude: Some(place.longitude),
                });
            }
            Ok(None) => {
                log::warn!("Could not geocode '{}': no match", record.name);
                summary.unresolved.push(record.name.clone());
            }
            Err(e) => {
                log::warn!("Could not geocode '{}': {e}", record.name);
                summary.unresolved.push(record.name.clone());
            }
        }
    }

    summary
}

/// Writes the community coordinates table to `path`.
///
/// # Errors
///
/// Returns [`GeocodeError::Csv`] if the file cannot be created or written.
pub fn write_coordinates(path: &Path, rows: &[CoordinateRow]) -> Result<(), GeocodeError> {
    let csv_error = |source| GeocodeError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let writer = csv::Writer::from_path(path).map_err(csv_error)?;
    write_rows(writer, rows).map_err(csv_error)?;
    log::info!("Wrote {} coordinates to {}", rows.len(), path.display());
    Ok(())
}

fn write_rows<W: Write>(mut writer: csv::Writer<W>, rows: &[CoordinateRow]) -> csv::Result<()> {
    writer.write_record([
        COORD_COMMUNITY_COLUMN,
        COORD_COUNTY_COLUMN,
        COORD_STATE_COLUMN,
        COORD_LATITUDE_COLUMN,
        COORD_LONGITUDE_COLUMN,
    ])?;

    let cell = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    for row in rows {
        writer.write_record([
            row.community.clone(),
            row.county.clone(),
            row.state.clone(),
            cell(row.latitude),
            cell(row.longitude),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Merges freshly resolved rows into an existing coordinates table.
///
/// An existing row is replaced when a resolved row names the same
/// community, county, and state (compared case-insensitively); every other
/// existing row is kept in place. Resolved rows with no existing
/// counterpart are appended. Row indices are renumbered.
#[must_use]
pub fn merge_coordinates(
    existing: &[CoordinateRow],
    resolved: &[CoordinateRow],
) -> Vec<CoordinateRow> {
    let same_place = |a: &CoordinateRow, b: &CoordinateRow| {
        a.community.eq_ignore_ascii_case(&b.community)
            && a.county.eq_ignore_ascii_case(&b.county)
            && a.state.eq_ignore_ascii_case(&b.state)
    };

    let mut merged: Vec<CoordinateRow> = existing
        .iter()
        .map(|old| {
            resolved
                .iter()
                .find(|new| same_place(old, new))
                .unwrap_or(old)
                .clone()
        })
        .collect();
    merged.extend(
        resolved
            .iter()
            .filter(|new| !existing.iter().any(|old| same_place(old, new)))
            .cloned(),
    );

    for (index, row) in merged.iter_mut().enumerate() {
        row.index = index;
    }
    merged
}

/// Reads `communities_path`, geocodes the communities of `targets`, and
/// merges the resolved coordinates into `output_path` with
/// [`merge_coordinates`]. Rows of other communities already in the table
/// are kept. When nothing resolves, `output_path` is not touched.
///
/// # Errors
///
/// Returns an error if the communities table cannot be read, the HTTP
/// client cannot be built, or the output cannot be written. Individual
/// geocoding failures are not errors.
pub async fn run(
    communities_path: &Path,
    output_path: &Path,
    targets: &[TargetCounty],
    config: &BatchConfig,
) -> Result<BatchSummary, GeocodeError> {
    let records = read_communities(communities_path)?;
    let selected = select_targets(&records, targets);
    log::info!(
        "Geocoding {} communities from {} target counties",
        selected.len(),
        targets.len()
    );

    let summary = if selected.is_empty() {
        BatchSummary::default()
    } else {
        let client = client()?;
        geocode_communities(&client, config, &selected).await
    };

    if summary.resolved.is_empty() {
        log::warn!(
            "Nothing resolved, leaving {} untouched",
            output_path.display()
        );
    } else {
        let existing = if output_path.exists() {
            CoordinateTable::from_path(output_path)?
        } else {
            CoordinateTable::default()
        };
        let merged = merge_coordinates(existing.rows(), &summary.resolved);
        write_coordinates(output_path, &merged)?;
    }

    log::info!(
        "Geocoded {}/{} communities ({} unresolved)",
        summary.resolved.len(),
        summary.requested,
        summary.unresolved.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const COMMUNITIES_CSV: &str = "\
NAME,COUNTYNAME,STUSPS,POP
\"Austin, TX\",Travis,TX,961855
\"Lakeway, TX\",travis ,tx,19000
\"Bastrop, TX\",Bastrop,TX,9000
\"Pasadena, CA\",Los Angeles,CA,138000
,Travis,TX,1
";

    fn records() -> Vec<CommunityRecord> {
        communities_from_reader(&PathBuf::from("Communities.csv"), COMMUNITIES_CSV.as_bytes())
            .unwrap()
    }

    #[test]
    fn reads_communities_and_skips_blank_names() {
        let records = records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].county, "travis");
        assert_eq!(records[1].state, "TX");
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = communities_from_reader(
            &PathBuf::from("Communities.csv"),
            "NAME,STUSPS\n\"Austin, TX\",TX\n".as_bytes(),
        )
        .unwrap_err();
        match err {
            GeocodeError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec![COUNTY_NAME_COLUMN.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn community_is_name_before_first_comma() {
        let record = CommunityRecord {
            name: "Lago Vista, TX".to_string(),
            county: "Travis".to_string(),
            state: "TX".to_string(),
        };
        assert_eq!(record.community(), "Lago Vista");

        let bare = CommunityRecord {
            name: " Manor ".to_string(),
            ..record
        };
        assert_eq!(bare.community(), "Manor");
    }

    #[test]
    fn selects_target_counties_case_insensitively() {
        let records = records();
        let targets = TargetCounty::parse_list("Travis:TX,Los Angeles:CA,Nowhere:XX").unwrap();
        let names: Vec<_> = select_targets(&records, &targets)
            .into_iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["Austin, TX", "Lakeway, TX", "Pasadena, CA"]);
    }

    #[test]
    fn written_table_loads_as_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("communities_with_lat_lng.csv");
        let rows = vec![
            CoordinateRow {
                index: 0,
                community: "Austin".to_string(),
                county: "Travis".to_string(),
                state: "TX".to_string(),
                latitude: Some(30.2672),
                longitude: Some(-97.7431),
            },
            CoordinateRow {
                index: 1,
                community: "Pasadena".to_string(),
                county: "Los Angeles".to_string(),
                state: "CA".to_string(),
                latitude: Some(34.1478),
                longitude: Some(-118.1445),
            },
        ];

        write_coordinates(&path, &rows).unwrap();
        let table = CoordinateTable::from_path(&path).unwrap();

        assert_eq!(table.len(), 2);
        let la = table.rows_for_county("los angeles", "ca");
        assert_eq!(la.len(), 1);
        assert_eq!(*la[0], rows[1]);
    }

    fn coordinate(index: usize, community: &str, county: &str, latitude: f64) -> CoordinateRow {
        CoordinateRow {
            index,
            community: community.to_string(),
            county: county.to_string(),
            state: "TX".to_string(),
            latitude: Some(latitude),
            longitude: Some(-97.0),
        }
    }

    #[test]
    fn merge_replaces_matching_rows_and_keeps_the_rest() {
        let existing = vec![
            coordinate(0, "Bastrop", "Bastrop", 30.11),
            coordinate(1, "Austin", "Travis", 1.0),
        ];
        let resolved = vec![
            coordinate(0, "austin", "TRAVIS", 30.27),
            coordinate(1, "Lakeway", "Travis", 30.36),
        ];

        let merged = merge_coordinates(&existing, &resolved);

        let names: Vec<_> = merged.iter().map(|r| r.community.as_str()).collect();
        assert_eq!(names, ["Bastrop", "austin", "Lakeway"]);
        assert_eq!(merged[0], existing[0]);
        assert_eq!(merged[1].latitude, Some(30.27));
        assert_eq!(
            merged.iter().map(|r| r.index).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[tokio::test]
    async fn run_without_matches_keeps_existing_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Communities.csv");
        let output = dir.path().join("communities_with_lat_lng.csv");
        std::fs::write(&input, COMMUNITIES_CSV).unwrap();
        let existing = vec![coordinate(0, "Bastrop", "Bastrop", 30.11)];
        write_coordinates(&output, &existing).unwrap();

        let targets = TargetCounty::parse_list("Nowhere:XX").unwrap();
        let summary = run(&input, &output, &targets, &BatchConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.requested, 0);
        assert!(summary.resolved.is_empty());
        let table = CoordinateTable::from_path(&output).unwrap();
        assert_eq!(table.rows(), existing.as_slice());
    }

    #[tokio::test]
    async fn run_without_matches_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Communities.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, COMMUNITIES_CSV).unwrap();

        let targets = TargetCounty::parse_list("Nowhere:XX").unwrap();
        run(&input, &output, &targets, &BatchConfig::default())
            .await
            .unwrap();
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            &dir.path().join("missing.csv"),
            &dir.path().join("out.csv"),
            &[],
            &BatchConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GeocodeError::Io { .. }));
    }
}
