//! CSV lookup tables.
//!
//! The feature workbook's `States`, `Counties`, and `Communities` sheets are
//! read as CSV exports of the same names. Each row is keyed by an entity
//! name and carries the five model features; blank or non-numeric cells are
//! missing values. The community coordinates table lists every community's
//! county, state, and location for county map views.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use wildfire_risk_models::{FEATURE_COLUMNS, FEATURE_COUNT, FeatureVector};

use crate::ReferenceError;

/// File name of the state sheet export.
pub const STATES_FILE: &str = "States.csv";
/// File name of the county sheet export.
pub const COUNTIES_FILE: &str = "Counties.csv";
/// File name of the community sheet export.
pub const COMMUNITIES_FILE: &str = "Communities.csv";

/// Key column of the county and community sheets (e.g. `"Travis County, TX"`).
pub const NAME_COLUMN: &str = "NAME";
/// Key column of the state sheet (two-letter abbreviation).
pub const STATE_ABBR_COLUMN: &str = "STUSPS";

/// Coordinates table column holding the bare community name.
pub const COORD_COMMUNITY_COLUMN: &str = "Community";
/// Coordinates table column holding the bare county name.
pub const COORD_COUNTY_COLUMN: &str = "County";
/// Coordinates table column holding the state abbreviation.
pub const COORD_STATE_COLUMN: &str = "State";
/// Coordinates table latitude column.
pub const COORD_LATITUDE_COLUMN: &str = "LATITUDE";
/// Coordinates table longitude column.
pub const COORD_LONGITUDE_COLUMN: &str = "LONGITUDE";

/// One keyed row of a feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Entity key (e.g. `"Austin, TX"`).
    pub key: String,
    /// Feature cells in [`FEATURE_COLUMNS`] order; `None` where blank.
    pub cells: [Option<f64>; FEATURE_COUNT],
}

impl FeatureRow {
    /// Returns the row's features if every cell is present.
    #[must_use]
    pub fn features(&self) -> Option<FeatureVector> {
        FeatureVector::from_cells(&self.cells)
    }
}

/// A feature table with exact, case-sensitive key lookup.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    name: String,
    rows: Vec<FeatureRow>,
    /// key -> index of the first row with that key
    index: BTreeMap<String, usize>,
}

impl FeatureTable {
    /// Builds a table from already-parsed rows. When keys repeat, the first
    /// row wins.
    #[must_use]
    pub fn from_rows(name: &str, rows: Vec<FeatureRow>) -> Self {
        let mut index = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            index.entry(row.key.clone()).or_insert(i);
        }
        Self {
            name: name.to_string(),
            rows,
            index,
        }
    }

    /// Loads a feature table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or lacks the key
    /// column or any feature column.
    pub fn from_path(path: &Path, key_column: &str) -> Result<Self, ReferenceError> {
        if !path.exists() {
            return Err(ReferenceError::MissingFile {
                kind: "Feature table",
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(&path.display().to_string(), key_column, file)
    }

    /// Parses a feature table from CSV text.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read or lacks the key column
    /// or any feature column.
    pub fn from_reader(
        name: &str,
        key_column: &str,
        reader: impl Read,
    ) -> Result<Self, ReferenceError> {
        let mut csv_reader = csv_reader(reader);
        let headers = read_headers(name, &mut csv_reader)?;

        let mut required = vec![key_column];
        required.extend(FEATURE_COLUMNS);
        let positions = column_positions(name, &headers, &required)?;
        let (key_pos, feature_pos) = positions.split_at(1);

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    log::trace!("{name}: skipping malformed row: {e}");
                    continue;
                }
            };

            let key = record.get(key_pos[0]).unwrap_or_default().trim();
            if key.is_empty() {
                continue;
            }

            let mut cells = [None; FEATURE_COUNT];
            for (cell, pos) in cells.iter_mut().zip(feature_pos) {
                *cell = parse_number(record.get(*pos));
            }

            rows.push(FeatureRow {
                key: key.to_string(),
                cells,
            });
        }

        log::debug!("{name}: loaded {} feature rows", rows.len());
        Ok(Self::from_rows(name, rows))
    }

    /// Looks up a row by exact key.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&FeatureRow> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    /// Iterates the features of every row whose features are all present.
    pub fn complete_features(&self) -> impl Iterator<Item = FeatureVector> + '_ {
        self.rows.iter().filter_map(FeatureRow::features)
    }

    /// Table name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows, including incomplete ones.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row of the community coordinates table.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRow {
    /// Zero-based position of the row in the source table.
    pub index: usize,
    /// Bare community name (e.g. `"Austin"`).
    pub community: String,
    /// Bare county name (e.g. `"Travis"`).
    pub county: String,
    /// State abbreviation.
    pub state: String,
    /// Latitude, if the cell parsed.
    pub latitude: Option<f64>,
    /// Longitude, if the cell parsed.
    pub longitude: Option<f64>,
}

/// The community coordinates table.
#[derive(Debug, Clone, Default)]
pub struct CoordinateTable {
    rows: Vec<CoordinateRow>,
}

impl CoordinateTable {
    /// Wraps already-parsed rows.
    #[must_use]
    pub const fn from_rows(rows: Vec<CoordinateRow>) -> Self {
        Self { rows }
    }

    /// Loads the coordinates table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or lacks a
    /// required column.
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        if !path.exists() {
            return Err(ReferenceError::MissingFile {
                kind: "Community coordinates table",
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(&path.display().to_string(), file)
    }

    /// Parses the coordinates table from CSV text.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read or lacks a required
    /// column.
    pub fn from_reader(name: &str, reader: impl Read) -> Result<Self, ReferenceError> {
        let mut csv_reader = csv_reader(reader);
        let headers = read_headers(name, &mut csv_reader)?;
        let pos = column_positions(
            name,
            &headers,
            &[
                COORD_COMMUNITY_COLUMN,
                COORD_COUNTY_COLUMN,
                COORD_STATE_COLUMN,
                COORD_LATITUDE_COLUMN,
                COORD_LONGITUDE_COLUMN,
            ],
        )?;

        let mut rows = Vec::new();
        for (index, result) in csv_reader.records().enumerate() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    log::trace!("{name}: skipping malformed row: {e}");
                    continue;
                }
            };
            let text = |i: usize| record.get(pos[i]).unwrap_or_default().trim().to_string();

            rows.push(CoordinateRow {
                index,
                community: text(0),
                county: text(1),
                state: text(2),
                latitude: parse_number(record.get(pos[3])),
                longitude: parse_number(record.get(pos[4])),
            });
        }

        log::debug!("{name}: loaded {} coordinate rows", rows.len());
        Ok(Self { rows })
    }

    /// Returns the rows of one county. The county name is compared
    /// case-insensitively, the state after upper-casing; both are trimmed.
    #[must_use]
    pub fn rows_for_county(&self, county: &str, state: &str) -> Vec<&CoordinateRow> {
        let county = county.trim().to_lowercase();
        let state = state.trim().to_uppercase();
        self.rows
            .iter()
            .filter(|row| row.county.to_lowercase() == county && row.state.to_uppercase() == state)
            .collect()
    }

    /// Every row, in table order.
    #[must_use]
    pub fn rows(&self) -> &[CoordinateRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_headers<R: Read>(
    name: &str,
    reader: &mut csv::Reader<R>,
) -> Result<Vec<String>, ReferenceError> {
    reader
        .headers()
        .map(|h| h.iter().map(str::to_string).collect())
        .map_err(|source| ReferenceError::Csv {
            table: name.to_string(),
            source,
        })
}

/// Finds the position of each required column, reporting every missing one.
fn column_positions(
    name: &str,
    headers: &[String],
    required: &[&str],
) -> Result<Vec<usize>, ReferenceError> {
    let mut positions = Vec::with_capacity(required.len());
    let mut missing = Vec::new();

    for column in required {
        match headers.iter().position(|h| h == column) {
            Some(i) => positions.push(i),
            None => missing.push((*column).to_string()),
        }
    }

    if missing.is_empty() {
        Ok(positions)
    } else {
        Err(ReferenceError::MissingColumns {
            table: name.to_string(),
            missing,
            available: headers.to_vec(),
        })
    }
}

/// Parses a numeric cell. Blank, non-numeric, and non-finite cells are
/// missing.
fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMUNITIES_CSV: &str = "\
NAME,STUSPS,POP,TOTAL_BUILDINGS,BUILDINGS_FRACTION_ME,BUILDINGS_FRACTION_IE,BUILDINGS_FRACTION_DE
\"Austin, TX\",TX,961855,310000,0.12,0.30,0.05
\"Leander, TX\",TX,59202,21000,,0.40,0.08
\"Austin, TX\",TX,1,1,1,1,1
\"austin, tx\",TX,2,2,2,2,2
";

    #[test]
    fn parses_rows_and_missing_cells() {
        let table =
            FeatureTable::from_reader("Communities", NAME_COLUMN, COMMUNITIES_CSV.as_bytes())
                .unwrap();
        assert_eq!(table.len(), 4);

        let leander = table.lookup("Leander, TX").unwrap();
        assert_eq!(leander.cells[2], None);
        assert!(leander.features().is_none());
    }

    #[test]
    fn lookup_is_exact_and_first_row_wins() {
        let table =
            FeatureTable::from_reader("Communities", NAME_COLUMN, COMMUNITIES_CSV.as_bytes())
                .unwrap();

        let austin = table.lookup("Austin, TX").unwrap();
        assert_eq!(austin.cells[0], Some(961_855.0));
        assert_eq!(table.lookup("austin, tx").unwrap().cells[0], Some(2.0));
        assert!(table.lookup("AUSTIN, TX").is_none());
        assert!(table.lookup("Austin").is_none());
    }

    #[test]
    fn complete_features_skip_incomplete_rows() {
        let table =
            FeatureTable::from_reader("Communities", NAME_COLUMN, COMMUNITIES_CSV.as_bytes())
                .unwrap();
        assert_eq!(table.complete_features().count(), 3);
    }

    #[test]
    fn missing_feature_column_is_fatal() {
        let csv = "STUSPS,POP,TOTAL_BUILDINGS\nTX,1,2\n";
        let err = FeatureTable::from_reader("States", STATE_ABBR_COLUMN, csv.as_bytes())
            .unwrap_err();
        match err {
            ReferenceError::MissingColumns { missing, .. } => {
                assert_eq!(
                    missing,
                    vec![
                        "BUILDINGS_FRACTION_ME",
                        "BUILDINGS_FRACTION_IE",
                        "BUILDINGS_FRACTION_DE"
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = FeatureTable::from_path(&dir.path().join(STATES_FILE), STATE_ABBR_COLUMN)
            .unwrap_err();
        assert!(matches!(err, ReferenceError::MissingFile { .. }));
    }

    #[test]
    fn coordinate_rows_filter_by_county() {
        let csv = "\
Community,County,State,LATITUDE,LONGITUDE
Austin,Travis,TX,30.2672,-97.7431
Lakeway, travis ,tx,30.3632,-97.9795
Pasadena,Los Angeles,CA,34.1478,-118.1445
Manor,Travis,TX,,-97.55
";
        let table = CoordinateTable::from_reader("coords", csv.as_bytes()).unwrap();
        let travis = table.rows_for_county("TRAVIS", "tx");
        let names: Vec<_> = travis.iter().map(|r| r.community.as_str()).collect();
        assert_eq!(names, vec!["Austin", "Lakeway", "Manor"]);
        assert_eq!(travis[2].index, 3);
        assert_eq!(travis[2].latitude, None);
        assert!(table.rows_for_county("Nowhere", "XX").is_empty());
    }

    #[test]
    fn coordinate_table_requires_columns() {
        let csv = "Community,County,LATITUDE,LONGITUDE\nAustin,Travis,30.2,-97.7\n";
        assert!(matches!(
            CoordinateTable::from_reader("coords", csv.as_bytes()),
            Err(ReferenceError::MissingColumns { .. })
        ));
    }
}
