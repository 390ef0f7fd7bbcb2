//! County map enumeration.
//!
//! Every community of a county with usable coordinates is scored and
//! bucketed into a severity. Map views expect a fixed number of markers, so
//! short lists are padded with jittered copies of real points (flagged
//! `synthesized`) and long lists are truncated to [`MAP_POINT_TARGET`].

use rand::Rng;
use wildfire_risk_models::{CommunityMapPoint, CountyMap, LocationQuery, Severity};
use wildfire_risk_reference::tables::CoordinateRow;

use crate::{MapError, PredictMode, Predictor};

/// Number of points a county map returns.
pub const MAP_POINT_TARGET: usize = 55;

/// Full width of the jitter window applied to padding points, in degrees.
/// Each axis moves by at most half of this.
pub const JITTER_DEGREES: f64 = 0.02;

/// Builds the county map for `county`, `state`.
///
/// # Errors
///
/// Returns [`MapError::CountyNotFound`] if no community of the county has
/// finite coordinates.
pub fn county_map<R: Rng + ?Sized>(
    predictor: &Predictor,
    county: &str,
    state: &str,
    rng: &mut R,
) -> Result<CountyMap, MapError> {
    let county = county.trim().to_string();
    let state = state.trim().to_uppercase();

    let rows = predictor
        .bundle()
        .coordinates()
        .rows_for_county(&county, &state);
    log::info!(
        "Found {} communities in {county} County, {state} for map display",
        rows.len()
    );

    let points: Vec<CommunityMapPoint> = rows
        .into_iter()
        .filter_map(|row| score_row(predictor, row, &county, &state))
        .collect();

    if points.is_empty() {
        return Err(MapError::CountyNotFound { county, state });
    }

    let real = points.len();
    let communities = pad_points(points, MAP_POINT_TARGET, rng);
    log::info!(
        "Returning {} map points for {county} County, {state} ({real} real)",
        communities.len()
    );

    Ok(CountyMap {
        county_name: county,
        state_abbr: state,
        communities,
    })
}

fn score_row(
    predictor: &Predictor,
    row: &CoordinateRow,
    county: &str,
    state: &str,
) -> Option<CommunityMapPoint> {
    let (Some(latitude), Some(longitude)) = (row.latitude, row.longitude) else {
        log::warn!(
            "Skipping map row {} ({}): missing or invalid coordinates",
            row.index,
            row.community
        );
        return None;
    };

    // The feature tables are keyed by the coordinate table's spelling, not
    // the caller's.
    let query = LocationQuery::new(&row.community, &row.county, &row.state);
    let bp_prediction = match predictor.predict_with_mode(&query, PredictMode::MapDisplay) {
        Ok(result) => Some(result.bp_prediction),
        Err(e) => {
            log::warn!("No prediction for map point {}: {e}", row.community);
            None
        }
    };
    let severity = Severity::from_score(bp_prediction.unwrap_or(0.0));
    log::trace!(
        "Map point {}: bp={bp_prediction:?} severity={severity}",
        row.community
    );

    Some(CommunityMapPoint {
        id: format!(
            "{county}-{state}-{}-{}",
            row.community.replace(' ', "-"),
            row.index
        ),
        name: format!("{}, {state}", row.community),
        latitude,
        longitude,
        severity,
        bp_prediction,
        synthesized: false,
    })
}

/// Truncates `points` to `target`, or pads them to `target` with jittered
/// copies of randomly chosen points.
///
/// Each copy moves by `(u - 0.5) * JITTER_DEGREES` on each axis, with `u`
/// uniform in `[0, 1)`, and keeps its source's severity. An empty input
/// stays empty.
#[must_use]
pub fn pad_points<R: Rng + ?Sized>(
    mut points: Vec<CommunityMapPoint>,
    target: usize,
    rng: &mut R,
) -> Vec<CommunityMapPoint> {
    if points.len() >= target {
        points.truncate(target);
        return points;
    }
    if points.is_empty() {
        return points;
    }

    let real = points.len();
    log::debug!("Padding {real} map points to {target}");
    for i in 0..target - real {
        let source = &points[rng.gen_range(0..real)];
        let jitter_lat = (rng.gen_range(0.0..1.0) - 0.5) * JITTER_DEGREES;
        let jitter_lng = (rng.gen_range(0.0..1.0) - 0.5) * JITTER_DEGREES;

        let padded = CommunityMapPoint {
            id: format!("{}-sim-{i}", source.id),
            name: format!("{} (sim)", source.name),
            latitude: source.latitude + jitter_lat,
            longitude: source.longitude + jitter_lng,
            severity: source.severity,
            bp_prediction: source.bp_prediction,
            synthesized: true,
        };
        points.push(padded);
    }
    points
}
