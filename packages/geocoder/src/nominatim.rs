//! Nominatim / OpenStreetMap geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use crate::{GeocodeError, GeocodedPlace, retry::send_with_retry};

/// Geocodes a free-form query (e.g. `"Austin, TX"`) using Nominatim,
/// restricted to the United States.
///
/// Transient failures are retried up to `max_attempts` times in total. The
/// caller is responsible for rate limiting between queries.
///
/// # Errors
///
/// Returns [`GeocodeError`] if every attempt fails, the service answers
/// with a client error, or the response cannot be parsed.
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    query: &str,
    max_attempts: u32,
) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let build = || {
        client.get(base_url).query(&[
            ("q", query),
            ("countrycodes", "us"),
            ("format", "jsonv2"),
            ("limit", "1"),
        ])
    };

    let resp = send_with_retry(&build, max_attempts).await?;
    let body: serde_json::Value = resp.json().await?;
    parse_response(&body)
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |field: &str| {
        first[field]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("Missing {field} in Nominatim response"),
            })
    };

    Ok(Some(GeocodedPlace {
        latitude: coordinate("lat")?,
        longitude: coordinate("lon")?,
        display_name: first["display_name"].as_str().map(String::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "30.2711286",
            "lon": "-97.7436995",
            "display_name": "Austin, Travis County, Texas, United States"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - 30.271_128_6).abs() < 1e-6);
        assert!((result.longitude - -97.743_699_5).abs() < 1e-6);
        assert_eq!(
            result.display_name.as_deref(),
            Some("Austin, Travis County, Texas, United States")
        );
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(parse_response(&serde_json::json!({"error": "bad"})).is_err());
        assert!(parse_response(&serde_json::json!([{ "lat": "30.0" }])).is_err());
        assert!(parse_response(&serde_json::json!([{ "lat": 30.0, "lon": -97.0 }])).is_err());
    }
}
