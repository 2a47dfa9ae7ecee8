//! Upstream JSON document shapes.
//!
//! Every response is wrapped in a `result` object. Failures are reported
//! inside that object as `{"code": 4xx, "message": "..."}` with a 200
//! status, so decoding checks for that before extracting the payload.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// `GET /stations/{type}s/{line}`
#[derive(Debug, Clone, Deserialize)]
pub struct StationsResult {
    pub stations: Vec<StationDto>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationDto {
    pub name: String,
    pub slug: String,
}

/// `GET /schedules/{type}s/{line}/{station}/{direction}`
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulesResult {
    pub schedules: Vec<ScheduleDto>,
}

/// One next pass: free-text wait (`"3 mn"`, `"Train a quai"`) and destination.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScheduleDto {
    pub message: String,
    pub destination: String,
}

/// `GET /traffic/{type}s/{line}`
///
/// All fields are optional: a partial document still yields a partial report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrafficDto {
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Extract the `result` payload of an upstream document.
pub fn decode<T: DeserializeOwned>(doc: Value) -> Result<T, ApiError> {
    if let Some(code) = doc
        .get("result")
        .and_then(|result| result.get("code"))
        .and_then(Value::as_u64)
        && code >= 400
    {
        let message = doc["result"]
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ApiError::Upstream {
            status: u16::try_from(code).unwrap_or(u16::MAX),
            message,
        });
    }

    serde_json::from_value::<Envelope<T>>(doc.clone())
        .map(|envelope| envelope.result)
        .map_err(|e| ApiError::parse(e, &doc.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_schedules() {
        let doc = json!({
            "result": {
                "schedules": [
                    {"message": "2 mn", "destination": "La Defense"},
                    {"message": "Train a quai", "destination": "La Defense"}
                ]
            },
            "_metadata": {"call": "GET /schedules/metros/1/bastille/A", "version": 4}
        });

        let result: SchedulesResult = decode(doc).unwrap();
        assert_eq!(result.schedules.len(), 2);
        assert_eq!(result.schedules[1].message, "Train a quai");
    }

    #[test]
    fn decode_error_document() {
        let doc = json!({
            "result": {"code": 400, "message": "Invalid line"},
            "_metadata": {"version": 4}
        });

        match decode::<SchedulesResult>(doc) {
            Err(ApiError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid line");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decode_wrong_shape_is_parse_error() {
        let doc = json!({"result": {"stations": "nope"}});
        assert!(matches!(
            decode::<StationsResult>(doc),
            Err(ApiError::Parse { .. })
        ));
    }

    #[test]
    fn decode_missing_envelope_is_parse_error() {
        let doc = json!({"schedules": []});
        assert!(matches!(
            decode::<SchedulesResult>(doc),
            Err(ApiError::Parse { .. })
        ));
    }

    #[test]
    fn decode_partial_traffic() {
        let doc = json!({"result": {"line": "B", "slug": "critical"}});
        let traffic: TrafficDto = decode(doc).unwrap();

        assert_eq!(traffic.slug.as_deref(), Some("critical"));
        assert!(traffic.title.is_none());
        assert!(traffic.message.is_none());
    }
}
