use crate::{PlayurClientError, Result};
use playur_core::records::flexible_int;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error};

/// Outcome of a request the server understood.
///
/// A structured `success: false` is not an error: the caller decides how to
/// present the message.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Success(Value),
    Failure(String),
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success(_))
    }

    /// Turns a structured failure into [`PlayurClientError::Application`].
    pub fn into_success(self) -> Result<Value> {
        match self {
            ApiResponse::Success(body) => Ok(body),
            ApiResponse::Failure(message) => Err(PlayurClientError::Application(message)),
        }
    }
}

/// Applies the response policy to a fully read body.
///
/// An HTTP error status short-circuits; the body is only inspected for a
/// `message` to report.
pub(crate) fn interpret(status: StatusCode, text: &str) -> Result<ApiResponse> {
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|json| json.get("message").map(message_text))
            .unwrap_or_else(|| text.to_string());
        error!(%status, %message, "server returned an error status");
        return Err(PlayurClientError::ServerError(status, message));
    }

    debug!(body = %text, "server response");

    let json: Value = serde_json::from_str(text).map_err(|e| {
        PlayurClientError::ServerCommunication(format!("JSON Parser Error: {e}"))
    })?;

    if json.is_null() {
        return Ok(ApiResponse::Failure(format!("Unknown error: {text}")));
    }

    if let Some(success) = json.get("success") {
        if !truthy(success) {
            let message = json.get("message").map(message_text).unwrap_or_default();
            return Ok(ApiResponse::Failure(message));
        }
    }

    Ok(ApiResponse::Success(json))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reads `latestBuildID`. A branch without builds reports nothing, which
/// counts as build `0`.
pub(crate) fn latest_build_id(body: &Value) -> Result<i64> {
    match body.get("latestBuildID") {
        None | Some(Value::Null) => Ok(0),
        Some(value) => flexible_int(value).map_err(|e| {
            PlayurClientError::ServerCommunication(format!("Invalid latestBuildID: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_failure_carries_message() {
        let res = interpret(StatusCode::OK, r#"{"success": false, "message": "bad secret"}"#);
        assert_eq!(res.unwrap(), ApiResponse::Failure("bad secret".into()));
    }

    #[test]
    fn success_returns_whole_body() {
        let res = interpret(StatusCode::OK, r#"{"success": true, "latestBuildID": 5}"#).unwrap();
        assert_eq!(
            res,
            ApiResponse::Success(json!({"success": true, "latestBuildID": 5}))
        );
    }

    #[test]
    fn body_without_success_flag_is_success() {
        let res = interpret(StatusCode::OK, r#"{"records": []}"#).unwrap();
        assert!(res.is_success());
    }

    #[test]
    fn unparseable_body_is_fatal() {
        let err = interpret(StatusCode::OK, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, PlayurClientError::ServerCommunication(_)));
    }

    #[test]
    fn null_body_is_unknown_failure() {
        let res = interpret(StatusCode::OK, "null").unwrap();
        assert_eq!(res, ApiResponse::Failure("Unknown error: null".into()));
    }

    #[test]
    fn http_error_short_circuits_with_server_message() {
        let err = interpret(
            StatusCode::FORBIDDEN,
            r#"{"success": false, "message": "no access"}"#,
        )
        .unwrap_err();
        match err {
            PlayurClientError::ServerError(status, message) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(message, "no access");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_error_with_plain_body_reports_body() {
        let err = interpret(StatusCode::INTERNAL_SERVER_ERROR, "fatal").unwrap_err();
        assert!(
            matches!(err, PlayurClientError::ServerError(StatusCode::INTERNAL_SERVER_ERROR, ref m) if m == "fatal")
        );
    }

    #[test]
    fn success_flag_as_string() {
        let res = interpret(StatusCode::OK, r#"{"success": "false", "message": 12}"#).unwrap();
        assert_eq!(res, ApiResponse::Failure("12".into()));
    }

    #[test]
    fn latest_build_id_shapes() {
        assert_eq!(latest_build_id(&json!({"latestBuildID": 5})).unwrap(), 5);
        assert_eq!(latest_build_id(&json!({"latestBuildID": "41"})).unwrap(), 41);
        assert_eq!(latest_build_id(&json!({"latestBuildID": null})).unwrap(), 0);
        assert_eq!(latest_build_id(&json!({})).unwrap(), 0);
        assert!(latest_build_id(&json!({"latestBuildID": "x"})).is_err());
    }
}
