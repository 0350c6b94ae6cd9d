//! HTTP client for the validation endpoint.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use eyre::{eyre, WrapErr};
use factorlock_core::{validate_path, Factor, RequestContext, ValidationRequest, ValidationResponse};
use tracing::debug;

/// Builds the request body for a captured sample stored at `path`.
///
/// Proximity samples are JSON device identifiers; every other factor is sent
/// as a base64 data URI.
pub fn build_request(
    factor: Factor,
    path: &Path,
    context: RequestContext,
) -> eyre::Result<ValidationRequest> {
    let bytes =
        std::fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;
    if factor == Factor::Proximity {
        let info = serde_json::from_slice(&bytes)
            .wrap_err("proximity sample must be a JSON object of device identifiers")?;
        return Ok(ValidationRequest::new("", context).with_proximity_info(info));
    }
    let data_uri = format!(
        "data:{};base64,{}",
        media_type(factor, path),
        STANDARD.encode(bytes)
    );
    Ok(ValidationRequest::new(data_uri, context))
}

fn media_type(factor: Factor, path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match (factor, extension.as_deref()) {
        (Factor::Voice, Some("webm")) => "audio/webm",
        (Factor::Voice, Some("ogg")) => "audio/ogg",
        (Factor::Voice, _) => "audio/wav",
        (_, Some("png")) => "image/png",
        _ => "image/jpeg",
    }
}

/// Client for `POST /biometrics/api/validate/<factor>`.
#[derive(Debug, Clone)]
pub struct ValidationClient {
    http: reqwest::Client,
    server: String,
}

impl ValidationClient {
    /// Client for the server at `server` (scheme and host, no trailing path).
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: server.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submits `request` for `factor` and decodes the verdict.
    ///
    /// Rejections and security violations arrive with 4xx statuses and a JSON
    /// body; those decode like any other response. Only a body that is not a
    /// validation response is an error.
    pub async fn submit(
        &self,
        factor: Factor,
        request: &ValidationRequest,
    ) -> eyre::Result<ValidationResponse> {
        let url = format!("{}{}", self.server, validate_path(factor));
        let mut builder = self.http.post(&url).json(request);
        if let Some(previous) = &request.previous_user_id {
            builder = builder.query(&[("previous_user_id", previous.as_str())]);
        }
        let response = builder
            .send()
            .await
            .wrap_err_with(|| format!("request to {url} failed"))?;
        let status = response.status();
        let body = response.text().await.wrap_err("failed to read response body")?;
        debug!(%status, "validation server answered");
        ValidationResponse::from_json(&body)
            .map_err(|err| eyre!("unexpected response from {url} ({status}): {err}"))
    }
}

#[cfg(test)]
mod tests {
    use factorlock_core::UserId;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_build_request_encodes_data_uri() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"abc").unwrap();

        let request = build_request(Factor::Face, file.path(), RequestContext::default()).unwrap();

        assert_eq!(request.biometric_data, "data:image/png;base64,YWJj");
        assert!(!request.is_second_validation);
        assert!(request.proximity_info.is_none());
    }

    #[test]
    fn test_build_request_reads_proximity_identifiers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"key_proximity_id": "KEY-1"}"#).unwrap();
        let context = RequestContext {
            previous_user_id: Some(UserId::from("4")),
            is_second_validation: true,
        };

        let request = build_request(Factor::Proximity, file.path(), context).unwrap();

        assert_eq!(request.biometric_data, "");
        assert_eq!(
            request.proximity_info,
            Some(serde_json::json!({"key_proximity_id": "KEY-1"}))
        );
        assert_eq!(request.previous_user_id, Some(UserId::from("4")));
    }

    #[test]
    fn test_build_request_rejects_bad_proximity_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        assert!(build_request(Factor::Proximity, file.path(), RequestContext::default()).is_err());
    }

    #[tokio::test]
    async fn test_submit_decodes_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/biometrics/api/validate/voice")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "biometric_data": "data:audio/wav;base64,AA==",
                "is_second_validation": false,
            })))
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "confidence": 0.91, "user": {"id": 9, "name": "Ada"}}"#)
            .create_async()
            .await;
        let request =
            ValidationRequest::new("data:audio/wav;base64,AA==", RequestContext::default());

        let response = ValidationClient::new(server.url())
            .submit(Factor::Voice, &request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.success);
        assert_eq!(response.bundle().unwrap().display_name(), "Ada");
    }

    #[tokio::test]
    async fn test_submit_decodes_forbidden_violation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/biometrics/api/validate/retina")
            .match_query(mockito::Matcher::UrlEncoded(
                "previous_user_id".into(),
                "2".into(),
            ))
            .with_status(403)
            .with_body(
                r#"{"success": false, "security_violation": true, "redirect": "/?security_violation=true"}"#,
            )
            .create_async()
            .await;
        let context = RequestContext {
            previous_user_id: Some(UserId::from("2")),
            is_second_validation: true,
        };
        let request = ValidationRequest::new("data:image/jpeg;base64,AA==", context);

        let response = ValidationClient::new(server.url())
            .submit(Factor::Retina, &request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.security_violation);
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_submit_rejects_non_json_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/biometrics/api/validate/face")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;
        let request =
            ValidationRequest::new("data:image/jpeg;base64,AA==", RequestContext::default());

        let result = ValidationClient::new(server.url())
            .submit(Factor::Face, &request)
            .await;

        assert!(result.is_err());
    }
}
