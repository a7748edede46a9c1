//! Shared HTTP plumbing

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{CollabError, CollabResult};

/// Error body shapes returned by the collaborators.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

pub(crate) fn build_client(timeout: Duration) -> CollabResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub(crate) fn normalize_base(base_url: &str) -> CollabResult<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(CollabError::Config(format!(
            "base URL must be http(s), got '{}'",
            base_url
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn with_auth(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Fail on non-2xx, extracting the collaborator's error message when present.
pub(crate) async fn check_status(response: Response) -> CollabResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        Err(CollabError::NotFound(message))
    } else {
        Err(CollabError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> CollabResult<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| CollabError::InvalidResponse(e.to_string()))
}
