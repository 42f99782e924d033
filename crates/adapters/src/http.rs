use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AdapterError;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AdapterError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Sends `body` as JSON and decodes a successful reply. Non-2xx replies keep
/// their body so the caller can see what the provider objected to.
pub(crate) fn send_json<B, R>(
    request: RequestBuilder,
    body: &B,
    timeout: Duration,
) -> Result<R, AdapterError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .map_err(|err| AdapterError::from_send(err, timeout.as_secs()))?;
    let response = check_status(response)?;
    let text = response
        .text()
        .map_err(|err| AdapterError::from_send(err, timeout.as_secs()))?;
    Ok(serde_json::from_str(&text)?)
}

fn check_status(response: Response) -> Result<Response, AdapterError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(AdapterError::HttpStatus { status, body })
}

pub(crate) fn non_empty(text: String) -> Result<String, AdapterError> {
    if text.trim().is_empty() {
        Err(AdapterError::EmptyResponse)
    } else {
        Ok(text)
    }
}
