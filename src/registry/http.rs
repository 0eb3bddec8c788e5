//! Thin `reqwest` wrapper shared by the registry plugins.
//!
//! Maps HTTP statuses and transport failures onto [`RegistryError`] so that
//! every plugin classifies transient and permanent failures the same way.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::RegistryError;

/// Shared HTTP client with a per-request timeout and user agent.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Setup(e.to_string()))?;
        Ok(Self { client })
    }

    /// GETs `url` and decodes a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
        tracing::trace!(url, "GET");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response.status())?;
        response.json::<T>().await.map_err(transport_error)
    }

    /// GETs `url` and returns the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, RegistryError> {
        tracing::trace!(url, "GET");
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        check_status(response.status())?;
        response.text().await.map_err(transport_error)
    }

    /// POSTs a JSON body to `url` and decodes a JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, RegistryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::trace!(url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response.status())?;
        response.json::<T>().await.map_err(transport_error)
    }
}

/// Maps a response status to an error, if it is not a success.
pub fn check_status(status: StatusCode) -> Result<(), RegistryError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => RegistryError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => RegistryError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RegistryError::Timeout,
        other => RegistryError::Http { status: other.as_u16() },
    })
}

fn transport_error(error: reqwest::Error) -> RegistryError {
    if error.is_timeout() {
        RegistryError::Timeout
    } else if error.is_decode() {
        RegistryError::Decode(error.to_string())
    } else if let Some(status) = error.status() {
        check_status(status).err().unwrap_or(RegistryError::Network(error.to_string()))
    } else {
        RegistryError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK).is_ok());
        assert_eq!(check_status(StatusCode::NOT_FOUND), Err(RegistryError::NotFound));
        assert_eq!(check_status(StatusCode::TOO_MANY_REQUESTS), Err(RegistryError::RateLimited));
        assert_eq!(check_status(StatusCode::BAD_GATEWAY), Err(RegistryError::Http { status: 502 }));
        assert_eq!(check_status(StatusCode::FORBIDDEN), Err(RegistryError::Http { status: 403 }));
        assert_eq!(check_status(StatusCode::GATEWAY_TIMEOUT), Err(RegistryError::Timeout));
    }
}
