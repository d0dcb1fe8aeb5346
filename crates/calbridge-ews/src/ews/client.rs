//! HTTP client for EWS and autodiscover requests.
//!
//! Every request is an authenticated XML POST. Status handling lives in
//! [`EwsClient::handle_response`]; SOAP-level errors inside a 200 response
//! are left to the caller.

use reqwest::{Client, Response, StatusCode};
use tracing::{trace, warn};
use url::Url;

use crate::remote::{Credentials, TransportError, TransportResult};

use super::auth::authorization;
use super::config::EwsConfig;
use super::soap;

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// HTTP client shared by every session of one backend.
#[derive(Debug)]
pub struct EwsClient {
    client: Client,
    config: EwsConfig,
}

impl EwsClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: EwsConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                TransportError::configuration(format!("Failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self { client, config })
    }

    /// Posts a SOAP envelope to an EWS endpoint.
    pub async fn soap(
        &self,
        endpoint: &Url,
        action: &str,
        envelope: String,
        credentials: &Credentials,
    ) -> TransportResult<String> {
        let soap_action = format!(
            "http://schemas.microsoft.com/exchange/services/2006/messages/{}",
            action
        );
        trace!(action = %action, url = %endpoint, "Sending SOAP request");

        let response = self
            .client
            .post(endpoint.clone())
            .header("Content-Type", XML_CONTENT_TYPE)
            .header("SOAPAction", soap_action)
            .header("Authorization", authorization(credentials))
            .body(envelope)
            .send()
            .await
            .map_err(|e| request_error(e, "SOAP request failed"))?;

        self.handle_response(response).await
    }

    /// Posts a plain XML document, as autodiscover expects.
    pub async fn post_xml(
        &self,
        url: &Url,
        body: String,
        credentials: &Credentials,
    ) -> TransportResult<String> {
        trace!(url = %url, "Sending XML request");

        let response = self
            .client
            .post(url.clone())
            .header("Content-Type", XML_CONTENT_TYPE)
            .header("Authorization", authorization(credentials))
            .body(body)
            .send()
            .await
            .map_err(|e| request_error(e, "Request failed"))?;

        self.handle_response(response).await
    }

    /// Handles the HTTP response and extracts the body.
    async fn handle_response(&self, response: Response) -> TransportResult<String> {
        let status = response.status();
        trace!(status = %status, "Received response");

        match status {
            StatusCode::OK => response.text().await.map_err(|e| {
                TransportError::network(format!("Failed to read response: {}", e)).with_source(e)
            }),
            StatusCode::UNAUTHORIZED => Err(TransportError::authentication(
                "Authentication failed: invalid credentials",
            )),
            StatusCode::FORBIDDEN => Err(TransportError::authorization("Access denied to mailbox")),
            StatusCode::NOT_FOUND => Err(TransportError::not_found("Service endpoint not found")),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(TransportError::rate_limited("Too many requests to server"))
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(soap::parse_fault(&body).unwrap_or_else(|| {
                    TransportError::server(format!("Server error ({}): {}", s, body))
                }))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %s, body = %body, "Unexpected response status");
                Err(TransportError::invalid_response(format!(
                    "Unexpected status {}: {}",
                    s, body
                )))
            }
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EwsConfig {
        &self.config
    }
}

fn request_error(err: reqwest::Error, context: &str) -> TransportError {
    let message = format!("{}: {}", context, err);
    if err.is_builder() {
        TransportError::configuration(message).with_source(err)
    } else {
        TransportError::network(message).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn client_creation() {
        let config = EwsConfig::new().with_timeout(Duration::from_secs(10));
        let client = EwsClient::new(config).unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn insecure_client_creation() {
        assert!(EwsClient::new(EwsConfig::new().with_insecure_tls()).is_ok());
    }
}
