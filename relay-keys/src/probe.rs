//! Best-effort credential probes against provider "list models" endpoints.
//!
//! Probes never fail: transport and auth problems both downgrade to
//! [`Validity::Invalid`], services without a registered endpoint stay
//! [`Validity::Unknown`].

use serde::Deserialize;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Whether a credential is known to work against its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
    Unknown,
}

/// Auth header shape a provider expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAuth {
    Bearer,
    /// `x-api-key` plus the `anthropic-version` header.
    AnthropicHeaders,
}

/// How a 200 probe body encodes the model list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelListing {
    /// `{"data": [{"id": "..."}]}`
    OpenAi,
    /// `{"models": ["..."]}`
    Anthropic,
    /// The probe response carries no model listing.
    None,
}

/// One provider's read-only probe endpoint.
#[derive(Debug, Clone)]
pub struct ProbeEndpoint {
    pub url: String,
    pub auth: ProbeAuth,
    pub models: ModelListing,
}

/// Probe endpoints keyed by service name.
#[derive(Debug, Clone)]
pub struct ProbeTable {
    endpoints: Vec<(String, ProbeEndpoint)>,
}

impl ProbeTable {
    /// Endpoints for the three well-known providers.
    pub fn well_known() -> Self {
        Self {
            endpoints: vec![
                (
                    "openai".to_string(),
                    ProbeEndpoint {
                        url: "https://api.openai.com/v1/models".to_string(),
                        auth: ProbeAuth::Bearer,
                        models: ModelListing::OpenAi,
                    },
                ),
                (
                    "anthropic".to_string(),
                    ProbeEndpoint {
                        url: "https://api.anthropic.com/v1/models".to_string(),
                        auth: ProbeAuth::AnthropicHeaders,
                        models: ModelListing::Anthropic,
                    },
                ),
                (
                    "huggingface".to_string(),
                    ProbeEndpoint {
                        url: "https://api-inference.huggingface.co/models".to_string(),
                        auth: ProbeAuth::Bearer,
                        models: ModelListing::None,
                    },
                ),
            ],
        }
    }

    /// Table with no endpoints: every service stays `Unknown`.
    pub fn empty() -> Self {
        Self {
            endpoints: Vec::new(),
        }
    }

    pub fn endpoint(&self, service: &str) -> Option<&ProbeEndpoint> {
        self.endpoints
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, endpoint)| endpoint)
    }

    /// Register or replace an endpoint. Tests point this at a stub server.
    pub fn set(&mut self, service: &str, endpoint: ProbeEndpoint) {
        if let Some(slot) = self
            .endpoints
            .iter_mut()
            .find(|(name, _)| name == service)
        {
            slot.1 = endpoint;
        } else {
            self.endpoints.push((service.to_string(), endpoint));
        }
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone)]
pub(crate) struct ProbeOutcome {
    pub(crate) validity: Validity,
    pub(crate) models: Vec<String>,
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(%e, "reqwest client build failed; falling back to default client");
            reqwest::Client::new()
        })
}

#[tracing::instrument(level = "debug", skip(http, api_key))]
pub(crate) async fn probe_service(
    http: &reqwest::Client,
    endpoint: &ProbeEndpoint,
    api_key: &str,
) -> ProbeOutcome {
    let request = match endpoint.auth {
        ProbeAuth::Bearer => http.get(&endpoint.url).bearer_auth(api_key),
        ProbeAuth::AnthropicHeaders => http
            .get(&endpoint.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION),
    };

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(url = %endpoint.url, error = %e, "probe transport failure");
            return ProbeOutcome {
                validity: Validity::Invalid,
                models: Vec::new(),
            };
        }
    };

    if response.status() != reqwest::StatusCode::OK {
        tracing::debug!(url = %endpoint.url, status = %response.status(), "probe rejected");
        return ProbeOutcome {
            validity: Validity::Invalid,
            models: Vec::new(),
        };
    }

    // The key is accepted; the model listing is a bonus and any parse
    // failure leaves it empty.
    let models = match response.text().await {
        Ok(body) => parse_models(endpoint.models, &body),
        Err(_) => Vec::new(),
    };
    ProbeOutcome {
        validity: Validity::Valid,
        models,
    }
}

fn parse_models(listing: ModelListing, body: &str) -> Vec<String> {
    match listing {
        ModelListing::OpenAi => {
            #[derive(Deserialize)]
            struct Listing {
                #[serde(default)]
                data: Vec<Entry>,
            }
            #[derive(Deserialize)]
            struct Entry {
                id: String,
            }
            serde_json::from_str::<Listing>(body)
                .map(|listing| listing.data.into_iter().map(|entry| entry.id).collect())
                .unwrap_or_default()
        }
        ModelListing::Anthropic => {
            #[derive(Deserialize)]
            struct Listing {
                #[serde(default)]
                models: Vec<String>,
            }
            serde_json::from_str::<Listing>(body)
                .map(|listing| listing.models)
                .unwrap_or_default()
        }
        ModelListing::None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_endpoint(url: String, models: ModelListing) -> ProbeEndpoint {
        ProbeEndpoint {
            url,
            auth: ProbeAuth::Bearer,
            models,
        }
    }

    #[tokio::test]
    async fn ok_response_is_valid_with_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body(r#"{"data": [{"id": "gpt-4"}, {"id": "gpt-3.5"}]}"#)
            .create_async()
            .await;

        let endpoint = stub_endpoint(format!("{}/v1/models", server.url()), ModelListing::OpenAi);
        let outcome = probe_service(&http_client(), &endpoint, "sk-test").await;
        assert_eq!(outcome.validity, Validity::Valid);
        assert_eq!(outcome.models, vec!["gpt-4", "gpt-3.5"]);
    }

    #[tokio::test]
    async fn unparseable_body_is_still_valid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let endpoint = stub_endpoint(format!("{}/v1/models", server.url()), ModelListing::OpenAi);
        let outcome = probe_service(&http_client(), &endpoint, "sk-test").await;
        assert_eq!(outcome.validity, Validity::Valid);
        assert!(outcome.models.is_empty());
    }

    #[tokio::test]
    async fn rejected_status_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .with_status(401)
            .with_body(r#"{"error": "bad key"}"#)
            .create_async()
            .await;

        let endpoint = stub_endpoint(format!("{}/v1/models", server.url()), ModelListing::OpenAi);
        let outcome = probe_service(&http_client(), &endpoint, "sk-bad").await;
        assert_eq!(outcome.validity, Validity::Invalid);
        assert!(outcome.models.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_invalid_not_an_error() {
        // Nothing listens here; the connection is refused immediately.
        let endpoint = stub_endpoint(
            "http://127.0.0.1:9/v1/models".to_string(),
            ModelListing::OpenAi,
        );
        let outcome = probe_service(&http_client(), &endpoint, "sk-test").await;
        assert_eq!(outcome.validity, Validity::Invalid);
    }

    #[tokio::test]
    async fn anthropic_auth_headers_and_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_body(r#"{"models": ["claude-3-opus", "claude-3-sonnet"]}"#)
            .create_async()
            .await;

        let endpoint = ProbeEndpoint {
            url: format!("{}/v1/models", server.url()),
            auth: ProbeAuth::AnthropicHeaders,
            models: ModelListing::Anthropic,
        };
        let outcome = probe_service(&http_client(), &endpoint, "sk-ant-test").await;
        assert_eq!(outcome.validity, Validity::Valid);
        assert_eq!(outcome.models, vec!["claude-3-opus", "claude-3-sonnet"]);
    }
}
