use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "https://lindat.mff.cuni.cz/services/udpipe/api/process";
const DEFAULT_MODEL: &str = "french";

/// Configuration for the remote dependency parser
#[derive(Debug, Clone)]
pub struct ParserServiceConfig {
    /// Endpoint (from CHAT2ROWS_PARSER_URL)
    pub url: String,
    /// Model name (from CHAT2ROWS_PARSER_MODEL)
    pub model: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl ParserServiceConfig {
    /// Create config from environment variables, falling back to the public UDPipe service
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("CHAT2ROWS_PARSER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            model: std::env::var("CHAT2ROWS_PARSER_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout_secs: 120,
        }
    }

    pub fn new(url: String, model: String) -> Self {
        Self {
            url,
            model,
            timeout_secs: 120,
        }
    }
}

/// Remote parser contract: CoNLL-U in, CoNLL-U with syntactic columns out.
///
/// Errors cover transport failures and non-success responses. Judging
/// whether a successful response is usable is left to the caller.
#[async_trait]
pub trait ParseService: Send + Sync {
    async fn parse(&self, payload: &str) -> Result<String>;

    /// Human-readable service name
    fn name(&self) -> &str;
}

/// UDPipe REST client
pub struct UdpipeClient {
    client: Client,
    config: ParserServiceConfig,
}

impl UdpipeClient {
    pub fn new(config: ParserServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ParseService for UdpipeClient {
    async fn parse(&self, payload: &str) -> Result<String> {
        let request = UdpipeRequest {
            data: payload,
            model: &self.config.model,
            input: "conllu",
            tagger: "",
            parser: "",
        };

        let response = self
            .client
            .post(&self.config.url)
            .form(&request)
            .send()
            .await
            .context("Failed to send request to parser service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Parser service error: {} - {}", status, body.trim());
        }

        let response: UdpipeResponse = response
            .json()
            .await
            .context("Failed to parse parser service response")?;

        Ok(response.result)
    }

    fn name(&self) -> &str {
        "udpipe"
    }
}

#[derive(Debug, Serialize)]
struct UdpipeRequest<'a> {
    data: &'a str,
    model: &'a str,
    input: &'a str,
    /// Present and empty: run the component with default options
    tagger: &'a str,
    parser: &'a str,
}

#[derive(Debug, Deserialize)]
struct UdpipeResponse {
    #[serde(default)]
    result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_form_fields() {
        let request = UdpipeRequest {
            data: "# item_id = 1_u1\n1\toui\t_\t_\t_\t_\t_\t_\t_\t_\n\n",
            model: "french",
            input: "conllu",
            tagger: "",
            parser: "",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["input"], "conllu");
        assert_eq!(value["tagger"], "");
        assert_eq!(value["model"], "french");
    }

    #[test]
    fn test_response_without_result_is_empty() {
        let response: UdpipeResponse = serde_json::from_str(r#"{"model": "french"}"#).unwrap();
        assert!(response.result.is_empty());

        let response: UdpipeResponse =
            serde_json::from_str(r##"{"result": "# item_id = 1_u1\n"}"##).unwrap();
        assert_eq!(response.result, "# item_id = 1_u1\n");
    }
}
