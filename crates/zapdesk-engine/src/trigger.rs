// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the chatbot flow-execution service.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use zapdesk_config::model::AutomationConfig;
use zapdesk_core::{FlowTrigger, FlowTriggerRequest, ZapdeskError};

/// Posts trigger requests as JSON to the configured endpoint.
pub struct HttpFlowTrigger {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl std::fmt::Debug for HttpFlowTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFlowTrigger")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl HttpFlowTrigger {
    pub fn new(url: &str, config: &AutomationConfig) -> Result<Self, ZapdeskError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ZapdeskError::Automation {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            url: url.to_string(),
            token: config.flow_service_token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl FlowTrigger for HttpFlowTrigger {
    async fn trigger(&self, request: FlowTriggerRequest) -> Result<(), ZapdeskError> {
        let mut builder = self.http.post(&self.url).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await.map_err(|e| ZapdeskError::Automation {
            message: format!("flow service unreachable: {e}"),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZapdeskError::Automation {
                message: format!("flow service returned {status}: {}", body.chars().take(200).collect::<String>()),
            });
        }
        debug!(conversation_id = %request.conversation_id, "flow triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> FlowTriggerRequest {
        FlowTriggerRequest {
            conversation_id: "conv-1".into(),
            contact_id: "ct-1".into(),
            message: "Oi".into(),
            connection_id: "cn-1".into(),
            is_new_conversation: true,
        }
    }

    fn config(token: Option<&str>) -> AutomationConfig {
        AutomationConfig {
            flow_service_token: token.map(str::to_string),
            ..AutomationConfig::default()
        }
    }

    #[tokio::test]
    async fn posts_camel_case_body_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute-flow"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "conversationId": "conv-1",
                "isNewConversation": true
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let trigger =
            HttpFlowTrigger::new(&format!("{}/execute-flow", server.uri()), &config(Some("secret")))
                .unwrap();
        trigger.trigger(request()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_is_an_automation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let trigger = HttpFlowTrigger::new(&server.uri(), &config(None)).unwrap();
        let err = trigger.trigger(request()).await.unwrap_err();
        assert!(matches!(err, ZapdeskError::Automation { .. }));
        assert!(err.to_string().contains("503"));
    }
}
