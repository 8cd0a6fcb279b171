// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Management REST clients for the self-hosted gateways.
//!
//! Every client wraps an [`ApiClient`]: a `reqwest::Client` with the
//! provider's auth header baked in, plus helpers that turn non-2xx answers
//! into [`ZapdeskError::Provider`].

pub mod baileys;
pub mod evolution;
pub mod waha;
pub mod wppconnect;

use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

use zapdesk_config::ZapdeskConfig;
use zapdesk_core::identity::{AddressKind, is_group_or_broadcast, parse_address};
use zapdesk_core::traits::LiveContact;
use zapdesk_core::{GatewayClient, Provider, ZapdeskError};

pub use baileys::BaileysClient;
pub use evolution::EvolutionClient;
pub use waha::WahaClient;
pub use wppconnect::WppConnectClient;

/// Management calls are interactive; fail fast rather than hang the operator.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the management client for `provider`, if one is configured.
///
/// Meta has no session management API and always yields `None`.
pub fn gateway_client(
    provider: Provider,
    config: &ZapdeskConfig,
) -> Result<Option<Arc<dyn GatewayClient>>, ZapdeskError> {
    let client: Arc<dyn GatewayClient> = match provider {
        Provider::Baileys if config.baileys.api_url.is_some() => {
            Arc::new(BaileysClient::new(&config.baileys)?)
        }
        Provider::Evolution if config.evolution.api_url.is_some() => {
            Arc::new(EvolutionClient::new(&config.evolution)?)
        }
        Provider::Waha if config.waha.api_url.is_some() => Arc::new(WahaClient::new(&config.waha)?),
        Provider::WppConnect if config.wppconnect.api_url.is_some() => {
            Arc::new(WppConnectClient::new(&config.wppconnect)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(client))
}

/// HTTP plumbing shared by the gateway clients.
pub(crate) struct ApiClient {
    provider: Provider,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// `auth` is an optional `(header, secret)` pair sent with every request.
    pub(crate) fn new(
        provider: Provider,
        base_url: Option<&str>,
        auth: Option<(&'static str, &str)>,
    ) -> Result<Self, ZapdeskError> {
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ZapdeskError::Config(format!("{provider}.api_url is not set")))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        if let Some((name, secret)) = auth {
            let mut value = HeaderValue::from_str(secret).map_err(|e| {
                ZapdeskError::Config(format!("invalid {provider} API key header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(name), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ZapdeskError::Provider {
                provider,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            provider,
            http,
            base_url,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path))
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<reqwest::Response, ZapdeskError> {
        let response = request.send().await.map_err(|e| ZapdeskError::Provider {
            provider: self.provider,
            message: format!("{action}: HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        debug!(provider = %self.provider, action, status = %status, "gateway response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ZapdeskError::provider(
            self.provider,
            format!("{action}: gateway returned {status}: {}", truncate(&body, 300)),
        ))
    }

    /// Send and decode a JSON answer.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, ZapdeskError> {
        let response = self.send(request, action).await?;
        let body = response.text().await.map_err(|e| ZapdeskError::Provider {
            provider: self.provider,
            message: format!("{action}: failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| ZapdeskError::Provider {
            provider: self.provider,
            message: format!("{action}: unexpected response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Send and read the answer as text.
    pub(crate) async fn text(&self, request: RequestBuilder, action: &str) -> Result<String, ZapdeskError> {
        let response = self.send(request, action).await?;
        response.text().await.map_err(|e| ZapdeskError::Provider {
            provider: self.provider,
            message: format!("{action}: failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Send and ignore the body.
    pub(crate) async fn empty(&self, request: RequestBuilder, action: &str) -> Result<(), ZapdeskError> {
        self.send(request, action).await.map(|_| ())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Sort a handful of JIDs into phone and LID slots.
pub(crate) fn live_contact(jids: &[Option<&str>], push_name: Option<String>) -> LiveContact {
    let mut contact = LiveContact {
        push_name: push_name.filter(|n| !n.trim().is_empty()),
        ..LiveContact::default()
    };
    for jid in jids.iter().flatten() {
        if is_group_or_broadcast(jid) {
            continue;
        }
        let Some(addr) = parse_address(jid) else { continue };
        match addr.kind {
            AddressKind::Phone if contact.phone.is_none() => contact.phone = Some(addr.id),
            AddressKind::Lid if contact.lid.is_none() => contact.lid = Some(addr.id),
            _ => {}
        }
    }
    contact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_contact_classifies_jids() {
        let c = live_contact(
            &[Some("64081549635686@lid"), Some("5511999998888@s.whatsapp.net"), None],
            Some("Rafa".into()),
        );
        let broadcast = live_contact(&[Some("status@broadcast")], None);
        assert!(broadcast.phone.is_none() && broadcast.lid.is_none());
        assert_eq!(c.phone.as_deref(), Some("5511999998888"));
        assert_eq!(c.lid.as_deref(), Some("64081549635686"));
        assert_eq!(c.push_name.as_deref(), Some("Rafa"));
    }

    #[test]
    fn unconfigured_providers_have_no_client() {
        let config = ZapdeskConfig::default();
        for provider in Provider::ALL {
            assert!(gateway_client(provider, &config).unwrap().is_none());
        }

        let mut config = ZapdeskConfig::default();
        config.waha.api_url = Some("http://waha:3000".into());
        let client = gateway_client(Provider::Waha, &config).unwrap().unwrap();
        assert_eq!(client.provider(), Provider::Waha);
        assert!(gateway_client(Provider::Meta, &config).unwrap().is_none());
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        assert!(matches!(
            ApiClient::new(Provider::Waha, None, None),
            Err(ZapdeskError::Config(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ação", 2), "aç");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
