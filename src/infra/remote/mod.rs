//! HTTP clients for the remote table store and blob bucket.

mod rest;
mod storage;

pub use rest::RestTableStore;
pub use storage::StorageBucket;

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use url::Url;

use crate::config::RemoteSettings;
use crate::infra::error::InfraError;

/// Shared connection to the remote project: base URL, service credentials,
/// and one pooled `reqwest` client.
#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    base: Url,
    service_key: String,
}

impl RemoteClient {
    /// Build a client from resolved settings. Both the project URL and the
    /// service key are required to serve requests.
    pub fn from_settings(settings: &RemoteSettings) -> Result<Self, InfraError> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| InfraError::configuration("remote.url is required"))?;
        let service_key = settings
            .service_role_key
            .as_deref()
            .ok_or_else(|| InfraError::configuration("remote.service_role_key is required"))?;

        Self::new(
            url,
            service_key,
            settings.connect_timeout,
            settings.read_timeout,
        )
    }

    pub fn new(
        url: &str,
        service_key: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, InfraError> {
        let base = Url::parse(url)
            .map_err(|err| InfraError::configuration(format!("invalid remote.url `{url}`: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "remote.url `{url}` cannot carry a path"
            )));
        }

        let http = Client::builder()
            .user_agent(Self::user_agent())
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            http,
            base,
            service_key: service_key.to_string(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("shieldforge/", env!("CARGO_PKG_VERSION"))
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Option<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().ok()?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Some(url)
    }

    /// Start a request carrying the service credentials.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}
