//! HTTP discovery endpoint of a browser started with remote debugging.
//!
//! Wraps reqwest for `/json/version`, `/json/list`, `/json/new`,
//! `/json/activate/{id}` and `/json/close/{id}`.

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DebuggerError, Result};

/// Pause between readiness probes.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Browser and protocol versions reported by `/json/version`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    #[serde(rename = "V8-Version")]
    pub v8_version: String,
    #[serde(rename = "WebKit-Version")]
    pub webkit_version: String,
    /// Browser-wide stream endpoint, when the browser advertises one.
    #[serde(
        rename = "webSocketDebuggerUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub web_socket_debugger_url: Option<String>,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Browser: {}", self.browser)?;
        writeln!(f, "Protocol Version: {}", self.protocol_version)?;
        writeln!(f, "User Agent: {}", self.user_agent)?;
        writeln!(f, "V8 Version: {}", self.v8_version)?;
        writeln!(f, "WebKit Version: {}", self.webkit_version)
    }
}

/// One debuggable target (tab, page, worker, ...) as listed by
/// `/json/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub title: String,
    pub url: String,
    /// Stream endpoint address for this target.
    pub web_socket_debugger_url: String,
    pub devtools_frontend_url: String,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Id: {}", self.id)?;
        writeln!(f, "Type: {}", self.kind)?;
        writeln!(f, "Description: {}", self.description)?;
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Url: {}", self.url)?;
        writeln!(f, "WebSocket Url: {}", self.web_socket_debugger_url)?;
        writeln!(f, "Devtools Url: {}", self.devtools_frontend_url)
    }
}

/// Client for a browser's discovery endpoint.
#[derive(Debug, Clone)]
pub struct Discovery {
    client: Client,
    base_url: String,
}

impl Discovery {
    /// Create a client for `host:port`.
    ///
    /// A full `http://` URL is accepted as well.
    pub fn new(address: &str) -> Self {
        if address.contains("://") {
            Self::with_base_url(address)
        } else {
            Self::with_base_url(&format!("http://{address}"))
        }
    }

    /// Create a client with an explicit base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "discovery request");

        let discovery_error = |source: reqwest::Error| DebuggerError::Discovery {
            url: url.clone(),
            source,
        };

        self.client
            .get(&url)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(discovery_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let resp = self.get(path, query).await?;
        let url = resp.url().to_string();
        resp.json()
            .await
            .map_err(|source| DebuggerError::Discovery { url, source })
    }

    /// Browser and protocol version information.
    pub async fn version(&self) -> Result<Version> {
        self.get_json("/json/version", &[]).await
    }

    /// Open targets, optionally only those of the given kind (e.g. `page`).
    ///
    /// An empty filter returns everything.
    pub async fn tabs(&self, filter: Option<&str>) -> Result<Vec<Target>> {
        let tabs: Vec<Target> = self.get_json("/json/list", &[]).await?;

        Ok(match filter {
            Some(kind) if !kind.is_empty() => {
                tabs.into_iter().filter(|t| t.kind == kind).collect()
            }
            _ => tabs,
        })
    }

    /// Open a new tab, loading `url` if it is not empty.
    pub async fn new_tab(&self, url: &str) -> Result<Target> {
        if url.is_empty() {
            self.get_json("/json/new", &[]).await
        } else {
            self.get_json("/json/new", &[("url", url)]).await
        }
    }

    /// Bring a tab to the foreground.
    pub async fn activate(&self, target: &Target) -> Result<()> {
        self.get(&format!("/json/activate/{}", target.id), &[])
            .await?;
        Ok(())
    }

    /// Close a tab.
    pub async fn close_tab(&self, target: &Target) -> Result<()> {
        self.get(&format!("/json/close/{}", target.id), &[]).await?;
        Ok(())
    }

    /// Poll `/json/version` until the endpoint answers or `timeout` passes.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<Version> {
        let start = Instant::now();

        loop {
            match self.version().await {
                Ok(version) => {
                    tracing::debug!(elapsed = ?start.elapsed(), "discovery endpoint ready");
                    return Ok(version);
                }
                Err(e) => {
                    if start.elapsed() >= timeout {
                        tracing::warn!(error = %e, "discovery endpoint never became ready");
                        return Err(DebuggerError::NotReady {
                            address: self.base_url.clone(),
                            waited: start.elapsed(),
                        });
                    }
                    tracing::trace!(error = %e, "discovery endpoint not ready yet");
                }
            }

            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}
