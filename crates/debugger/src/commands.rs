//! Convenience wrappers around [`RemoteDebugger::call`] for the handful of
//! methods the command-line front end uses.

use serde_json::{Value, json};

use crate::error::Result;
use crate::remote::RemoteDebugger;

impl RemoteDebugger {
    /// Load `url` in the connected page
    pub async fn navigate(&self, url: &str) -> Result<Value> {
        self.call("Page.navigate", Some(json!({ "url": url })))
            .await
    }

    /// List the protocol domains the browser supports
    pub async fn get_domains(&self) -> Result<Value> {
        self.call("Schema.getDomains", None).await
    }

    /// Turn notifications for a domain on or off
    pub async fn set_domain_events(&self, domain: &str, enable: bool) -> Result<Value> {
        let method = if enable {
            format!("{domain}.enable")
        } else {
            format!("{domain}.disable")
        };
        self.call(&method, None).await
    }

    pub async fn page_events(&self, enable: bool) -> Result<Value> {
        self.set_domain_events("Page", enable).await
    }

    pub async fn dom_events(&self, enable: bool) -> Result<Value> {
        self.set_domain_events("DOM", enable).await
    }

    pub async fn network_events(&self, enable: bool) -> Result<Value> {
        self.set_domain_events("Network", enable).await
    }

    pub async fn runtime_events(&self, enable: bool) -> Result<Value> {
        self.set_domain_events("Runtime", enable).await
    }
}
