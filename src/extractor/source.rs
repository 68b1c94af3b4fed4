use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use tracing::{debug, warn};

use crate::errors::{MdbError, Result};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Where page html comes from. `Ok(None)` means the page exists but gave
/// nothing usable; transport failures are errors.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_html(&self, url: &str) -> Result<Option<String>>;
}

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .build()?;
        Ok(HttpSource { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn get_html(&self, url: &str) -> Result<Option<String>> {
        debug!("GET {url}");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("Request to '{url}' failed with status {status}");
            return Ok(None);
        }
        let html = resp.text().await?;
        if html.trim().is_empty() {
            warn!("HTML was empty for url '{url}'");
            return Ok(None);
        }
        Ok(Some(html))
    }
}

/// Serves pages from memory. Urls registered as failing return a transport error.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    pages: HashMap<String, String>,
    failing: Vec<String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn get_html(&self, url: &str) -> Result<Option<String>> {
        if self.failing.iter().any(|u| u == url) {
            return Err(MdbError::Generic(format!("Connection to '{url}' refused")));
        }
        Ok(self.pages.get(url).cloned())
    }
}
