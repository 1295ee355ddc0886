//! Touch-icon downloads over HTTP

use axiom_tabs::TouchIconFetcher;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::redirect::Policy;
use std::time::Duration;

use crate::Result;

/// Icons larger than this are rejected.
const MAX_ICON_BYTES: usize = 512 * 1024;

pub struct HttpTouchIconFetcher {
    client: reqwest::Client,
}

impl HttpTouchIconFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(5))
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (AXIOM)")
            .build()?;
        Ok(Self { client })
    }
}

impl TouchIconFetcher for HttpTouchIconFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>> {
        download_icon(self.client.clone(), url.to_string()).boxed()
    }
}

async fn download_icon(client: reqwest::Client, url: String) -> anyhow::Result<Vec<u8>> {
    let parsed = url::Url::parse(&url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("unsupported touch icon scheme: {}", parsed.scheme());
    }

    let resp = client.get(parsed).send().await?.error_for_status()?;
    if resp
        .content_length()
        .is_some_and(|len| len > MAX_ICON_BYTES as u64)
    {
        anyhow::bail!("touch icon too large");
    }
    let bytes = resp.bytes().await?;
    if bytes.len() > MAX_ICON_BYTES {
        anyhow::bail!("touch icon too large");
    }

    tracing::debug!(url = %url, size = bytes.len(), "Fetched touch icon");
    Ok(bytes.to_vec())
}
