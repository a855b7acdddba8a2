// File: ./src/fetch/transport.rs
//! Shared HTTPS transport for every adapter.
use crate::config::Config;
use crate::fetch::middleware::{UserAgentLayer, UserAgentService};
use crate::fetch::redirect::{FollowRedirectLayer, FollowRedirectService};
use anyhow::{Context, Result, anyhow, bail};
use http::{Method, Request, Uri};
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tower::{ServiceBuilder, ServiceExt};

type HttpsClient = Client<HttpsConnector<HttpConnector>, String>;
type HttpService = UserAgentService<FollowRedirectService<HttpsClient>>;

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    service: HttpService,
    request_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, max_redirects: usize, request_timeout: Duration) -> Result<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        let result = rustls_native_certs::load_native_certs();
        for err in &result.errors {
            log::debug!("Skipping native certificate: {}", err);
        }
        root_store.add_parsable_certificates(result.certs);
        if root_store.is_empty() {
            // plain http endpoints still work
            log::warn!("No valid system certificates found; HTTPS sources will fail");
        }
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let client: HttpsClient = Client::builder(TokioExecutor::new()).build(https_connector);
        let service = ServiceBuilder::new()
            .layer(UserAgentLayer::new(user_agent))
            .layer(FollowRedirectLayer::new(max_redirects))
            .service(client);

        Ok(Self {
            service,
            request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.user_agent,
            config.max_redirects,
            config.request_timeout(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// GET `url` with the default request timeout.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get_text_with_timeout(url, self.request_timeout).await
    }

    /// GET `url`, failing on transport errors, HTTP status >= 400 or when
    /// the whole exchange (headers and body) exceeds `timeout`.
    pub async fn get_text_with_timeout(&self, url: &str, timeout: Duration) -> Result<String> {
        let uri: Uri = url
            .trim()
            .parse()
            .with_context(|| format!("Invalid URL: {}", url))?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(String::new())?;

        let svc = self.service.clone();
        let exchange = async move {
            let resp = svc.oneshot(req).await?;
            let status = resp.status();
            if status.as_u16() >= 400 {
                bail!("HTTP {} from {}", status, url);
            }
            let bytes = resp.into_body().collect().await?.to_bytes();
            Ok::<String, anyhow::Error>(String::from_utf8_lossy(&bytes).into_owned())
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| anyhow!("Request to {} timed out after {:?}", url, timeout))?
    }

    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).with_context(|| format!("Invalid JSON from {}", url))
    }
}
