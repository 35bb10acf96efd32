//! Main Cadenza server client.

use crate::catalog::HttpCatalog;
use crate::error::{Result, ServerClientError};
use crate::stream::HttpStreamFetcher;
use crate::types::ServerConfig;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Shared HTTP state behind every sub-client
#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) http: Client,
    pub(crate) base: Url,
    access_token: Option<String>,
}

impl Connection {
    /// Attach the bearer token for requests to the configured server
    pub(crate) fn authorize(&self, request: RequestBuilder, target: &Url) -> RequestBuilder {
        match &self.access_token {
            Some(token) if target.origin() == self.base.origin() => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Resolve a server-relative stream path against the base URL
    ///
    /// Absolute URLs are returned unchanged.
    pub(crate) fn resolve(&self, locator: &str) -> Result<Url> {
        match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .join(locator)
                .map_err(|e| ServerClientError::InvalidUrl(format!("{locator}: {e}"))),
            Err(e) => Err(ServerClientError::InvalidUrl(format!("{locator}: {e}"))),
        }
    }
}

/// Client for a Cadenza server.
///
/// Hands out the collaborator implementations the playback core consumes.
/// All of them share one connection pool.
///
/// # Example
///
/// ```ignore
/// use cadenza_server_client::{CadenzaServerClient, ServerConfig};
///
/// let client = CadenzaServerClient::new(ServerConfig::with_token(
///     "https://music.example.com",
///     "token",
/// ))?;
/// let catalog = client.catalog();
/// let fetcher = client.stream_fetcher();
/// ```
#[derive(Debug, Clone)]
pub struct CadenzaServerClient {
    connection: Arc<Connection>,
}

impl CadenzaServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let url = config.url.trim_end_matches('/');
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        // Trailing slash so relative joins keep any base path
        let base = Url::parse(&format!("{url}/"))
            .map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Cadenza/{} (Headless)", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ServerClientError::Request)?;

        Ok(Self {
            connection: Arc::new(Connection {
                http,
                base,
                access_token: config.access_token,
            }),
        })
    }

    /// Get the server URL, without trailing slash.
    pub fn url(&self) -> String {
        self.connection.base.as_str().trim_end_matches('/').to_string()
    }

    /// Check if the client has an access token.
    pub fn is_authenticated(&self) -> bool {
        self.connection.access_token.is_some()
    }

    /// Paged collection catalog backed by this server
    pub fn catalog(&self) -> HttpCatalog {
        HttpCatalog::new(Arc::clone(&self.connection))
    }

    /// Stream head fetcher for the prefetch cache
    pub fn stream_fetcher(&self) -> HttpStreamFetcher {
        HttpStreamFetcher::new(Arc::clone(&self.connection))
    }
}
