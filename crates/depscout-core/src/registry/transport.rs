//! Remote collaborators: the package registry and the vulnerability
//! database, each reduced to a single fetch function. Authentication and
//! timeouts live here; decoding lives in the adapters.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

const DEFAULT_USER_AGENT: &str = concat!("depscout/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

/// Fetches the registry's native document for a package.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn fetch_raw(&self, name: &str) -> Result<Vec<u8>, TransportError>;
}

/// Fetches the vulnerability database's response for a keyword search.
#[async_trait]
pub trait AdvisoryTransport: Send + Sync {
    async fn fetch_cves(&self, keyword: &str) -> Result<Vec<u8>, TransportError>;

    /// Whether requests carry credentials; drives the rate-limit interval.
    fn is_authenticated(&self) -> bool {
        false
    }
}

/// HTTP client options shared by both remotes. Per-request timeouts are
/// caller-configurable; a timed-out fetch surfaces as a request failure.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpOptions {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpOptions {
    fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .gzip(true)
            .user_agent(&self.user_agent)
            .build()
    }
}

/// Registry authentication, applied per request.
#[derive(Debug, Clone)]
pub enum RegistryAuth {
    Basic { username: String, password: String },
    Token(String),
}

/// npm-registry-compatible HTTP transport.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    auth: Option<RegistryAuth>,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> Result<Self, TransportError> {
        Ok(HttpRegistry {
            client: options.build_client()?,
            base_url: base_url.into(),
            auth: None,
        })
    }

    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    fn apply_auth(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(RegistryAuth::Basic { username, password }) => {
                request = request.basic_auth(username, Some(password));
            }
            Some(RegistryAuth::Token(token)) => {
                request = request.bearer_auth(token);
            }
            None => {}
        }
        request
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistry {
    async fn fetch_raw(&self, name: &str) -> Result<Vec<u8>, TransportError> {
        // Scoped names contain a slash that must survive as one path segment.
        let url = format!("{}/{}", self.base_url, name.replace('/', "%2F"));
        log::debug!("registry fetch: {}", url);

        let request = self.apply_auth(self.client.get(&url));
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(name.to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TransportError::Auth(url));
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// NVD-compatible HTTP transport for CVE keyword searches.
pub struct HttpAdvisories {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAdvisories {
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> Result<Self, TransportError> {
        Ok(HttpAdvisories {
            client: options.build_client()?,
            base_url: base_url.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl AdvisoryTransport for HttpAdvisories {
    async fn fetch_cves(&self, keyword: &str) -> Result<Vec<u8>, TransportError> {
        log::debug!("advisory fetch: keyword \"{}\"", keyword);

        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("keywordSearch", keyword)]);
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TransportError::Auth(self.base_url.clone()));
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: self.base_url.clone(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }
}
