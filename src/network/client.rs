use crate::network::auth::{apply_json_headers, Credentials};
use crate::network::errors::ClientError;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

// * Shared HTTP plumbing for one integration: base URL, credentials, timeout.
pub struct ServiceClient {
    inner: Client,
    base_url: Url,
    credentials: Credentials,
    service: &'static str,
}

impl ServiceClient {
    // * Builds the underlying reqwest client with JSON headers and the integration's timeout.
    // * @param verify_tls - false accepts self-signed certificates
    pub fn new(
        service: &'static str,
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
        verify_tls: bool,
    ) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut headers = HeaderMap::new();
        apply_json_headers(&mut headers);

        let inner = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;

        tracing::debug!(
            service,
            base_url = %base_url,
            auth = credentials.scheme(),
            timeout_secs = timeout.as_secs(),
            "Integration client built"
        );

        Ok(Self {
            inner,
            base_url,
            credentials,
            service,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // * Appends an API path to the base URL, keeping any path prefix the base already has.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ClientError::InvalidUrl(format!("{joined}: {e}")))
    }

    // * Like endpoint(), then appends one caller-supplied segment percent-encoded,
    // * so '/', '?' and '#' inside it stay part of that segment.
    pub fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    // * Authenticated GET; any HTTP status is returned as-is.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, ClientError> {
        self.get_url(self.endpoint(path)?, query).await
    }

    pub async fn get_url(&self, url: Url, query: &[(&str, String)]) -> Result<Response, ClientError> {
        tracing::trace!(service = self.service, url = %url, "GET");
        let request = self.credentials.authorize(self.inner.get(url).query(query));
        Ok(request.send().await?)
    }

    pub async fn status_of(&self, path: &str) -> Result<StatusCode, ClientError> {
        Ok(self.get(path, &[]).await?.status())
    }

    // * Succeeds only on exactly 200, the reachability contract of every integration.
    pub async fn expect_ok(&self, path: &str) -> Result<(), ClientError> {
        match self.status_of(path).await? {
            StatusCode::OK => Ok(()),
            other => Err(ClientError::Status(other.as_u16())),
        }
    }

    // * GET and decode a JSON body; non-success statuses become ClientError::Status.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.get_json_url(self.endpoint(path)?, query).await
    }

    pub async fn get_json_url<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let resp = self.get_url(url, query).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
