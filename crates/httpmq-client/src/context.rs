//! Per-call request metadata

use std::time::Duration;

use reqwest::RequestBuilder;

/// Header carrying the request correlation ID
pub const REQUEST_ID_HEADER: &str = "Httpmq-Request-Id";

/// Per-call context: correlation ID, auth, extra headers/query params and timeout.
///
/// A fresh UUID is used as the correlation ID unless one is supplied. The
/// context is only read by the client; clone it to issue concurrent calls
/// with different settings.
///
/// ```
/// use httpmq_client::RequestContext;
///
/// let ctx = RequestContext::new()
///     .add_header("hello", "world")
///     .add_param("checking", "1")
///     .with_bearer_token("secret");
/// assert!(!ctx.request_id().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    headers: Vec<(String, String)>,
    params: Vec<(String, String)>,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            headers: Vec::new(),
            params: Vec::new(),
            bearer_token: None,
            timeout: None,
        }
    }

    /// Override the generated correlation ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Add a header. Repeating a name sends the header multiple times.
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter
    pub fn add_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Send `Authorization: Bearer <token>` with the call
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Override the client's request timeout for this call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Attach correlation ID, headers, query params and auth to a request.
    ///
    /// The timeout is not applied here; callers decide whether it bounds the
    /// whole request or only the initial response.
    pub(crate) fn apply(&self, mut builder: RequestBuilder) -> RequestBuilder {
        builder = builder.header(REQUEST_ID_HEADER, self.request_id.as_str());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !self.params.is_empty() {
            builder = builder.query(&self.params);
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_request_ids_are_unique() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id(), b.request_id());
        assert!(uuid::Uuid::parse_str(a.request_id()).is_ok());
    }

    #[test]
    fn test_request_id_override() {
        let ctx = RequestContext::new().with_request_id("my-request");
        assert_eq!(ctx.request_id(), "my-request");
    }

    #[test]
    fn test_apply_attaches_everything() {
        let ctx = RequestContext::new()
            .with_request_id("rid-1")
            .add_header("hello", "world")
            .add_header("hello", "again")
            .add_param("checking", "1")
            .with_bearer_token("tok");

        let client = reqwest::Client::new();
        let request = ctx
            .apply(client.get("http://localhost:4101/test"))
            .build()
            .unwrap();

        assert_eq!(request.url().query(), Some("checking=1"));
        let headers = request.headers();
        assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "rid-1");
        let hello: Vec<_> = headers.get_all("hello").iter().collect();
        assert_eq!(hello, vec!["world", "again"]);
        assert_eq!(
            headers.get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer tok"
        );
    }

    #[test]
    fn test_timeout_not_applied_to_builder() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(3));
        assert_eq!(ctx.timeout(), Some(Duration::from_secs(3)));

        let client = reqwest::Client::new();
        let request = ctx.apply(client.get("http://localhost/")).build().unwrap();
        assert!(request.timeout().is_none());
    }
}
