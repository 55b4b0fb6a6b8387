//! HTTP binding used by the client
//!
//! The client only needs "send a request, get status and body back"; the
//! [`Transport`] trait is that seam. [`ReqwestTransport`] is the default
//! binding and owns the cookie jar when the policy asks for one; under
//! `CookiePolicy::Ambient` it keeps none and the host supplies cookies.

use async_trait::async_trait;
use odoorpc_core::CookiePolicy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::Result;

/// Outbound request handed to a [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// POST with `Content-Type: application/json`
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            method: Method::POST,
            url: url.into(),
            headers,
            body: Some(body),
        }
    }

    /// GET with the given `Accept` header
    pub fn get(url: impl Into<String>, accept: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        Self {
            method: Method::GET,
            url: url.into(),
            headers,
            body: None,
        }
    }
}

/// Status line and raw body of a completed exchange
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// One request/response exchange with cookie semantics fixed at construction
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
    fn cookie_policy(&self) -> CookiePolicy;
}

/// reqwest-backed binding
pub struct ReqwestTransport {
    client: reqwest::Client,
    policy: CookiePolicy,
}

impl ReqwestTransport {
    /// Build a client for `policy` (resolving `Auto` once) and an optional
    /// per-request deadline.
    pub fn new(policy: CookiePolicy, timeout: Option<Duration>) -> Result<Self> {
        let policy = policy.resolve();
        let mut builder = reqwest::Client::builder().cookie_store(policy == CookiePolicy::Jar);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            policy,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }

    fn cookie_policy(&self) -> CookiePolicy {
        self.policy
    }
}
