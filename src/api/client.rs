use crate::error::AppResult;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single call against the API base, e.g. `PUT /player/play`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw status and body; classification is the dispatcher's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Low-level bearer-token call wrapper. No retries, no refresh, no
/// interpretation of the status code.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(&self, request: &ApiRequest, access_token: &str) -> AppResult<ApiResponse>;
}

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn call(&self, request: &ApiRequest, access_token: &str) -> AppResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let auth_value = format!("Bearer {}", access_token);

        let mut builder = self
            .http
            .request(request.method.as_reqwest(), &url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(AUTHORIZATION, auth_value)
            .query(&request.query);

        // The player endpoints answer 411 to a bodiless PUT/POST.
        if matches!(request.method, Method::Put | Method::Post) {
            builder = builder.body("");
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        log::debug!("{:?} {} -> {}", request.method, request.path, status);

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder_keeps_order() {
        let request = ApiRequest::new(Method::Put, "/player/seek")
            .query("position_ms", 0)
            .query("device_id", "abc");
        assert_eq!(request.query_value("position_ms"), Some("0"));
        assert_eq!(request.query[1], ("device_id".to_string(), "abc".to_string()));
        assert_eq!(request.query_value("missing"), None);
    }

    #[test]
    fn response_json_reports_parse_errors() {
        let response = ApiResponse {
            status: 200,
            body: "not json".into(),
        };
        assert!(response.json::<serde_json::Value>().is_err());
    }
}
