//! Declarative HTTP scenarios.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use super::app::AppHandle;
use super::error::{HarnessError, Result};

/// One HTTP request against the application under test.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn to_http(&self) -> Result<Request<Body>> {
        let builder = Request::builder()
            .method(self.method.clone())
            .uri(self.path.as_str());

        let request = match &self.body {
            Some(body) => {
                let bytes = serde_json::to_vec(body).map_err(|e| {
                    HarnessError::Request(format!("cannot encode body for {}: {}", self.path, e))
                })?;
                builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(bytes))
            }
            None => builder.body(Body::empty()),
        };

        request.map_err(|e| {
            HarnessError::Request(format!("invalid request {} {}: {}", self.method, self.path, e))
        })
    }
}

/// Structured response: status, headers and the body as JSON.
///
/// Empty bodies become `null`; bodies that are not JSON are kept as a JSON
/// string.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    pub(crate) fn from_parts(status: StatusCode, headers: HeaderMap, bytes: Bytes) -> Self {
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Self {
            status,
            headers,
            body,
        }
    }

    /// Deserialize the body into the expected shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            HarnessError::Request(format!(
                "response body does not match {}: {} (body: {})",
                std::any::type_name::<T>(),
                e,
                self.body
            ))
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
    }
}

/// A request plus the status it must produce.
///
/// The expected status defaults to `200 OK`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub request: ApiRequest,
    pub expected_status: StatusCode,
}

impl Scenario {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            expected_status: StatusCode::OK,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiRequest::new(Method::GET, path))
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiRequest::new(Method::POST, path).with_body(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiRequest::new(Method::PUT, path).with_body(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(ApiRequest::new(Method::DELETE, path))
    }

    pub fn expect(mut self, status: StatusCode) -> Self {
        self.expected_status = status;
        self
    }
}

/// Execute `scenario` and check its status code.
pub async fn run_scenario(app: &AppHandle, scenario: &Scenario) -> Result<ApiResponse> {
    let request = &scenario.request;
    let response = app.execute(request).await?;

    if response.status != scenario.expected_status {
        warn!(
            method = %request.method,
            path = %request.path,
            expected = scenario.expected_status.as_u16(),
            actual = response.status.as_u16(),
            "Scenario status mismatch"
        );
        return Err(HarnessError::ScenarioAssertion {
            method: request.method.to_string(),
            path: request.path.clone(),
            expected: scenario.expected_status.as_u16(),
            actual: response.status.as_u16(),
            body: response.body.to_string(),
        });
    }

    info!(
        method = %request.method,
        path = %request.path,
        status = response.status.as_u16(),
        "Scenario passed"
    );
    Ok(response)
}
