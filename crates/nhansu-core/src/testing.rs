//! In-crate fakes for exercising the auth path without a server.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::api::{HttpResponse, RequestEnvelope, Transport, TransportError};
use crate::auth::{LogoutReason, SessionHooks};

type Handler = dyn Fn(&RequestEnvelope) -> Result<HttpResponse, TransportError> + Send + Sync;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Scripted [`Transport`]. Every exchange yields to the scheduler a few
/// times before answering, so concurrent calls genuinely overlap.
pub(crate) struct FakeTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<RecordedRequest>>,
    yields: usize,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestEnvelope) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            yields: 8,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn bearers(&self, path: &str) -> Vec<Option<String>> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .map(|r| r.bearer)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: &RequestEnvelope) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            bearer: request.bearer_token().map(str::to_string),
            body: request.body.clone(),
        });
        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }
        (self.handler)(request)
    }
}

pub(crate) fn respond(status: u16, body: serde_json::Value) -> Result<HttpResponse, TransportError> {
    let status = StatusCode::from_u16(status).unwrap();
    Ok(HttpResponse::new(status, body.to_string()))
}

/// Answers protected calls with 200 only for `valid_access`, 401 otherwise.
pub(crate) fn protected(request: &RequestEnvelope, valid_access: &str) -> Result<HttpResponse, TransportError> {
    if request.bearer_token() == Some(valid_access) {
        respond(200, serde_json::json!([]))
    } else {
        respond(401, serde_json::json!({"detail": "Given token not valid for any token type"}))
    }
}

#[derive(Default)]
pub(crate) struct RecordingHooks {
    refreshed: Mutex<usize>,
    expired: Mutex<Vec<LogoutReason>>,
}

impl RecordingHooks {
    pub fn refreshed(&self) -> usize {
        *self.refreshed.lock().unwrap()
    }

    pub fn expired(&self) -> Vec<LogoutReason> {
        self.expired.lock().unwrap().clone()
    }
}

impl SessionHooks for RecordingHooks {
    fn credentials_refreshed(&self) {
        *self.refreshed.lock().unwrap() += 1;
    }

    fn credentials_expired(&self, reason: LogoutReason) {
        self.expired.lock().unwrap().push(reason);
    }
}
