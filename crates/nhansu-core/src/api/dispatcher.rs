//! Authenticated request path.
//!
//! Per logical call:
//!
//! ```text
//! Sent ──2xx/other──────────────────────────────▶ Success (pass-through)
//!  │
//!  └─401/403, not retried ─▶ Refreshing ─ok─▶ replay once ─▶ Success | Fatal
//!  │                              └─err───────────────────▶ Fatal
//!  └─401/403, retried ──────────────────────────────────────▶ Fatal
//! ```

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{DispatchError, HttpResponse, RequestEnvelope, Transport};
use crate::auth::{CredentialStore, LogoutReason, RefreshCoordinator, SessionHooks};

/// Attaches the access token to outgoing calls and recovers from a rejected
/// token with one refresh and one replay.
///
/// Cheap to clone; clones share the store and the refresh coordinator.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
    hooks: Arc<dyn SessionHooks>,
}

fn is_authorization_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl RequestDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        refresher: Arc<RefreshCoordinator>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            transport,
            store,
            refresher,
            hooks,
        }
    }

    /// Send one logical call. Any response other than 401/403 is returned
    /// as-is; business errors are the caller's to interpret.
    pub async fn send(&self, mut envelope: RequestEnvelope) -> Result<HttpResponse, DispatchError> {
        loop {
            // Re-read on every attempt so a replay picks up the refreshed token
            let presented = self.store.access_token();
            envelope.set_bearer(presented.as_deref());

            let response = match self.transport.execute(&envelope).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(method = %envelope.method, path = %envelope.path, error = %e, "Request failed");
                    return Err(DispatchError::NetworkError(e));
                }
            };

            let status = response.status();
            if !is_authorization_failure(status) {
                return Ok(response);
            }

            if envelope.is_retried() {
                warn!(path = %envelope.path, status = status.as_u16(), "Rejected again after refresh");
                self.hooks.credentials_expired(LogoutReason::RejectedAfterRetry {
                    status: status.as_u16(),
                });
                return Err(DispatchError::AuthExpired {
                    status: status.as_u16(),
                    refresh: None,
                });
            }

            // Marked before awaiting the refresh so this call can never loop
            envelope.mark_retried();
            debug!(path = %envelope.path, status = status.as_u16(), "Authorization rejected, refreshing");

            if let Err(e) = self.refresher.refresh_rejected(presented.as_deref()).await {
                // The coordinator has already torn the session down
                return Err(DispatchError::AuthExpired {
                    status: status.as_u16(),
                    refresh: Some(e),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        exchange::REFRESH_PATH, CredentialPair, RefreshError, SessionController, SessionEvent,
    };
    use crate::testing::{protected, respond, FakeTransport};
    use crate::api::TransportError;
    use tokio::sync::broadcast::error::TryRecvError;

    const EMPLOYEES: &str = "/nhanvien/";

    fn session_with(
        pair: CredentialPair,
        transport: FakeTransport,
    ) -> (Arc<FakeTransport>, Arc<CredentialStore>, SessionController) {
        let transport = Arc::new(transport);
        let store = CredentialStore::in_memory().shared();
        store.set(pair);
        let session = SessionController::new(transport.clone(), store.clone());
        (transport, store, session)
    }

    /// Protected resources accept only A2; refresh hands out A2.
    fn expiring_server() -> FakeTransport {
        FakeTransport::new(|request| match request.path.as_str() {
            REFRESH_PATH => respond(200, serde_json::json!({"access": "A2"})),
            _ => protected(request, "A2"),
        })
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let (transport, _, session) = session_with(
            CredentialPair::new("A2", "R1"),
            expiring_server(),
        );

        let response = session.dispatcher().send(RequestEnvelope::get(EMPLOYEES)).await.expect("ok");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.bearers(EMPLOYEES), vec![Some("A2".to_string())]);
        assert_eq!(transport.count(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_replays_once() {
        let (transport, store, session) = session_with(
            CredentialPair::new("A1", "R1"),
            expiring_server(),
        );

        let response = session.dispatcher().send(RequestEnvelope::get(EMPLOYEES)).await.expect("ok");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            transport.bearers(EMPLOYEES),
            vec![Some("A1".to_string()), Some("A2".to_string())]
        );
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(store.get(), CredentialPair::new("A2", "R1"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_forbidden_is_treated_like_unauthorized() {
        let transport = FakeTransport::new(|request| match request.path.as_str() {
            REFRESH_PATH => respond(200, serde_json::json!({"access": "A2"})),
            _ if request.bearer_token() == Some("A2") => respond(200, serde_json::json!([])),
            _ => respond(403, serde_json::json!({"detail": "forbidden"})),
        });
        let (transport, _, session) = session_with(CredentialPair::new("A1", "R1"), transport);

        let response = session.dispatcher().send(RequestEnvelope::get(EMPLOYEES)).await.expect("ok");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.count(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn test_new_token_is_reused_without_refresh() {
        let (transport, _, session) = session_with(
            CredentialPair::new("A1", "R1"),
            expiring_server(),
        );
        let dispatcher = session.dispatcher();

        dispatcher.send(RequestEnvelope::get(EMPLOYEES)).await.expect("first call");
        dispatcher.send(RequestEnvelope::get("/phongban/")).await.expect("second call");

        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.bearers("/phongban/"), vec![Some("A2".to_string())]);
    }

    #[tokio::test]
    async fn test_concurrent_expiry_single_refresh() {
        let (transport, _, session) = session_with(
            CredentialPair::new("A1", "R1"),
            expiring_server(),
        );
        let dispatcher = session.dispatcher();

        let paths = ["/nhanvien/", "/phongban/", "/chucvu/", "/chamcong/", "/donxinnghi/"];
        let results = futures::future::join_all(
            paths.iter().map(|path| dispatcher.send(RequestEnvelope::get(*path))),
        )
        .await;

        assert!(results.iter().all(|r| matches!(r, Ok(resp) if resp.status() == StatusCode::OK)));
        assert_eq!(transport.count(REFRESH_PATH), 1);
        for path in paths {
            assert_eq!(
                transport.bearers(path),
                vec![Some("A1".to_string()), Some("A2".to_string())],
                "{} replayed with the refreshed token",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_concurrent_refresh_failure_tears_down_once() {
        let transport = FakeTransport::new(|request| match request.path.as_str() {
            REFRESH_PATH => respond(401, serde_json::json!({"detail": "Token is blacklisted"})),
            _ => protected(request, "A2"),
        });
        let (transport, store, session) = session_with(CredentialPair::new("A1", "R1"), transport);
        let mut events = session.subscribe();
        let dispatcher = session.dispatcher();

        let results = futures::future::join_all(
            (0..3).map(|_| dispatcher.send(RequestEnvelope::get(EMPLOYEES))),
        )
        .await;

        for result in &results {
            assert!(matches!(
                result,
                Err(DispatchError::AuthExpired { status: 401, refresh: Some(RefreshError::Rejected { status: 401 }) })
            ));
        }
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert_eq!(transport.count(EMPLOYEES), 3);
        assert!(store.get().is_empty());
        assert!(!session.is_authenticated());

        assert!(matches!(events.try_recv(), Ok(SessionEvent::NavigateToLogin { .. })));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_rejected_after_retry_is_fatal() {
        // The refreshed token is rejected too
        let transport = FakeTransport::new(|request| match request.path.as_str() {
            REFRESH_PATH => respond(200, serde_json::json!({"access": "A2"})),
            _ => protected(request, "never"),
        });
        let (transport, store, session) = session_with(CredentialPair::new("A1", "R1"), transport);
        let mut events = session.subscribe();

        let err = session
            .dispatcher()
            .send(RequestEnvelope::get(EMPLOYEES))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::AuthExpired { status: 401, refresh: None }));
        assert_eq!(transport.count(EMPLOYEES), 2);
        assert_eq!(transport.count(REFRESH_PATH), 1);
        assert!(store.get().is_empty());
        assert_eq!(
            events.try_recv(),
            Ok(SessionEvent::NavigateToLogin {
                reason: LogoutReason::RejectedAfterRetry { status: 401 }
            })
        );
    }

    #[tokio::test]
    async fn test_business_errors_pass_through() {
        let transport = FakeTransport::new(|request| match request.path.as_str() {
            "/donxinnghi/7/approve/" => {
                respond(400, serde_json::json!({"error": "already processed"}))
            }
            _ => respond(500, serde_json::json!({})),
        });
        let (transport, _, session) = session_with(CredentialPair::new("A1", "R1"), transport);
        let dispatcher = session.dispatcher();

        let response = dispatcher
            .send(RequestEnvelope::post("/donxinnghi/7/approve/"))
            .await
            .expect("400 is a response, not a dispatch error");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<serde_json::Value>().expect("json")["error"], "already processed");

        let response = dispatcher.send(RequestEnvelope::get(EMPLOYEES)).await.expect("500 passes");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.count(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn test_network_error_is_not_retried() {
        let transport = FakeTransport::new(|_| Err(TransportError::new("connection reset")));
        let (transport, store, session) = session_with(CredentialPair::new("A1", "R1"), transport);

        let err = session
            .dispatcher()
            .send(RequestEnvelope::get(EMPLOYEES))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NetworkError(_)));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(store.get(), CredentialPair::new("A1", "R1"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_unauthenticated_call_has_no_header() {
        let transport = FakeTransport::new(|_| respond(200, serde_json::json!([])));
        let (transport, _, session) = session_with(CredentialPair::default(), transport);

        session.dispatcher().send(RequestEnvelope::get("/chucvu/")).await.expect("ok");
        assert_eq!(transport.bearers("/chucvu/"), vec![None]);
    }
}
