//! Permission Broker
//!
//! Client-side policy seam for `session/request_permission`. The agent
//! transitions a tool call to `awaiting_permission` and sends the request;
//! on the client the broker consults the application's
//! [`PermissionHandler`] and caches decisions the user asked to remember.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

// Layer 3: Internal module imports
use crate::protocol::{AcpResult, PermissionOutcome, PermissionRequest, PermissionScope};

/// Application-supplied permission policy
///
/// Implementations typically prompt the user; automated policies are fine
/// for tests and headless runs.
#[async_trait]
pub trait PermissionHandler: Send + Sync {
    /// Decide one permission request
    async fn decide(&self, request: &PermissionRequest) -> AcpResult<PermissionOutcome>;
}

/// Policy that grants everything; for tests and trusted setups
pub struct AllowAllPermissions;

#[async_trait]
impl PermissionHandler for AllowAllPermissions {
    async fn decide(&self, _request: &PermissionRequest) -> AcpResult<PermissionOutcome> {
        Ok(PermissionOutcome::granted_once())
    }
}

/// Policy that denies everything
pub struct DenyAllPermissions;

#[async_trait]
impl PermissionHandler for DenyAllPermissions {
    async fn decide(&self, request: &PermissionRequest) -> AcpResult<PermissionOutcome> {
        Ok(PermissionOutcome::denied(format!(
            "{} on {} denied by policy",
            request.operation, request.resource
        )))
    }
}

#[derive(Debug, Clone, Copy)]
struct RememberedGrant {
    granted: bool,
    scope: PermissionScope,
}

/// Brokers permission requests against the policy, remembering decisions
/// with `session` or `always` scope
///
/// Remembered grants are keyed by `(operation, resource)`. Nothing is
/// persisted across process restarts; `always` only outlives sessions
/// within this process.
pub struct PermissionBroker {
    handler: Arc<dyn PermissionHandler>,
    remembered: DashMap<(String, String), RememberedGrant>,
}

impl PermissionBroker {
    /// Create a broker over the application policy
    pub fn new(handler: Arc<dyn PermissionHandler>) -> Self {
        Self {
            handler,
            remembered: DashMap::new(),
        }
    }

    /// Decide a request, consulting remembered grants first
    pub async fn decide(&self, request: &PermissionRequest) -> AcpResult<PermissionOutcome> {
        let key = (request.operation.clone(), request.resource.clone());

        if let Some(entry) = self.remembered.get(&key) {
            let grant = *entry.value();
            debug!(
                operation = %request.operation,
                resource = %request.resource,
                granted = grant.granted,
                "using remembered permission decision"
            );
            return Ok(PermissionOutcome {
                granted: grant.granted,
                remember: Some(true),
                scope: Some(grant.scope),
                reason: Some("remembered decision".to_string()),
                selected_option_id: None,
            });
        }

        let outcome = self.handler.decide(request).await?;

        let scope = outcome.scope.unwrap_or(PermissionScope::Once);
        let should_remember =
            outcome.remember.unwrap_or(false) || matches!(scope, PermissionScope::Session | PermissionScope::Always);
        if should_remember && !matches!(scope, PermissionScope::Once) {
            self.remembered.insert(
                key,
                RememberedGrant {
                    granted: outcome.granted,
                    scope,
                },
            );
        }

        Ok(outcome)
    }

    /// Drop grants remembered with `session` scope (a session ended)
    pub fn clear_session_grants(&self) {
        self.remembered
            .retain(|_, grant| grant.scope == PermissionScope::Always);
    }

    /// Number of remembered decisions
    pub fn remembered_count(&self) -> usize {
        self.remembered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PermissionOption, SessionId, ToolCallId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(operation: &str, resource: &str) -> PermissionRequest {
        PermissionRequest {
            session_id: SessionId::new("s1"),
            operation: operation.to_string(),
            resource: resource.to_string(),
            tool_call_id: ToolCallId::new("tc1"),
            options: vec![PermissionOption {
                id: "allow".to_string(),
                label: None,
            }],
            reason: None,
        }
    }

    struct CountingPolicy {
        calls: AtomicUsize,
        outcome: PermissionOutcome,
    }

    #[async_trait]
    impl PermissionHandler for CountingPolicy {
        async fn decide(&self, _request: &PermissionRequest) -> AcpResult<PermissionOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    #[tokio::test]
    async fn test_once_scope_not_remembered() {
        let policy = Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
            outcome: PermissionOutcome::granted_once(),
        });
        let broker = PermissionBroker::new(Arc::clone(&policy) as Arc<dyn PermissionHandler>);

        broker.decide(&request("file_write", "/a")).await.unwrap();
        broker.decide(&request("file_write", "/a")).await.unwrap();

        // The policy was asked both times
        assert_eq!(policy.calls.load(Ordering::SeqCst), 2);
        assert_eq!(broker.remembered_count(), 0);
    }

    #[tokio::test]
    async fn test_session_scope_remembered() {
        let policy = Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
            outcome: PermissionOutcome {
                granted: true,
                remember: Some(true),
                scope: Some(PermissionScope::Session),
                reason: None,
                selected_option_id: None,
            },
        });
        let broker = PermissionBroker::new(Arc::clone(&policy) as Arc<dyn PermissionHandler>);

        broker.decide(&request("file_write", "/a")).await.unwrap();
        let outcome = broker.decide(&request("file_write", "/a")).await.unwrap();

        assert!(outcome.granted);
        assert_eq!(policy.calls.load(Ordering::SeqCst), 1);

        // Different resource is a fresh decision
        broker.decide(&request("file_write", "/b")).await.unwrap();
        assert_eq!(policy.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_session_grants_keeps_always() {
        let session_policy = PermissionOutcome {
            granted: true,
            remember: Some(true),
            scope: Some(PermissionScope::Session),
            reason: None,
            selected_option_id: None,
        };
        let always_policy = PermissionOutcome {
            scope: Some(PermissionScope::Always),
            ..session_policy.clone()
        };

        let broker = PermissionBroker::new(Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
            outcome: session_policy,
        }));
        broker.decide(&request("file_write", "/a")).await.unwrap();

        let broker2 = PermissionBroker::new(Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
            outcome: always_policy,
        }));
        broker2.decide(&request("terminal_execute", "ls")).await.unwrap();

        broker.clear_session_grants();
        broker2.clear_session_grants();

        assert_eq!(broker.remembered_count(), 0);
        assert_eq!(broker2.remembered_count(), 1);
    }

    #[tokio::test]
    async fn test_denials_are_remembered_too() {
        let policy = Arc::new(CountingPolicy {
            calls: AtomicUsize::new(0),
            outcome: PermissionOutcome {
                granted: false,
                remember: Some(true),
                scope: Some(PermissionScope::Session),
                reason: Some("no".to_string()),
                selected_option_id: None,
            },
        });
        let broker = PermissionBroker::new(Arc::clone(&policy) as Arc<dyn PermissionHandler>);

        broker.decide(&request("file_delete", "/etc")).await.unwrap();
        let outcome = broker.decide(&request("file_delete", "/etc")).await.unwrap();

        assert!(!outcome.granted);
        assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
    }
}
