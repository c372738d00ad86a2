//! Scoped inference sessions.
//!
//! A session is created for exactly one logical request and released on
//! every exit path. Cancellation (dropping the request future) is covered by
//! [`SessionGuard`]'s `Drop` impl.

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use super::backend::{BackendError, BackendKind, CapabilityState, InferenceBackend, SessionBox};

/// Errors from running a request inside a session.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to create {backend} session: {source}")]
    SessionCreateFailed {
        backend: BackendKind,
        #[source]
        source: BackendError,
    },

    #[error("{backend} inference failed: {source}")]
    InferenceFailed {
        backend: BackendKind,
        #[source]
        source: BackendError,
    },
}

impl InferenceError {
    pub fn backend(&self) -> BackendKind {
        match self {
            InferenceError::SessionCreateFailed { backend, .. }
            | InferenceError::InferenceFailed { backend, .. } => *backend,
        }
    }
}

/// Owns a live session and releases it exactly once.
pub struct SessionGuard {
    session: SessionBox,
    backend: BackendKind,
    released: bool,
}

impl SessionGuard {
    fn new(session: SessionBox, backend: BackendKind) -> Self {
        Self {
            session,
            backend,
            released: false,
        }
    }

    /// Release now instead of waiting for drop.
    fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.session.release();
            debug!("Released {} session", self.backend);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.released {
            debug!("{} session dropped before completion", self.backend);
        }
        self.release_inner();
    }
}

/// Creates sessions against the configured backends.
#[derive(Clone)]
pub struct SessionManager {
    on_device: Option<Arc<dyn InferenceBackend>>,
    remote: Option<Arc<dyn InferenceBackend>>,
}

impl SessionManager {
    pub fn new(
        on_device: Option<Arc<dyn InferenceBackend>>,
        remote: Option<Arc<dyn InferenceBackend>>,
    ) -> Self {
        Self { on_device, remote }
    }

    /// Get the backend instance for a kind, if configured.
    pub fn backend(&self, kind: BackendKind) -> Option<&Arc<dyn InferenceBackend>> {
        match kind {
            BackendKind::OnDevice => self.on_device.as_ref(),
            BackendKind::Remote => self.remote.as_ref(),
        }
    }

    /// Run `body` against a fresh session on `kind`.
    ///
    /// `body` is not invoked if the session cannot be created. The session
    /// is released after `body` finishes, fails, or is cancelled.
    pub async fn with_session<T, F>(
        &self,
        kind: BackendKind,
        system_instruction: Option<&str>,
        body: F,
    ) -> Result<T, InferenceError>
    where
        F: for<'s> FnOnce(&'s mut SessionBox) -> BoxFuture<'s, Result<T, BackendError>> + Send,
        T: Send,
    {
        let backend = self
            .backend(kind)
            .ok_or_else(|| InferenceError::SessionCreateFailed {
                backend: kind,
                source: BackendError::NotReady {
                    state: CapabilityState::Unavailable,
                    hint: format!("No {} backend configured", kind),
                },
            })?;

        let session = backend
            .create_session(system_instruction)
            .await
            .map_err(|source| {
                warn!("Could not create {} session: {}", backend.name(), source);
                InferenceError::SessionCreateFailed {
                    backend: kind,
                    source,
                }
            })?;
        debug!("Created {} session on {}", kind, backend.name());

        let mut guard = SessionGuard::new(session, kind);
        let result = body(&mut guard.session).await;
        guard.release();

        result.map_err(|source| InferenceError::InferenceFailed {
            backend: kind,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::llm::scripted::ScriptedBackend;

    fn manager(backend: Arc<ScriptedBackend>) -> SessionManager {
        SessionManager::new(None, Some(backend))
    }

    #[tokio::test]
    async fn test_release_after_success() {
        let backend = Arc::new(ScriptedBackend::new(BackendKind::Remote).with_reply("hello"));
        let sessions = manager(backend.clone());

        let out = sessions
            .with_session(BackendKind::Remote, Some("be brief"), |session| {
                Box::pin(async move { session.prompt("hi").await })
            })
            .await
            .unwrap();

        assert_eq!(out, "hello");
        assert_eq!(backend.created(), 1);
        assert_eq!(backend.released(), 1);
        assert_eq!(
            backend.system_instructions(),
            vec![Some("be brief".to_string())]
        );
    }

    #[tokio::test]
    async fn test_release_after_body_error() {
        let backend = Arc::new(
            ScriptedBackend::new(BackendKind::Remote).with_prompt_error("quota exceeded"),
        );
        let sessions = manager(backend.clone());

        let err = sessions
            .with_session(BackendKind::Remote, None, |session| {
                Box::pin(async move { session.prompt("hi").await })
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InferenceError::InferenceFailed {
                backend: BackendKind::Remote,
                ..
            }
        ));
        assert_eq!(backend.created(), 1);
        assert_eq!(backend.released(), 1);
    }

    #[tokio::test]
    async fn test_release_after_cancellation() {
        let backend = Arc::new(ScriptedBackend::new(BackendKind::Remote).with_reply("late"));
        let sessions = manager(backend.clone());

        let request = sessions.with_session(BackendKind::Remote, None, |session| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                session.prompt("never sent").await
            })
        });
        let outcome = tokio::time::timeout(Duration::from_millis(20), request).await;

        assert!(outcome.is_err());
        assert_eq!(backend.created(), 1);
        assert_eq!(backend.released(), 1);
        assert_eq!(backend.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_skips_body() {
        let backend = Arc::new(ScriptedBackend::new(BackendKind::Remote).with_create_error());
        let sessions = manager(backend.clone());

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let err = sessions
            .with_session(BackendKind::Remote, None, move |_session| {
                Box::pin(async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, InferenceError::SessionCreateFailed { .. }));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(backend.created(), 0);
        assert_eq!(backend.released(), 0);
    }

    #[tokio::test]
    async fn test_missing_backend_is_create_failure() {
        let sessions = SessionManager::new(None, None);
        let err = sessions
            .with_session(BackendKind::OnDevice, None, |session| {
                Box::pin(async move { session.prompt("x").await })
            })
            .await
            .unwrap_err();

        assert_eq!(err.backend(), BackendKind::OnDevice);
        assert!(matches!(err, InferenceError::SessionCreateFailed { .. }));
    }

    #[tokio::test]
    async fn test_sessions_are_not_reused() {
        let backend = Arc::new(
            ScriptedBackend::new(BackendKind::Remote)
                .with_reply("one")
                .with_reply("two"),
        );
        let sessions = manager(backend.clone());

        for _ in 0..2 {
            sessions
                .with_session(BackendKind::Remote, None, |session| {
                    Box::pin(async move { session.prompt("q").await })
                })
                .await
                .unwrap();
        }

        assert_eq!(backend.created(), 2);
        assert_eq!(backend.released(), 2);
    }
}
