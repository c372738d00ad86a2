//! On-device capability probing.

use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::{CapabilityState, InferenceBackend};

/// Determines whether the on-device engine can serve requests right now.
///
/// State is re-derived on every call; nothing is cached between requests.
#[derive(Clone)]
pub struct CapabilityProber {
    on_device: Option<Arc<dyn InferenceBackend>>,
}

impl CapabilityProber {
    /// Create a prober for the given on-device backend.
    ///
    /// `None` models a host without the on-device feature at all.
    pub fn new(on_device: Option<Arc<dyn InferenceBackend>>) -> Self {
        Self { on_device }
    }

    /// Whether an on-device backend is configured at all.
    pub fn has_engine(&self) -> bool {
        self.on_device.is_some()
    }

    /// Probe the on-device engine.
    ///
    /// Probe failures are absorbed and reported as `Unavailable`.
    pub async fn probe(&self) -> CapabilityState {
        let Some(backend) = &self.on_device else {
            debug!("No on-device engine configured");
            return CapabilityState::Unavailable;
        };

        match backend.probe().await {
            Ok(state) => {
                debug!("On-device engine {} reports {}", backend.name(), state);
                state
            }
            Err(e) => {
                warn!(
                    "Could not determine {} readiness, treating as unavailable: {}",
                    backend.name(),
                    e
                );
                CapabilityState::Unavailable
            }
        }
    }

    /// True only when the engine reports `Available`.
    pub async fn is_ready(&self) -> bool {
        self.probe().await == CapabilityState::Available
    }
}
