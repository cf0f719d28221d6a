//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "module"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Service-platform registration seam for baseline bills-of-materials."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use async_trait::async_trait;
use ncm_common::{NcmError, NcmResult};
use parking_lot::Mutex;

/// The bill-of-materials pushed to the licensing platform for one baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineRegistration {
    /// Project id on the external platform; `-1` before registration.
    pub platform_project_id: i64,
    /// Name of the registered baseline.
    pub baseline_name: String,
    /// SKU to quantity.
    pub sku_quantities: BTreeMap<String, u32>,
}

/// Outbound seam to the external licensing platform. Implementations own
/// authentication; an expired token surfaces as
/// [`NcmError::ServicePlatformUnauthorized`] so callers know to re-login.
#[async_trait]
pub trait PlatformRegistrar: Send + Sync {
    /// Push one baseline bill-of-materials to the platform.
    async fn register_baseline(&self, registration: &BaselineRegistration) -> NcmResult<()>;
}

/// Test double recording every registration and optionally failing the next
/// call with an armed error.
#[derive(Debug, Default)]
pub struct RecordingRegistrar {
    calls: Mutex<Vec<BaselineRegistration>>,
    fail_next: Mutex<Option<NcmError>>,
}

impl RecordingRegistrar {
    /// Fresh double that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the double: the next call fails with `err`.
    pub fn fail_next(&self, err: NcmError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Drain and return the recorded registrations.
    pub fn take_calls(&self) -> Vec<BaselineRegistration> {
        std::mem::take(&mut self.calls.lock())
    }
}

#[async_trait]
impl PlatformRegistrar for RecordingRegistrar {
    async fn register_baseline(&self, registration: &BaselineRegistration) -> NcmResult<()> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        self.calls.lock().push(registration.clone());
        Ok(())
    }
}
