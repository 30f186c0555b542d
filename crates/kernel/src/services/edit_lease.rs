//! Advisory edit lease.
//!
//! Editors heartbeat the resource they have open, stamping `viewedBy` and
//! `viewedOn` on the stored document. Another user opening the same resource
//! within the heartbeat window is told who is editing it.
//!
//! The lease is advisory only: writes never check it, and two editors racing
//! on a heartbeat simply overwrite each other. A heartbeat touches only the
//! two stamps; a full save carries whatever stamps the editor loaded.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ServiceError, ServiceResult};
use crate::store::{ResourceStore, Scope};

/// Interval at which editors send heartbeats, in seconds.
pub const HEARTBEAT_INTERVAL_SECS: i64 = 60;

/// Extra wait before a missed heartbeat releases the lease, in seconds.
pub const HEARTBEAT_GRACE_SECS: i64 = 5;

/// Current holder of a resource's edit lease.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLease {
    pub viewed_by: String,
    pub viewed_on: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl EditLease {
    /// Lease described by a document's stamps, if still within the window.
    pub fn from_document(document: &Value, now: DateTime<Utc>) -> Option<Self> {
        let viewed_by = document.get("viewedBy")?.as_str()?.to_string();
        let viewed_on: DateTime<Utc> = document
            .get("viewedOn")
            .and_then(|v| serde_json::from_value(v.clone()).ok())?;

        let expires_at =
            viewed_on + Duration::seconds(HEARTBEAT_INTERVAL_SECS + HEARTBEAT_GRACE_SECS);
        (now < expires_at).then_some(Self {
            viewed_by,
            viewed_on,
            expires_at,
        })
    }
}

/// Edit lease service.
#[derive(Clone)]
pub struct EditLeaseService {
    store: Arc<dyn ResourceStore>,
}

impl EditLeaseService {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Stamp `user` as the current editor.
    pub async fn heartbeat(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        user: &str,
    ) -> ServiceResult<EditLease> {
        let now = Utc::now();
        let mut stamps = Map::new();
        stamps.insert("viewedBy".to_string(), Value::String(user.to_string()));
        stamps.insert(
            "viewedOn".to_string(),
            serde_json::to_value(now).map_err(anyhow::Error::from)?,
        );

        // Only the stamps are written, so a save landing between heartbeats is kept.
        if !self.store.merge(scope, category, id, &stamps).await? {
            return Err(ServiceError::not_found("resource", id));
        }

        debug!(%scope, category, id, user, "edit lease heartbeat");
        Ok(EditLease {
            viewed_by: user.to_string(),
            viewed_on: now,
            expires_at: now + Duration::seconds(HEARTBEAT_INTERVAL_SECS + HEARTBEAT_GRACE_SECS),
        })
    }

    /// The lease held by someone other than `user`, if any.
    pub async fn held_by_other(
        &self,
        scope: &Scope,
        category: &str,
        id: &str,
        user: &str,
    ) -> ServiceResult<Option<EditLease>> {
        let document = self
            .store
            .find(scope, category, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("resource", id))?;

        Ok(EditLease::from_document(&document, Utc::now()).filter(|lease| lease.viewed_by != user))
    }
}

impl std::fmt::Debug for EditLeaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditLeaseService").finish()
    }
}
