//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Ephemeral alert notifications with fixed time-to-live."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Identifier assigned to an alert when it is received.
pub type AlertId = Uuid;

/// Alert as delivered by the push channel or the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertPayload {
    /// Severity class, e.g. `warning`, `danger`, `info`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub icon: String,
    pub message: String,
}

/// Alert held on the display list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: AlertId,
    #[serde(rename = "type")]
    pub kind: String,
    pub icon: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Give a received payload a fresh id.
    pub fn from_payload(payload: AlertPayload, raised_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: payload.kind,
            icon: payload.icon,
            message: payload.message,
            raised_at,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveAlert {
    alert: Alert,
    expires_at: Instant,
}

/// Display list of alerts; newest first, uncapped, no deduplication.
#[derive(Debug, Clone)]
pub struct AlertBoard {
    ttl: Duration,
    active: Vec<ActiveAlert>,
}

impl AlertBoard {
    /// Empty board whose alerts lapse `ttl` after posting.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active: Vec::new(),
        }
    }

    /// Display lifetime applied by [`AlertBoard::post`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert at the top of the list; the alert lapses `ttl` after `now`.
    pub fn post(&mut self, alert: Alert, now: Instant) -> AlertId {
        let id = alert.id;
        self.active.insert(
            0,
            ActiveAlert {
                alert,
                expires_at: now + self.ttl,
            },
        );
        id
    }

    /// Remove a single alert. Unknown ids are ignored.
    pub fn remove(&mut self, id: AlertId) -> Option<Alert> {
        let position = self.active.iter().position(|entry| entry.alert.id == id)?;
        Some(self.active.remove(position).alert)
    }

    /// Drop every alert whose deadline is strictly before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<Alert> {
        let mut expired = Vec::new();
        self.active.retain(|entry| {
            if entry.expires_at < now {
                expired.push(entry.alert.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Number of alerts on display.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when nothing is on display.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether `id` is still on display.
    pub fn contains(&self, id: AlertId) -> bool {
        self.active.iter().any(|entry| entry.alert.id == id)
    }

    /// Alerts on display, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.active.iter().map(|entry| entry.alert.clone()).collect()
    }
}
