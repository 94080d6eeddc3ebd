//! Shared handle tying the pipeline stages together
//!
//! The transport task feeds [`LinkEvent`]s in, the UI issues control
//! requests, and the renderer pulls snapshots. All of them go through one
//! mutex around the [`TelemetryStore`], so a notification is decoded, gated
//! and routed across every channel as a single step and a snapshot never
//! sees half of an update.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use time::OffsetDateTime;

use crate::error::Result;
use crate::models::Channel;
use crate::telemetry::decoder::decode_or_empty;
use crate::telemetry::router::{route, MissingValuePolicy, RouteOutcome};
use crate::telemetry::snapshot::Snapshot;
use crate::telemetry::state::LinkId;
use crate::telemetry::store::TelemetryStore;

/// Report from the device link, tagged with the attempt that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEvent {
    pub link: LinkId,
    pub kind: LinkEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEventKind {
    /// Connected and subscribed to notifications
    Established,
    /// One notification payload
    Notification(Vec<u8>),
    /// Connect or subscribe failed
    Failed(String),
    /// Link dropped after being established
    Lost(String),
}

impl LinkEvent {
    pub fn new(link: LinkId, kind: LinkEventKind) -> Self {
        LinkEvent { link, kind }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryPipeline {
    store: Arc<Mutex<TelemetryStore>>,
}

impl TelemetryPipeline {
    pub fn new(capacity: usize, channels: &[Channel], policy: MissingValuePolicy) -> Self {
        Self::from_store(TelemetryStore::create(capacity, channels, policy))
    }

    pub fn from_store(store: TelemetryStore) -> Self {
        TelemetryPipeline {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Apply one transport report
    pub fn handle_event(&self, event: LinkEvent) {
        match event.kind {
            LinkEventKind::Established => {
                self.lock().connection.link_established(event.link);
            }
            LinkEventKind::Notification(bytes) => {
                self.on_notification(event.link, &bytes);
            }
            LinkEventKind::Failed(reason) => {
                self.lock().connection.link_failed(event.link, &reason);
            }
            LinkEventKind::Lost(reason) => {
                self.lock().connection.link_lost(event.link, &reason);
            }
        }
    }

    /// Ingress for one notification, stamped with the current time
    pub fn on_notification(&self, link: LinkId, bytes: &[u8]) -> RouteOutcome {
        self.on_notification_at(link, bytes, OffsetDateTime::now_utc())
    }

    pub fn on_notification_at(
        &self,
        link: LinkId,
        bytes: &[u8],
        now: OffsetDateTime,
    ) -> RouteOutcome {
        let mut store = self.lock();
        if !store.connection.routing_enabled()
            || !store.connection.is_current(link, "notification")
        {
            debug!("Dropping notification from link {}", link);
            return RouteOutcome::Gated;
        }
        debug!("Received: {}", String::from_utf8_lossy(bytes));
        let sample = decode_or_empty(bytes, now);
        if sample.is_empty() {
            debug!("No usable fields, routing a {} tick", store.policy);
        }
        route(&mut store, sample, now)
    }

    /// Start a connect attempt; the returned id must tag its link events
    pub fn request_connect(&self) -> Result<LinkId> {
        self.lock().connection.request_connect()
    }

    /// Stop routing immediately; buffers are kept
    pub fn request_disconnect(&self) {
        self.lock().connection.request_disconnect();
    }

    /// Clear all buffers regardless of connection state
    pub fn request_reset(&self) {
        self.lock().reset();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.lock())
    }

    /// End the session, disconnecting if this is the last handle
    pub fn teardown(self) {
        match Arc::try_unwrap(self.store) {
            Ok(store) => store
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .teardown(),
            Err(shared) => {
                shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .connection
                    .request_disconnect();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, TelemetryStore> {
        // The store holds plain values, so a panic elsewhere cannot leave it torn
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
