//! Link lifecycle tracking
//!
//! `Disconnected → Connecting → Connected → Disconnected`, with
//! `Connecting → Error(reason)` on transport failure. A later connect request
//! acknowledges an error and starts over. Only `Connected` lets samples
//! through to the router.

use std::fmt;

use log::{info, warn};

use crate::error::{Result, TelemetryError};

/// Identifies one connect attempt; transport events carry it back
pub type LinkId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Transport diagnostic, kept verbatim
    Error(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Error(reason) => write!(f, "Error - {}", reason),
        }
    }
}

/// Connection state plus the id of the attempt that owns it
#[derive(Debug, Default)]
pub struct ConnectionMachine {
    state: ConnectionState,
    current_link: LinkId,
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn routing_enabled(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn can_connect(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Error(_)
        )
    }

    /// User connect request; returns the id for the new attempt
    pub fn request_connect(&mut self) -> Result<LinkId> {
        if !self.can_connect() {
            return Err(TelemetryError::InvalidTransition {
                from: self.state.clone(),
                request: "connect",
            });
        }
        if let ConnectionState::Error(reason) = &self.state {
            info!("Acknowledged previous error: {}", reason);
        }
        self.current_link += 1;
        self.set(ConnectionState::Connecting);
        Ok(self.current_link)
    }

    /// User disconnect request; valid from every state
    pub fn request_disconnect(&mut self) {
        // Orphan whatever attempt is in flight
        self.current_link += 1;
        self.set(ConnectionState::Disconnected);
    }

    /// Transport reports the link is up and subscribed
    pub fn link_established(&mut self, link: LinkId) -> bool {
        if !self.is_current(link, "established") {
            return false;
        }
        if self.state != ConnectionState::Connecting {
            warn!("Ignoring link established while {}", self.state);
            return false;
        }
        self.set(ConnectionState::Connected);
        true
    }

    /// Transport reports the connect attempt failed
    pub fn link_failed(&mut self, link: LinkId, reason: &str) -> bool {
        if !self.is_current(link, "failure") {
            return false;
        }
        match self.state {
            ConnectionState::Connecting => {
                self.set(ConnectionState::Error(reason.to_string()));
                true
            }
            // A failure after subscribing is a lost link
            ConnectionState::Connected => self.link_lost(link, reason),
            _ => {
                warn!("Ignoring link failure while {}: {}", self.state, reason);
                false
            }
        }
    }

    /// Transport reports an unexpected disconnect
    pub fn link_lost(&mut self, link: LinkId, reason: &str) -> bool {
        if !self.is_current(link, "loss") {
            return false;
        }
        if self.state != ConnectionState::Connected {
            warn!("Ignoring link loss while {}: {}", self.state, reason);
            return false;
        }
        warn!("{}", TelemetryError::LinkLost(reason.to_string()));
        self.set(ConnectionState::Disconnected);
        true
    }

    /// Whether `link` still owns the session
    pub fn is_current(&self, link: LinkId, what: &str) -> bool {
        if link != self.current_link {
            warn!(
                "Dropping stale link {} {} (current link is {})",
                link, what, self.current_link
            );
            return false;
        }
        true
    }

    fn set(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("Status: {} -> {}", self.state, next);
        }
        self.state = next;
    }
}
