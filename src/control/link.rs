use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{LinkConfig, PoseConfig};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// What the pose transport reports.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectivityEvent {
    Connected,
    Disconnected,
}

/// Connectivity of the pose stream.
///
/// The host owns the socket; the link only decides when to try again. Every
/// disconnect asks for a reconnect after the same fixed delay.
pub struct Link {
    state: LinkState,
    attempts: u32,
    delay: Duration,
}

impl Link {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            state: LinkState::Disconnected,
            attempts: 0,
            delay: config.reconnect_delay(),
        }
    }

    /// Returns the delay before the next connection attempt, if one is due.
    pub fn handle(&mut self, event: ConnectivityEvent) -> Option<Duration> {
        match event {
            ConnectivityEvent::Connected => {
                debug!(after_attempts = self.attempts, "pose link connected");
                self.state = LinkState::Connected;
                self.attempts = 0;
                None
            }
            ConnectivityEvent::Disconnected => {
                self.state = LinkState::Disconnected;
                self.attempts += 1;
                warn!(attempt = self.attempts, delay_ms = self.delay.as_millis() as u64, "pose link lost, reconnecting");
                Some(self.delay)
            }
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Reconnect attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Websocket URL of the pose detector for a given video size.
pub fn endpoint_url(config: &PoseConfig, width: u32, height: u32) -> String {
    format!("ws://{}:{}{}/{}x{}", config.host, config.port, config.uri, width, height)
}
