use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the device's link to the broker as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Never connected, or closed on purpose.
    #[default]
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Connected and able to publish.
    Connected,
    /// The connection dropped unexpectedly.
    Lost,
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Lost => write!(f, "LOST"),
        }
    }
}
