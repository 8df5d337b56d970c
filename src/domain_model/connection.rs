use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

const ALPHABET: [char; 16] = [
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
];

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn generate() -> Self {
        ConnectionId(nanoid::nanoid!(16, &ALPHABET))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

/// Shared, lock-free view of a connection's lifecycle. `Closed` is terminal.
#[derive(Debug)]
pub struct ConnectionStatus(AtomicU8);

impl ConnectionStatus {
    pub fn new() -> Self {
        ConnectionStatus(AtomicU8::new(ConnectionState::Connecting as u8))
    }

    pub fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::Acquire) {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }

    /// Moves `Connecting -> Open`. Returns false if the connection already closed.
    pub fn open(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn close(&self) {
        self.0
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Close codes sent when a realtime handshake is refused.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HandshakeRejection {
    MissingToken,
    InvalidToken,
    WrongTokenKind,
    TokenRevoked,
}

impl HandshakeRejection {
    pub fn close_code(self) -> u16 {
        match self {
            HandshakeRejection::MissingToken => 4001,
            HandshakeRejection::InvalidToken => 4002,
            HandshakeRejection::WrongTokenKind => 4003,
            HandshakeRejection::TokenRevoked => 4004,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            HandshakeRejection::MissingToken => "Missing token",
            HandshakeRejection::InvalidToken => "Invalid token",
            HandshakeRejection::WrongTokenKind => "Invalid token type",
            HandshakeRejection::TokenRevoked => "Token revoked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_terminal() {
        let status = ConnectionStatus::new();
        assert_eq!(status.get(), ConnectionState::Connecting);
        assert!(status.open());
        assert_eq!(status.get(), ConnectionState::Open);
        status.close();
        assert!(!status.open());
        assert_eq!(status.get(), ConnectionState::Closed);
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }
}
