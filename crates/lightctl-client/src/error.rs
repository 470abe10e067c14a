//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("outbound queue full ({capacity} messages waiting)")]
    QueueFull { capacity: usize },

    #[error("failed to spawn connection thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let full = ClientError::QueueFull { capacity: 256 };
        assert_eq!(full.to_string(), "outbound queue full (256 messages waiting)");

        let spawn: ClientError = std::io::Error::new(std::io::ErrorKind::Other, "no threads").into();
        assert!(matches!(spawn, ClientError::Spawn(_)));
        assert_eq!(spawn.to_string(), "failed to spawn connection thread: no threads");
    }
}
