//! Error types for the client and the process lifecycle manager.

use std::path::PathBuf;

/// Failures raised by [`LlamaClient`](crate::client::LlamaClient) calls.
///
/// Every client method performs exactly one HTTP exchange and maps its
/// outcome onto one of these variants; nothing is retried or reinterpreted.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Server reachable but returned a non-2xx status.
    #[error("llama-server returned HTTP {status} {status_text}")]
    Http { status: u16, status_text: String },

    /// Deadline exceeded while awaiting the response.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Server unreachable (connection refused, DNS, network).
    #[error("connection to llama-server failed: {0}")]
    Connection(String),

    /// Any other transport-level failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Response arrived but its body did not match the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

/// Failures raised by [`ServerManager`](crate::process::ServerManager)
/// lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("llama-server already running with pid {0}")]
    AlreadyRunning(u32),

    #[error("llama-server not running")]
    NotRunning,

    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spawn reported success but yielded no process id.
    #[error("failed to start {}: no process id", path.display())]
    NoPid { path: PathBuf },

    #[error("llama-server did not become healthy after {attempts} attempts")]
    Unhealthy { attempts: u32 },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_carries_status() {
        let err = ClientError::Http {
            status: 503,
            status_text: "Service Unavailable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("Service Unavailable"));
    }

    #[test]
    fn timeout_and_connection_messages_differ() {
        let timeout = ClientError::Timeout { timeout_ms: 250 }.to_string();
        let refused = ClientError::Connection("connection refused".into()).to_string();
        assert!(timeout.contains("timed out"));
        assert!(refused.contains("connection"));
        assert_ne!(timeout, refused);
    }

    #[test]
    fn lifecycle_messages_match_preconditions() {
        assert!(ProcessError::AlreadyRunning(12345).to_string().contains("12345"));
        assert!(ProcessError::AlreadyRunning(12345)
            .to_string()
            .contains("already running"));
        assert!(ProcessError::NotRunning.to_string().contains("not running"));
    }
}
