//! Session error types.

use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The debugger process could not be started.
    #[error("debugger failed to start: {0}")]
    Spawn(#[from] std::io::Error),

    /// Pipe or pseudo-terminal plumbing failed after start.
    #[error("i/o error: {0}")]
    Io(String),

    /// A synchronous command got no response in time.
    #[error("command {token} timed out")]
    Timeout {
        /// Token of the abandoned command.
        token: u64,
    },

    /// The debugger answered with `^error`.
    #[error("command {token} failed: {message}")]
    Command {
        /// Token of the failed command.
        token: u64,
        /// The `msg` field of the error record.
        message: String,
    },

    /// The debugger has exited or its output stream closed.
    #[error("session terminated")]
    Terminated,

    /// The debuggee is running and the command would interleave with it.
    #[error("session is busy: the target is running")]
    Busy,

    /// A response lacked a field the operation needs.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No variable object with this name is known.
    #[error("unknown variable object: {0}")]
    UnknownVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_spawn_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = SessionError::Spawn(io_err);
        assert!(err.to_string().contains("debugger failed to start"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn error_timeout_display() {
        let err = SessionError::Timeout { token: 1000004 };
        assert_eq!(err.to_string(), "command 1000004 timed out");
    }

    #[test]
    fn error_command_display() {
        let err = SessionError::Command {
            token: 7,
            message: "No symbol \"x\" in current context.".into(),
        };
        assert_eq!(
            err.to_string(),
            "command 7 failed: No symbol \"x\" in current context."
        );
    }

    #[test]
    fn error_simple_variants_display() {
        assert_eq!(SessionError::Terminated.to_string(), "session terminated");
        assert_eq!(
            SessionError::Busy.to_string(),
            "session is busy: the target is running"
        );
        assert_eq!(
            SessionError::InvalidResponse("missing name".into()).to_string(),
            "invalid response: missing name"
        );
        assert_eq!(
            SessionError::UnknownVariable("var3".into()).to_string(),
            "unknown variable object: var3"
        );
        assert_eq!(
            SessionError::Io("pty closed".into()).to_string(),
            "i/o error: pty closed"
        );
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SessionError = io_err.into();
        assert!(matches!(err, SessionError::Spawn(_)));
    }
}
