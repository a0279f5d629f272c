//! Pending-request table.
//!
//! Tracks outstanding commands by token and routes the first matching
//! response to whoever is waiting for it. An entry is removed exactly once:
//! on the first response, on an error record, or when its waiter gives up.
use std::collections::HashMap;

use migdb_mi::Fields;
use tokio::sync::oneshot;

use crate::error::SessionError;

/// A non-error response to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub token: u64,
    /// Result or async class, e.g. `done`, `running`, `stopped`.
    pub class: String,
    pub fields: Fields,
}

/// Callback invoked once with a command's response.
pub type Callback = Box<dyn FnOnce(Response) + Send>;

/// What to do with a command's response.
pub enum Handler {
    /// Run the callback on its own task.
    Callback(Callback),
    /// Wake a caller blocked on the command.
    Waiter(oneshot::Sender<Result<Response, SessionError>>),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Callback(_) => f.write_str("Handler::Callback"),
            Handler::Waiter(_) => f.write_str("Handler::Waiter"),
        }
    }
}

/// Outstanding commands keyed by token.
#[derive(Debug, Default)]
pub struct PendingTable {
    pending: HashMap<u64, Handler>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `token`, replacing any previous one.
    pub fn register(&mut self, token: u64, handler: Handler) {
        if self.pending.insert(token, handler).is_some() {
            tracing::warn!("token {} registered twice; previous handler dropped", token);
        }
    }

    /// Register a waiter and return the receiving end.
    pub fn register_waiter(
        &mut self,
        token: u64,
    ) -> oneshot::Receiver<Result<Response, SessionError>> {
        let (tx, rx) = oneshot::channel();
        self.register(token, Handler::Waiter(tx));
        rx
    }

    /// Remove and return the handler for a response.
    pub fn take(&mut self, token: u64) -> Option<Handler> {
        self.pending.remove(&token)
    }

    /// Drop the handler for `token` without invoking it.
    ///
    /// Returns true if it was found.
    pub fn cancel(&mut self, token: u64) -> bool {
        self.pending.remove(&token).is_some()
    }

    /// Fail every outstanding request, waking waiters with `Terminated`.
    pub fn fail_all(&mut self) {
        for (_, handler) in self.pending.drain() {
            if let Handler::Waiter(tx) = handler {
                let _ = tx.send(Err(SessionError::Terminated));
            }
        }
    }

    pub fn contains(&self, token: u64) -> bool {
        self.pending.contains_key(&token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Deliver a response to a handler taken from the table.
///
/// Callbacks run on a fresh task so a slow handler cannot stall the reader.
pub(crate) fn deliver(handler: Handler, response: Response) {
    match handler {
        Handler::Callback(callback) => {
            tokio::spawn(async move { callback(response) });
        }
        Handler::Waiter(tx) => {
            // The waiter may have timed out already.
            let _ = tx.send(Ok(response));
        }
    }
}

/// Tell a handler its command failed. Callbacks are dropped uninvoked.
pub(crate) fn reject(handler: Handler, token: u64, message: &str) {
    if let Handler::Waiter(tx) = handler {
        let _ = tx.send(Err(SessionError::Command {
            token,
            message: message.to_string(),
        }));
    }
}
