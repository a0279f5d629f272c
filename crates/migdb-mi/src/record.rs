//! MI output records and the visitor that consumes them.

use crate::value::Fields;

/// Channel of a stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamChannel {
    /// `~`: debugger console output.
    Console,
    /// `@`: output of the debuggee.
    Target,
    /// `&`: debugger internal log.
    Log,
}

/// Kind of an out-of-band async record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncKind {
    /// `*`: execution state changes.
    Exec,
    /// `=`: supplementary notifications.
    Notify,
    /// `+`: progress of slow operations.
    Status,
}

/// One line of MI output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Stream {
        channel: StreamChannel,
        text: String,
    },
    Async {
        kind: AsyncKind,
        token: Option<u64>,
        class: String,
        fields: Fields,
    },
    Result {
        token: Option<u64>,
        class: String,
        fields: Fields,
    },
    /// The `(gdb)` end-of-turn marker.
    Prompt,
}

impl Record {
    /// The command token, for async and result records that carry one.
    pub fn token(&self) -> Option<u64> {
        match self {
            Record::Async { token, .. } | Record::Result { token, .. } => *token,
            _ => None,
        }
    }

    /// Deliver this record to the matching visitor method.
    pub fn accept<V: RecordVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Record::Stream { channel, text } => visitor.on_stream(*channel, text),
            Record::Async {
                kind,
                token,
                class,
                fields,
            } => match kind {
                AsyncKind::Exec => visitor.on_exec_async(*token, class, fields),
                AsyncKind::Notify => visitor.on_notify_async(*token, class, fields),
                AsyncKind::Status => visitor.on_status_async(*token, class, fields),
            },
            Record::Result {
                token,
                class,
                fields,
            } => visitor.on_result(*token, class, fields),
            Record::Prompt => visitor.on_prompt(),
        }
    }
}

/// Receives parsed records, one call per line.
///
/// Every method has an empty default so visitors only implement what they
/// care about.
pub trait RecordVisitor {
    fn on_stream(&mut self, _channel: StreamChannel, _text: &str) {}
    fn on_exec_async(&mut self, _token: Option<u64>, _class: &str, _fields: &Fields) {}
    fn on_notify_async(&mut self, _token: Option<u64>, _class: &str, _fields: &Fields) {}
    fn on_status_async(&mut self, _token: Option<u64>, _class: &str, _fields: &Fields) {}
    fn on_result(&mut self, _token: Option<u64>, _class: &str, _fields: &Fields) {}
    fn on_prompt(&mut self) {}
}
