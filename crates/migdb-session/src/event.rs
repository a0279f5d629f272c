//! Events published by a session.

use crate::breakpoint::Breakpoint;
use crate::frame::Frame;
use crate::varobj::VarObject;
use crate::watch::{NativeValue, WatchId};

/// Capacity of the event channel; slow subscribers see `Lagged`.
pub(crate) const EVENT_CAPACITY: usize = 256;

/// Something observable happened in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The debugger rejected a command.
    Error {
        token: Option<u64>,
        message: String,
    },
    /// A new executable was loaded.
    FileChanged(String),
    BreakpointSet(Breakpoint),
    BreakpointDeleted(u32),
    ThreadSwitched(u32),
    FrameChanged(Frame),
    /// A response record was fully handled.
    Processed,
    /// A variable object's value or scope changed.
    WatchUpdated(VarObject),
    /// Some variable object under this root changed.
    RootUpdated(String),
    /// A typed watch has a new decoded value.
    WatchDecoded {
        id: WatchId,
        value: NativeValue,
    },
    /// Text from the debugger console stream.
    ConsoleOutput(String),
    /// Output of the debuggee.
    TargetOutput(String),
    /// The debugger exited or closed its output.
    SessionEnded {
        exit_code: Option<i32>,
    },
}
