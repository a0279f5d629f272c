//! migdb-session: GDB/MI session controller.
//!
//! Spawns or connects to a debugger speaking the machine interface,
//! correlates token-tagged commands with their responses, tracks run
//! state, frames and breakpoints, and decodes watched expressions into
//! native values through variable objects.

pub mod breakpoint;
pub mod command;
mod control;
pub mod error;
pub mod event;
pub mod frame;
pub mod launch;
pub mod pending;
pub mod session;
pub mod state;
pub mod typename;
mod variables;
pub mod varobj;
pub mod watch;
mod watcher;

pub use breakpoint::{Breakpoint, BreakpointTable};
pub use command::{BreakInsert, DisassembleRange, MiCommand, PrintValues, VarFormat, WatchKind};
pub use error::SessionError;
pub use event::SessionEvent;
pub use frame::Frame;
pub use launch::{launch, LaunchOptions};
pub use pending::{Handler, Response};
pub use session::{Session, SessionOptions};
pub use state::SessionState;
pub use typename::{normalize_type, parse_type, CppType};
pub use varobj::VarObject;
pub use watch::{NativeValue, TypedWatch, WatchId};
