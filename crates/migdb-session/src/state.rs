//! Session run-state machine.
//!
//! `Idle` means the debugger is ready for input. Submitting any command
//! moves to `AwaitingStop`; a `*stopped` record or a `done`, `connected`,
//! `error` or `exit` result moves back. Separately the machine tracks
//! whether the debuggee is running, which is what gates execution control.

use crate::error::SessionError;
use crate::frame::Frame;

/// Result classes that hand input back to the caller.
const INPUT_RESTORING_CLASSES: &[&str] = &["done", "connected", "error", "exit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting input.
    Idle,
    /// A command is in flight or the debuggee is running.
    AwaitingStop,
    /// The debugger is gone.
    Terminated,
}

/// Run state, current thread and current frame of a session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    state: SessionState,
    target_running: bool,
    /// Token of the execution command that set the target running.
    exec_token: Option<u64>,
    thread_id: Option<u32>,
    frame: Option<Frame>,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            target_running: false,
            exec_token: None,
            thread_id: None,
            frame: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn accepting_input(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn target_running(&self) -> bool {
        self.target_running
    }

    pub fn thread_id(&self) -> Option<u32> {
        self.thread_id
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Transition for a command about to be written.
    ///
    /// Commands that resume the target are refused while it is running.
    pub fn begin_command(&mut self, token: u64, resumes_target: bool) -> Result<(), SessionError> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::Terminated);
        }
        if resumes_target {
            if self.target_running {
                return Err(SessionError::Busy);
            }
            self.target_running = true;
            self.exec_token = Some(token);
        }
        self.state = SessionState::AwaitingStop;
        Ok(())
    }

    /// Transition for an async record.
    pub fn on_async(&mut self, class: &str) {
        if self.state == SessionState::Terminated {
            return;
        }
        match class {
            "running" => self.target_running = true,
            "stopped" => {
                self.target_running = false;
                self.exec_token = None;
                self.state = SessionState::Idle;
            }
            _ => {}
        }
    }

    /// Transition for a result record.
    pub fn on_result(&mut self, token: Option<u64>, class: &str) {
        if self.state == SessionState::Terminated {
            return;
        }
        if INPUT_RESTORING_CLASSES.contains(&class) {
            self.state = SessionState::Idle;
        }
        // An execution command that did not start the target (e.g. ^error)
        if token.is_some() && token == self.exec_token && class != "running" {
            self.target_running = false;
            self.exec_token = None;
        }
    }

    /// Record the current thread. Returns true if it changed.
    pub fn update_thread(&mut self, thread_id: u32) -> bool {
        let changed = self.thread_id != Some(thread_id);
        self.thread_id = Some(thread_id);
        changed
    }

    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    /// Move to `Terminated`. Returns false if already there.
    pub fn terminate(&mut self) -> bool {
        if self.state == SessionState::Terminated {
            return false;
        }
        self.state = SessionState::Terminated;
        self.target_running = false;
        self.exec_token = None;
        true
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}
