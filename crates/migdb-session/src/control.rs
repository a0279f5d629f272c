//! Convenience wrappers for files, breakpoints, execution and frames.

use crate::breakpoint::Breakpoint;
use crate::command::{BreakInsert, MiCommand};
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::frame::Frame;
use crate::pending::Response;
use crate::session::Session;

impl Session {
    /// Load an executable and set its arguments.
    pub async fn file(&self, path: &str, args: &[String]) -> Result<(), SessionError> {
        self.execute(MiCommand::exec_arguments(args.iter().cloned()))
            .await?;
        self.execute(MiCommand::file_exec_and_symbols(path)).await?;
        tracing::info!("loaded {}", path);
        self.emit(SessionEvent::FileChanged(path.to_string()));
        Ok(())
    }

    /// Attach to a running process.
    pub async fn attach(&self, pid: u32) -> Result<Response, SessionError> {
        self.execute(MiCommand::target_attach(&pid.to_string()))
            .await
    }

    pub async fn detach(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::target_detach()).await
    }

    // Breakpoints

    /// Insert a breakpoint and return it as the debugger reported it.
    pub async fn set_break(&self, request: BreakInsert) -> Result<Breakpoint, SessionError> {
        let response = self.execute(MiCommand::break_insert(&request)).await?;
        response
            .fields
            .get_tuple("bkpt")
            .and_then(Breakpoint::from_fields)
            .ok_or_else(|| SessionError::InvalidResponse("break-insert without bkpt".into()))
    }

    pub async fn tbreak(&self, location: &str) -> Result<Breakpoint, SessionError> {
        self.set_break(BreakInsert::at(location).temporary()).await
    }

    pub async fn hbreak(&self, location: &str) -> Result<Breakpoint, SessionError> {
        self.set_break(BreakInsert::at(location).hardware()).await
    }

    pub async fn thbreak(&self, location: &str) -> Result<Breakpoint, SessionError> {
        self.set_break(BreakInsert::at(location).temporary().hardware())
            .await
    }

    pub async fn delete_breakpoints(&self, numbers: &[u32]) -> Result<(), SessionError> {
        self.execute(MiCommand::break_delete(numbers)).await?;
        for number in numbers {
            self.forget_breakpoint(*number);
        }
        Ok(())
    }

    pub async fn enable(&self, numbers: &[u32]) -> Result<(), SessionError> {
        self.execute(MiCommand::break_enable(numbers)).await?;
        self.set_enabled(numbers, true);
        Ok(())
    }

    pub async fn disable(&self, numbers: &[u32]) -> Result<(), SessionError> {
        self.execute(MiCommand::break_disable(numbers)).await?;
        self.set_enabled(numbers, false);
        Ok(())
    }

    fn set_enabled(&self, numbers: &[u32], enabled: bool) {
        let mut updated = Vec::new();
        {
            let mut table = self.breakpoint_table();
            for number in numbers {
                if table.set_enabled(*number, enabled) {
                    updated.extend(table.get(*number).cloned());
                }
            }
        }
        for bp in updated {
            self.emit(SessionEvent::BreakpointSet(bp));
        }
    }

    /// Set or, with an empty expression, clear a breakpoint condition.
    pub async fn condition(&self, number: u32, expression: &str) -> Result<(), SessionError> {
        self.execute(MiCommand::break_condition(number, expression))
            .await?;
        let condition = (!expression.trim().is_empty()).then(|| expression.to_string());
        let updated = {
            let mut table = self.breakpoint_table();
            table.set_condition(number, condition);
            table.get(number).cloned()
        };
        if let Some(bp) = updated {
            self.emit(SessionEvent::BreakpointSet(bp));
        }
        Ok(())
    }

    // Execution. Each returns once the debugger acknowledged the command;
    // the stop arrives later as an event.

    pub async fn run(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_run()).await
    }

    pub async fn cont(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_continue()).await
    }

    pub async fn step(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_step()).await
    }

    pub async fn next(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_next()).await
    }

    pub async fn stepi(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_step_instruction()).await
    }

    pub async fn nexti(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_next_instruction()).await
    }

    pub async fn until(&self, location: Option<&str>) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_until(location)).await
    }

    pub async fn finish(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_finish()).await
    }

    /// Pop the selected frame (`-exec-return`).
    pub async fn ret(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_return()).await
    }

    /// Stop a running target. Allowed while the target runs.
    pub async fn interrupt(&self) -> Result<Response, SessionError> {
        self.execute(MiCommand::exec_interrupt()).await
    }

    // Stack

    /// Select a frame and refresh the current frame from it.
    pub async fn select_frame(&self, level: u32) -> Result<Option<Frame>, SessionError> {
        self.execute(MiCommand::stack_select_frame(level)).await?;
        let response = self.execute(MiCommand::stack_info_frame()).await?;
        Ok(response.fields.get_tuple("frame").and_then(Frame::from_fields))
    }

    /// Evaluate an expression without creating a variable object.
    pub async fn data_evaluate(&self, expression: &str) -> Result<String, SessionError> {
        let response = self
            .execute(MiCommand::data_evaluate_expression(expression))
            .await?;
        response
            .fields
            .get_str("value")
            .map(str::to_string)
            .ok_or_else(|| SessionError::InvalidResponse("evaluate without value".into()))
    }

    /// Send user-typed text (MI or CLI) as is. Output arrives as events.
    pub async fn raw(&self, text: &str) -> Result<u64, SessionError> {
        self.send(MiCommand::raw(text)).await
    }

    /// Ask the debugger to exit.
    pub async fn quit(&self) -> Result<(), SessionError> {
        self.send(MiCommand::gdb_exit()).await.map(|_| ())
    }
}
