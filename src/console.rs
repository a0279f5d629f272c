//! Line-oriented front end: reads commands, runs them against the session
//! and prints session events.

use anyhow::{Context, Result};
use migdb_session::{Breakpoint, Session, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::commands::{help_text, parse_line, Action};

const PROMPT: &str = "migdb> ";

/// Whether the loop keeps reading after an action.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Read commands from stdin until `q`, end of input or the debugger exits.
pub async fn run(session: Session) -> Result<()> {
    let printer = tokio::spawn(print_events(session.subscribe()));
    let mut ended = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !session.is_terminated() {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = session_ended(&mut ended) => break,
        };
        let Some(line) = line else {
            break;
        };
        let action = match parse_line(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match run_action(&session, action).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => println!("error: {e:#}"),
        }
    }

    if !session.is_terminated() {
        if let Err(e) = session.quit().await {
            tracing::debug!("quit not sent: {}", e);
        }
    }
    printer.abort();
    Ok(())
}

async fn session_ended(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::SessionEnded { .. }) | Err(broadcast::error::RecvError::Closed) => {
                return
            }
            _ => {}
        }
    }
}

fn prompt() {
    use std::io::Write;
    print!("{PROMPT}");
    let _ = std::io::stdout().flush();
}

/// Run one parsed command.
pub async fn run_action(session: &Session, action: Action) -> Result<Flow> {
    match action {
        Action::Break(request) => {
            let bp = session.set_break(request).await?;
            println!("{}", describe_breakpoint(&bp));
        }
        Action::Delete(numbers) => session.delete_breakpoints(&numbers).await?,
        Action::Enable(numbers) => session.enable(&numbers).await?,
        Action::Disable(numbers) => session.disable(&numbers).await?,
        Action::Condition { number, expression } => session.condition(number, &expression).await?,
        Action::Run => {
            session.run().await?;
        }
        Action::Continue => {
            session.cont().await?;
        }
        Action::Step => {
            session.step().await?;
        }
        Action::Next => {
            session.next().await?;
        }
        Action::StepInstruction => {
            session.stepi().await?;
        }
        Action::NextInstruction => {
            session.nexti().await?;
        }
        Action::Until(location) => {
            session.until(location.as_deref()).await?;
        }
        Action::Finish => {
            session.finish().await?;
        }
        Action::Return => {
            session.ret().await?;
        }
        Action::Interrupt => {
            session.interrupt().await?;
        }
        Action::File { path, args } => session
            .file(&path, &args)
            .await
            .with_context(|| format!("loading {path}"))?,
        Action::Attach(pid) => {
            session.attach(pid).await?;
        }
        Action::Detach => {
            session.detach().await?;
        }
        Action::Frame(level) => match session.select_frame(level).await? {
            Some(frame) => println!("#{level} {frame}"),
            None => println!("no frame at level {level}"),
        },
        Action::Print(expression) => {
            let value = session
                .data_evaluate(&expression)
                .await
                .with_context(|| format!("evaluating {expression}"))?;
            println!("{expression} = {value}");
        }
        Action::Watch(expression) => {
            let id = session
                .add_watch(&expression)
                .await
                .with_context(|| format!("watching {expression}"))?;
            println!("watch {id}: {expression}");
        }
        Action::Unwatch(id) => {
            if !session.remove_watch(id).await? {
                println!("no watch {id}");
            }
        }
        Action::Watches => {
            for (id, expression) in session.watches() {
                let value = session
                    .watch_value(id)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                println!("{id:>3}  {expression} = {value}");
            }
        }
        Action::Mi(text) => {
            session.raw(&text).await?;
        }
        Action::Log(text) => tracing::info!(target: "migdb::console", "{}", text),
        Action::Help(name) => println!("{}", help_text(name.as_deref())?),
        Action::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(text) = describe_event(&event) {
                    println!("{text}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!("event printer skipped {} events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe_breakpoint(bp: &Breakpoint) -> String {
    let mut text = format!("breakpoint {}", bp.number);
    match (&bp.file, bp.line) {
        (Some(file), Some(line)) => text.push_str(&format!(" at {file}:{line}")),
        _ => {
            if let Some(function) = bp.function.as_deref().or(bp.address.as_deref()) {
                text.push_str(&format!(" at {function}"));
            }
        }
    }
    if let Some(condition) = &bp.condition {
        text.push_str(&format!(" if {condition}"));
    }
    if !bp.enabled {
        text.push_str(" (disabled)");
    }
    text
}

/// One printable line per user-visible event.
pub fn describe_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Error { message, .. } => Some(format!("error: {message}")),
        SessionEvent::FileChanged(path) => Some(format!("loaded {path}")),
        SessionEvent::BreakpointSet(bp) => Some(describe_breakpoint(bp)),
        SessionEvent::BreakpointDeleted(number) => Some(format!("deleted breakpoint {number}")),
        SessionEvent::ThreadSwitched(id) => Some(format!("[thread {id}]")),
        SessionEvent::FrameChanged(frame) => Some(format!("=> {frame}")),
        SessionEvent::WatchDecoded { id, value } => Some(format!("watch {id} = {value}")),
        SessionEvent::ConsoleOutput(text) | SessionEvent::TargetOutput(text) => {
            Some(text.trim_end_matches('\n').to_string())
        }
        SessionEvent::SessionEnded { exit_code } => Some(match exit_code {
            Some(code) => format!("debugger exited with code {code}"),
            None => "debugger exited".to_string(),
        }),
        SessionEvent::Processed
        | SessionEvent::WatchUpdated(_)
        | SessionEvent::RootUpdated(_) => None,
    }
}
