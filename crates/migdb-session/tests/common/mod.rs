//! A scripted stand-in for the debugger, connected over in-memory pipes.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use migdb_session::{Session, SessionEvent, SessionOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};

enum Control {
    Line(String),
    Bytes(Vec<u8>),
    Close,
}

/// Handle to the fake debugger.
pub struct FakeGdb {
    control: mpsc::UnboundedSender<Control>,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeGdb {
    /// Write an unsolicited line, e.g. a `*stopped` record.
    pub fn emit(&self, line: &str) {
        let _ = self.control.send(Control::Line(line.to_string()));
    }

    /// Write a line of raw bytes, which need not be UTF-8.
    pub fn emit_bytes(&self, bytes: &[u8]) {
        let _ = self.control.send(Control::Bytes(bytes.to_vec()));
    }

    /// Close the fake's stdout, as if the debugger exited.
    pub fn close(&self) {
        let _ = self.control.send(Control::Close);
    }

    /// Command lines received so far, tokens stripped.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_matching(&self, needle: &str) -> usize {
        self.received()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

/// Split `1000001-exec-run` into its token and the rest.
pub fn split_token(line: &str) -> (u64, &str) {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    let token = line[..digits].parse().unwrap_or(0);
    (token, &line[digits..])
}

/// Start a session against a fake debugger answering with `script`.
///
/// `script` gets the token and the command text and returns the lines to
/// write back.
pub fn start<F>(options: SessionOptions, mut script: F) -> (Session, FakeGdb)
where
    F: FnMut(u64, &str) -> Vec<String> + Send + 'static,
{
    let (session_stdin, gdb_stdin) = tokio::io::duplex(64 * 1024);
    let (mut gdb_stdout, session_stdout) = tokio::io::duplex(64 * 1024);
    let session = Session::new(session_stdin, session_stdout, options);

    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        let mut lines = BufReader::new(gdb_stdin).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    let (token, command) = split_token(&line);
                    log.lock().unwrap().push(command.to_string());
                    for reply in script(token, command) {
                        if gdb_stdout.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                            return;
                        }
                    }
                }
                control = control_rx.recv() => match control {
                    Some(Control::Line(line)) => {
                        if gdb_stdout.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    Some(Control::Bytes(mut bytes)) => {
                        bytes.push(b'\n');
                        if gdb_stdout.write_all(&bytes).await.is_err() {
                            return;
                        }
                    }
                    Some(Control::Close) | None => return,
                }
            }
        }
    });

    (
        session,
        FakeGdb {
            control: control_tx,
            received,
        },
    )
}

/// Start with default options.
pub fn start_default<F>(script: F) -> (Session, FakeGdb)
where
    F: FnMut(u64, &str) -> Vec<String> + Send + 'static,
{
    start(SessionOptions::default(), script)
}

/// Wait for the first event matching `pred`, failing after two seconds.
pub async fn wait_for<P>(events: &mut broadcast::Receiver<SessionEvent>, mut pred: P) -> SessionEvent
where
    P: FnMut(&SessionEvent) -> bool,
{
    let deadline = tokio::time::sleep(Duration::from_secs(2));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event.expect("event channel closed");
                if pred(&event) {
                    return event;
                }
            }
            _ = &mut deadline => panic!("timed out waiting for event"),
        }
    }
}

/// Collect events until one matches `stop`, returning all of them.
pub async fn collect_until<P>(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut stop: P,
) -> Vec<SessionEvent>
where
    P: FnMut(&SessionEvent) -> bool,
{
    let mut seen = Vec::new();
    let deadline = tokio::time::sleep(Duration::from_secs(2));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event.expect("event channel closed");
                let done = stop(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            _ = &mut deadline => panic!("timed out collecting events: {seen:?}"),
        }
    }
}

/// Reply for `-var-create` of a scalar.
pub fn var_created(token: u64, name: &str, value: &str, type_name: &str, numchild: u32) -> String {
    format!(
        r#"{token}^done,name="{name}",numchild="{numchild}",value="{value}",type="{type_name}",thread-id="1",has_more="0""#
    )
}
