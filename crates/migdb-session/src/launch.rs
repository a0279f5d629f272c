//! Spawning the debugger.
//!
//! The debugger runs with `--interpreter=mi` and piped stdio. With a tty
//! requested, a pseudo-terminal is allocated for the debuggee; its output
//! is read on a blocking thread and published as target output.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read};
use std::process::Stdio;

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt, PtyMaster};
use tokio::process::Command;

use crate::error::SessionError;
use crate::session::{lossy_line, Session, SessionOptions};

/// Default debugger executable.
pub const DEFAULT_DEBUGGER: &str = "gdb";

/// How to start the debugger.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub program: String,
    /// Extra arguments placed before the MI flags.
    pub args: Vec<String>,
    /// Give the debuggee its own pseudo-terminal.
    pub use_tty: bool,
    pub session: SessionOptions,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            program: DEFAULT_DEBUGGER.to_string(),
            args: Vec::new(),
            use_tty: true,
            session: SessionOptions::default(),
        }
    }
}

impl LaunchOptions {
    /// Full argument list passed to the debugger.
    pub fn command_args(&self, tty: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(tty) = tty {
            args.push(format!("--tty={tty}"));
        }
        args.push("--interpreter=mi".to_string());
        args
    }
}

/// Master side of the debuggee's terminal plus an open slave, which keeps
/// the master readable until the debugger exits.
struct TargetTerminal {
    master: PtyMaster,
    slave: File,
    path: String,
}

fn open_terminal() -> Result<TargetTerminal, SessionError> {
    let nix_err = |e: nix::Error| SessionError::Io(format!("pseudo-terminal: {e}"));
    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(nix_err)?;
    grantpt(&master).map_err(nix_err)?;
    unlockpt(&master).map_err(nix_err)?;
    let path = ptsname_r(&master).map_err(nix_err)?;
    let slave = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| SessionError::Io(format!("{path}: {e}")))?;
    Ok(TargetTerminal {
        master,
        slave,
        path,
    })
}

/// Hand each line of `reader` to `each` until end of input or a read
/// error. Invalid UTF-8 is replaced, never fatal.
fn forward_lines<R: Read>(reader: R, mut each: impl FnMut(&str)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => each(&lossy_line(&buf)),
            Err(e) => {
                tracing::debug!("debuggee terminal closed: {}", e);
                break;
            }
        }
    }
}

/// Start the debugger and return a session connected to it.
///
/// A supervisor task waits for the process and ends the session with its
/// exit code.
pub async fn launch(options: LaunchOptions) -> Result<Session, SessionError> {
    let terminal = if options.use_tty {
        Some(open_terminal()?)
    } else {
        None
    };
    let args = options.command_args(terminal.as_ref().map(|t| t.path.as_str()));
    tracing::info!("starting {} {}", options.program, args.join(" "));

    let mut child = Command::new(&options.program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| SessionError::Io("could not capture debugger stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SessionError::Io("could not capture debugger stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SessionError::Io("could not capture debugger stderr".into()))?;

    let session = Session::spawn(stdin, stdout, options.session, false);
    session.attach_stderr(stderr);

    let slave = terminal.map(|TargetTerminal { master, slave, .. }| {
        let target = session.clone();
        tokio::task::spawn_blocking(move || {
            // Ends with EIO once the slave side is closed.
            forward_lines(master, |line| target.target_line(line));
        });
        slave
    });

    let weak = session.downgrade();
    tokio::spawn(async move {
        let status = child.wait().await;
        drop(slave);
        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!("waiting for debugger failed: {}", e);
                None
            }
        };
        if let Some(session) = Session::upgrade(&weak) {
            session.end(exit_code);
        }
    });

    Ok(session)
}
