//! The session controller.
//!
//! A [`Session`] owns one debugger connection: a writer task draining
//! command lines into the debugger's stdin and a reader task feeding each
//! stdout line through the MI grammar into a [`RecordVisitor`] that
//! correlates responses with pending commands and keeps the derived state
//! (run status, thread, frame, breakpoints, variable objects) current.
//!
//! Every table sits behind its own mutex. Locks are held for the duration
//! of a table operation only, never across an `.await`.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use migdb_mi::{Fields, MiGrammar, RecordVisitor, StreamChannel};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;

use crate::breakpoint::{Breakpoint, BreakpointTable};
use crate::command::MiCommand;
use crate::error::SessionError;
use crate::event::{SessionEvent, EVENT_CAPACITY};
use crate::frame::Frame;
use crate::pending::{deliver, reject, Handler, PendingTable, Response};
use crate::state::{SessionState, SessionStatus};
use crate::varobj::{VarObject, VarTable};
use crate::watch::WatchRegistry;

/// Default wait for a synchronous command (milliseconds).
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// First token handed out by a new session.
pub const DEFAULT_FIRST_TOKEN: u64 = 1_000_001;

/// Default upper bound on decoded container elements.
pub const DEFAULT_MAX_CONTAINER_ELEMENTS: usize = 1000;

/// Tunables of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long [`Session::execute`] waits for a response.
    pub command_timeout: Duration,
    pub first_token: u64,
    /// Run `-var-update` after every stop.
    pub auto_update_vars: bool,
    /// Upper bound on vector elements and map nodes a watch decodes.
    pub max_container_elements: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            first_token: DEFAULT_FIRST_TOKEN,
            auto_update_vars: true,
            max_container_elements: DEFAULT_MAX_CONTAINER_ELEMENTS,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) options: SessionOptions,
    writer: mpsc::Sender<String>,
    next_token: AtomicU64,
    pub(crate) next_watch: AtomicU64,
    grammar: MiGrammar,
    pending: Mutex<PendingTable>,
    breakpoints: Mutex<BreakpointTable>,
    status: Mutex<SessionStatus>,
    pub(crate) vars: Mutex<VarTable>,
    pub(crate) watches: Mutex<WatchRegistry>,
    events: broadcast::Sender<SessionEvent>,
}

/// Lock a table, recovering from a panicked holder.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decode one output line, dropping the terminator. Bytes that are not
/// UTF-8 become U+FFFD rather than failing the line.
pub(crate) fn lossy_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(line) => line.to_string(),
        Cow::Owned(line) => {
            tracing::debug!("replaced invalid UTF-8 in output line");
            line
        }
    }
}

/// Read one line with [`lossy_line`]. `Ok(None)` at end of input.
pub(crate) async fn next_line_lossy<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(lossy_line(buf)))
}

/// Handle to a debugger session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &lock(&self.inner.status).state())
            .field("pending", &lock(&self.inner.pending).pending_count())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session over the debugger's stdin and stdout.
    ///
    /// End of stdout ends the session. Must be called inside a tokio
    /// runtime.
    pub fn new<W, R>(stdin: W, stdout: R, options: SessionOptions) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self::spawn(stdin, stdout, options, true)
    }

    pub(crate) fn spawn<W, R>(stdin: W, stdout: R, options: SessionOptions, end_on_eof: bool) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (writer_tx, mut writer_rx) = mpsc::channel::<String>(64);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            next_token: AtomicU64::new(options.first_token),
            next_watch: AtomicU64::new(1),
            options,
            writer: writer_tx,
            grammar: MiGrammar::new(),
            pending: Mutex::new(PendingTable::new()),
            breakpoints: Mutex::new(BreakpointTable::new()),
            status: Mutex::new(SessionStatus::new()),
            vars: Mutex::new(VarTable::new()),
            watches: Mutex::new(WatchRegistry::new()),
            events,
        });

        // Writer task: one command per line
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = writer_rx.recv().await {
                tracing::debug!(target: "migdb::gdbin", "{}", line);
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    tracing::warn!("debugger stdin closed");
                    break;
                }
            }
        });

        // Reader task: one record per line
        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                match next_line_lossy(&mut reader, &mut buf).await {
                    Ok(Some(line)) => match Session::upgrade(&weak) {
                        Some(session) => session.handle_line(&line),
                        None => return,
                    },
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("reading debugger output failed: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("debugger output closed");
            if end_on_eof {
                if let Some(session) = Session::upgrade(&weak) {
                    session.end(None);
                }
            }
        });

        Self { inner }
    }

    pub(crate) fn upgrade(weak: &Weak<Inner>) -> Option<Session> {
        weak.upgrade().map(|inner| Session { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Log the debugger's stderr.
    pub fn attach_stderr<R>(&self, stderr: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
                tracing::warn!(target: "migdb::gdberr", "{}", line);
            }
        });
    }

    /// Forward the debuggee's output as [`SessionEvent::TargetOutput`].
    pub fn attach_target_output<R>(&self, output: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let weak = self.downgrade();
        tokio::spawn(async move {
            let mut reader = BufReader::new(output);
            let mut buf = Vec::new();
            while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
                match Session::upgrade(&weak) {
                    Some(session) => session.target_line(&line),
                    None => break,
                }
            }
        });
    }

    pub(crate) fn target_line(&self, line: &str) {
        tracing::info!(target: "migdb::target", "{}", line);
        self.emit(SessionEvent::TargetOutput(line.to_string()));
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    // -- Command submission --

    /// Write a command, registering `handler` for its response.
    ///
    /// Returns the token the command was sent with.
    pub async fn submit(
        &self,
        command: &MiCommand,
        handler: Option<Handler>,
    ) -> Result<u64, SessionError> {
        let token = command
            .token()
            .unwrap_or_else(|| self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.status).begin_command(token, command.resumes_target())?;
        if let Some(handler) = handler {
            lock(&self.inner.pending).register(token, handler);
        }
        if self.inner.writer.send(command.render(token)).await.is_err() {
            lock(&self.inner.pending).cancel(token);
            return Err(SessionError::Terminated);
        }
        Ok(token)
    }

    /// Fire and forget.
    pub async fn send(&self, command: MiCommand) -> Result<u64, SessionError> {
        self.submit(&command, None).await
    }

    /// Send and run `callback` on its own task when the response arrives.
    /// The callback is dropped uninvoked if the command fails.
    pub async fn send_with<F>(&self, command: MiCommand, callback: F) -> Result<u64, SessionError>
    where
        F: FnOnce(Response) + Send + 'static,
    {
        self.submit(&command, Some(Handler::Callback(Box::new(callback))))
            .await
    }

    /// Send and wait for the response, up to the configured timeout.
    ///
    /// On timeout the pending entry is dropped so a late response is
    /// ignored.
    pub async fn execute(&self, command: MiCommand) -> Result<Response, SessionError> {
        let (tx, rx) = oneshot::channel();
        let token = self.submit(&command, Some(Handler::Waiter(tx))).await?;
        match timeout(self.inner.options.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::Terminated),
            Err(_) => {
                lock(&self.inner.pending).cancel(token);
                tracing::warn!("command {} timed out", token);
                Err(SessionError::Timeout { token })
            }
        }
    }

    // -- Output handling --

    pub(crate) fn handle_line(&self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        tracing::debug!(target: "migdb::gdbout", "{}", line);
        if line.trim().is_empty() {
            return;
        }
        let mut controller = Controller { session: self };
        if let Err(e) = self.inner.grammar.visit_line(line, &mut controller) {
            tracing::warn!("unparsed debugger output: {}", e);
        }
    }

    /// Mark the session ended. Only the first call has any effect.
    pub(crate) fn end(&self, exit_code: Option<i32>) {
        if !lock(&self.inner.status).terminate() {
            return;
        }
        lock(&self.inner.pending).fail_all();
        tracing::info!("debugger session ended (exit code {:?})", exit_code);
        self.emit(SessionEvent::SessionEnded { exit_code });
    }

    fn apply_context(&self, fields: &Fields) {
        if let Some(thread_id) = fields.get_str("thread-id").and_then(|t| t.parse().ok()) {
            if lock(&self.inner.status).update_thread(thread_id) {
                self.emit(SessionEvent::ThreadSwitched(thread_id));
            }
        }
        if let Some(frame) = fields.get_tuple("frame").and_then(Frame::from_fields) {
            lock(&self.inner.status).set_frame(frame.clone());
            self.emit(SessionEvent::FrameChanged(frame));
        }
    }

    pub(crate) fn upsert_breakpoint(&self, fields: &Fields) {
        match Breakpoint::from_fields(fields) {
            Some(bp) => {
                lock(&self.inner.breakpoints).insert(bp.clone());
                self.emit(SessionEvent::BreakpointSet(bp));
            }
            None => tracing::debug!("ignoring breakpoint record without a number"),
        }
    }

    pub(crate) fn forget_breakpoint(&self, number: u32) {
        if lock(&self.inner.breakpoints).remove(number).is_some() {
            self.emit(SessionEvent::BreakpointDeleted(number));
        }
    }

    pub(crate) fn breakpoint_table(&self) -> MutexGuard<'_, BreakpointTable> {
        lock(&self.inner.breakpoints)
    }

    fn respond(&self, token: Option<u64>, class: &str, fields: &Fields) {
        let Some(token) = token else { return };
        let handler = lock(&self.inner.pending).take(token);
        if let Some(handler) = handler {
            deliver(
                handler,
                Response {
                    token,
                    class: class.to_string(),
                    fields: fields.clone(),
                },
            );
        }
    }

    fn schedule_var_update(&self) {
        if !self.inner.options.auto_update_vars || lock(&self.inner.vars).is_empty() {
            return;
        }
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session.var_update().await {
                tracing::warn!("variable update after stop failed: {}", e);
            }
        });
    }

    // -- State queries --

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        lock(&self.inner.breakpoints).iter().cloned().collect()
    }

    pub fn breakpoint(&self, number: u32) -> Option<Breakpoint> {
        lock(&self.inner.breakpoints).get(number).cloned()
    }

    /// Whether a breakpoint sits on `file:line`.
    pub fn is_breakpoint(&self, file: &str, line: u32) -> bool {
        lock(&self.inner.breakpoints).is_breakpoint(file, line)
    }

    pub fn breakpoint_lines(&self, file: &str) -> Vec<u32> {
        lock(&self.inner.breakpoints).lines_in(file)
    }

    pub fn frame(&self) -> Option<Frame> {
        lock(&self.inner.status).frame().cloned()
    }

    pub fn thread_id(&self) -> Option<u32> {
        lock(&self.inner.status).thread_id()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.status).state()
    }

    pub fn accepting_input(&self) -> bool {
        lock(&self.inner.status).accepting_input()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.status).target_running()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == SessionState::Terminated
    }

    pub fn var(&self, name: &str) -> Option<VarObject> {
        lock(&self.inner.vars).get(name).cloned()
    }

    /// Number of commands still awaiting a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).pending_count()
    }
}

/// Applies parsed records to the session.
struct Controller<'a> {
    session: &'a Session,
}

impl RecordVisitor for Controller<'_> {
    fn on_stream(&mut self, channel: StreamChannel, text: &str) {
        match channel {
            StreamChannel::Console => self
                .session
                .emit(SessionEvent::ConsoleOutput(text.to_string())),
            StreamChannel::Target => self.session.target_line(text.trim_end_matches('\n')),
            StreamChannel::Log => tracing::debug!("debugger log: {}", text.trim_end()),
        }
    }

    fn on_exec_async(&mut self, token: Option<u64>, class: &str, fields: &Fields) {
        let session = self.session;
        lock(&session.inner.status).on_async(class);
        session.apply_context(fields);
        session.respond(token, class, fields);
        if class == "stopped" {
            session.schedule_var_update();
        }
        session.emit(SessionEvent::Processed);
    }

    fn on_notify_async(&mut self, token: Option<u64>, class: &str, fields: &Fields) {
        let session = self.session;
        match class {
            "breakpoint-created" | "breakpoint-modified" => {
                if let Some(bkpt) = fields.get_tuple("bkpt") {
                    session.upsert_breakpoint(bkpt);
                }
            }
            "breakpoint-deleted" => {
                if let Some(number) = fields.get_str("id").and_then(|id| id.parse().ok()) {
                    session.forget_breakpoint(number);
                }
            }
            "thread-selected" => {
                if let Some(thread_id) = fields.get_str("id").and_then(|id| id.parse().ok()) {
                    if lock(&session.inner.status).update_thread(thread_id) {
                        session.emit(SessionEvent::ThreadSwitched(thread_id));
                    }
                }
                session.apply_context(fields);
            }
            _ => tracing::trace!("notification {}", class),
        }
        session.respond(token, class, fields);
        session.emit(SessionEvent::Processed);
    }

    fn on_status_async(&mut self, token: Option<u64>, class: &str, fields: &Fields) {
        self.session.respond(token, class, fields);
        self.session.emit(SessionEvent::Processed);
    }

    fn on_result(&mut self, token: Option<u64>, class: &str, fields: &Fields) {
        let session = self.session;
        if class == "error" {
            let message = fields.get_str("msg").unwrap_or("unknown error").to_string();
            lock(&session.inner.status).on_result(token, class);
            if let Some(token) = token {
                let handler = lock(&session.inner.pending).take(token);
                if let Some(handler) = handler {
                    reject(handler, token, &message);
                }
            }
            tracing::debug!("command {:?} failed: {}", token, message);
            session.emit(SessionEvent::Error { token, message });
            return;
        }

        lock(&session.inner.status).on_result(token, class);
        session.apply_context(fields);
        if class == "done" {
            if let Some(bkpt) = fields.get_tuple("bkpt") {
                session.upsert_breakpoint(bkpt);
            }
        }
        session.respond(token, class, fields);
        if class == "stopped" {
            session.schedule_var_update();
        }
        session.emit(SessionEvent::Processed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Session, tokio::io::DuplexStream, tokio::io::DuplexStream) {
        let (stdin, gdb_in) = tokio::io::duplex(4096);
        let (gdb_out, stdout) = tokio::io::duplex(4096);
        let session = Session::new(stdin, stdout, SessionOptions::default());
        (session, gdb_in, gdb_out)
    }

    #[test]
    fn options_default() {
        let options = SessionOptions::default();
        assert_eq!(options.command_timeout, Duration::from_millis(5000));
        assert_eq!(options.first_token, 1_000_001);
        assert!(options.auto_update_vars);
        assert_eq!(options.max_container_elements, 1000);
    }

    #[tokio::test]
    async fn tokens_increase_from_first_token() {
        let (session, _gdb_in, _gdb_out) = session();
        let first = session.send(MiCommand::break_list()).await.unwrap();
        let second = session.send(MiCommand::break_list()).await.unwrap();
        assert_eq!(first, 1_000_001);
        assert_eq!(second, 1_000_002);
        let explicit = session
            .send(MiCommand::break_list().with_token(7))
            .await
            .unwrap();
        assert_eq!(explicit, 7);
    }

    #[tokio::test]
    async fn handle_line_updates_frame_and_thread() {
        let (session, _gdb_in, _gdb_out) = session();
        let mut events = session.subscribe();
        session.handle_line(
            r#"*stopped,reason="breakpoint-hit",thread-id="1",frame={addr="0x1",func="main",file="hello.c",fullname="/src/hello.c",line="16"}"#,
        );
        assert_eq!(session.thread_id(), Some(1));
        assert_eq!(session.frame().and_then(|f| f.line), Some(16));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::ThreadSwitched(1));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::FrameChanged(_)
        ));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Processed);
    }

    #[test]
    fn lossy_line_strips_terminator_and_replaces_bad_bytes() {
        assert_eq!(lossy_line(b"^done\r\n"), "^done");
        assert_eq!(lossy_line(b"~\"\xff\"\n"), "~\"\u{fffd}\"");
        assert_eq!(lossy_line(b"(gdb) "), "(gdb) ");
    }

    #[tokio::test]
    async fn handle_line_ignores_garbage() {
        let (session, _gdb_in, _gdb_out) = session();
        session.handle_line("this is not MI");
        session.handle_line("");
        session.handle_line("(gdb) ");
        assert!(!session.is_terminated());
    }

    #[tokio::test]
    async fn console_and_target_streams_become_events() {
        let (session, _gdb_in, _gdb_out) = session();
        let mut events = session.subscribe();
        session.handle_line(r#"~"GNU gdb 13.1\n""#);
        session.handle_line(r#"@"hello from target\n""#);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::ConsoleOutput("GNU gdb 13.1\n".into())
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::TargetOutput("hello from target".into())
        );
    }

    #[tokio::test]
    async fn breakpoint_notifications_update_table() {
        let (session, _gdb_in, _gdb_out) = session();
        session.handle_line(
            r#"=breakpoint-created,bkpt={number="3",type="breakpoint",disp="keep",enabled="y",file="a.c",line="9"}"#,
        );
        assert!(session.is_breakpoint("a.c", 9));
        session.handle_line(r#"=breakpoint-deleted,id="3""#);
        assert!(!session.is_breakpoint("a.c", 9));
        assert!(session.breakpoints().is_empty());
    }
}
