/// Terminal session handler: the duplex bridge and its teardown
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::app_state::{
    CloseReason, CloseTrigger, SessionHandle, SessionId, SessionRegistry, SessionState, StateCell,
};
use crate::config::SessionConfig;
use crate::protocol::{FrameSink, FrameSource, TerminalConnection};
use crate::pty::{MAX_READ_CHUNK, PtyMaster, ReadOutcome, ShellExit, ShellProcess};
use crate::service::SessionError;
use crate::service::message_handler::{InputAction, MessageHandler, OutputDecoder, split_frames};

/// Bridge tuning taken from `[session]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub outbound_capacity: usize,
    pub drain_timeout: Duration,
    pub close_timeout: Duration,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            outbound_capacity: config.outbound_queue_capacity.max(1),
            drain_timeout: config.drain_timeout(),
            close_timeout: config.close_timeout(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Outcome of one teardown.
///
/// Failures are recorded here and logged; they never stop the remaining steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub reason: CloseReason,
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tasks of an armed bridge.
struct Bridge {
    /// Stops the pty reader, the input loop and the exit watcher.
    cancel: CancellationToken,
    /// Stops the outbound writer once draining took too long.
    stop_writer: CancellationToken,
    reader: JoinHandle<()>,
    input: JoinHandle<()>,
    exit_watcher: JoinHandle<()>,
    writer: JoinHandle<WriterExit>,
    /// Bumped by the reader and the writer on every step of progress.
    activity: Arc<AtomicU64>,
}

/// What the outbound writer hands back when it stops.
struct WriterExit {
    sink: Box<dyn FrameSink>,
    /// Frames that were queued but never reached the client.
    dropped: usize,
}

/// One live shell connection.
///
/// Owns the pty master, the shell process and, once attached, the bridge tasks
/// that own the two transport halves. Nothing else touches those resources.
/// Dropping the session without closing it still releases everything.
pub struct TerminalSession {
    id: SessionId,
    pid: u32,
    shell: String,
    settings: SessionSettings,
    state: StateCell,
    trigger: CloseTrigger,
    close_rx: mpsc::Receiver<CloseReason>,
    master: Option<Arc<PtyMaster>>,
    process: Option<ShellProcess>,
    registry: SessionRegistry,
    bridge: Option<Bridge>,
}

impl TerminalSession {
    /// Wraps a freshly spawned pty pair. `state` must still be `Created`; the
    /// session moves to `Running` here because the spawn already succeeded.
    pub(crate) fn new(
        id: SessionId,
        shell: String,
        master: PtyMaster,
        process: ShellProcess,
        state: StateCell,
        settings: SessionSettings,
        registry: SessionRegistry,
    ) -> Self {
        let (trigger, close_rx) = CloseTrigger::new();
        let pid = process.pid();
        state.advance(SessionState::Running);
        info!(session_id = %id, pid, shell = %shell, "Session running");
        Self {
            id,
            pid,
            shell,
            settings,
            state,
            trigger,
            close_rx,
            master: Some(Arc::new(master)),
            process: Some(process),
            registry,
            bridge: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.trigger.reason()
    }

    /// Fires the close trigger without tearing down; the owner's
    /// [`TerminalSession::wait_for_close`] picks it up.
    pub fn request_close(&self, reason: CloseReason) -> bool {
        self.trigger.fire(reason)
    }

    /// Arms the bridge over `connection` and registers the session.
    pub async fn attach<C: TerminalConnection>(&mut self, connection: C) -> Result<(), SessionError> {
        let state = self.state.current();
        let (Some(master), Some(process)) = (self.master.clone(), self.process.as_ref()) else {
            return Err(self.invalid_state("attach"));
        };
        if state != SessionState::Running || self.bridge.is_some() {
            return Err(self.invalid_state("attach"));
        }

        let connection_type = connection.connection_type();
        let (sink, source) = connection.split();
        let (queue_tx, queue_rx) = mpsc::channel(self.settings.outbound_capacity);
        let cancel = CancellationToken::new();
        let stop_writer = CancellationToken::new();
        let activity = Arc::new(AtomicU64::new(0));

        let writer = tokio::spawn(pump_frames(
            self.id,
            Box::new(sink),
            queue_rx,
            self.trigger.clone(),
            activity.clone(),
            stop_writer.clone(),
        ));
        let reader = tokio::spawn(pump_output(
            self.id,
            master.clone(),
            queue_tx,
            self.trigger.clone(),
            activity.clone(),
            cancel.clone(),
        ));
        let input = tokio::spawn(pump_input(
            self.id,
            source,
            master,
            self.trigger.clone(),
            cancel.clone(),
        ));
        let exit_watcher = tokio::spawn(watch_exit(
            self.id,
            process.exit_watch(),
            self.trigger.clone(),
            activity.clone(),
            self.settings.drain_timeout,
            cancel.clone(),
        ));
        self.bridge = Some(Bridge {
            cancel,
            stop_writer,
            reader,
            input,
            exit_watcher,
            writer,
            activity,
        });

        self.registry
            .insert(SessionHandle::new(
                self.id,
                self.pid,
                self.shell.clone(),
                connection_type,
                self.state.subscribe(),
                self.trigger.clone(),
            ))
            .await;
        info!(session_id = %self.id, ?connection_type, "Bridge armed");
        Ok(())
    }

    /// Waits for the first close trigger from any source.
    pub async fn wait_for_close(&mut self) -> CloseReason {
        if let Some(reason) = self.trigger.reason() {
            return reason;
        }
        match self.close_rx.recv().await {
            Some(reason) => reason,
            None => self.trigger.reason().unwrap_or(CloseReason::Requested),
        }
    }

    /// Closes the session.
    ///
    /// If another trigger already fired, its reason wins. Only the first call
    /// tears down and returns a report; later calls return `None`.
    pub async fn close(&mut self, reason: CloseReason) -> Option<TeardownReport> {
        self.trigger.fire(reason);
        let reason = self.trigger.reason().unwrap_or(reason);
        self.teardown(reason).await
    }

    /// Attach, wait for the first close trigger, tear down.
    pub async fn run<C: TerminalConnection>(mut self, connection: C) -> Result<TeardownReport, SessionError> {
        self.attach(connection).await?;
        let reason = self.wait_for_close().await;
        self.close(reason)
            .await
            .ok_or_else(|| self.invalid_state("close"))
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            id: self.id,
            state: self.state.current(),
            operation,
        }
    }

    async fn teardown(&mut self, reason: CloseReason) -> Option<TeardownReport> {
        if !self.state.advance(SessionState::Closing) {
            debug!(session_id = %self.id, "Teardown already done, ignoring");
            return None;
        }
        self.close_rx.close();
        if reason.is_abnormal() {
            warn!(session_id = %self.id, %reason, "Session closing");
        } else {
            info!(session_id = %self.id, %reason, "Session closing");
        }

        let mut failures = Vec::new();
        let settings = self.settings;

        // 1. stop reading from the pty and from the client
        let writer = match self.bridge.take() {
            Some(bridge) => {
                bridge.cancel.cancel();
                for (name, task) in [
                    ("pty reader", bridge.reader),
                    ("input loop", bridge.input),
                    ("exit watcher", bridge.exit_watcher),
                ] {
                    if let Err(e) = join_bounded(task, settings.close_timeout).await {
                        failures.push(format!("{name}: {e}"));
                    }
                }
                Some((bridge.writer, bridge.stop_writer, bridge.activity))
            }
            None => None,
        };

        // 2. signal the shell, without waiting for it
        match self.process.as_mut() {
            Some(process) => {
                if !process.terminate() {
                    failures.push("shell already signalled".to_string());
                }
            }
            None => failures.push("no shell process".to_string()),
        }

        // 3. close the master
        match self.master.take() {
            Some(master) => match Arc::try_unwrap(master) {
                Ok(mut master) => {
                    master.release();
                }
                Err(_shared) => {
                    failures.push("pty master still referenced, closed on last drop".to_string());
                }
            },
            None => failures.push("pty master already released".to_string()),
        }

        // 4. flush queued output, then close the transport
        if let Some((writer, stop_writer, activity)) = writer {
            match drain_writer(writer, stop_writer, &activity, settings).await {
                Ok(WriterExit { mut sink, dropped }) => {
                    if dropped > 0 {
                        failures.push(format!("client stalled, {dropped} queued frame(s) dropped"));
                    }
                    match tokio::time::timeout(settings.close_timeout, sink.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            debug!(session_id = %self.id, "Transport close error ignored: {}", e);
                        }
                        Err(_) => failures.push("transport close timed out".to_string()),
                    }
                }
                Err(e) => failures.push(format!("outbound writer: {e}")),
            }
        }

        // 5. deregister
        self.registry.remove(&self.id).await;
        self.state.advance(SessionState::Closed);

        for failure in &failures {
            warn!(session_id = %self.id, "Teardown step failed: {}", failure);
        }
        info!(session_id = %self.id, %reason, "Session closed");
        Some(TeardownReport { reason, failures })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if self.state.current() == SessionState::Closed {
            return;
        }
        debug!(session_id = %self.id, "Session dropped before teardown finished, releasing resources");
        if let Some(bridge) = self.bridge.take() {
            bridge.cancel.cancel();
            bridge.stop_writer.cancel();
        }
        if let Some(process) = self.process.as_mut() {
            process.terminate();
        }
        if let Some(master) = self.master.take() {
            // Tasks still holding a clone close it when they stop.
            if let Ok(mut master) = Arc::try_unwrap(master) {
                master.release();
            }
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let registry = self.registry.clone();
            let id = self.id;
            runtime.spawn(async move {
                registry.remove(&id).await;
            });
        }
        self.state.advance(SessionState::Closed);
    }
}

async fn join_bounded(mut task: JoinHandle<()>, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => {
            task.abort();
            let _ = task.await;
            Err("did not stop in time, aborted".to_string())
        }
    }
}

/// Lets the writer flush the queue for as long as the client keeps taking
/// frames. Stops it once a whole `drain_timeout` passes without progress.
async fn drain_writer(
    mut writer: JoinHandle<WriterExit>,
    stop_writer: CancellationToken,
    activity: &AtomicU64,
    settings: SessionSettings,
) -> Result<WriterExit, String> {
    let mut seen = activity.load(Ordering::Relaxed);
    loop {
        if let Ok(joined) = tokio::time::timeout(settings.drain_timeout, &mut writer).await {
            return joined.map_err(|e| e.to_string());
        }
        let now = activity.load(Ordering::Relaxed);
        if now == seen {
            break;
        }
        seen = now;
    }
    debug!("Client stopped taking output, dropping the rest of the queue");
    stop_writer.cancel();
    match tokio::time::timeout(settings.close_timeout, &mut writer).await {
        Ok(joined) => joined.map_err(|e| e.to_string()),
        Err(_) => {
            writer.abort();
            Err("did not stop in time, aborted".to_string())
        }
    }
}

// ================ 桥接任务 ================

/// Process to client: one bounded read per readiness event, in order, into
/// the outbound queue. Stops polling the pty while the queue is full.
async fn pump_output(
    session_id: SessionId,
    master: Arc<PtyMaster>,
    queue: mpsc::Sender<String>,
    trigger: CloseTrigger,
    activity: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let mut decoder = OutputDecoder::new();
    let mut buf = vec![0u8; MAX_READ_CHUNK];

    let reason = loop {
        let capacity = decoder.read_capacity();
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = master.read_nonblocking(&mut buf[..capacity]) => read,
        };
        match read {
            Ok(ReadOutcome::Data(n)) => {
                activity.fetch_add(1, Ordering::Relaxed);
                trace!(%session_id, bytes = n, "pty output");
                let text = decoder.decode(&buf[..n]);
                if text.is_empty() {
                    continue;
                }
                for frame in split_frames(text, MAX_READ_CHUNK) {
                    if !enqueue(session_id, &queue, frame, &cancel).await {
                        return;
                    }
                }
            }
            Ok(ReadOutcome::Eof) => {
                debug!(%session_id, "pty reached EOF");
                if let Some(rest) = decoder.finish() {
                    enqueue(session_id, &queue, rest, &cancel).await;
                }
                break CloseReason::ProcessExited;
            }
            Err(e) => {
                warn!(%session_id, "pty read failed: {}", e);
                break CloseReason::ReadError;
            }
        }
    };
    trigger.fire(reason);
}

/// Returns `false` once the writer is gone or the bridge is cancelled.
async fn enqueue(
    session_id: SessionId,
    queue: &mpsc::Sender<String>,
    frame: String,
    cancel: &CancellationToken,
) -> bool {
    match queue.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(frame)) => {
            debug!(%session_id, "Outbound queue full, pausing pty reads");
            tokio::select! {
                _ = cancel.cancelled() => false,
                sent = queue.send(frame) => sent.is_ok(),
            }
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// The single writer of client frames. Hands the sink back for closing.
async fn pump_frames(
    session_id: SessionId,
    mut sink: Box<dyn FrameSink>,
    mut queue: mpsc::Receiver<String>,
    trigger: CloseTrigger,
    activity: Arc<AtomicU64>,
    stop: CancellationToken,
) -> WriterExit {
    let mut in_flight = 0;
    loop {
        let frame = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            frame = queue.recv() => frame,
        };
        let Some(frame) = frame else {
            break;
        };
        let sent = tokio::select! {
            _ = stop.cancelled() => {
                in_flight = 1;
                break;
            }
            sent = sink.send_text(frame) => sent,
        };
        if let Err(e) = sent {
            debug!(%session_id, "Failed to send output to client: {}", e);
            trigger.fire(CloseReason::TransportError);
            in_flight = 1;
            break;
        }
        activity.fetch_add(1, Ordering::Relaxed);
    }
    let dropped = in_flight + queue.len();
    if dropped > 0 {
        warn!(%session_id, dropped, "Output frames not delivered");
    }
    WriterExit { sink, dropped }
}

/// Client to process: the single writer to the pty master.
async fn pump_input<S: FrameSource>(
    session_id: SessionId,
    mut source: S,
    master: Arc<PtyMaster>,
    trigger: CloseTrigger,
    cancel: CancellationToken,
) {
    let handler = MessageHandler::new(session_id);

    let reason = loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return,
            message = source.receive() => message,
        };
        let bytes = match message {
            Some(Ok(message)) => match handler.handle_message(message) {
                InputAction::Forward(bytes) => bytes,
                InputAction::Skip => continue,
                InputAction::Close => break CloseReason::ClientDisconnected,
            },
            Some(Err(e)) => {
                warn!(%session_id, "Client receive failed: {}", e);
                break CloseReason::TransportError;
            }
            None => {
                debug!(%session_id, "Client connection ended");
                break CloseReason::ClientDisconnected;
            }
        };
        let written = tokio::select! {
            _ = cancel.cancelled() => return,
            written = master.write_all(&bytes) => written,
        };
        if let Err(e) = written {
            warn!(%session_id, "pty write failed: {}", e);
            break CloseReason::WriteError;
        }
    };
    trigger.fire(reason);
}

/// Closes the session if the shell was reaped but EOF never came, which
/// happens when a background job keeps the terminal open.
///
/// Fires only once output stopped moving for a whole `grace` period, so a
/// slow client still receives everything the shell wrote before exiting.
async fn watch_exit(
    session_id: SessionId,
    mut exit: watch::Receiver<Option<ShellExit>>,
    trigger: CloseTrigger,
    activity: Arc<AtomicU64>,
    grace: Duration,
    cancel: CancellationToken,
) {
    let reaped = tokio::select! {
        _ = cancel.cancelled() => false,
        reaped = exit.wait_for(Option::is_some) => reaped.is_ok(),
    };
    if !reaped {
        return;
    }

    let mut seen = activity.load(Ordering::Relaxed);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(grace) => {}
        }
        let now = activity.load(Ordering::Relaxed);
        if now == seen {
            if trigger.fire(CloseReason::ProcessExited) {
                debug!(%session_id, "Shell exited without pty EOF");
            }
            return;
        }
        seen = now;
    }
}
