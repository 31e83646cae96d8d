//! Shard connection state machine
//!
//! One [`ShardConnection`] per shard index. It outlives any number of
//! transports: each pass through the run loop opens a transport, waits for
//! Hello, identifies or resumes, and pumps frames until the transport ends.
//! The transport lives on the session's stack frame and the heartbeat timer
//! is stopped before the loop moves on, so neither can outlive its session.
//!
//! ```text
//! Disconnected → Connecting → AwaitingHello → Identifying | Resuming → Ready
//!       ↑                                                                │
//!       └────────────── close / error / reconnect / zombie ──────────────┘
//! ```

use futures_util::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, trace, warn};

use super::handle::{Diagnostic, HandlerFailure, ShardCommand, ShardEvent, ShardHandle, ShardStatus};
use super::heartbeat::{Beat, HeartbeatScheduler};
use super::session::SessionState;
use super::ShardHealth;
use crate::client::Client;
use crate::error::GatewayError;
use crate::events::EventRegistry;
use crate::gateway::{
    close_code, connect_url, encode, event_names, Command, Envelope, Heartbeat, Hello, Identify,
    OpCode, ReadyInfo, Resume,
};
use crate::metrics;
use crate::presence::Presence;
use crate::transport::{Connector, Frame, Transport};

/// Capacity of the per-shard event broadcast
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// First retry delay after a failed connect; doubles per failure
const CONNECT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Upper bound on the connect retry delay
const CONNECT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Bounds of the random wait before reconnecting after InvalidSession
const INVALID_SESSION_DELAY_MS: std::ops::RangeInclusive<u64> = 1_000..=5_000;

/// Why a transport session ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    /// Peer closed (or the stream ended without a close frame)
    Closed { code: Option<u16> },
    /// We closed with 4000 to reconnect
    Reconnect { reason: &'static str },
    /// Server rejected the session with op 9
    InvalidSession,
    /// Receiving or sending failed
    TransportError,
    /// No Hello within the bounded wait
    HelloTimeout,
    /// Permanent stop requested
    Stopped,
}

impl SessionEnd {
    fn reason(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::Reconnect { reason } => reason,
            Self::InvalidSession => "invalid_session",
            Self::TransportError => "transport_error",
            Self::HelloTimeout => "hello_timeout",
            Self::Stopped => "stopped",
        }
    }
}

/// Result of handling one frame or tick
enum Flow {
    Continue,
    End(SessionEnd),
}

/// Debounce for the one-shot ready signal
#[derive(Debug, Default)]
struct ReadyGate {
    deadline: Option<Instant>,
    fired: bool,
}

impl ReadyGate {
    fn arm(&mut self, delay: Duration) {
        if !self.fired {
            self.deadline = Some(Instant::now() + delay);
        }
    }

    fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    fn fire(&mut self) {
        self.deadline = None;
        self.fired = true;
    }
}

pub struct ShardConnection {
    shard_id: u32,
    client: Client,
    registry: Arc<EventRegistry>,
    connector: Arc<dyn Connector>,
    handle: ShardHandle,
    presence: Presence,
    session: SessionState,
    heartbeat: HeartbeatScheduler,
    ready: ReadyGate,
    commands: mpsc::UnboundedReceiver<ShardCommand>,
    status: watch::Sender<ShardStatus>,
    events: broadcast::Sender<ShardEvent>,
    /// Attempts since the last READY or RESUMED
    failed_attempts: u32,
    /// Whether the current transport reached READY or RESUMED
    session_ready: bool,
}

impl ShardConnection {
    pub fn new(
        shard_id: u32,
        client: Client,
        registry: Arc<EventRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(ShardStatus::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let handle = ShardHandle::new(shard_id, commands_tx, status_rx, events.clone());
        let presence = client.options().presence.clone();

        Self {
            shard_id,
            client,
            registry,
            connector,
            handle,
            presence,
            session: SessionState::default(),
            heartbeat: HeartbeatScheduler::default(),
            ready: ReadyGate::default(),
            commands,
            status,
            events,
            failed_attempts: 0,
            session_ready: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.shard_id
    }

    pub fn handle(&self) -> ShardHandle {
        self.handle.clone()
    }

    /// Drive the shard until a permanent disconnect is requested.
    ///
    /// Every other way a transport can end (close, error, Reconnect,
    /// InvalidSession, missed heartbeat ack, Hello timeout) loops back to a
    /// fresh connect. Attempts that never reach READY or RESUMED back off
    /// exponentially, and InvalidSession always waits 1-5s first.
    pub async fn run(mut self) {
        let shard_id = self.shard_id;
        info!(shard_id, "Shard starting");

        loop {
            let url = self.next_url();
            self.set_state(ShardHealth::Connecting);
            self.debug(format!("Connecting to Discord Gateway: {url}"));

            let transport = match self.connector.connect(&url).await {
                Ok(transport) => transport,
                Err(source) => {
                    let err = GatewayError::Connect { url, source };
                    self.failed_attempts = self.failed_attempts.saturating_add(1);
                    let delay = connect_backoff(self.failed_attempts);
                    warn!(
                        shard_id,
                        error = %err,
                        failures = self.failed_attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        "Gateway connect failed"
                    );
                    metrics::record_error(shard_id, err.error_type_label());
                    self.publish(ShardEvent::Debug(Diagnostic::Transport {
                        error: err.to_string(),
                    }));
                    self.set_state(ShardHealth::Disconnected);
                    if self.backoff(delay).await {
                        break;
                    }
                    continue;
                }
            };

            let end = self.run_session(transport).await;
            self.teardown();

            match end {
                SessionEnd::Stopped => break,
                end => {
                    let delay = self.reconnect_delay(&end);
                    info!(
                        shard_id,
                        reason = end.reason(),
                        resumable = self.session.is_resumable(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Reconnecting"
                    );
                    self.client.state().record_reconnect(shard_id);
                    metrics::record_reconnect(shard_id, end.reason());
                    if !delay.is_zero() && self.backoff(delay).await {
                        break;
                    }
                }
            }
        }

        self.session.clear();
        self.publish_session();
        self.set_state(ShardHealth::Stopped);
        info!(shard_id, "Shard stopped");
    }

    /// Wait before the next connect. A session that got to Ready reconnects
    /// at once; anything short of that counts as a failed attempt.
    fn reconnect_delay(&mut self, end: &SessionEnd) -> Duration {
        let floor = match end {
            SessionEnd::InvalidSession => invalid_session_delay(),
            _ => Duration::ZERO,
        };
        if self.session_ready {
            return floor;
        }
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        connect_backoff(self.failed_attempts).max(floor)
    }

    async fn run_session(&mut self, mut transport: Box<dyn Transport>) -> SessionEnd {
        self.session_ready = false;
        self.set_state(ShardHealth::AwaitingHello);
        let hello_deadline = Instant::now() + self.client.options().hello_timeout;

        loop {
            let awaiting_hello = !self.heartbeat.is_running();
            let ready_deadline = self.ready.deadline.unwrap_or(hello_deadline);

            let flow = tokio::select! {
                frame = transport.recv() => match frame {
                    Some(Ok(Frame::Text(text))) => self.handle_text(transport.as_mut(), &text).await,
                    Some(Ok(Frame::Close(frame))) => {
                        let code = frame.as_ref().map(|f| f.code);
                        let reason = frame.map(|f| f.reason).unwrap_or_default();
                        self.on_close(code, &reason);
                        Flow::End(SessionEnd::Closed { code })
                    }
                    Some(Err(source)) => {
                        self.on_transport_error(GatewayError::Transport { shard_id: self.shard_id, source });
                        Flow::End(SessionEnd::TransportError)
                    }
                    None => {
                        self.on_close(None, "stream ended");
                        Flow::End(SessionEnd::Closed { code: None })
                    }
                },
                beat = self.heartbeat.tick() => self.on_beat(transport.as_mut(), beat).await,
                Some(command) = self.commands.recv() => self.on_command(transport.as_mut(), command).await,
                _ = time::sleep_until(hello_deadline), if awaiting_hello => {
                    let err = GatewayError::HelloTimeout {
                        shard_id: self.shard_id,
                        timeout_ms: self.client.options().hello_timeout.as_millis() as u64,
                    };
                    warn!(shard_id = self.shard_id, error = %err, "Hello not received");
                    metrics::record_error(self.shard_id, err.error_type_label());
                    self.debug(err.to_string());
                    Flow::End(SessionEnd::HelloTimeout)
                }
                _ = time::sleep_until(ready_deadline), if self.ready.pending() => {
                    self.ready.fire();
                    info!(shard_id = self.shard_id, "Shard ready");
                    self.publish(ShardEvent::Ready);
                    Flow::Continue
                }
            };

            if let Flow::End(end) = flow {
                return end;
            }
        }
    }

    /// Stop the heartbeat and reset health metrics after a transport ends
    fn teardown(&mut self) {
        if self.heartbeat.stop() {
            self.client.state().heartbeat_stopped(self.shard_id);
            debug!(shard_id = self.shard_id, "Heartbeat stopped");
        }
        self.heartbeat.reset_latency();
        self.ready.deadline = None;
        self.set_state(ShardHealth::Disconnected);
    }

    async fn handle_text(&mut self, transport: &mut dyn Transport, text: &str) -> Flow {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => Arc::new(envelope),
            Err(source) => {
                let err = GatewayError::MalformedEnvelope {
                    shard_id: self.shard_id,
                    source,
                };
                metrics::record_error(self.shard_id, err.error_type_label());
                if self.client.options().development {
                    warn!(shard_id = self.shard_id, error = %err, "Dropping malformed frame");
                    self.publish(ShardEvent::Debug(Diagnostic::MalformedEnvelope {
                        error: err.to_string(),
                    }));
                } else {
                    trace!(shard_id = self.shard_id, error = %err, "Dropping malformed frame");
                }
                return Flow::Continue;
            }
        };

        self.publish(ShardEvent::Raw(Arc::clone(&envelope)));

        match envelope.opcode() {
            Some(OpCode::Hello) => self.on_hello(transport, &envelope).await,
            Some(OpCode::HeartbeatAck) => {
                self.on_heartbeat_ack();
                Flow::Continue
            }
            Some(OpCode::Heartbeat) => {
                debug!(shard_id = self.shard_id, "Server requested heartbeat");
                self.send_heartbeat(transport).await
            }
            Some(OpCode::InvalidSession) => self.on_invalid_session(transport, envelope.resumable()).await,
            Some(OpCode::Reconnect) => {
                self.debug("Received Reconnect Gateway");
                self.close_for_reconnect(transport, SessionEnd::Reconnect { reason: "server_reconnect" })
                    .await
            }
            Some(OpCode::Dispatch) => {
                self.on_dispatch(envelope);
                Flow::Continue
            }
            Some(OpCode::Identify | OpCode::Resume | OpCode::PresenceUpdate) | None => {
                if self.client.options().development {
                    debug!(shard_id = self.shard_id, op = envelope.op, "Unknown opcode");
                    self.publish(ShardEvent::Debug(Diagnostic::UnknownOpcode { op: envelope.op }));
                }
                Flow::Continue
            }
        }
    }

    async fn on_hello(&mut self, transport: &mut dyn Transport, envelope: &Envelope) -> Flow {
        let interval = match serde_json::from_value::<Hello>(envelope.d.clone()) {
            Ok(hello) if hello.heartbeat_interval > 0 => Duration::from_millis(hello.heartbeat_interval),
            Ok(_) | Err(_) => {
                warn!(shard_id = self.shard_id, payload = %envelope.d, "Ignoring Hello without a usable heartbeat_interval");
                return Flow::Continue;
            }
        };

        if self.heartbeat.start(interval) {
            debug!(shard_id = self.shard_id, "Replaced running heartbeat timer");
        }
        self.client.state().heartbeat_started(self.shard_id, interval);
        debug!(shard_id = self.shard_id, interval_ms = interval.as_millis() as u64, "Received Hello");

        let request = self
            .session
            .resume_point()
            .map(|(session_id, seq)| Resume::new(self.client.options().token.clone(), session_id, seq));

        match request {
            Some(resume) => {
                self.debug("Resuming with Gateway");
                info!(shard_id = self.shard_id, session_id = %resume.session_id, seq = resume.seq, "Resuming session");
                self.set_state(ShardHealth::Resuming);
                self.send(transport, &resume, "resume").await
            }
            None => {
                self.debug("Identifying with Gateway");
                info!(shard_id = self.shard_id, "Identifying new session");
                let identify = self.identify();
                self.set_state(ShardHealth::Identifying);
                self.send(transport, &identify, "identify").await
            }
        }
    }

    fn identify(&self) -> Identify {
        let options = self.client.options();
        Identify::new(
            options.token.clone(),
            options.intents,
            [self.shard_id, options.shard_count],
            options.large_threshold,
            self.presence.clone(),
        )
    }

    fn on_heartbeat_ack(&mut self) {
        let latency = self.heartbeat.record_ack();
        self.client.state().record_heartbeat_ack(self.shard_id, latency);
        if let Some(latency) = latency {
            metrics::record_heartbeat_ack(self.shard_id, latency);
            self.status.send_modify(|s| s.latency = Some(latency));
            self.debug(format!("Received HeartbeatAck with ping {}", latency.as_millis()));
        }
    }

    async fn on_invalid_session(&mut self, transport: &mut dyn Transport, resumable: bool) -> Flow {
        self.debug(format!("Received InvalidSession (resumable: {resumable})"));
        if resumable {
            info!(shard_id = self.shard_id, "Session invalidated but resumable");
        } else {
            info!(shard_id = self.shard_id, "Session invalidated, will identify again");
            self.session.clear();
            self.publish_session();
        }
        self.close_for_reconnect(transport, SessionEnd::InvalidSession).await
    }

    fn on_dispatch(&mut self, envelope: Arc<Envelope>) {
        if let Some(seq) = envelope.s {
            self.session.observe_sequence(seq);
        }

        let Some(name) = envelope.event_name() else {
            self.publish_session();
            return;
        };

        match name {
            event_names::READY => match serde_json::from_value::<ReadyInfo>(envelope.d.clone()) {
                Ok(ready) => {
                    info!(shard_id = self.shard_id, session_id = %ready.session_id, "Session established");
                    self.session.establish(ready);
                    self.became_ready();
                }
                Err(e) => warn!(shard_id = self.shard_id, error = %e, "READY without session_id"),
            },
            event_names::RESUMED => {
                info!(shard_id = self.shard_id, seq = ?self.session.sequence(), "Session resumed");
                self.became_ready();
            }
            event_names::GUILD_CREATE => self.ready.arm(self.client.options().ready_delay),
            _ => {}
        }

        self.publish_session();
        self.client.state().record_event(self.shard_id);
        metrics::record_dispatch(self.shard_id, name);

        if let Some(handler) = self.registry.get(name) {
            self.spawn_handler(name.to_string(), handler, envelope);
        }
    }

    fn became_ready(&mut self) {
        self.session_ready = true;
        self.failed_attempts = 0;
        self.set_state(ShardHealth::Ready);
        self.status.send_modify(|s| s.connected_at = Some(Instant::now()));
        self.ready.arm(self.client.options().ready_delay);
    }

    /// Run a handler on its own task. The loop never waits for it; errors
    /// and panics are turned into diagnostics.
    fn spawn_handler(
        &self,
        event_name: String,
        handler: Arc<dyn crate::events::EventHandler>,
        envelope: Arc<Envelope>,
    ) {
        let shard_id = self.shard_id;
        let shard = self.handle.clone();
        let client = self.client.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(handler.run(envelope, shard, client))
                .catch_unwind()
                .await;

            let failure = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => HandlerFailure::Error(e.to_string()),
                Err(panic) => HandlerFailure::Panic(panic_message(panic.as_ref())),
            };

            warn!(shard_id, event_name = %event_name, failure = %failure, "Event handler failed");
            metrics::record_handler_failure(shard_id, &event_name);
            let _ = events.send(ShardEvent::Debug(Diagnostic::HandlerFailed {
                event_name,
                failure,
            }));
        });
    }

    async fn on_beat(&mut self, transport: &mut dyn Transport, beat: Beat) -> Flow {
        match beat {
            Beat::Due => self.send_heartbeat(transport).await,
            Beat::Missed => {
                warn!(shard_id = self.shard_id, "Heartbeat not acknowledged, connection is a zombie");
                self.debug("Heartbeat not acknowledged");
                self.close_for_reconnect(transport, SessionEnd::Reconnect { reason: "heartbeat_timeout" })
                    .await
            }
        }
    }

    async fn send_heartbeat(&mut self, transport: &mut dyn Transport) -> Flow {
        let flow = self
            .send(transport, &Heartbeat(self.session.sequence()), "heartbeat")
            .await;
        if let Flow::Continue = flow {
            self.heartbeat.record_sent();
            metrics::record_heartbeat_sent(self.shard_id);
            trace!(shard_id = self.shard_id, seq = ?self.session.sequence(), "Heartbeat sent");
        }
        flow
    }

    async fn on_command(&mut self, transport: &mut dyn Transport, command: ShardCommand) -> Flow {
        match command {
            ShardCommand::SetPresence(presence) => {
                self.debug(format!("Setting presence to {:?}", presence.status));
                self.presence = presence;
                if self.heartbeat.is_running() {
                    let presence = self.presence.clone();
                    self.send(transport, &presence, "presence_update").await
                } else {
                    // Sent with the next Identify instead
                    Flow::Continue
                }
            }
            ShardCommand::Disconnect { reason } => {
                self.disconnect(transport, &reason).await;
                Flow::End(SessionEnd::Stopped)
            }
        }
    }

    async fn disconnect(&mut self, transport: &mut dyn Transport, reason: &str) {
        if self.heartbeat.stop() {
            self.client.state().heartbeat_stopped(self.shard_id);
        }
        self.debug(format!("Disconnecting from Discord Gateway with reason {reason}"));
        info!(shard_id = self.shard_id, reason, "Disconnecting");
        if let Err(e) = transport.close(close_code::NORMAL, "Disconnecting").await {
            debug!(shard_id = self.shard_id, error = %e, "Close frame not delivered");
        }
        self.session.clear();
        self.publish_session();
    }

    /// Close with 4000 so the server keeps the session, then let the run
    /// loop reconnect.
    async fn close_for_reconnect(&mut self, transport: &mut dyn Transport, end: SessionEnd) -> Flow {
        if self.heartbeat.stop() {
            self.client.state().heartbeat_stopped(self.shard_id);
        }
        if let Err(e) = transport.close(close_code::RECONNECT, "Reconnecting").await {
            debug!(shard_id = self.shard_id, error = %e, "Close frame not delivered");
        }
        Flow::End(end)
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        self.debug(format!(
            "Disconnected from Discord Gateway with code {} and reason {reason}",
            code.map_or_else(|| "none".to_string(), |c| c.to_string())
        ));

        match code {
            Some(code) if close_code::is_configuration_error(code) => {
                error!(shard_id = self.shard_id, code, reason, "Gateway rejected shard configuration");
            }
            Some(code) if close_code::invalidates_session(code) => {
                info!(shard_id = self.shard_id, code, "Session no longer resumable");
                self.session.clear();
                self.publish_session();
            }
            _ => info!(shard_id = self.shard_id, ?code, reason, "Gateway closed connection"),
        }
    }

    fn on_transport_error(&mut self, err: GatewayError) {
        if err.is_recoverable() {
            warn!(shard_id = self.shard_id, error = %err, "Transport error");
        } else {
            error!(shard_id = self.shard_id, error = %err, "Transport error");
        }
        metrics::record_error(self.shard_id, err.error_type_label());
        self.publish(ShardEvent::Debug(Diagnostic::Transport {
            error: err.to_string(),
        }));
    }

    async fn send<C: Command>(&mut self, transport: &mut dyn Transport, command: &C, label: &str) -> Flow {
        let text = match encode(command) {
            Ok(text) => text,
            Err(source) => {
                let err = GatewayError::SerializationFailed {
                    payload: label.to_string(),
                    shard_id: self.shard_id,
                    source,
                };
                error!(shard_id = self.shard_id, error = %err, "Failed to encode request");
                metrics::record_error(self.shard_id, err.error_type_label());
                return Flow::Continue;
            }
        };

        match transport.send(text).await {
            Ok(()) => Flow::Continue,
            Err(source) => {
                self.on_transport_error(GatewayError::Transport {
                    shard_id: self.shard_id,
                    source,
                });
                Flow::End(SessionEnd::TransportError)
            }
        }
    }

    /// Wait out a reconnect backoff. Returns true if a disconnect arrived.
    ///
    /// The connection holds its own handle, so the command channel stays
    /// open for as long as this loop runs.
    async fn backoff(&mut self, delay: Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                Some(command) = self.commands.recv() => match command {
                    ShardCommand::SetPresence(presence) => self.presence = presence,
                    ShardCommand::Disconnect { reason } => {
                        info!(shard_id = self.shard_id, reason = %reason, "Disconnected while waiting to reconnect");
                        return true;
                    }
                },
            }
        }
    }

    fn next_url(&self) -> String {
        let base = self
            .session
            .resume_url()
            .unwrap_or(&self.client.options().gateway_url);
        connect_url(base)
    }

    fn set_state(&mut self, state: ShardHealth) {
        self.client.state().set_health(self.shard_id, state);
        let latency = self.heartbeat.latency();
        self.status.send_modify(|s| {
            s.state = state;
            s.latency = latency;
            if !matches!(state, ShardHealth::Ready | ShardHealth::Resuming | ShardHealth::Identifying) {
                s.connected_at = None;
            }
        });
    }

    fn publish_session(&mut self) {
        let session_id = self.session.session_id().map(str::to_string);
        let sequence = self.session.sequence();
        self.status.send_if_modified(|s| {
            let changed = s.session_id != session_id || s.sequence != sequence;
            s.session_id = session_id;
            s.sequence = sequence;
            changed
        });
    }

    fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(shard_id = self.shard_id, "{message}");
        self.publish(ShardEvent::Debug(Diagnostic::Message(message)));
    }

    fn publish(&self, event: ShardEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Exponential connect backoff: 1s, 2s, 4s, ... capped at 60s
fn connect_backoff(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(6);
    (CONNECT_BACKOFF_BASE * 2u32.pow(exponent)).min(CONNECT_BACKOFF_MAX)
}

fn invalid_session_delay() -> Duration {
    Duration::from_millis(rand::rng().random_range(INVALID_SESSION_DELAY_MS))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_backoff_doubles_and_caps() {
        let delays: Vec<u64> = (1..=9).map(|n| connect_backoff(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn invalid_session_delay_stays_in_bounds() {
        for _ in 0..200 {
            let delay = invalid_session_delay();
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(5), "{delay:?}");
        }
    }

    #[test]
    fn ready_gate_fires_once() {
        let mut gate = ReadyGate::default();
        gate.arm(Duration::from_millis(1_500));
        assert!(gate.pending());
        gate.fire();
        assert!(!gate.pending());

        gate.arm(Duration::from_millis(1_500));
        assert!(!gate.pending(), "ready is only signalled once");
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
