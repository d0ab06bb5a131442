//! Connection manager task.
//!
//! One tokio task owns the WebSocket, the [`ConnectionMachine`], and the
//! [`Dispatcher`]. Callers talk to it through [`ConnectionManager`], which
//! sends control messages over an unbounded channel. Every wait in the
//! task (dialing, reading, the reconnect delay) also listens for control
//! messages, so `disconnect` cancels pending timers and in-flight dials
//! immediately.
//!
//! Because a single task reads frames and runs the handlers, inbound
//! frames are applied strictly in arrival order and the heartbeat never
//! interleaves with a handler.

use std::time::Duration;

use citypulse_types::{ClientFrame, ConnectionState, ConnectionStatus};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ConnectionConfig;
use crate::connection::{ConnectionEvent, ConnectionMachine};
use crate::dispatcher::Dispatcher;
use crate::error::SyncError;
use crate::notification::NotificationCenter;
use crate::retry::ReconnectPolicy;
use crate::store::StateStore;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Connect,
    Disconnect,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Handle to the connection task.
#[derive(Debug)]
pub struct ConnectionManager {
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the connection task in `Idle`.
    ///
    /// Must be called from within a tokio runtime. The task owns
    /// `dispatcher` and publishes its state to the store's connection
    /// slice.
    pub fn spawn(
        ws_url: impl Into<String>,
        config: &ConnectionConfig,
        dispatcher: Dispatcher,
        store: StateStore,
        notifications: NotificationCenter,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let state = store.connection().subscribe();
        let driver = Driver {
            url: ws_url.into(),
            machine: ConnectionMachine::new(ReconnectPolicy::from_config(config)),
            heartbeat: config.heartbeat_interval().max(Duration::from_millis(1)),
            connect_timeout: config.connect_timeout(),
            liveness: config.liveness_timeout(),
            socket: None,
            dispatcher,
            store,
            notifications,
            control: control_rx,
        };
        let task = tokio::spawn(driver.run());
        Self {
            control: control_tx,
            state,
            task,
        }
    }

    /// Ask the task to connect.
    ///
    /// Ignored while already connecting, open, or reconnecting. From
    /// `Failed` this starts over with a fresh attempt budget.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ManagerStopped`] if the task has exited.
    pub fn connect(&self) -> Result<(), SyncError> {
        self.send(Control::Connect)
    }

    /// Ask the task to disconnect and cancel any pending reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ManagerStopped`] if the task has exited.
    pub fn disconnect(&self) -> Result<(), SyncError> {
        self.send(Control::Disconnect)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the task, closing the socket if open, and wait for it to exit.
    pub async fn shutdown(self) {
        if self.control.send(Control::Shutdown).is_err() {
            tracing::debug!("connection task already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "connection task ended abnormally");
        }
    }

    fn send(&self, control: Control) -> Result<(), SyncError> {
        self.control
            .send(control)
            .map_err(|mpsc::error::SendError(_)| SyncError::ManagerStopped)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

struct Driver {
    url: String,
    machine: ConnectionMachine,
    heartbeat: Duration,
    connect_timeout: Duration,
    liveness: Option<Duration>,
    socket: Option<Socket>,
    dispatcher: Dispatcher,
    store: StateStore,
    notifications: NotificationCenter,
    control: mpsc::UnboundedReceiver<Control>,
}

impl Driver {
    async fn run(mut self) {
        tracing::debug!(url = %self.url, "connection task started");
        loop {
            let flow = match self.machine.status() {
                ConnectionStatus::Idle | ConnectionStatus::Failed => {
                    let control = self.control.recv().await;
                    self.handle_control(control)
                }
                ConnectionStatus::Connecting => self.dial().await,
                ConnectionStatus::Open => self.pump().await,
                ConnectionStatus::Reconnecting => self.wait_retry().await,
            };
            if flow == Flow::Stop {
                break;
            }
        }

        if matches!(
            self.machine.status(),
            ConnectionStatus::Connecting | ConnectionStatus::Open | ConnectionStatus::Reconnecting
        ) {
            self.apply(ConnectionEvent::DisconnectRequested);
        }
        tracing::debug!("connection task stopped");
    }

    /// Feed the machine and publish the outcome.
    fn apply(&mut self, event: ConnectionEvent) {
        let name = event.name();
        let Some(transition) = self.machine.apply(event) else {
            tracing::debug!(event = name, status = %self.machine.status(), "event ignored");
            return;
        };

        tracing::info!(
            from = %transition.from,
            to = %transition.state.status,
            attempt = transition.state.attempt,
            error = transition.state.last_error.as_deref().unwrap_or(""),
            "connection status changed"
        );
        self.store.connection().replace(transition.state);
        self.notifications
            .show(transition.notice.message, transition.notice.kind);
    }

    fn lost(&mut self, error: impl Into<String>) {
        self.apply(ConnectionEvent::TransportLost {
            error: error.into(),
        });
    }

    fn handle_control(&mut self, control: Option<Control>) -> Flow {
        match control {
            Some(Control::Connect) => {
                self.apply(ConnectionEvent::ConnectRequested);
                Flow::Continue
            }
            Some(Control::Disconnect) => {
                self.apply(ConnectionEvent::DisconnectRequested);
                Flow::Continue
            }
            Some(Control::Shutdown) | None => Flow::Stop,
        }
    }

    async fn dial(&mut self) -> Flow {
        tracing::debug!(url = %self.url, attempt = self.machine.state().attempt, "dialing");
        let handshake = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        );
        tokio::select! {
            result = handshake => {
                match result {
                    Ok(Ok((socket, _response))) => {
                        self.socket = Some(socket);
                        self.apply(ConnectionEvent::TransportOpened);
                    }
                    Ok(Err(e)) => self.lost(e.to_string()),
                    Err(_elapsed) => self.lost(format!(
                        "handshake timed out after {} ms",
                        self.connect_timeout.as_millis()
                    )),
                }
                Flow::Continue
            }
            control = self.control.recv() => self.handle_control(control),
        }
    }

    async fn wait_retry(&mut self) -> Flow {
        let delay = self.machine.retry_delay();
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            next_attempt = self.machine.state().attempt.saturating_add(1),
            max_attempts = self.machine.policy().max_attempts,
            "reconnect scheduled"
        );

        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                () = &mut timer => {
                    self.apply(ConnectionEvent::RetryElapsed);
                    return Flow::Continue;
                }
                control = self.control.recv() => {
                    let flow = self.handle_control(control);
                    if flow == Flow::Stop || self.machine.status() != ConnectionStatus::Reconnecting {
                        return flow;
                    }
                }
            }
        }
    }

    async fn pump(&mut self) -> Flow {
        let Some(socket) = self.socket.take() else {
            self.lost("no active socket");
            return Flow::Continue;
        };
        let (mut sink, mut stream) = socket.split();

        let first_beat = Instant::now()
            .checked_add(self.heartbeat)
            .unwrap_or_else(Instant::now);
        let mut heartbeat = tokio::time::interval_at(first_beat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();

        loop {
            let deadline = self
                .liveness
                .and_then(|bound| last_seen.checked_add(bound));

            tokio::select! {
                frame = stream.next() => {
                    match frame {
                        Some(Ok(message)) => {
                            last_seen = Instant::now();
                            if let Some(reason) = self.on_message(message) {
                                self.lost(reason);
                                return Flow::Continue;
                            }
                        }
                        Some(Err(e)) => {
                            self.lost(e.to_string());
                            return Flow::Continue;
                        }
                        None => {
                            self.lost("connection closed");
                            return Flow::Continue;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    match ClientFrame::Ping.to_text() {
                        Ok(ping) => {
                            if let Err(e) = sink.send(Message::Text(ping.into())).await {
                                self.lost(format!("heartbeat failed: {e}"));
                                return Flow::Continue;
                            }
                            tracing::trace!("heartbeat sent");
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to encode heartbeat"),
                    }
                }
                () = wait_until(deadline) => {
                    self.lost("no frames received within liveness timeout");
                    return Flow::Continue;
                }
                control = self.control.recv() => {
                    let flow = self.handle_control(control);
                    if flow == Flow::Stop || self.machine.status() != ConnectionStatus::Open {
                        if let Err(e) = sink.close().await {
                            tracing::debug!(error = %e, "close handshake failed");
                        }
                        return flow;
                    }
                }
            }
        }
    }

    /// Handle one inbound message. Returns a reason if it ends the session.
    fn on_message(&mut self, message: Message) -> Option<String> {
        match message {
            Message::Text(text) => {
                self.dispatcher.on_frame(text.as_str());
            }
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    self.dispatcher.on_frame(text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, len = bytes.len(), "dropping non-UTF-8 binary frame");
                }
            },
            Message::Close(frame) => {
                let reason = frame.map_or_else(
                    || "server closed the connection".to_owned(),
                    |f| format!("server closed the connection ({}: {})", f.code, f.reason),
                );
                return Some(reason);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
        None
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
