//! Connection lifecycle for the push channel, as an explicit state
//! machine: `Disconnected → Connecting → Connected → Reconnecting`, with
//! `Disconnected` terminal on explicit close or an exhausted retry budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use attribution_cache::{CacheKey, ResultCache};
use attribution_core::bus::{EngineUpdate, UpdateBus};
use attribution_core::config::RealtimeConfig;
use attribution_core::AttributionError;

use crate::protocol::PushMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Transition-table guard for the connection lifecycle. `force_disconnect`
/// bypasses the table: explicit close is legal from any state.
#[derive(Debug)]
struct ChannelStateMachine {
    state: ConnectionState,
    terminal: bool,
}

const TRANSITIONS: &[(ConnectionState, ConnectionState)] = &[
    (ConnectionState::Disconnected, ConnectionState::Connecting),
    (ConnectionState::Connecting, ConnectionState::Connected),
    (ConnectionState::Connecting, ConnectionState::Reconnecting),
    (ConnectionState::Connected, ConnectionState::Reconnecting),
    (ConnectionState::Reconnecting, ConnectionState::Connecting),
    (ConnectionState::Reconnecting, ConnectionState::Disconnected),
];

impl ChannelStateMachine {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            terminal: false,
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.terminal {
            return;
        }
        if TRANSITIONS.iter().any(|t| t.0 == self.state && t.1 == to) {
            self.state = to;
        } else {
            warn!(from = ?self.state, ?to, "invalid channel state transition ignored");
        }
    }

    fn force_disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.terminal = true;
    }
}

/// A live connection pair handed out by a transport: the channel writes
/// outbound frames into `outbound` and reads pushed frames from `inbound`.
/// Either side closing means the transport closed.
pub struct TransportConn {
    pub outbound: mpsc::Sender<PushMessage>,
    pub inbound: mpsc::Receiver<PushMessage>,
}

/// Seam to the external compute/notification service. Implementations
/// perform the actual handshake (WebSocket, NATS, test double) and decode
/// each raw wire frame with [`crate::protocol::parse_frame`] before
/// forwarding it into `inbound`, so unrecognized frame types are dropped
/// at the transport edge and the channel only ever sees typed messages.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self) -> Result<TransportConn, AttributionError>;
}

enum ServeExit {
    Shutdown,
    Closed,
}

/// The realtime update channel. Runs as one background task, so at most
/// one connect/reconnect attempt is ever in flight.
pub struct RealtimeChannel {
    transport: Arc<dyn PushTransport>,
    cache: Arc<ResultCache>,
    bus: UpdateBus,
    config: RealtimeConfig,
    machine: Arc<Mutex<ChannelStateMachine>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        cache: Arc<ResultCache>,
        bus: UpdateBus,
        config: RealtimeConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            transport,
            cache,
            bus,
            config,
            machine: Arc::new(Mutex::new(ChannelStateMachine::new())),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.lock().state
    }

    pub fn is_terminal(&self) -> bool {
        self.machine.lock().terminal
    }

    /// Subscribe to engine updates delivered over this channel.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineUpdate> {
        self.bus.subscribe()
    }

    /// Start the background connection task. A second call while the task
    /// is alive is a no-op.
    pub fn connect(&self) {
        if self.machine.lock().terminal {
            return;
        }
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let transport = self.transport.clone();
        let cache = self.cache.clone();
        let bus = self.bus.clone();
        let config = self.config.clone();
        let machine = self.machine.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        *task = Some(tokio::spawn(run_loop(
            transport,
            cache,
            bus,
            config,
            machine,
            shutdown_rx,
        )));
    }

    /// Explicit close: cancels the connection task and any pending retry
    /// timer, and moves to terminal `Disconnected` from any state. No
    /// `ChannelDown` notification is emitted for a deliberate close.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.machine.lock().force_disconnect();
        info!("realtime channel disconnected");
    }
}

async fn run_loop(
    transport: Arc<dyn PushTransport>,
    cache: Arc<ResultCache>,
    bus: UpdateBus,
    config: RealtimeConfig,
    machine: Arc<Mutex<ChannelStateMachine>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        machine.lock().transition(ConnectionState::Connecting);

        match transport.connect().await {
            Ok(conn) => {
                machine.lock().transition(ConnectionState::Connected);
                attempt = 0;
                info!("push channel connected");

                match serve(conn, &cache, &bus, &config, &mut shutdown_rx).await {
                    ServeExit::Shutdown => {
                        machine.lock().force_disconnect();
                        return;
                    }
                    ServeExit::Closed => {
                        warn!("push channel transport closed, reconnecting");
                        machine.lock().transition(ConnectionState::Reconnecting);
                    }
                }
            }
            Err(err) => {
                warn!(%err, attempt, "push channel connect failed");
                machine.lock().transition(ConnectionState::Reconnecting);
            }
        }

        attempt += 1;
        metrics::counter!("attribution.realtime.reconnect").increment(1);
        if attempt > config.max_reconnect_attempts {
            // Retry budget exhausted: go terminal and tell subscribers
            // exactly once.
            machine.lock().force_disconnect();
            bus.publish(EngineUpdate::ChannelDown {
                reason: format!(
                    "gave up after {} reconnect attempts",
                    config.max_reconnect_attempts
                ),
            });
            warn!("push channel retry budget exhausted, giving up");
            return;
        }

        let backoff = Duration::from_millis(
            config
                .reconnect_base_ms
                .saturating_mul(1u64 << (attempt - 1).min(16)),
        );
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown_rx.changed() => {
                machine.lock().force_disconnect();
                return;
            }
        }
    }
}

/// Drive one live connection: send heartbeats on the interval, apply
/// inbound updates, and report why the connection ended.
async fn serve(
    mut conn: TransportConn,
    cache: &ResultCache,
    bus: &UpdateBus,
    config: &RealtimeConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ServeExit {
    let period = Duration::from_secs(config.heartbeat_secs.max(1));
    let mut heartbeat =
        tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => return ServeExit::Shutdown,

            _ = heartbeat.tick() => {
                if conn.outbound.send(PushMessage::Heartbeat).await.is_err() {
                    return ServeExit::Closed;
                }
            }

            msg = conn.inbound.recv() => match msg {
                Some(PushMessage::AttributionUpdate { results }) => {
                    // Write through to the cache, then fan out.
                    for result in &results {
                        cache.put(CacheKey::latest(result), result.clone());
                    }
                    bus.publish(EngineUpdate::Results { results });
                }
                Some(PushMessage::Heartbeat) => {} // discard
                None => return ServeExit::Closed,
            },
        }
    }
}
