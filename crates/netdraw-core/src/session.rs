// ── Collaborative session ──
//
// One tokio task owns the editor and multiplexes the topology socket,
// the optional test socket, host input and the two timers. After every
// step it flushes outbound frames and publishes the document.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use netdraw_api::{ReconnectConfig, SocketEvent, TopologySocket, test_url, topology_url};

use crate::config::SessionConfig;
use crate::editor::Editor;
use crate::error::CoreError;
use crate::event::{Event, Key, Wheel};
use crate::message::Modifiers;
use crate::model::Snapshot;
use crate::stream::DocumentStream;
use crate::workspace::Effect;

const INPUT_CHANNEL_SIZE: usize = 256;
const EFFECT_CHANNEL_SIZE: usize = 256;
const ANIMATION_PERIOD: Duration = Duration::from_millis(17);
const TEST_PUMP_PERIOD: Duration = Duration::from_millis(10);

// ── ConnectionState ──────────────────────────────────────────────────

/// Topology socket state observable by hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// The socket gave up; the session has ended.
    Failed,
}

// ── Input ────────────────────────────────────────────────────────────

/// Host input for the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    MouseDown { x: f64, y: f64, modifiers: Modifiers },
    MouseUp { x: f64, y: f64, modifiers: Modifiers },
    MouseMove { x: f64, y: f64, modifiers: Modifiers },
    Wheel { x: f64, y: f64, wheel: Wheel },
    Key(Key),
    /// A command event dispatched as-is.
    Command(Event),
}

impl Input {
    fn apply(self, editor: &mut Editor) -> Result<(), CoreError> {
        match self {
            Input::MouseDown { x, y, modifiers } => editor.mouse_down(x, y, modifiers),
            Input::MouseUp { x, y, modifiers } => editor.mouse_up(x, y, modifiers),
            Input::MouseMove { x, y, modifiers } => editor.mouse_move(x, y, modifiers),
            Input::Wheel { x, y, wheel } => editor.mouse_wheel(x, y, wheel),
            Input::Key(key) => editor.key_down(key),
            Input::Command(event) => editor.command(event),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

pub struct Session;

impl Session {
    /// Connect the sockets described by `config` and start the session
    /// task. Returns immediately; connection progress is observable via
    /// [`SessionHandle::connection_state`].
    pub fn spawn(config: &SessionConfig, editor: Editor, cancel: CancellationToken) -> Result<SessionHandle, CoreError> {
        let authorization = config
            .token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()));
        let reconnect = ReconnectConfig {
            initial_delay: config.reconnect_delay,
            ..ReconnectConfig::default()
        };

        let topology = TopologySocket::connect(
            topology_url(&config.url, config.inventory_id)?,
            reconnect.clone(),
            cancel.child_token(),
            authorization.clone(),
        );
        let test = if config.test_channel {
            Some(TopologySocket::connect(
                test_url(&config.url, config.inventory_id)?,
                reconnect,
                cancel.child_token(),
                authorization,
            ))
        } else {
            None
        };

        info!(url = %config.url, inventory_id = config.inventory_id, test_channel = config.test_channel, "session starting");
        Ok(Self::attach(editor, topology, test, cancel))
    }

    /// Run the session over already-established sockets.
    pub fn attach(
        editor: Editor,
        topology: TopologySocket,
        test: Option<TopologySocket>,
        cancel: CancellationToken,
    ) -> SessionHandle {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (document_tx, document_rx) = watch::channel(Arc::new(editor.snapshot()));
        let (error_tx, error_rx) = watch::channel(None);
        let (effect_tx, _) = broadcast::channel(EFFECT_CHANNEL_SIZE);

        let task = tokio::spawn(run(SessionTask {
            editor,
            topology,
            test,
            input_rx,
            state_tx,
            document_tx,
            error_tx,
            effect_tx: effect_tx.clone(),
            cancel: cancel.clone(),
        }));

        SessionHandle {
            input_tx,
            connection: state_rx,
            document: document_rx,
            last_error: error_rx,
            effects: effect_tx,
            cancel,
            task,
        }
    }
}

// ── SessionHandle ────────────────────────────────────────────────────

/// The host's side of a running session.
pub struct SessionHandle {
    input_tx: mpsc::Sender<Input>,
    connection: watch::Receiver<ConnectionState>,
    document: watch::Receiver<Arc<Snapshot>>,
    last_error: watch::Receiver<Option<String>>,
    effects: broadcast::Sender<Effect>,
    cancel: CancellationToken,
    task: JoinHandle<Editor>,
}

impl SessionHandle {
    /// Dispatch a command event.
    pub async fn send(&self, event: Event) -> Result<(), CoreError> {
        self.input(Input::Command(event)).await
    }

    /// Feed raw pointer or key input.
    pub async fn input(&self, input: Input) -> Result<(), CoreError> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| CoreError::SessionClosed)
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn document(&self) -> DocumentStream {
        DocumentStream::new(self.document.clone())
    }

    /// The most recent protocol or dispatch error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Side effects (navigation, panels, host lookups) for the host.
    pub fn effects(&self) -> broadcast::Receiver<Effect> {
        self.effects.subscribe()
    }

    /// Stop the session and get the editor back.
    pub async fn shutdown(self) -> Result<Editor, CoreError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| CoreError::Internal(format!("session task failed: {e}")))
    }
}

// ── Session task ─────────────────────────────────────────────────────

struct SessionTask {
    editor: Editor,
    topology: TopologySocket,
    test: Option<TopologySocket>,
    input_rx: mpsc::Receiver<Input>,
    state_tx: watch::Sender<ConnectionState>,
    document_tx: watch::Sender<Arc<Snapshot>>,
    error_tx: watch::Sender<Option<String>>,
    effect_tx: broadcast::Sender<Effect>,
    cancel: CancellationToken,
}

/// Why the loop woke up.
enum Wake {
    Cancelled,
    Topology(Option<SocketEvent>),
    Test(Option<SocketEvent>),
    Input(Input),
    Animation,
    Pump,
}

async fn recv_test(test: &mut Option<TopologySocket>) -> Option<SocketEvent> {
    match test {
        Some(socket) => socket.recv().await,
        None => std::future::pending().await,
    }
}

async fn run(mut task: SessionTask) -> Editor {
    let mut animation = tokio::time::interval(ANIMATION_PERIOD);
    animation.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pump = tokio::time::interval(TEST_PUMP_PERIOD);
    pump.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reconnects: u32 = 0;

    loop {
        let wake = tokio::select! {
            biased;
            () = task.cancel.cancelled() => Wake::Cancelled,
            event = task.topology.recv() => Wake::Topology(event),
            event = recv_test(&mut task.test) => Wake::Test(event),
            Some(input) = task.input_rx.recv() => Wake::Input(input),
            _ = animation.tick() => Wake::Animation,
            _ = pump.tick() => Wake::Pump,
        };

        let step: Result<bool, CoreError> = match wake {
            Wake::Cancelled => break,
            Wake::Topology(None) => {
                warn!("topology socket closed");
                task.state_tx.send_replace(ConnectionState::Failed);
                break;
            }
            Wake::Topology(Some(SocketEvent::Connected)) => {
                info!("topology socket connected");
                reconnects = 0;
                task.state_tx.send_replace(ConnectionState::Connected);
                Ok(false)
            }
            Wake::Topology(Some(SocketEvent::Disconnected)) => {
                reconnects += 1;
                warn!(attempt = reconnects, "topology socket lost, reconnecting");
                task.state_tx
                    .send_replace(ConnectionState::Reconnecting { attempt: reconnects });
                task.editor.set_connected(false);
                Ok(false)
            }
            Wake::Topology(Some(SocketEvent::Frame(text))) => {
                task.editor.receive_frame(&text).map(|()| true)
            }
            Wake::Test(None) => {
                debug!("test socket closed");
                task.test = None;
                Ok(false)
            }
            Wake::Test(Some(SocketEvent::Frame(text))) => {
                task.editor.receive_test_frame(&text).map(|()| true)
            }
            Wake::Test(Some(event)) => {
                debug!(?event, "test socket");
                Ok(false)
            }
            Wake::Input(input) => input.apply(&mut task.editor).map(|()| true),
            Wake::Animation => task.editor.animation_tick(),
            Wake::Pump => Ok(task.editor.test_tick()),
        };

        let changed = match step {
            Ok(changed) => changed,
            Err(err) => {
                warn!(error = %err, "session step failed");
                task.error_tx.send_replace(Some(err.to_string()));
                true
            }
        };
        flush(&mut task).await;
        if changed {
            task.document_tx
                .send_replace(Arc::new(task.editor.snapshot()));
        }
    }

    info!("session stopped");
    task.topology.shutdown();
    if let Some(test) = &task.test {
        test.shutdown();
    }
    task.state_tx.send_if_modified(|state| {
        if *state == ConnectionState::Failed {
            false
        } else {
            *state = ConnectionState::Disconnected;
            true
        }
    });
    task.editor
}

/// Hand queued frames to the sockets and effects to subscribers.
async fn flush(task: &mut SessionTask) {
    for frame in task.editor.control_frames() {
        if let Err(err) = task.topology.send(frame).await {
            debug!(error = %err, "control frame not sent");
        }
    }
    let frames = task.editor.test_frames();
    match &task.test {
        Some(test) => {
            for frame in frames {
                if let Err(err) = test.send(frame).await {
                    debug!(error = %err, "test frame not sent");
                }
            }
        }
        None if !frames.is_empty() => trace!(count = frames.len(), "no test channel, frames dropped"),
        None => {}
    }
    for effect in task.editor.take_effects() {
        // No subscribers is fine.
        let _ = task.effect_tx.send(effect);
    }
}
