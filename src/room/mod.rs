//! Room actor: a single task per room that owns the engine and linearizes
//! every intent, socket lifecycle event, and timer fire into one stream.
//!
//! Timers are spawned sleeps that post a synthetic command back into the
//! mailbox; they never touch state from the timer callback. Stale fires are
//! filtered by the engine's generation counters.

pub mod engine;
pub mod game;


use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::broadcast::Outbound;
use crate::config::Config;
use crate::protocol::{ErrorCode, Intent};
use crate::registry::Registry;
use crate::util::id::now_ms;

use engine::RoomEngine;

/// Synthetic events posted back into the mailbox by spawned sleeps.
#[derive(Debug, Clone, Copy)]
pub enum TimerEvent {
    /// The single armed turn timer; drinks on behalf of the turn seat.
    TurnTimeout { gen: u64 },
    /// Scheduled phase advance: dealing hold, reveal pacing, round-end hold,
    /// or the auto-reveal for an absent dealer.
    PhaseAdvance { gen: u64 },
    /// Reconnect grace window expiry for one player.
    Grace { player_id: Uuid, epoch: u64 },
}

/// Side effects the engine asks its actor to perform after a command.
#[derive(Debug)]
pub enum Directive {
    Schedule { delay: Duration, event: TimerEvent },
    DropToken { token: String },
}

/// Outcome of an HTTP-side add-player request.
#[derive(Debug)]
pub enum AddOutcome {
    Added { player_id: Uuid, seat: u8 },
    /// The session already had a (disconnected) player here; rebind with the
    /// existing token.
    Reconnected { player_id: Uuid, token: String },
}

/// Commands accepted by a room's mailbox.
pub enum RoomCmd {
    AddPlayer {
        name: String,
        avatar_id: u8,
        session_id: String,
        token: String,
        respond: oneshot::Sender<Result<AddOutcome, ErrorCode>>,
    },
    Attach {
        player_id: Uuid,
        outbound: Outbound,
        respond: oneshot::Sender<Result<u64, ErrorCode>>,
    },
    Intent {
        player_id: Uuid,
        intent: Intent,
    },
    SocketClosed {
        player_id: Uuid,
        epoch: u64,
    },
    Timer(TimerEvent),
    Shutdown,
}

/// Cheap handle to a live room; held by the registry and by bound sockets.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: Uuid,
    pub join_code: String,
    pub cmd: mpsc::UnboundedSender<RoomCmd>,
    /// Published by the actor after every command, read by the reaper.
    pub members: Arc<AtomicUsize>,
    pub connected: Arc<AtomicUsize>,
    pub last_active_ms: Arc<AtomicI64>,
}

/// Spawn the actor for a new, empty room and return its handle.
pub fn spawn_room(
    cfg: Arc<Config>,
    registry: Arc<Registry>,
    room_id: Uuid,
    join_code: String,
) -> RoomHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        room_id,
        join_code: join_code.clone(),
        cmd: tx.clone(),
        members: Arc::new(AtomicUsize::new(0)),
        connected: Arc::new(AtomicUsize::new(0)),
        last_active_ms: Arc::new(AtomicI64::new(now_ms())),
    };

    let members = handle.members.clone();
    let connected = handle.connected.clone();
    let last_active = handle.last_active_ms.clone();

    tokio::spawn(async move {
        let mut engine = RoomEngine::new(cfg, room_id, join_code);
        while let Some(cmd) = rx.recv().await {
            let shutdown = matches!(cmd, RoomCmd::Shutdown);
            engine.handle_cmd(cmd);

            for directive in engine.take_directives() {
                match directive {
                    Directive::Schedule { delay, event } => {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = tx.send(RoomCmd::Timer(event));
                        });
                    }
                    Directive::DropToken { token } => registry.drop_token(&token),
                }
            }

            members.store(engine.player_count(), Ordering::Relaxed);
            connected.store(engine.connected_count(), Ordering::Relaxed);
            last_active.store(now_ms(), Ordering::Relaxed);

            if shutdown || engine.is_empty() {
                registry.deregister(room_id);
                tracing::info!(%room_id, "room closed");
                break;
            }
        }
    });

    handle
}
