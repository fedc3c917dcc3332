//! WebSocket connection lifecycle.
//!
//! One task per socket. The task owns the sink, drains the room-fed outbound
//! queue, answers pings, and runs the liveness probe. A `JOIN` intent binds
//! the socket to its (room, player) pair; everything else is forwarded into
//! the room's mailbox in arrival order.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::broadcast::{self, Outbound};
use crate::http::routes::AppState;
use crate::protocol::{decode, encode, ErrorCode, Event, Intent};
use crate::room::RoomCmd;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Binding of a socket to its room and player, established by `JOIN`.
struct Binding {
    cmd: mpsc::UnboundedSender<RoomCmd>,
    player_id: Uuid,
    epoch: u64,
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let cfg = state.registry.config().clone();
    let (mut ws_tx, mut ws_rx) = socket.split();

    // The room gets the sender at JOIN and keeps the only copy; when it
    // drops the queue we close the socket.
    let (outbound, mut out_rx) = broadcast::channel(cfg.outbound_queue);
    let mut out_slot = Some(outbound);
    let mut bound: Option<Binding> = None;

    let mut heartbeat = interval_at(
        Instant::now() + cfg.heartbeat_interval,
        cfg.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pong_seen = true;

    loop {
        tokio::select! {
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if handle_text(&state, &text, &mut ws_tx, &mut out_slot, &mut bound)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => pong_seen = true,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
            queued = out_rx.recv() => match queued {
                Some(msg) => {
                    if ws_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                // Room dropped us (kick, overflow, shutdown).
                None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if !pong_seen {
                    tracing::debug!("heartbeat missed, terminating socket");
                    break;
                }
                pong_seen = false;
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(binding) = bound {
        let _ = binding.cmd.send(RoomCmd::SocketClosed {
            player_id: binding.player_id,
            epoch: binding.epoch,
        });
    }
}

async fn send_error(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: ErrorCode,
) -> Result<(), ()> {
    ws_tx
        .send(Message::Text(encode(&Event::error(code))))
        .await
        .map_err(|_| ())
}

/// Process one text frame. `Err` means the socket is unusable.
async fn handle_text(
    state: &AppState,
    text: &str,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    out_slot: &mut Option<Outbound>,
    bound: &mut Option<Binding>,
) -> Result<(), ()> {
    let intent = match decode(text) {
        Ok(intent) => intent,
        Err(code) => return send_error(ws_tx, code).await,
    };

    match intent {
        // Answered at the connection layer, bound or not.
        Intent::Ping { t } => ws_tx
            .send(Message::Text(encode(&Event::Pong { t })))
            .await
            .map_err(|_| ()),
        Intent::Join { token, .. } => {
            if bound.is_some() {
                return send_error(ws_tx, ErrorCode::InvalidRequest).await;
            }
            let Some((entry, handle)) = state.registry.resolve_token(&token) else {
                return send_error(ws_tx, ErrorCode::InvalidToken).await;
            };
            let Some(outbound) = out_slot.take() else {
                return send_error(ws_tx, ErrorCode::InvalidRequest).await;
            };
            let (respond, rx) = oneshot::channel();
            if handle
                .cmd
                .send(RoomCmd::Attach {
                    player_id: entry.player_id,
                    outbound,
                    respond,
                })
                .is_err()
            {
                return send_error(ws_tx, ErrorCode::RoomNotFound).await;
            }
            match rx.await {
                Ok(Ok(epoch)) => {
                    *bound = Some(Binding {
                        cmd: handle.cmd.clone(),
                        player_id: entry.player_id,
                        epoch,
                    });
                    Ok(())
                }
                // The room pushed the ERROR frame into our queue before
                // dropping it; nothing more to send here.
                Ok(Err(_)) => Ok(()),
                Err(_) => send_error(ws_tx, ErrorCode::RoomNotFound).await,
            }
        }
        other => match bound {
            Some(binding) => {
                let _ = binding.cmd.send(RoomCmd::Intent {
                    player_id: binding.player_id,
                    intent: other,
                });
                Ok(())
            }
            None => send_error(ws_tx, ErrorCode::NotInRoom).await,
        },
    }
}
