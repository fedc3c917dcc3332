//! The per-room engine core: membership, seats, presence, lobby operations.
//!
//! All rules live on `RoomEngine`. The struct is fully synchronous; the actor
//! in `room::mod` feeds it one command at a time, so every method runs to a
//! consistent boundary before the next command is read.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::broadcast::{self, Outbound};
use crate::config::Config;
use crate::protocol::{
    encode, ErrorCode, Event, Intent, LeaveReason, PlayerSnapshot, RoomSettings, RoomSnapshot,
    RoomStatus, SettingsPatch,
};
use crate::util::id::unix_ms;

use super::game::GameState;
use super::{AddOutcome, Directive, RoomCmd, TimerEvent};

/// Stable identity of a member within the room.
#[derive(Debug)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub avatar_id: u8,
    pub seat: u8,
    pub alive: bool,
    pub connected: bool,
    pub ready: bool,
    pub has_cheese: bool,
}

/// A member plus their connection binding. The socket is held only through
/// its outbound queue; dropping the queue closes the socket.
#[derive(Debug)]
pub struct PlayerConn {
    pub player: Player,
    pub token: String,
    pub session_id: String,
    pub sock: Option<Outbound>,
    /// Bumped on every attach; a close event with a stale epoch is ignored.
    pub conn_epoch: u64,
    /// Bumped on every disconnect; invalidates pending grace windows.
    pub disconnect_epoch: u64,
    pub disconnected_at: Option<OffsetDateTime>,
}

pub struct RoomEngine {
    pub room_id: Uuid,
    pub join_code: String,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    /// Join order; host migration promotes the first remaining member.
    pub players: Vec<PlayerConn>,
    pub game: Option<GameState>,
    pub created_at: OffsetDateTime,
    pub(super) cfg: Arc<Config>,
    pub(super) turn_gen: u64,
    pub(super) phase_gen: u64,
    directives: Vec<Directive>,
}

impl RoomEngine {
    pub fn new(cfg: Arc<Config>, room_id: Uuid, join_code: String) -> Self {
        let settings = RoomSettings {
            turn_timer_seconds: cfg.turn_timer_secs,
            cheese_enabled: false,
            cheese_count: cfg.default_cheese_count,
        };
        Self {
            room_id,
            join_code,
            host_id: Uuid::nil(),
            status: RoomStatus::Lobby,
            settings,
            players: Vec::new(),
            game: None,
            created_at: OffsetDateTime::now_utc(),
            cfg,
            turn_gen: 0,
            phase_gen: 0,
            directives: Vec::new(),
        }
    }

    // ===== actor surface =====

    pub fn handle_cmd(&mut self, cmd: RoomCmd) {
        match cmd {
            RoomCmd::AddPlayer {
                name,
                avatar_id,
                session_id,
                token,
                respond,
            } => {
                let _ = respond.send(self.add_player(name, avatar_id, session_id, token));
            }
            RoomCmd::Attach {
                player_id,
                outbound,
                respond,
            } => {
                let _ = respond.send(self.attach(player_id, outbound));
            }
            RoomCmd::Intent { player_id, intent } => self.handle_intent(player_id, intent),
            RoomCmd::SocketClosed { player_id, epoch } => {
                if self
                    .find(player_id)
                    .map(|pc| pc.conn_epoch == epoch)
                    .unwrap_or(false)
                {
                    self.handle_disconnect(player_id);
                }
            }
            RoomCmd::Timer(event) => self.handle_timer(event),
            RoomCmd::Shutdown => {}
        }
    }

    pub fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.directives)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|pc| pc.player.connected).count()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::TurnTimeout { gen } => self.handle_turn_timeout(gen),
            TimerEvent::PhaseAdvance { gen } => self.handle_phase_advance(gen),
            TimerEvent::Grace { player_id, epoch } => self.handle_grace(player_id, epoch),
        }
    }

    fn handle_intent(&mut self, pid: Uuid, intent: Intent) {
        if self.find(pid).is_none() {
            return;
        }
        match intent {
            Intent::Ready { ready } => self.set_ready(pid, ready),
            Intent::UpdateSettings { settings } => self.update_settings(pid, settings),
            Intent::StartGame => self.start_game(pid),
            Intent::ActionDrink => self.action_drink(pid),
            Intent::ActionSwap { target_seat } => self.action_swap(pid, target_seat),
            Intent::ActionStealCheese { target_seat } => self.action_steal_cheese(pid, target_seat),
            Intent::DealerSet { composition } => self.dealer_set(pid, composition),
            Intent::DealerPreview { seat, card_type } => {
                self.dealer_preview(pid, seat, card_type.is_some())
            }
            Intent::StartReveal => self.start_reveal(pid),
            Intent::VoteRematch { vote } => self.vote_rematch(pid, vote),
            Intent::LeaveRoom => self.remove_player(pid, LeaveReason::Left),
            // Bound sockets have no business re-joining; pings are answered
            // at the connection layer.
            Intent::Join { .. } => self.send_err(pid, ErrorCode::InvalidRequest),
            Intent::Ping { t } => self.send_to(pid, &Event::Pong { t }),
        }
    }

    // ===== membership =====

    pub fn add_player(
        &mut self,
        name: String,
        avatar_id: u8,
        session_id: String,
        token: String,
    ) -> Result<AddOutcome, ErrorCode> {
        // Session check first: reconnection works even mid-game.
        if let Some(pc) = self.players.iter().find(|pc| pc.session_id == session_id) {
            if pc.player.connected {
                return Err(ErrorCode::SessionAlreadyInRoom);
            }
            return Ok(AddOutcome::Reconnected {
                player_id: pc.player.id,
                token: pc.token.clone(),
            });
        }
        if self.status != RoomStatus::Lobby {
            return Err(ErrorCode::GameInProgress);
        }
        if self.players.len() >= self.cfg.max_players {
            return Err(ErrorCode::RoomFull);
        }
        let lowered = name.to_lowercase();
        if self
            .players
            .iter()
            .any(|pc| pc.player.name.to_lowercase() == lowered)
        {
            return Err(ErrorCode::NameTaken);
        }

        let seat = self.lowest_free_seat();
        let player_id = Uuid::new_v4();
        if self.players.is_empty() {
            self.host_id = player_id;
        }
        self.players.push(PlayerConn {
            player: Player {
                id: player_id,
                name,
                avatar_id,
                seat,
                alive: true,
                connected: false,
                ready: false,
                has_cheese: false,
            },
            token,
            session_id,
            sock: None,
            conn_epoch: 0,
            disconnect_epoch: 0,
            disconnected_at: None,
        });
        tracing::info!(room_id = %self.room_id, %player_id, seat, "player joined");
        self.broadcast_lobby();
        Ok(AddOutcome::Added { player_id, seat })
    }

    fn lowest_free_seat(&self) -> u8 {
        let mut seat = 0u8;
        loop {
            if !self.players.iter().any(|pc| pc.player.seat == seat) {
                return seat;
            }
            seat += 1;
        }
    }

    /// Bind a socket to a member. A fresh binding replaces any current one
    /// (latest socket wins); the old socket's close event goes stale.
    pub fn attach(&mut self, pid: Uuid, outbound: Outbound) -> Result<u64, ErrorCode> {
        let Some(pc) = self.find_mut(pid) else {
            // The token resolved but the player is gone (left or reaped).
            let _ = outbound.push(encode(&Event::error(ErrorCode::NotInRoom)));
            return Err(ErrorCode::NotInRoom);
        };
        pc.conn_epoch += 1;
        pc.disconnect_epoch += 1;
        pc.sock = Some(outbound);
        pc.player.connected = true;
        pc.disconnected_at = None;
        let epoch = pc.conn_epoch;
        let seat = pc.player.seat;

        tracing::info!(room_id = %self.room_id, player_id = %pid, seat, "socket bound");
        self.send_state(pid);
        self.broadcast_lobby();
        if self.status == RoomStatus::InGame {
            self.on_presence_gain(pid, seat);
        }
        Ok(epoch)
    }

    /// Socket gone (close, write failure, heartbeat, queue overflow).
    pub fn handle_disconnect(&mut self, pid: Uuid) {
        let lobby = self.status == RoomStatus::Lobby;
        let (seat, epoch) = {
            let Some(pc) = self.find_mut(pid) else { return };
            if !pc.player.connected {
                return;
            }
            pc.sock = None;
            pc.player.connected = false;
            if !lobby {
                pc.disconnected_at = Some(OffsetDateTime::now_utc());
                pc.disconnect_epoch += 1;
            }
            (pc.player.seat, pc.disconnect_epoch)
        };
        tracing::info!(room_id = %self.room_id, player_id = %pid, seat, "socket lost");

        if lobby {
            // Lobby disconnects are terminal.
            self.remove_player(pid, LeaveReason::Disconnected);
            return;
        }

        self.directives.push(Directive::Schedule {
            delay: self.cfg.reconnect_timeout,
            event: TimerEvent::Grace {
                player_id: pid,
                epoch,
            },
        });
        self.broadcast_lobby();
        self.on_presence_loss(pid, seat);
    }

    /// Grace window expired without a rebind.
    fn handle_grace(&mut self, pid: Uuid, epoch: u64) {
        let Some(pc) = self.find(pid) else { return };
        if pc.player.connected || pc.disconnect_epoch != epoch {
            return; // reconnected (or re-disconnected) in the meantime
        }
        tracing::info!(room_id = %self.room_id, player_id = %pid, "reconnect window expired");
        if self.status == RoomStatus::Lobby || self.in_vote_phase() {
            // Removal: terminal in the lobby, and it shrinks the quorum for
            // good while voting.
            self.remove_player(pid, LeaveReason::Disconnected);
        } else {
            self.force_out(pid);
        }
    }

    /// Remove a member entirely: voluntary leave, lobby disconnect, or grace
    /// expiry during voting.
    pub fn remove_player(&mut self, pid: Uuid, reason: LeaveReason) {
        let Some(idx) = self.players.iter().position(|pc| pc.player.id == pid) else {
            return;
        };
        let was_voting = self.in_vote_phase();
        let pc = self.players.remove(idx);
        let seat = pc.player.seat;
        let was_alive = pc.player.alive;
        self.directives.push(Directive::DropToken {
            token: pc.token.clone(),
        });
        drop(pc); // closes the socket, if any

        tracing::info!(room_id = %self.room_id, player_id = %pid, seat, ?reason, "player left");
        self.broadcast(&Event::PlayerLeft { seat, reason });

        if self.host_id == pid {
            if let Some(first) = self.players.first() {
                self.host_id = first.player.id;
            }
        }

        if let Some(g) = self.game.as_mut() {
            g.votes.remove(&pid);
        }
        if self.status == RoomStatus::InGame {
            if was_voting {
                self.broadcast_vote_update();
                self.try_resolve_vote();
            } else if was_alive {
                self.vacate_seat(seat);
            }
        }
        self.broadcast_lobby();
    }

    // ===== lobby operations =====

    fn set_ready(&mut self, pid: Uuid, ready: bool) {
        if self.status != RoomStatus::Lobby {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        if let Some(pc) = self.find_mut(pid) {
            pc.player.ready = ready;
        }
        self.broadcast_lobby();
    }

    fn update_settings(&mut self, pid: Uuid, patch: SettingsPatch) {
        if pid != self.host_id {
            return self.send_err(pid, ErrorCode::NotHost);
        }
        if self.status != RoomStatus::Lobby {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        if let Some(count) = patch.cheese_count {
            if count == 0 || count > self.cfg.max_cheese_count {
                return self.send_err(pid, ErrorCode::InvalidRequest);
            }
            self.settings.cheese_count = count;
        }
        if let Some(enabled) = patch.cheese_enabled {
            self.settings.cheese_enabled = enabled;
        }
        self.broadcast_lobby();
    }

    // ===== fan-out =====

    pub(super) fn broadcast(&mut self, event: &Event) {
        let text = encode(event);
        let dead = broadcast::fanout(
            self.players
                .iter()
                .filter_map(|pc| pc.sock.as_ref().map(|s| (pc.player.id, s))),
            &text,
        );
        self.drop_overflowed(dead);
    }

    pub(super) fn broadcast_except(&mut self, exclude: Uuid, event: &Event) {
        let text = encode(event);
        let dead = broadcast::fanout(
            self.players
                .iter()
                .filter(|pc| pc.player.id != exclude)
                .filter_map(|pc| pc.sock.as_ref().map(|s| (pc.player.id, s))),
            &text,
        );
        self.drop_overflowed(dead);
    }

    pub(super) fn send_to(&mut self, pid: Uuid, event: &Event) {
        let text = encode(event);
        let dead = broadcast::fanout(
            self.players
                .iter()
                .filter(|pc| pc.player.id == pid)
                .filter_map(|pc| pc.sock.as_ref().map(|s| (pc.player.id, s))),
            &text,
        );
        self.drop_overflowed(dead);
    }

    pub(super) fn send_err(&mut self, pid: Uuid, code: ErrorCode) {
        self.send_to(pid, &Event::error(code));
    }

    fn drop_overflowed(&mut self, dead: Vec<Uuid>) {
        for pid in dead {
            tracing::warn!(room_id = %self.room_id, player_id = %pid, "outbound queue overflow, dropping socket");
            self.handle_disconnect(pid);
        }
    }

    pub(super) fn broadcast_lobby(&mut self) {
        let event = Event::LobbyUpdate {
            players: self.player_snapshots(),
            settings: self.settings,
            host_id: self.host_id,
        };
        self.broadcast(&event);
    }

    fn send_state(&mut self, pid: Uuid) {
        let Some(seat) = self.seat_of(pid) else { return };
        let event = Event::State {
            room: self.room_snapshot(),
            game: self.game.as_ref().map(|g| g.snapshot(&self.cheese_seats())),
            your_seat: seat,
            your_player_id: pid,
        };
        self.send_to(pid, &event);
    }

    // ===== lookups & snapshots =====

    pub(super) fn find(&self, pid: Uuid) -> Option<&PlayerConn> {
        self.players.iter().find(|pc| pc.player.id == pid)
    }

    pub(super) fn find_mut(&mut self, pid: Uuid) -> Option<&mut PlayerConn> {
        self.players.iter_mut().find(|pc| pc.player.id == pid)
    }

    pub(super) fn find_by_seat(&self, seat: u8) -> Option<&PlayerConn> {
        self.players.iter().find(|pc| pc.player.seat == seat)
    }

    pub(super) fn find_by_seat_mut(&mut self, seat: u8) -> Option<&mut PlayerConn> {
        self.players.iter_mut().find(|pc| pc.player.seat == seat)
    }

    pub(super) fn seat_of(&self, pid: Uuid) -> Option<u8> {
        self.find(pid).map(|pc| pc.player.seat)
    }

    pub(super) fn seat_connected(&self, seat: u8) -> bool {
        self.find_by_seat(seat)
            .map(|pc| pc.player.connected)
            .unwrap_or(false)
    }

    pub(super) fn cheese_seats(&self) -> Vec<u8> {
        let mut seats: Vec<u8> = self
            .players
            .iter()
            .filter(|pc| pc.player.has_cheese)
            .map(|pc| pc.player.seat)
            .collect();
        seats.sort_unstable();
        seats
    }

    fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
        let mut players: Vec<PlayerSnapshot> = self
            .players
            .iter()
            .map(|pc| PlayerSnapshot {
                player_id: pc.player.id,
                name: pc.player.name.clone(),
                avatar_id: pc.player.avatar_id,
                seat: pc.player.seat,
                alive: pc.player.alive,
                connected: pc.player.connected,
                ready: pc.player.ready,
                has_cheese: pc.player.has_cheese,
            })
            .collect();
        players.sort_by_key(|p| p.seat);
        players
    }

    fn room_snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id,
            join_code: self.join_code.clone(),
            host_id: self.host_id,
            status: self.status,
            settings: self.settings,
            players: self.player_snapshots(),
            created_at: unix_ms(self.created_at),
        }
    }

    // ===== timer arming =====

    pub(super) fn arm_turn_timer(&mut self, delay: Duration) {
        self.turn_gen += 1;
        if let Some(g) = self.game.as_mut() {
            g.deadline_ts = Some(crate::util::id::now_ms() + delay.as_millis() as i64);
        }
        self.directives.push(Directive::Schedule {
            delay,
            event: TimerEvent::TurnTimeout { gen: self.turn_gen },
        });
    }

    pub(super) fn cancel_turn_timer(&mut self) {
        self.turn_gen += 1;
        if let Some(g) = self.game.as_mut() {
            g.deadline_ts = None;
        }
    }

    /// Schedule an advance bound to the current phase generation; any later
    /// phase change makes the fire a no-op.
    pub(super) fn schedule_phase_advance(&mut self, delay: Duration) {
        self.directives.push(Directive::Schedule {
            delay,
            event: TimerEvent::PhaseAdvance {
                gen: self.phase_gen,
            },
        });
    }

    pub(super) fn cancel_phase_advance(&mut self) {
        self.phase_gen += 1;
    }
}
