//! The round state machine: dealer setup, dealing, turns, reveals, round and
//! game end, and rematch voting.
//!
//! The hidden card table lives here and never leaves the engine; the only
//! frames that carry a card identity are per-seat REVEALs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::protocol::{CardType, ErrorCode, Event, GameSnapshot, Phase, RoomStatus, VotePhase};

use super::engine::RoomEngine;

/// Per-game state, present iff the room is IN_GAME.
#[derive(Debug)]
pub struct GameState {
    pub phase: Phase,
    pub dealer_seat: u8,
    pub turn_seat: Option<u8>,
    pub round_index: u32,
    /// Sorted ascending; seats are never renumbered, so the cyclic order is
    /// stable under eliminations.
    pub alive_seats: Vec<u8>,
    pub facedown_seats: BTreeSet<u8>,
    pub acted_seats: BTreeSet<u8>,
    pub deadline_ts: Option<i64>,
    /// The secret. Serialized only seat-by-seat inside REVEAL frames.
    pub(crate) card_by_seat: HashMap<u8, CardType>,
    pub next_dealer_seat: Option<u8>,
    /// Rematch yes-votes while in GAME_END.
    pub votes: HashSet<Uuid>,
}

impl GameState {
    pub fn new(alive_seats: Vec<u8>, dealer_seat: u8) -> Self {
        Self {
            phase: Phase::DealerSetup,
            dealer_seat,
            turn_seat: None,
            round_index: 0,
            alive_seats,
            facedown_seats: BTreeSet::new(),
            acted_seats: BTreeSet::new(),
            deadline_ts: None,
            card_by_seat: HashMap::new(),
            next_dealer_seat: None,
            votes: HashSet::new(),
        }
    }

    /// Public view; the card table is deliberately absent.
    pub fn snapshot(&self, cheese_seats: &[u8]) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            dealer_seat: self.dealer_seat,
            turn_seat: self.turn_seat,
            round_index: self.round_index,
            alive_seats: self.alive_seats.clone(),
            facedown_seats: self.facedown_seats.iter().copied().collect(),
            acted_seats: self.acted_seats.iter().copied().collect(),
            deadline_ts: self.deadline_ts,
            cheese_seats: cheese_seats.to_vec(),
        }
    }
}

/// "Next alive seat clockwise from `from`": smallest alive seat greater than
/// `from`, wrapping to the smallest alive seat overall.
fn next_alive_clockwise(alive: &[u8], from: u8) -> Option<u8> {
    alive
        .iter()
        .copied()
        .find(|&s| s > from)
        .or_else(|| alive.first().copied())
}

impl RoomEngine {
    // ===== game start =====

    pub(super) fn start_game(&mut self, pid: Uuid) {
        if pid != self.host_id {
            return self.send_err(pid, ErrorCode::NotHost);
        }
        if self.status != RoomStatus::Lobby {
            return self.send_err(pid, ErrorCode::GameInProgress);
        }
        if self.players.len() < self.cfg.min_players {
            return self.send_err(pid, ErrorCode::NotEnoughPlayers);
        }
        // Host readiness is implicit.
        if self
            .players
            .iter()
            .any(|pc| pc.player.id != self.host_id && !pc.player.ready)
        {
            return self.send_err(pid, ErrorCode::NotAllReady);
        }

        for pc in &mut self.players {
            pc.player.alive = true;
            pc.player.ready = false;
            pc.player.has_cheese = false;
        }
        let mut alive: Vec<u8> = self.players.iter().map(|pc| pc.player.seat).collect();
        alive.sort_unstable();
        let dealer_seat = *alive
            .choose(&mut rand::thread_rng())
            .expect("at least MIN_PLAYERS seats");

        tracing::info!(room_id = %self.room_id, dealer_seat, players = alive.len(), "game started");
        self.status = RoomStatus::InGame;
        self.game = Some(GameState::new(alive, dealer_seat));
        self.enter_dealer_setup();
    }

    // ===== dealer setup =====

    fn enter_dealer_setup(&mut self) {
        self.cancel_turn_timer();
        let Some(g) = self.game.as_mut() else { return };
        g.turn_seat = None;
        let dealer_seat = g.dealer_seat;
        self.set_phase(Phase::DealerSetup);
        self.emit_phase();
        if !self.seat_can_act(dealer_seat) {
            self.auto_compose();
        }
    }

    pub(super) fn dealer_set(&mut self, pid: Uuid, composition: Vec<CardType>) {
        let Some(g) = self.game.as_ref() else {
            return self.send_err(pid, ErrorCode::InvalidAction);
        };
        if g.phase != Phase::DealerSetup {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        if self.seat_of(pid) != Some(g.dealer_seat) {
            return self.send_err(pid, ErrorCode::NotDealer);
        }
        if composition.len() != g.alive_seats.len() {
            return self.send_err(pid, ErrorCode::MissingAssignments);
        }
        if !composition.contains(&CardType::Safe) || !composition.contains(&CardType::Doom) {
            return self.send_err(pid, ErrorCode::InvalidComposition);
        }
        // Composition is ordered by ascending alive seat.
        let cards: HashMap<u8, CardType> = g
            .alive_seats
            .iter()
            .copied()
            .zip(composition)
            .collect();
        self.commit_composition(cards);
    }

    pub(super) fn dealer_preview(&mut self, pid: Uuid, seat: u8, assigned: bool) {
        let Some(g) = self.game.as_ref() else {
            return self.send_err(pid, ErrorCode::InvalidAction);
        };
        if g.phase != Phase::DealerSetup {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        if self.seat_of(pid) != Some(g.dealer_seat) {
            return self.send_err(pid, ErrorCode::NotDealer);
        }
        if !g.alive_seats.contains(&seat) {
            return self.send_err(pid, ErrorCode::InvalidTarget);
        }
        // Non-dealers only learn that the seat has an assignment.
        self.broadcast_except(pid, &Event::DealerPreview { seat, assigned });
    }

    /// Valid random assignment when the dealer cannot act: one card per alive
    /// seat, flipped if the draw came out single-kind.
    fn auto_compose(&mut self) {
        let Some(g) = self.game.as_ref() else { return };
        let alive = g.alive_seats.clone();
        let mut rng = rand::thread_rng();
        let mut cards: HashMap<u8, CardType> = alive
            .iter()
            .map(|&s| {
                let card = if rng.gen_bool(0.5) {
                    CardType::Safe
                } else {
                    CardType::Doom
                };
                (s, card)
            })
            .collect();
        if alive.len() >= 2 {
            let first = cards[&alive[0]];
            if cards.values().all(|&c| c == first) {
                let &flip = alive.choose(&mut rng).expect("non-empty");
                let other = match first {
                    CardType::Safe => CardType::Doom,
                    CardType::Doom => CardType::Safe,
                };
                cards.insert(flip, other);
            }
        }
        tracing::info!(room_id = %self.room_id, "dealer absent, committing a synthesized deal");
        self.commit_composition(cards);
    }

    fn commit_composition(&mut self, cards: HashMap<u8, CardType>) {
        {
            let Some(g) = self.game.as_mut() else { return };
            g.card_by_seat = cards;
            g.facedown_seats = g.alive_seats.iter().copied().collect();
            g.acted_seats.clear();
        }
        self.distribute_cheese();
        self.enter_dealing();
    }

    /// Runs exactly once per round, at composition commit time.
    fn distribute_cheese(&mut self) {
        for pc in &mut self.players {
            pc.player.has_cheese = false;
        }
        if !self.settings.cheese_enabled {
            return;
        }
        let Some(g) = self.game.as_ref() else { return };
        let alive = g.alive_seats.clone();
        if alive.len() >= 3 {
            let count = (self.settings.cheese_count as usize).min(alive.len() - 1);
            let chosen: Vec<u8> = alive
                .choose_multiple(&mut rand::thread_rng(), count)
                .copied()
                .collect();
            for seat in chosen {
                if let Some(pc) = self.find_by_seat_mut(seat) {
                    pc.player.has_cheese = true;
                }
            }
        }
        let cheese_seats = self.cheese_seats();
        self.broadcast(&Event::CheeseUpdate { cheese_seats });
    }

    // ===== dealing and turns =====

    fn enter_dealing(&mut self) {
        let Some(g) = self.game.as_ref() else { return };
        let alive_seats = g.alive_seats.clone();
        self.set_phase(Phase::Dealing);
        self.broadcast(&Event::Dealt { alive_seats });
        self.emit_phase();
        self.schedule_phase_advance(self.cfg.dealing_hold);
    }

    fn begin_turns(&mut self) {
        let Some(g) = self.game.as_ref() else { return };
        let dealer_seat = g.dealer_seat;
        match self.next_eligible(dealer_seat) {
            Some(seat) => self.enter_turn(seat),
            // No non-dealer is eligible; skip straight to the climax.
            None => self.enter_awaiting_reveal(),
        }
    }

    fn enter_turn(&mut self, seat: u8) {
        self.set_phase(Phase::Turns);
        if let Some(g) = self.game.as_mut() {
            g.turn_seat = Some(seat);
        }
        let delay = if self.seat_connected(seat) {
            Duration::from_secs(self.settings.turn_timer_seconds)
        } else {
            self.cfg.disconnected_turn_timeout
        };
        self.arm_turn_timer(delay);
        self.emit_phase();
    }

    /// Smallest alive non-dealer seat after `from` that has not acted,
    /// wrapping once; None when every candidate is exhausted.
    fn next_eligible(&self, from: u8) -> Option<u8> {
        let g = self.game.as_ref()?;
        let candidates: Vec<u8> = g
            .alive_seats
            .iter()
            .copied()
            .filter(|&s| s != g.dealer_seat && !g.acted_seats.contains(&s))
            .collect();
        next_alive_clockwise(&candidates, from)
    }

    fn advance_from(&mut self, seat: u8) {
        match self.next_eligible(seat) {
            Some(next) => self.enter_turn(next),
            None => self.enter_awaiting_reveal(),
        }
    }

    /// Common guards for the three turn actions. Emits the error itself and
    /// returns the acting seat on success.
    fn turn_guard(&mut self, pid: Uuid) -> Option<u8> {
        let Some(seat) = self.seat_of(pid) else { return None };
        let Some(g) = self.game.as_ref() else {
            self.send_err(pid, ErrorCode::InvalidAction);
            return None;
        };
        if g.phase != Phase::Turns || !g.alive_seats.contains(&seat) {
            self.send_err(pid, ErrorCode::InvalidAction);
            return None;
        }
        if g.acted_seats.contains(&seat) {
            self.send_err(pid, ErrorCode::AlreadyActed);
            return None;
        }
        if g.turn_seat != Some(seat) {
            self.send_err(pid, ErrorCode::NotYourTurn);
            return None;
        }
        Some(seat)
    }

    pub(super) fn action_drink(&mut self, pid: Uuid) {
        if let Some(seat) = self.turn_guard(pid) {
            self.resolve_drink(seat);
        }
    }

    /// Drink for a seat: the deterministic default on timeout as well.
    fn resolve_drink(&mut self, seat: u8) {
        if let Some(g) = self.game.as_mut() {
            g.acted_seats.insert(seat);
        }
        self.reveal_seat(seat);
        self.advance_from(seat);
    }

    pub(super) fn action_swap(&mut self, pid: Uuid, target: u8) {
        let Some(seat) = self.turn_guard(pid) else { return };
        let g = self.game.as_ref().expect("guarded");
        if target == seat
            || !g.alive_seats.contains(&target)
            || !g.facedown_seats.contains(&target)
        {
            return self.send_err(pid, ErrorCode::InvalidTarget);
        }
        let g = self.game.as_mut().expect("guarded");
        if let (Some(&mine), Some(&theirs)) =
            (g.card_by_seat.get(&seat), g.card_by_seat.get(&target))
        {
            g.card_by_seat.insert(seat, theirs);
            g.card_by_seat.insert(target, mine);
        }
        g.acted_seats.insert(seat);
        // Seats only; the cards stay hidden.
        self.broadcast(&Event::Swap {
            from_seat: seat,
            to_seat: target,
        });
        self.advance_from(seat);
    }

    pub(super) fn action_steal_cheese(&mut self, pid: Uuid, target: u8) {
        if !self.settings.cheese_enabled {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        let Some(seat) = self.turn_guard(pid) else { return };
        let g = self.game.as_ref().expect("guarded");
        if target == seat || !g.alive_seats.contains(&target) {
            return self.send_err(pid, ErrorCode::InvalidTarget);
        }
        let self_has = self
            .find_by_seat(seat)
            .map(|pc| pc.player.has_cheese)
            .unwrap_or(false);
        if self_has {
            return self.send_err(pid, ErrorCode::AlreadyHasCheese);
        }
        let target_has = self
            .find_by_seat(target)
            .map(|pc| pc.player.has_cheese)
            .unwrap_or(false);
        if !target_has {
            return self.send_err(pid, ErrorCode::NoCheeseToSteal);
        }

        if let Some(pc) = self.find_by_seat_mut(target) {
            pc.player.has_cheese = false;
        }
        if let Some(pc) = self.find_by_seat_mut(seat) {
            pc.player.has_cheese = true;
        }
        if let Some(g) = self.game.as_mut() {
            g.acted_seats.insert(seat);
        }
        self.broadcast(&Event::CheeseStolen {
            from_seat: target,
            to_seat: seat,
        });
        let cheese_seats = self.cheese_seats();
        self.broadcast(&Event::CheeseUpdate { cheese_seats });
        self.advance_from(seat);
    }

    pub(super) fn handle_turn_timeout(&mut self, gen: u64) {
        if gen != self.turn_gen {
            return;
        }
        let Some(g) = self.game.as_ref() else { return };
        if g.phase != Phase::Turns {
            return;
        }
        let Some(seat) = g.turn_seat else { return };
        tracing::info!(room_id = %self.room_id, seat, "turn timer fired, drinking by default");
        self.resolve_drink(seat);
    }

    // ===== reveals =====

    /// Reveal a seat's card to everyone and apply the cheese-inverted
    /// outcome.
    fn reveal_seat(&mut self, seat: u8) {
        let card = {
            let Some(g) = self.game.as_mut() else { return };
            let Some(&card) = g.card_by_seat.get(&seat) else {
                return;
            };
            g.facedown_seats.remove(&seat);
            card
        };
        self.broadcast(&Event::Reveal {
            seat,
            card_type: card,
        });
        let cheesed = self
            .find_by_seat(seat)
            .map(|pc| pc.player.has_cheese)
            .unwrap_or(false);
        // Base elimination on DOOM, inverted when the seat holds cheese.
        if (card == CardType::Doom) != cheesed {
            self.eliminate(seat);
        }
    }

    fn eliminate(&mut self, seat: u8) {
        match self.find_by_seat_mut(seat) {
            Some(pc) if pc.player.alive => pc.player.alive = false,
            _ => return,
        }
        if let Some(g) = self.game.as_mut() {
            g.alive_seats.retain(|&s| s != seat);
            g.facedown_seats.remove(&seat);
            g.acted_seats.remove(&seat);
        }
        self.broadcast(&Event::Elim { seat });
    }

    fn enter_awaiting_reveal(&mut self) {
        self.cancel_turn_timer();
        if let Some(g) = self.game.as_mut() {
            g.turn_seat = None;
        }
        self.set_phase(Phase::AwaitingReveal);
        self.emit_phase();
        let Some(g) = self.game.as_ref() else { return };
        if !self.seat_can_act(g.dealer_seat) {
            // Absent dealer: trigger the reveal after the short grace.
            self.schedule_phase_advance(self.cfg.disconnected_turn_timeout);
        }
    }

    pub(super) fn start_reveal(&mut self, pid: Uuid) {
        let Some(g) = self.game.as_ref() else {
            return self.send_err(pid, ErrorCode::InvalidAction);
        };
        if g.phase != Phase::AwaitingReveal {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        if self.seat_of(pid) != Some(g.dealer_seat) {
            return self.send_err(pid, ErrorCode::NotDealer);
        }
        self.enter_final_reveal();
    }

    fn enter_final_reveal(&mut self) {
        self.set_phase(Phase::FinalReveal);
        self.emit_phase();
        self.reveal_tick();
    }

    /// One paced reveal per tick, ascending seat order; the tick after the
    /// last reveal is the buffer before the round-end check.
    pub(super) fn reveal_tick(&mut self) {
        let next = self
            .game
            .as_ref()
            .and_then(|g| g.facedown_seats.iter().next().copied());
        match next {
            Some(seat) => {
                self.reveal_seat(seat);
                self.schedule_phase_advance(self.cfg.per_reveal);
            }
            None => self.check_round_end(),
        }
    }

    // ===== round / game end =====

    fn check_round_end(&mut self) {
        let Some(g) = self.game.as_ref() else { return };
        if g.alive_seats.len() <= 1 {
            self.enter_game_end();
        } else {
            self.enter_round_end();
        }
    }

    fn enter_round_end(&mut self) {
        let next_dealer_seat = {
            let Some(g) = self.game.as_mut() else { return };
            let next = next_alive_clockwise(&g.alive_seats, g.dealer_seat)
                .unwrap_or(g.dealer_seat);
            g.next_dealer_seat = Some(next);
            // The secret dies with the round; the acted/facedown sets stay
            // visible in snapshots until the hold ends.
            g.card_by_seat.clear();
            next
        };
        self.set_phase(Phase::RoundEnd);
        self.broadcast(&Event::RoundEnd { next_dealer_seat });
        self.emit_phase();
        self.schedule_phase_advance(self.cfg.round_end_hold);
    }

    fn begin_next_round(&mut self) {
        {
            let Some(g) = self.game.as_mut() else { return };
            g.round_index += 1;
            g.facedown_seats.clear();
            g.acted_seats.clear();
            let next = g.next_dealer_seat.take().unwrap_or(g.dealer_seat);
            // The chosen dealer may have died or left during the hold.
            g.dealer_seat = if g.alive_seats.contains(&next) {
                next
            } else {
                next_alive_clockwise(&g.alive_seats, next).unwrap_or(next)
            };
        }
        self.enter_dealer_setup();
    }

    fn enter_game_end(&mut self) {
        self.cancel_turn_timer();
        let winner_seat = {
            let Some(g) = self.game.as_mut() else { return };
            g.turn_seat = None;
            g.votes.clear();
            g.alive_seats.first().copied()
        };
        self.set_phase(Phase::GameEnd);
        tracing::info!(room_id = %self.room_id, ?winner_seat, "game over");
        self.broadcast(&Event::GameEnd { winner_seat });
        self.emit_phase();
        self.broadcast_vote_update();
    }

    // ===== rematch voting =====

    pub(super) fn in_vote_phase(&self) -> bool {
        self.status == RoomStatus::InGame
            && self
                .game
                .as_ref()
                .map(|g| g.phase == Phase::GameEnd)
                .unwrap_or(false)
    }

    pub(super) fn vote_rematch(&mut self, pid: Uuid, vote: bool) {
        if !self.in_vote_phase() {
            return self.send_err(pid, ErrorCode::InvalidAction);
        }
        if let Some(g) = self.game.as_mut() {
            if vote {
                g.votes.insert(pid);
            } else {
                g.votes.remove(&pid);
            }
        }
        self.broadcast_vote_update();
        self.try_resolve_vote();
    }

    fn connected_ids(&self) -> Vec<Uuid> {
        self.players
            .iter()
            .filter(|pc| pc.player.connected)
            .map(|pc| pc.player.id)
            .collect()
    }

    /// The quorum is the set of currently-connected members; it mutates with
    /// connectivity.
    pub(super) fn broadcast_vote_update(&mut self) {
        let Some(g) = self.game.as_ref() else { return };
        let connected = self.connected_ids();
        let voted_yes = connected.iter().filter(|id| g.votes.contains(id)).count();
        let required_votes = connected.len();
        self.broadcast(&Event::VoteUpdate {
            voted_yes,
            required_votes,
            phase: VotePhase::Voting,
        });
    }

    pub(super) fn try_resolve_vote(&mut self) {
        if !self.in_vote_phase() {
            return;
        }
        let connected = self.connected_ids();
        let Some(g) = self.game.as_ref() else { return };
        if connected.is_empty() || !connected.iter().all(|id| g.votes.contains(id)) {
            return;
        }
        let count = connected.len();
        self.broadcast(&Event::VoteUpdate {
            voted_yes: count,
            required_votes: count,
            phase: VotePhase::Starting,
        });
        tracing::info!(room_id = %self.room_id, votes = count, "rematch approved");
        self.return_to_lobby();
    }

    fn return_to_lobby(&mut self) {
        self.cancel_turn_timer();
        self.cancel_phase_advance();
        self.status = RoomStatus::Lobby;
        self.game = None;
        for pc in &mut self.players {
            pc.player.alive = true;
            pc.player.ready = false;
            pc.player.has_cheese = false;
        }
        self.broadcast_lobby();
    }

    // ===== presence hooks and forced exits =====

    pub(super) fn on_presence_loss(&mut self, pid: Uuid, seat: u8) {
        let Some(g) = self.game.as_ref() else { return };
        match g.phase {
            Phase::DealerSetup if seat == g.dealer_seat => self.auto_compose(),
            Phase::Turns if g.turn_seat == Some(seat) => {
                // Re-arm with the short deadline for an absent actor.
                self.arm_turn_timer(self.cfg.disconnected_turn_timeout);
                self.emit_phase();
            }
            Phase::AwaitingReveal if seat == g.dealer_seat => {
                self.schedule_phase_advance(self.cfg.disconnected_turn_timeout);
            }
            Phase::GameEnd => {
                if let Some(g) = self.game.as_mut() {
                    g.votes.remove(&pid);
                }
                self.broadcast_vote_update();
                self.try_resolve_vote();
            }
            _ => {}
        }
    }

    pub(super) fn on_presence_gain(&mut self, _pid: Uuid, seat: u8) {
        let Some(g) = self.game.as_ref() else { return };
        match g.phase {
            Phase::Turns if g.turn_seat == Some(seat) => {
                self.arm_turn_timer(Duration::from_secs(self.settings.turn_timer_seconds));
                self.emit_phase();
            }
            Phase::AwaitingReveal if seat == g.dealer_seat => {
                // The dealer is back; let them pace the reveal again.
                self.cancel_phase_advance();
            }
            Phase::GameEnd => self.broadcast_vote_update(),
            _ => {}
        }
    }

    /// Grace expiry in-game: the seat is marked dead but the member stays as
    /// a reconnectable spectator.
    pub(super) fn force_out(&mut self, pid: Uuid) {
        let Some(pc) = self.find(pid) else { return };
        if !pc.player.alive {
            return;
        }
        let seat = pc.player.seat;
        tracing::info!(room_id = %self.room_id, player_id = %pid, seat, "marking absent player dead");
        self.eliminate(seat);
        self.after_seat_loss(seat);
    }

    /// Seat removal path for members who left the room outright.
    pub(super) fn vacate_seat(&mut self, seat: u8) {
        if let Some(g) = self.game.as_mut() {
            g.alive_seats.retain(|&s| s != seat);
            g.facedown_seats.remove(&seat);
            g.acted_seats.remove(&seat);
            g.card_by_seat.remove(&seat);
        }
        self.after_seat_loss(seat);
    }

    fn after_seat_loss(&mut self, seat: u8) {
        let Some(g) = self.game.as_ref() else { return };
        if g.phase == Phase::GameEnd {
            return;
        }
        if g.alive_seats.len() <= 1 {
            return self.enter_game_end();
        }
        match g.phase {
            Phase::DealerSetup if seat == g.dealer_seat => self.auto_compose(),
            Phase::Turns if g.turn_seat == Some(seat) => self.advance_from(seat),
            // Nobody is left to press the button; auto-trigger like the
            // disconnect path does.
            Phase::AwaitingReveal if seat == g.dealer_seat => {
                self.schedule_phase_advance(self.cfg.disconnected_turn_timeout);
            }
            _ => {}
        }
    }

    // ===== shared helpers =====

    fn set_phase(&mut self, phase: Phase) {
        if let Some(g) = self.game.as_mut() {
            g.phase = phase;
        }
        // Any scheduled advance for the previous phase is now stale.
        self.cancel_phase_advance();
    }

    pub(super) fn handle_phase_advance(&mut self, gen: u64) {
        if gen != self.phase_gen {
            return;
        }
        let Some(phase) = self.game.as_ref().map(|g| g.phase) else {
            return;
        };
        match phase {
            Phase::Dealing => self.begin_turns(),
            Phase::FinalReveal => self.reveal_tick(),
            Phase::RoundEnd => self.begin_next_round(),
            // Auto-reveal on behalf of an absent dealer.
            Phase::AwaitingReveal => self.enter_final_reveal(),
            _ => {}
        }
    }

    fn emit_phase(&mut self) {
        let Some(g) = self.game.as_ref() else { return };
        let event = Event::Phase {
            phase: g.phase,
            dealer_seat: g.dealer_seat,
            turn_seat: g.turn_seat,
            deadline_ts: g.deadline_ts,
            alive_seats: g.alive_seats.clone(),
        };
        self.broadcast(&event);
    }

    /// A seat can act when its member is present and still in the round.
    fn seat_can_act(&self, seat: u8) -> bool {
        self.find_by_seat(seat)
            .map(|pc| pc.player.connected && pc.player.alive)
            .unwrap_or(false)
    }
}
