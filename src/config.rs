//! Configuration (bind address, game tunables, env vars)

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// All deployment knobs in one place. Defaults are the normative values;
/// the interesting ones can be overridden through `MOUSETRAP_*` env vars
/// (`PORT` is honored for the bind port, as on Fly.io).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub min_players: usize,
    pub max_players: usize,
    /// Default `turnTimerSeconds` for new rooms.
    pub turn_timer_secs: u64,
    /// Turn deadline when the turn owner is disconnected.
    pub disconnected_turn_timeout: Duration,
    /// Grace window for a disconnected player's token to rebind.
    pub reconnect_timeout: Duration,
    /// Visual hold in DEALING before the first turn.
    pub dealing_hold: Duration,
    /// Pacing between final reveals, and the buffer after the last one.
    pub per_reveal: Duration,
    /// Hold on ROUND_END before the next round's dealer setup.
    pub round_end_hold: Duration,
    pub default_cheese_count: u8,
    pub max_cheese_count: u8,
    pub heartbeat_interval: Duration,
    pub reap_interval: Duration,
    /// Rooms with zero connected sockets for this long are reaped.
    pub idle_room_timeout: Duration,
    /// Outbound per-connection queue bound; overflow closes the socket.
    pub outbound_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            min_players: 3,
            max_players: 8,
            turn_timer_secs: 30,
            disconnected_turn_timeout: Duration::from_secs(5),
            reconnect_timeout: Duration::from_secs(60),
            dealing_hold: Duration::from_millis(1200),
            per_reveal: Duration::from_millis(1500),
            round_end_hold: Duration::from_millis(3000),
            default_cheese_count: 2,
            max_cheese_count: 3,
            heartbeat_interval: Duration::from_secs(30),
            reap_interval: Duration::from_secs(60),
            idle_room_timeout: Duration::from_secs(600),
            outbound_queue: 256,
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(port) = parse_var("PORT") {
            cfg.port = port;
        }
        if let Some(n) = parse_var("MOUSETRAP_MAX_PLAYERS") {
            // Seat allocation tolerates large tables; stay within the
            // supported deployment range.
            cfg.max_players = usize::clamp(n, 3, 60);
        }
        if let Some(n) = parse_var("MOUSETRAP_TURN_TIMER_SECS") {
            cfg.turn_timer_secs = n;
        }
        if let Some(secs) = parse_var("MOUSETRAP_RECONNECT_TIMEOUT_SECS") {
            cfg.reconnect_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var("MOUSETRAP_PER_REVEAL_MS") {
            cfg.per_reveal = Duration::from_millis(ms);
        }
        cfg
    }

    /// Socket address to bind the server to (0.0.0.0, `PORT` or 8080).
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
