//! Process-wide registry: roomId → room, joinCode → roomId, token → binding.
//!
//! These three maps are the only mutable state shared across rooms. Room
//! internals are owned by their actors; the registry only holds handles.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::Config;
use crate::protocol::ErrorCode;
use crate::room::{spawn_room, AddOutcome, RoomCmd, RoomHandle};
use crate::util::id::{new_join_code, new_token, now_ms};

/// What a bearer token resolves to.
#[derive(Debug, Clone, Copy)]
pub struct TokenEntry {
    pub room_id: Uuid,
    pub player_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub room_id: Uuid,
    pub join_code: String,
    pub token: String,
    pub player_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub room_id: Uuid,
    pub token: String,
    pub is_reconnect: bool,
}

pub struct Registry {
    cfg: Arc<Config>,
    rooms: DashMap<Uuid, RoomHandle>,
    codes: DashMap<String, Uuid>,
    tokens: DashMap<String, TokenEntry>,
}

impl Registry {
    pub fn new(cfg: Arc<Config>) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            rooms: DashMap::new(),
            codes: DashMap::new(),
            tokens: DashMap::new(),
        })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.cfg
    }

    /// Create a room with the caller as host and return their credentials.
    pub async fn create_room(
        self: &Arc<Self>,
        host_name: String,
        avatar_id: u8,
        session_id: String,
    ) -> Result<CreatedRoom, ErrorCode> {
        let room_id = Uuid::new_v4();
        // Collisions are negligible at this alphabet size but the check is
        // mandatory; the entry reserves the code atomically.
        let join_code = loop {
            let code = new_join_code();
            if let Entry::Vacant(slot) = self.codes.entry(code.clone()) {
                slot.insert(room_id);
                break code;
            }
        };

        let handle = spawn_room(self.cfg.clone(), self.clone(), room_id, join_code.clone());
        self.rooms.insert(room_id, handle.clone());

        let token = new_token();
        match self
            .add_player(&handle, host_name, avatar_id, session_id, token.clone())
            .await?
        {
            AddOutcome::Added { player_id, .. } => {
                self.tokens
                    .insert(token.clone(), TokenEntry { room_id, player_id });
                tracing::info!(%room_id, join_code, "room created");
                Ok(CreatedRoom {
                    room_id,
                    join_code,
                    token,
                    player_id,
                })
            }
            // A brand-new room cannot hold the session already.
            AddOutcome::Reconnected { .. } => Err(ErrorCode::InvalidRequest),
        }
    }

    /// Join by code, with the session-based reconnect rule: a disconnected
    /// player with the same session gets their existing token back.
    pub async fn join_room(
        &self,
        join_code: &str,
        name: String,
        avatar_id: u8,
        session_id: String,
    ) -> Result<JoinedRoom, ErrorCode> {
        let room_id = *self
            .codes
            .get(join_code)
            .ok_or(ErrorCode::RoomNotFound)?
            .value();
        let handle = self
            .rooms
            .get(&room_id)
            .map(|h| h.clone())
            .ok_or(ErrorCode::RoomNotFound)?;

        let token = new_token();
        match self
            .add_player(&handle, name, avatar_id, session_id, token.clone())
            .await?
        {
            AddOutcome::Added { player_id, .. } => {
                self.tokens
                    .insert(token.clone(), TokenEntry { room_id, player_id });
                Ok(JoinedRoom {
                    room_id,
                    token,
                    is_reconnect: false,
                })
            }
            AddOutcome::Reconnected { token: existing, .. } => Ok(JoinedRoom {
                room_id,
                token: existing,
                is_reconnect: true,
            }),
        }
    }

    async fn add_player(
        &self,
        handle: &RoomHandle,
        name: String,
        avatar_id: u8,
        session_id: String,
        token: String,
    ) -> Result<AddOutcome, ErrorCode> {
        let (respond, rx) = oneshot::channel();
        handle
            .cmd
            .send(RoomCmd::AddPlayer {
                name,
                avatar_id,
                session_id,
                token,
                respond,
            })
            .map_err(|_| ErrorCode::RoomNotFound)?;
        rx.await.map_err(|_| ErrorCode::RoomNotFound)?
    }

    pub fn resolve_token(&self, token: &str) -> Option<(TokenEntry, RoomHandle)> {
        let entry = *self.tokens.get(token)?.value();
        let handle = self.rooms.get(&entry.room_id)?.clone();
        Some((entry, handle))
    }

    pub fn lookup_room(&self, room_id: Uuid) -> Option<RoomHandle> {
        self.rooms.get(&room_id).map(|h| h.clone())
    }

    pub fn lookup_code(&self, join_code: &str) -> Option<Uuid> {
        self.codes.get(join_code).map(|id| *id.value())
    }

    /// Invalidate one bearer token (player left or was removed).
    pub fn drop_token(&self, token: &str) {
        self.tokens.remove(token);
    }

    /// Forget a room and everything pointing at it.
    pub fn deregister(&self, room_id: Uuid) {
        if let Some((_, handle)) = self.rooms.remove(&room_id) {
            self.codes.remove(&handle.join_code);
        }
        self.tokens.retain(|_, entry| entry.room_id != room_id);
    }

    /// Periodic sweep: drop dead actors, shut down rooms that have had no
    /// connected socket for the idle window.
    pub fn reap(&self) {
        let now = now_ms();
        let idle_ms = self.cfg.idle_room_timeout.as_millis() as i64;
        let stale: Vec<Uuid> = self
            .rooms
            .iter()
            .filter_map(|entry| {
                let h = entry.value();
                if h.cmd.is_closed() {
                    return Some(*entry.key());
                }
                let connected = h.connected.load(Ordering::Relaxed);
                let idle = now - h.last_active_ms.load(Ordering::Relaxed) > idle_ms;
                (connected == 0 && idle).then(|| *entry.key())
            })
            .collect();
        for room_id in stale {
            if let Some(handle) = self.rooms.get(&room_id).map(|h| h.clone()) {
                let _ = handle.cmd.send(RoomCmd::Shutdown);
            }
            self.deregister(room_id);
            tracing::info!(%room_id, "reaped idle room");
        }
    }

    #[cfg(test)]
    pub fn live_rooms(&self) -> usize {
        self.rooms.len()
    }
}

/// Background reap loop; one per process.
pub fn spawn_reaper(registry: Arc<Registry>) {
    tokio::spawn(async move {
        let period = registry.cfg.reap_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            registry.reap();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> Arc<Registry> {
        Registry::new(Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn create_and_join_issue_distinct_tokens() {
        let reg = test_registry();
        let created = reg
            .create_room("Ana".into(), 0, "sess-a".into())
            .await
            .unwrap();
        assert_eq!(created.join_code.len(), 6);

        let joined = reg
            .join_room(&created.join_code, "Ben".into(), 1, "sess-b".into())
            .await
            .unwrap();
        assert_eq!(joined.room_id, created.room_id);
        assert!(!joined.is_reconnect);
        assert_ne!(joined.token, created.token);
    }

    #[tokio::test]
    async fn join_unknown_code_fails() {
        let reg = test_registry();
        let err = reg
            .join_room("ZZZZZZ", "Ben".into(), 0, "sess".into())
            .await
            .unwrap_err();
        assert_eq!(err, ErrorCode::RoomNotFound);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_case_insensitively() {
        let reg = test_registry();
        let created = reg
            .create_room("Ana".into(), 0, "sess-a".into())
            .await
            .unwrap();
        let err = reg
            .join_room(&created.join_code, "ANA".into(), 0, "sess-b".into())
            .await
            .unwrap_err();
        assert_eq!(err, ErrorCode::NameTaken);
    }

    #[tokio::test]
    async fn room_fills_at_capacity() {
        let reg = test_registry();
        let created = reg
            .create_room("Host".into(), 0, "sess-0".into())
            .await
            .unwrap();
        for i in 1..reg.cfg.max_players {
            reg.join_room(
                &created.join_code,
                format!("P{i}"),
                0,
                format!("sess-{i}"),
            )
            .await
            .unwrap();
        }
        let err = reg
            .join_room(&created.join_code, "Extra".into(), 0, "sess-x".into())
            .await
            .unwrap_err();
        assert_eq!(err, ErrorCode::RoomFull);
    }

    #[tokio::test]
    async fn same_session_join_while_never_connected_reuses_player() {
        // The session holder never opened a socket, so they count as
        // disconnected and the join is a reconnect with the original token.
        let reg = test_registry();
        let created = reg
            .create_room("Ana".into(), 0, "sess-a".into())
            .await
            .unwrap();
        let rejoin = reg
            .join_room(&created.join_code, "Ana".into(), 0, "sess-a".into())
            .await
            .unwrap();
        assert!(rejoin.is_reconnect);
        assert_eq!(rejoin.token, created.token);
    }

    #[tokio::test]
    async fn tokens_resolve_until_room_deregisters() {
        let reg = test_registry();
        let created = reg
            .create_room("Ana".into(), 0, "sess-a".into())
            .await
            .unwrap();
        assert!(reg.resolve_token(&created.token).is_some());

        reg.deregister(created.room_id);
        assert!(reg.resolve_token(&created.token).is_none());
        assert!(reg.lookup_code(&created.join_code).is_none());
        assert_eq!(reg.live_rooms(), 0);
    }
}
