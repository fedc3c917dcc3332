//! Per-connection outbound queues and room-scoped fan-out.
//!
//! Events are serialized once per message; the text is cloned into each
//! connection's bounded queue. A queue that overflows means a consumer too
//! slow to keep up; the room drops the sender, which closes the socket.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sending half of a connection's outbound queue. The room holds the only
/// instance; dropping it tells the connection task to close the socket.
#[derive(Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
}

/// Create an outbound queue with the given bound.
pub fn channel(bound: usize) -> (Outbound, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(bound);
    (Outbound { tx }, rx)
}

impl Outbound {
    /// Enqueue a text frame without blocking. Returns false when the queue
    /// is full or the connection is gone.
    pub fn push(&self, text: String) -> bool {
        self.tx.try_send(Message::Text(text)).is_ok()
    }
}

/// Push one serialized message to every listed connection. Returns the
/// players whose queues overflowed so the caller can treat them as
/// disconnected.
pub fn fanout<'a, I>(conns: I, text: &str) -> Vec<Uuid>
where
    I: Iterator<Item = (Uuid, &'a Outbound)>,
{
    let mut dead = Vec::new();
    for (player_id, out) in conns {
        if !out.push(text.to_owned()) {
            dead.push(player_id);
        }
    }
    dead
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflowed_queues_are_reported() {
        let (a, _rx_a) = channel(1);
        let (b, _rx_b) = channel(1);
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();

        assert!(fanout([(one, &a), (two, &b)].into_iter(), "first").is_empty());
        // Both queues are now full.
        let dead = fanout([(one, &a), (two, &b)].into_iter(), "second");
        assert_eq!(dead, vec![one, two]);
    }

    #[test]
    fn push_fails_after_receiver_drops() {
        let (out, rx) = channel(4);
        drop(rx);
        assert!(!out.push("hello".into()));
    }
}
