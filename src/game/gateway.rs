//! Engine side of the connection gateway: per-session outbound queues
//!
//! Sends never wait. Each session has a bounded queue drained by its socket
//! writer task; a session whose queue stays full for too many consecutive
//! sends, or whose writer is gone, is reported as stalled and dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, warn};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::snapshot::SnapshotStats;

/// Serialized frames queued for one session's socket writer
pub type Outbound = mpsc::Sender<Arc<str>>;

struct SessionLink {
    tx: Outbound,
    /// Consecutive sends that found the queue full
    missed: u32,
    closed: bool,
}

pub struct Gateway {
    sessions: HashMap<Uuid, SessionLink>,
    max_missed: u32,
    stats: SnapshotStats,
}

impl Gateway {
    pub fn new(max_missed: u32) -> Self {
        Self {
            sessions: HashMap::new(),
            max_missed,
            stats: SnapshotStats::default(),
        }
    }

    pub fn attach(&mut self, session: Uuid, tx: Outbound) {
        self.sessions.insert(
            session,
            SessionLink {
                tx,
                missed: 0,
                closed: false,
            },
        );
    }

    /// Forget a session; dropping its sender ends the writer task
    pub fn detach(&mut self, session: &Uuid) -> bool {
        self.sessions.remove(session).is_some()
    }

    pub fn contains(&self, session: &Uuid) -> bool {
        self.sessions.contains_key(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }

    pub fn send_to(&mut self, session: &Uuid, msg: &ServerMsg) {
        let Some(payload) = encode(msg) else {
            return;
        };
        if let Some(link) = self.sessions.get_mut(session) {
            deliver(session, link, payload);
        }
    }

    pub fn broadcast(&mut self, msg: &ServerMsg) {
        self.broadcast_filtered(msg, None);
    }

    pub fn broadcast_except(&mut self, except: &Uuid, msg: &ServerMsg) {
        self.broadcast_filtered(msg, Some(except));
    }

    /// Broadcast a per-tick snapshot and record its size
    pub fn broadcast_snapshot(&mut self, msg: &ServerMsg) {
        if let Some(bytes) = self.broadcast_filtered(msg, None) {
            self.stats.record(self.sessions.len(), bytes);
        }
    }

    /// Remove and return sessions that stopped draining their queue
    pub fn take_stalled(&mut self) -> Vec<Uuid> {
        let max_missed = self.max_missed;
        let stalled: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|(_, link)| link.closed || link.missed > max_missed)
            .map(|(id, _)| *id)
            .collect();
        for id in &stalled {
            self.sessions.remove(id);
        }
        stalled
    }

    fn broadcast_filtered(&mut self, msg: &ServerMsg, except: Option<&Uuid>) -> Option<usize> {
        let payload = encode(msg)?;
        let bytes = payload.len();
        for (id, link) in self.sessions.iter_mut() {
            if Some(id) == except {
                continue;
            }
            deliver(id, link, payload.clone());
        }
        Some(bytes)
    }
}

fn encode(msg: &ServerMsg) -> Option<Arc<str>> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(error = %e, "Failed to encode server message");
            None
        }
    }
}

fn deliver(session: &Uuid, link: &mut SessionLink, payload: Arc<str>) {
    match link.tx.try_send(payload) {
        Ok(()) => link.missed = 0,
        Err(TrySendError::Full(_)) => {
            link.missed += 1;
            if link.missed == 1 {
                warn!(session_id = %session, "Outbound queue full, skipping message");
            }
        }
        Err(TrySendError::Closed(_)) => link.closed = true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg() -> ServerMsg {
        ServerMsg::PlayerDisconnected(Uuid::nil())
    }

    #[test]
    fn broadcast_except_skips_sender() {
        let mut gateway = Gateway::new(5);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        gateway.attach(a, tx_a);
        gateway.attach(b, tx_b);

        gateway.broadcast_except(&a, &msg());

        assert!(rx_a.try_recv().is_err());
        let frame = rx_b.try_recv().unwrap();
        assert!(frame.contains("playerDisconnected"));
    }

    #[test]
    fn slow_session_is_dropped_after_threshold() {
        let mut gateway = Gateway::new(2);
        let slow = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        gateway.attach(slow, tx);

        for _ in 0..3 {
            gateway.broadcast(&msg());
            assert!(gateway.take_stalled().is_empty());
        }
        gateway.broadcast(&msg());

        assert_eq!(gateway.take_stalled(), vec![slow]);
        assert!(!gateway.contains(&slow));
    }

    #[test]
    fn draining_resets_missed_count() {
        let mut gateway = Gateway::new(1);
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        gateway.attach(id, tx);

        for _ in 0..10 {
            gateway.broadcast(&msg());
            gateway.broadcast(&msg());
            assert!(rx.try_recv().is_ok());
        }
        assert!(gateway.take_stalled().is_empty());
    }

    #[test]
    fn closed_session_is_stalled() {
        let mut gateway = Gateway::new(10);
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        gateway.attach(id, tx);
        drop(rx);

        gateway.send_to(&id, &msg());
        assert_eq!(gateway.take_stalled(), vec![id]);
    }
}
