//! Application state shared across routes

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::game::EngineHandle;

/// Connection bookkeeping for one open socket
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn connected_secs(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: EngineHandle,
    /// Open sockets, keyed by session id
    pub sessions: Arc<DashMap<Uuid, SessionInfo>>,
}

impl AppState {
    pub fn new(config: Config, engine: EngineHandle) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn open_session(&self, session: Uuid, addr: SocketAddr) {
        self.sessions.insert(
            session,
            SessionInfo {
                addr,
                connected_at: Utc::now(),
            },
        );
    }

    pub fn close_session(&self, session: &Uuid) -> Option<SessionInfo> {
        self.sessions.remove(session).map(|(_, info)| info)
    }
}
