use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, RwLock};

use crate::config::ServerConfig;
use crate::room_manager::RoomManager;

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub ws_per_ip: Arc<Mutex<HashMap<IpAddr, usize>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(RoomManager::new(config.rooms.max_players))),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            ws_per_ip: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Counts a live connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Holds one of an IP's connection slots.
pub struct IpConnectionGuard {
    ip: IpAddr,
    map: Arc<Mutex<HashMap<IpAddr, usize>>>,
}

impl IpConnectionGuard {
    /// Take a slot for `ip`, or `None` if it already holds `max` connections.
    pub async fn try_acquire(
        ip: IpAddr,
        map: Arc<Mutex<HashMap<IpAddr, usize>>>,
        max: usize,
    ) -> Option<Self> {
        {
            let mut counts = map.lock().await;
            let count = counts.entry(ip).or_insert(0);
            if *count >= max {
                return None;
            }
            *count += 1;
        }
        Some(Self { ip, map })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        let ip = self.ip;
        let map = Arc::clone(&self.map);
        // Drop can't await; release the slot on the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut counts = map.lock().await;
                if let Some(count) = counts.get_mut(&ip) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        counts.remove(&ip);
                    }
                }
            });
        }
    }
}
