//! Shared fixtures for hub integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sockhub::{ConnectionId, HubConfig, SocketHub};

/// Loopback config with an ephemeral port and short timeouts so failure
/// paths resolve within the test deadline.
pub fn test_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.read_secs = 5;
    config.timeouts.write_secs = 2;
    config
}

pub async fn start_hub(config: HubConfig) -> (Arc<SocketHub>, SocketAddr) {
    let hub = Arc::new(SocketHub::new(config));
    let addr = hub.start().await.expect("hub should bind on loopback");
    (hub, addr)
}

/// Poll until `check` passes or the deadline expires.
pub async fn wait_for(check: impl Fn() -> bool, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Subscribes to all five event kinds and records what fired.
#[derive(Clone, Default)]
pub struct EventRecorder {
    connects: Arc<Mutex<Vec<ConnectionId>>>,
    sends: Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>>,
    receives: Arc<Mutex<Vec<(ConnectionId, Vec<u8>)>>>,
    closes: Arc<Mutex<Vec<ConnectionId>>>,
    errors: Arc<Mutex<Vec<ConnectionId>>>,
}

impl EventRecorder {
    pub fn attach(hub: &SocketHub) -> Self {
        let recorder = Self::default();

        let sink = Arc::clone(&recorder.connects);
        hub.events()
            .subscribe_connect(move |info| sink.lock().unwrap().push(info.id));

        let sink = Arc::clone(&recorder.sends);
        hub.events().subscribe_send(move |info, payload| {
            sink.lock().unwrap().push((info.id, payload.to_vec()))
        });

        let sink = Arc::clone(&recorder.receives);
        hub.events().subscribe_receive(move |info, payload| {
            sink.lock().unwrap().push((info.id, payload.to_vec()))
        });

        let sink = Arc::clone(&recorder.closes);
        hub.events()
            .subscribe_close(move |info| sink.lock().unwrap().push(info.id));

        let sink = Arc::clone(&recorder.errors);
        hub.events()
            .subscribe_error(move |info, _err| sink.lock().unwrap().push(info.id));

        recorder
    }

    pub fn connects(&self) -> Vec<ConnectionId> {
        self.connects.lock().unwrap().clone()
    }

    pub fn receives(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.receives.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<ConnectionId> {
        self.closes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ConnectionId> {
        self.errors.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn receive_count(&self) -> usize {
        self.receives.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.lock().unwrap().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn first_connect(&self) -> Option<ConnectionId> {
        self.connects.lock().unwrap().first().copied()
    }
}
