//! Fake backends for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use lumen_core::connectors::ConnectorRegistry;
use lumen_core::logging::EventLog;
use lumen_core::providers::{Endpoints, ProviderId};
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral loopback port and returns its base URL.
#[allow(dead_code)]
pub async fn spawn_fake(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    // Brief delay to ensure the server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    base_url(addr)
}

/// A loopback URL nothing listens on.
#[allow(dead_code)]
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    base_url(addr)
}

fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

/// Registry whose `provider` points at `url`; everything else keeps defaults.
#[allow(dead_code)]
pub fn registry_for(provider: ProviderId, url: &str) -> (ConnectorRegistry, Arc<EventLog>) {
    let events = Arc::new(EventLog::new());
    let endpoints = Endpoints::defaults().with(provider, url);
    let registry = ConnectorRegistry::new(endpoints, events.clone()).unwrap();
    (registry, events)
}

/// Collects whatever a fake handler wants to inspect later.
#[derive(Clone, Default)]
pub struct Captured<T>(Arc<Mutex<Vec<T>>>);

#[allow(dead_code)]
impl<T: Clone> Captured<T> {
    pub fn push(&self, value: T) {
        self.0.lock().unwrap().push(value);
    }

    pub fn all(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> T {
        self.0.lock().unwrap().last().cloned().unwrap()
    }
}
