//! Online/offline state.
//!
//! The flag lives in a `watch` channel so any number of tasks can await
//! transitions.  The host platform drives it with [`Connectivity::set_online`];
//! [`Connectivity::spawn_probe`] can drive it instead by polling a URL.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx }
    }

    /// Update the flag.  Subscribers are only woken on an actual change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Poll `url` every `interval`; any HTTP response counts as online, a
    /// transport error as offline.
    pub fn spawn_probe(&self, url: String, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        let client = reqwest::Client::builder()
            .timeout(interval.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_default();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let online = match client.head(&url).send().await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(url = %url, error = %e, "connectivity probe failed");
                        false
                    }
                };
                this.set_online(online);
            }
        })
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
