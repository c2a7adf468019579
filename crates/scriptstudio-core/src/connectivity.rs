//! Network reachability signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Coarse online/offline flag read at the start of every remote attempt.
///
/// `true` only means the network looks reachable; each remote call still
/// has its own failure path.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Publish a new reachability value. Returns whether it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn set_online_reports_changes_only() {
        let signal = ConnectivitySignal::offline();
        assert!(!signal.is_online());
        assert!(signal.set_online(true));
        assert!(!signal.set_online(true));
        assert!(signal.is_online());
    }

    #[test]
    fn clones_share_state() {
        let signal = ConnectivitySignal::online();
        let clone = signal.clone();
        clone.set_online(false);
        assert!(!signal.is_online());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribers_see_transitions() {
        let signal = ConnectivitySignal::offline();
        let mut rx = signal.subscribe();

        let publisher = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.set_online(true);
        });

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(*rx.borrow());
    }
}
