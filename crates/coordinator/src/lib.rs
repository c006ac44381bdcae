/// CflLive — Update Coordinator
///
/// Obecný plánovač refresh cyklů:
///   - první refresh okamžitě (hodnota existuje dřív než se kdokoliv přihlásí)
///   - pak opakovaný timer, interval se přepočítává z každého úspěšného payloadu
///   - každý cyklus ohraničený timeoutem
///   - publikace přes watch kanál JEN při úspěchu — poslední dobrá hodnota
///     zůstává odběratelům k dispozici i přes neúspěšné cykly

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

#[async_trait]
pub trait Refresher: Send + Sync + 'static {
    type Data: Clone + Send + Sync + 'static;

    /// Jeden refresh cyklus (fetch + normalizace). Err = cyklus selhal,
    /// nic se nepublikuje.
    async fn refresh(&self) -> Result<Self::Data>;

    /// Interval do dalšího cyklu, odvozený z čerstvého payloadu.
    fn next_interval(&self, data: &Self::Data) -> Duration;
}

pub struct UpdateCoordinator<R: Refresher> {
    name:             String,
    refresher:        R,
    default_interval: Duration,
    cycle_timeout:    Duration,
    tx:               watch::Sender<Option<R::Data>>,
}

impl<R: Refresher> UpdateCoordinator<R> {
    pub fn new(
        name: impl Into<String>,
        refresher: R,
        default_interval: Duration,
        cycle_timeout: Duration,
    ) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            name: name.into(),
            refresher,
            default_interval,
            cycle_timeout,
            tx,
        }
    }

    /// Odběr publikovaných hodnot. `None` dokud neproběhl první úspěšný refresh.
    pub fn subscribe(&self) -> watch::Receiver<Option<R::Data>> {
        self.tx.subscribe()
    }

    /// Hlavní smyčka. Shutdown signál zruší čekající timer a ukončí task;
    /// rozpracovaný cyklus se nedokončuje po návratu.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // interval zůstává na poslední hodnotě i přes selhané cykly
        let mut interval = self.default_interval;

        loop {
            match timeout(self.cycle_timeout, self.refresher.refresh()).await {
                Ok(Ok(data)) => {
                    interval = self.refresher.next_interval(&data);
                    debug!("[{}] refresh ok, next in {:?}", self.name, interval);
                    let _ = self.tx.send(Some(data));
                }
                Ok(Err(e)) => {
                    warn!("[{}] refresh failed: {e:#}", self.name);
                }
                Err(_) => {
                    warn!(
                        "[{}] refresh timed out after {:?}",
                        self.name, self.cycle_timeout
                    );
                }
            }

            tokio::select! {
                _ = sleep(interval) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("[{}] coordinator stopping", self.name);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Refresher přehrávající předem daný scénář; po vyčerpání vrací Err.
    struct Scripted {
        results: Mutex<VecDeque<Result<u64>>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<u64>>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl Refresher for Scripted {
        type Data = u64;

        async fn refresh(&self) -> Result<u64> {
            let next = self.results.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        /// Payload přímo určuje interval v sekundách
        fn next_interval(&self, data: &u64) -> Duration {
            Duration::from_secs(*data)
        }
    }

    /// Refresher jehož první volání visí déle než cycle timeout.
    struct SlowThenOk {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Refresher for SlowThenOk {
        type Data = u64;

        async fn refresh(&self) -> Result<u64> {
            let call = {
                let mut guard = self.calls.lock().unwrap();
                *guard += 1;
                *guard
            };
            if call == 1 {
                sleep(Duration::from_secs(600)).await;
            }
            Ok(7)
        }

        fn next_interval(&self, _data: &u64) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn coordinator<R: Refresher>(r: R) -> UpdateCoordinator<R> {
        UpdateCoordinator::new(
            "test",
            r,
            Duration::from_secs(1),
            Duration::from_secs(120),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_refresh_is_immediate() {
        let coord = coordinator(Scripted::new(vec![Ok(600)]));
        let mut rx = coord.subscribe();
        assert!(rx.borrow().is_none());

        let (stop_tx, stop_rx) = watch::channel(false);
        let start = Instant::now();
        let handle = tokio::spawn(coord.run(stop_rx));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(600));
        // První hodnota dorazí bez čekání na timer
        assert_eq!(start.elapsed(), Duration::ZERO);

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_publishes_nothing() {
        // Ok(2) → Err → Ok(4): odběratel vidí jen 2 a 4
        let coord = coordinator(Scripted::new(vec![Ok(2), Err(anyhow!("boom")), Ok(4)]));
        let mut rx = coord.subscribe();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(coord.run(stop_rx));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(2));

        rx.changed().await.unwrap();
        // Selhání nikdy nepřepsalo poslední dobrou hodnotu
        assert_eq!(*rx.borrow(), Some(4));

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_follows_payload() {
        // První payload říká "další za 3 s"
        let coord = coordinator(Scripted::new(vec![Ok(3), Ok(600)]));
        let mut rx = coord.subscribe();

        let (stop_tx, stop_rx) = watch::channel(false);
        let start = Instant::now();
        let handle = tokio::spawn(coord.run(stop_rx));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(3));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(600));
        assert_eq!(start.elapsed(), Duration::from_secs(3));

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_cycle() {
        let coord = UpdateCoordinator::new(
            "test",
            SlowThenOk { calls: Mutex::new(0) },
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        let mut rx = coord.subscribe();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(coord.run(stop_rx));

        // První cyklus vyprší po 2 s a nic nepublikuje; druhý projde
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(7));

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_timer() {
        let coord = coordinator(Scripted::new(vec![Ok(600)]));
        let mut rx = coord.subscribe();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(coord.run(stop_rx));

        rx.changed().await.unwrap();

        // Timer má před sebou 600 s; shutdown ho musí zrušit hned
        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
