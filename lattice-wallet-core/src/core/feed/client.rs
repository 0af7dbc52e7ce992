//! Realtime confirmation feed with reconnect and subscription replay

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::messages::{
    keepalive_command, parse_confirmation, subscribe_command, unsubscribe_command, FeedEvent,
};
use super::transport::{FeedConnection, FeedTransport};
use crate::shared::constants::{
    DEFAULT_FEED_URL, EVENT_CHANNEL_CAPACITY, FEED_KEEPALIVE_INTERVAL_MS, FEED_MAX_QUEUED_COMMANDS,
    FEED_RECONNECT_BASE_MS, FEED_RECONNECT_CEILING_MS,
};
use crate::shared::types::Address;

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub url: String,
    pub reconnect_base: Duration,
    pub reconnect_ceiling: Duration,
    pub keepalive_interval: Duration,
    /// Commands kept while disconnected; older ones are dropped
    pub max_queued: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            reconnect_base: Duration::from_millis(FEED_RECONNECT_BASE_MS),
            reconnect_ceiling: Duration::from_millis(FEED_RECONNECT_CEILING_MS),
            keepalive_interval: Duration::from_millis(FEED_KEEPALIVE_INTERVAL_MS),
            max_queued: FEED_MAX_QUEUED_COMMANDS,
        }
    }
}

/// Linear backoff: `base * attempt`, capped at `ceiling`
pub fn reconnect_delay(base: Duration, ceiling: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1)).min(ceiling)
}

#[derive(Default)]
struct FeedState {
    subscribed: BTreeSet<Address>,
    queued: VecDeque<Value>,
    outbound: Option<mpsc::UnboundedSender<Value>>,
}

pub struct RealtimeFeed {
    settings: FeedSettings,
    transport: Arc<dyn FeedTransport>,
    state: Mutex<FeedState>,
    events: broadcast::Sender<FeedEvent>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
}

impl RealtimeFeed {
    pub fn new(settings: FeedSettings, transport: Arc<dyn FeedTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            settings,
            transport,
            state: Mutex::new(FeedState::default()),
            events,
            shutdown,
            running: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().outbound.is_some()
    }

    pub fn subscribed(&self) -> Vec<Address> {
        self.state().subscribed.iter().cloned().collect()
    }

    pub fn queued_commands(&self) -> Vec<Value> {
        self.state().queued.iter().cloned().collect()
    }

    pub fn subscribe_accounts(&self, accounts: &[Address]) {
        let mut state = self.state();
        let added: Vec<Address> = accounts
            .iter()
            .filter(|a| state.subscribed.insert((*a).clone()))
            .cloned()
            .collect();
        if !added.is_empty() {
            self.dispatch(&mut state, subscribe_command(&added));
        }
    }

    pub fn unsubscribe_accounts(&self, accounts: &[Address]) {
        let mut state = self.state();
        let removed: Vec<Address> = accounts
            .iter()
            .filter(|a| state.subscribed.remove(a.as_str()))
            .cloned()
            .collect();
        if !removed.is_empty() {
            self.dispatch(&mut state, unsubscribe_command(&removed));
        }
    }

    fn dispatch(&self, state: &mut FeedState, command: Value) {
        if let Some(outbound) = &state.outbound {
            match outbound.send(command) {
                Ok(()) => return,
                Err(mpsc::error::SendError(command)) => self.enqueue(state, command),
            }
        } else {
            self.enqueue(state, command);
        }
    }

    fn enqueue(&self, state: &mut FeedState, command: Value) {
        state.queued.push_back(command);
        while state.queued.len() > self.settings.max_queued {
            if let Some(dropped) = state.queued.pop_front() {
                debug!("Feed command queue full, dropping {}", dropped);
            }
        }
    }

    /// Spawn the connection loop. Returns `None` if it is already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.shutdown.send_replace(false);
        let feed = Arc::clone(self);
        Some(tokio::spawn(async move { feed.run().await }))
    }

    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut attempt: u32 = 0;

        while !*shutdown.borrow() {
            match self.transport.connect(&self.settings.url).await {
                Ok(connection) => {
                    attempt = 0;
                    info!("Feed connected to {}", self.settings.url);
                    self.serve(connection, &mut shutdown).await;
                    let _ = self.events.send(FeedEvent::Disconnected);
                }
                Err(e) => warn!("Feed connection to {} failed: {}", self.settings.url, e),
            }

            if *shutdown.borrow() {
                break;
            }
            attempt = attempt.saturating_add(1);
            let delay = reconnect_delay(self.settings.reconnect_base, self.settings.reconnect_ceiling, attempt);
            info!("Reconnecting feed in {:?} (attempt {})", delay, attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("Feed loop stopped");
    }

    async fn serve(&self, mut connection: Box<dyn FeedConnection>, shutdown: &mut watch::Receiver<bool>) {
        let (outbound, mut commands) = mpsc::unbounded_channel();
        let replay = {
            let mut state = self.state();
            let mut replay = Vec::new();
            if !state.subscribed.is_empty() {
                let accounts: Vec<Address> = state.subscribed.iter().cloned().collect();
                replay.push(subscribe_command(&accounts));
            }
            replay.extend(state.queued.drain(..));
            state.outbound = Some(outbound);
            replay
        };

        for command in replay {
            if let Err(e) = connection.send(command).await {
                warn!("Feed replay failed: {}", e);
                self.detach(commands);
                return;
            }
        }
        let _ = self.events.send(FeedEvent::Connected);

        let mut keepalive = tokio::time::interval(self.settings.keepalive_interval);
        keepalive.tick().await;

        loop {
            tokio::select! {
                inbound = connection.next() => match inbound {
                    Some(Ok(message)) => {
                        if let Some(confirmation) = parse_confirmation(&message) {
                            let _ = self.events.send(FeedEvent::Confirmation(confirmation));
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Feed connection error: {}", e);
                        break;
                    }
                    None => {
                        info!("Feed connection closed");
                        break;
                    }
                },
                Some(command) = commands.recv() => {
                    if let Err(e) = connection.send(command).await {
                        warn!("Feed send failed: {}", e);
                        break;
                    }
                }
                _ = keepalive.tick() => {
                    if let Err(e) = connection.send(keepalive_command()).await {
                        warn!("Feed keepalive failed: {}", e);
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.detach(commands);
    }

    /// Unsent commands go back to the queue for the next connection
    fn detach(&self, mut commands: mpsc::UnboundedReceiver<Value>) {
        let mut state = self.state();
        state.outbound = None;
        while let Ok(command) = commands.try_recv() {
            self.enqueue(&mut state, command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::WalletError;
    use crate::shared::WalletResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    struct FakeConnection {
        inbound: mpsc::UnboundedReceiver<Value>,
        sent: mpsc::UnboundedSender<Value>,
    }

    #[async_trait]
    impl FeedConnection for FakeConnection {
        async fn send(&mut self, message: Value) -> WalletResult<()> {
            self.sent
                .send(message)
                .map_err(|_| WalletError::network("peer gone"))
        }

        async fn next(&mut self) -> Option<WalletResult<Value>> {
            self.inbound.recv().await.map(Ok)
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        pending: Mutex<VecDeque<FakeConnection>>,
        connects: Mutex<Vec<Instant>>,
        attempts: AtomicUsize,
    }

    /// Test side of one accepted connection
    struct Peer {
        inbound: mpsc::UnboundedSender<Value>,
        sent: mpsc::UnboundedReceiver<Value>,
    }

    impl FakeTransport {
        fn accept_next(&self) -> Peer {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            self.pending.lock().unwrap().push_back(FakeConnection { inbound: inbound_rx, sent: sent_tx });
            Peer { inbound: inbound_tx, sent: sent_rx }
        }
    }

    #[async_trait]
    impl FeedTransport for FakeTransport {
        async fn connect(&self, _url: &str) -> WalletResult<Box<dyn FeedConnection>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.connects.lock().unwrap().push(Instant::now());
            match self.pending.lock().unwrap().pop_front() {
                Some(connection) => Ok(Box::new(connection)),
                None => Err(WalletError::network("connection refused")),
            }
        }
    }

    fn feed(transport: Arc<FakeTransport>) -> Arc<RealtimeFeed> {
        Arc::new(RealtimeFeed::new(FeedSettings::default(), transport))
    }

    fn accounts(command: &Value) -> Vec<String> {
        serde_json::from_value(command["options"]["accounts"].clone()).unwrap()
    }

    #[test]
    fn test_reconnect_delay_is_linear_with_ceiling() {
        let base = Duration::from_secs(5);
        let ceiling = Duration::from_secs(60);
        assert_eq!(reconnect_delay(base, ceiling, 1), Duration::from_secs(5));
        assert_eq!(reconnect_delay(base, ceiling, 2), Duration::from_secs(10));
        assert_eq!(reconnect_delay(base, ceiling, 12), Duration::from_secs(60));
        assert_eq!(reconnect_delay(base, ceiling, 40), Duration::from_secs(60));
    }

    #[test]
    fn test_queue_keeps_three_newest_commands() {
        let feed = feed(Arc::new(FakeTransport::default()));
        for account in ["nano_a", "nano_b", "nano_c", "nano_d"] {
            feed.subscribe_accounts(&[account.to_string()]);
        }
        let queued = feed.queued_commands();
        assert_eq!(queued.len(), 3);
        assert_eq!(accounts(&queued[0]), vec!["nano_b"]);
        assert_eq!(feed.subscribed().len(), 4);
    }

    #[test]
    fn test_duplicate_subscription_sends_nothing() {
        let feed = feed(Arc::new(FakeTransport::default()));
        feed.subscribe_accounts(&["nano_a".to_string()]);
        feed.subscribe_accounts(&["nano_a".to_string()]);
        assert_eq!(feed.queued_commands().len(), 1);

        feed.unsubscribe_accounts(&["nano_a".to_string()]);
        assert!(feed.subscribed().is_empty());
        assert_eq!(feed.queued_commands()[1]["action"], "unsubscribe");
    }

    #[tokio::test]
    async fn test_connect_replays_subscriptions_then_queue() {
        let transport = Arc::new(FakeTransport::default());
        let feed = feed(transport.clone());
        feed.subscribe_accounts(&["nano_a".to_string()]);
        feed.subscribe_accounts(&["nano_b".to_string()]);

        let mut peer = transport.accept_next();
        let mut events = feed.events();
        let handle = feed.start().unwrap();
        assert!(feed.start().is_none());

        let full = peer.sent.recv().await.unwrap();
        assert_eq!(full["action"], "subscribe");
        assert_eq!(accounts(&full), vec!["nano_a", "nano_b"]);
        assert_eq!(accounts(&peer.sent.recv().await.unwrap()), vec!["nano_a"]);
        assert_eq!(accounts(&peer.sent.recv().await.unwrap()), vec!["nano_b"]);
        assert_eq!(events.recv().await.unwrap(), FeedEvent::Connected);
        assert!(feed.queued_commands().is_empty());

        // Live subscriptions go straight to the socket
        feed.subscribe_accounts(&["nano_c".to_string()]);
        assert_eq!(accounts(&peer.sent.recv().await.unwrap()), vec!["nano_c"]);

        feed.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_confirmation_is_emitted() {
        let transport = Arc::new(FakeTransport::default());
        let feed = feed(transport.clone());
        let peer = transport.accept_next();
        let mut events = feed.events();
        let handle = feed.start().unwrap();
        assert_eq!(events.recv().await.unwrap(), FeedEvent::Connected);

        peer.inbound.send(json!({"ack": "subscribe"})).unwrap();
        peer.inbound
            .send(json!({
                "topic": "confirmation",
                "message": {
                    "account": "nano_sender",
                    "amount": "10",
                    "hash": "991CF190094C00F0B68E2E5F75F6BEE95A2E0BD93CEAA4A6734DB9F19B728948",
                    "block": {"subtype": "send", "link_as_account": "nano_me"},
                },
            }))
            .unwrap();

        match events.recv().await.unwrap() {
            FeedEvent::Confirmation(confirmation) => assert_eq!(confirmation.amount, 10),
            other => panic!("unexpected event {:?}", other),
        }

        feed.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_backoff_after_close() {
        let transport = Arc::new(FakeTransport::default());
        let feed = feed(transport.clone());
        let peer = transport.accept_next();
        let mut events = feed.events();
        let handle = feed.start().unwrap();
        assert_eq!(events.recv().await.unwrap(), FeedEvent::Connected);

        let _second = transport.accept_next();
        drop(peer);
        assert_eq!(events.recv().await.unwrap(), FeedEvent::Disconnected);
        assert_eq!(events.recv().await.unwrap(), FeedEvent::Connected);

        let connects = transport.connects.lock().unwrap().clone();
        assert_eq!(connects.len(), 2);
        assert!(connects[1] - connects[0] >= Duration::from_millis(FEED_RECONNECT_BASE_MS));

        feed.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_ping() {
        let transport = Arc::new(FakeTransport::default());
        let feed = feed(transport.clone());
        let mut peer = transport.accept_next();
        let handle = feed.start().unwrap();

        let started = Instant::now();
        let ping = peer.sent.recv().await.unwrap();
        assert_eq!(ping, json!({"action": "ping"}));
        assert!(started.elapsed() >= Duration::from_millis(FEED_KEEPALIVE_INTERVAL_MS));

        feed.stop();
        handle.await.unwrap();
    }
}
