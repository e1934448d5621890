//! livefeed store: the batched update reducer, the list store that owns a page's
//! view state, and the live feed task wiring a transport subscription into it.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use livefeed_core::{Action, LedgerMessage, PageMeta, PageVariant, ViewState, BATCH_THRESHOLD};
use livefeed_transport::{decode_payload, ChannelEvent, Subscription};
use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

mod batcher;
mod reducer;

pub use batcher::Batcher;
pub use reducer::BatchedReducer;

pub type Listener = Box<dyn FnMut(&ViewState, &ViewState) + Send>;

/// Owns one page's view state. Every change goes through `dispatch` or `load_page`,
/// and listeners see each transition as `(state, previous)`.
pub struct ListStore {
    reducer: BatchedReducer,
    identifier_path: String,
    state: Arc<ViewState>,
    page: PageMeta,
    listeners: Vec<Listener>,
    epoch: u64,
}

impl ListStore {
    pub fn new(reducer: BatchedReducer, initial: ViewState, identifier_path: impl Into<String>) -> Self {
        let page = initial.page_meta();
        Self {
            reducer,
            identifier_path: identifier_path.into(),
            state: Arc::new(initial),
            page,
            listeners: Vec::new(),
            epoch: 0,
        }
    }

    pub fn for_variant(variant: PageVariant) -> Self {
        let reducer = BatchedReducer::for_variant(variant);
        Self::new(reducer, reducer.initial_state(), variant.identifier_path())
    }

    pub fn reducer(&self) -> &BatchedReducer { &self.reducer }
    pub fn identifier_path(&self) -> &str { &self.identifier_path }
    pub fn state(&self) -> Arc<ViewState> { Arc::clone(&self.state) }
    /// Number of transitions that changed the state.
    pub fn epoch(&self) -> u64 { self.epoch }

    pub fn subscribe(&mut self, listener: Listener) { self.listeners.push(listener); }

    /// Merge page metadata into the state, run the reducer, and notify listeners.
    pub fn dispatch(&mut self, action: Action) -> Arc<ViewState> {
        let merged = (*self.state).clone().with_page(&self.page);
        let next = self.reducer.reduce(&merged, &action);
        self.page.items = next.items.clone();

        if let Some((_, msgs)) = action.batch() {
            counter!("livefeed_batches_total", 1);
            counter!("livefeed_messages_total", msgs.len() as u64);
            let deferred = next.pending_batch.len().saturating_sub(merged.pending_batch.len());
            if deferred > 0 {
                counter!("livefeed_deferred_total", deferred as u64);
            }
            debug!(
                action = action.tag(),
                msgs = msgs.len(),
                items = next.items.len(),
                pending = next.pending_batch.len(),
                "store: batch reduced"
            );
        } else if matches!(action, Action::ChannelDisconnected) && next.channel_disconnected && !merged.channel_disconnected {
            counter!("livefeed_disconnects_total", 1);
            info!(pending_dropped = merged.pending_batch.len(), "store: channel disconnected");
        } else {
            debug!(action = action.tag(), "store: action reduced");
        }
        self.commit(next)
    }

    /// Replace pagination metadata. Loading page one also releases the pending batch,
    /// since the fresh listing already contains those rows.
    pub fn load_page(&mut self, meta: PageMeta) -> Arc<ViewState> {
        self.page = meta;
        let mut next = (*self.state).clone().with_page(&self.page);
        if !self.page.beyond_page_one {
            next.pending_batch.clear();
        }
        debug!(items = self.page.items.len(), beyond_page_one = self.page.beyond_page_one, "store: page loaded");
        self.commit(next)
    }

    fn commit(&mut self, next: ViewState) -> Arc<ViewState> {
        if next != *self.state {
            self.epoch = self.epoch.saturating_add(1);
        }
        let prev = std::mem::replace(&mut self.state, Arc::new(next));
        for l in self.listeners.iter_mut() {
            l(&self.state, &prev);
        }
        Arc::clone(&self.state)
    }
}

/// Runtime knobs for the live feed, read from `LIVEFEED_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub threshold: usize,
    pub debounce: Duration,
    pub max_wait: Duration,
    pub queue_cap: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            threshold: BATCH_THRESHOLD,
            debounce: Duration::from_millis(1000),
            max_wait: Duration::from_millis(5000),
            queue_cap: 1024,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let num = |key: &str| std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok());
        Self {
            threshold: num("LIVEFEED_BATCH_THRESHOLD").map(|v| v as usize).unwrap_or(d.threshold),
            debounce: num("LIVEFEED_DEBOUNCE_MS").map(Duration::from_millis).unwrap_or(d.debounce),
            max_wait: num("LIVEFEED_MAX_WAIT_MS").map(Duration::from_millis).unwrap_or(d.max_wait),
            queue_cap: num("LIVEFEED_QUEUE_CAP").map(|v| v as usize).unwrap_or(d.queue_cap),
        }
    }
}

/// Commands from the page lifecycle into the running feed.
#[derive(Debug, Clone)]
pub enum FeedCommand {
    Dispatch(Action),
    LoadPage(PageMeta),
}

/// Handle for readers to access the current state and subscribe to changes.
pub struct FeedHandle {
    snap: Arc<ArcSwap<ViewState>>,
    epoch_rx: watch::Receiver<u64>,
    ctl_tx: mpsc::Sender<FeedCommand>,
    task: JoinHandle<ListStore>,
}

impl FeedHandle {
    pub fn current(&self) -> Arc<ViewState> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }

    pub async fn send(&self, cmd: FeedCommand) -> bool { self.ctl_tx.send(cmd).await.is_ok() }

    /// Mark the page as being left so the disconnect banner stays hidden.
    pub async fn navigate_away(&self) -> bool { self.send(FeedCommand::Dispatch(Action::NavigatingAway)).await }

    /// Wait for the subscription to end and take the store back.
    pub async fn join(self) -> Result<ListStore, tokio::task::JoinError> {
        drop(self.ctl_tx);
        self.task.await
    }
}

/// Spawn the feed loop: group messages for the store's entity with a [`Batcher`],
/// dispatch each group as one batch action, and map channel errors to a disconnect.
pub fn spawn_feed(mut store: ListStore, mut sub: Subscription, cfg: &FeedConfig) -> FeedHandle {
    let snap = Arc::new(ArcSwap::new(store.state()));
    let (epoch_tx, epoch_rx) = watch::channel(store.epoch());
    let (ctl_tx, mut ctl_rx) = mpsc::channel::<FeedCommand>(cfg.queue_cap.max(1));
    let snap_clone = Arc::clone(&snap);
    let entity = store.reducer().config().entity;
    let mut batcher: Batcher<LedgerMessage> = Batcher::new(cfg.debounce, cfg.max_wait);

    let task = tokio::spawn(async move {
        let publish = |store: &ListStore| {
            snap_clone.store(store.state());
            let _ = epoch_tx.send(store.epoch());
        };
        let mut ctl_open = true;
        let topic = sub.topic.clone();
        info!(topic = %topic, event = entity.event_name(), "feed started");
        loop {
            let deadline = batcher.deadline();
            let tick = async move {
                match deadline {
                    Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                maybe = sub.recv() => match maybe {
                    Some(ChannelEvent::Message { event, payload }) => {
                        if event != entity.event_name() {
                            debug!(event = %event, "feed: ignoring event for another entity");
                            continue;
                        }
                        let now = Instant::now();
                        for m in decode_payload(&payload) {
                            batcher.push(m, now);
                        }
                    }
                    Some(ChannelEvent::Error { reason }) => {
                        info!(topic = %topic, reason = %reason, "feed: channel error");
                        store.dispatch(Action::ChannelDisconnected);
                        publish(&store);
                        let dropped = batcher.flush();
                        if !dropped.is_empty() {
                            debug!(dropped = dropped.len(), "feed: discarding messages buffered before disconnect");
                        }
                    }
                    None => {
                        debug!("subscription closed; draining and exiting feed loop");
                        let group = batcher.flush();
                        if !group.is_empty() {
                            store.dispatch(Action::received_batch(entity, group));
                            publish(&store);
                        }
                        break;
                    }
                },
                cmd = ctl_rx.recv(), if ctl_open => match cmd {
                    Some(FeedCommand::Dispatch(action)) => {
                        store.dispatch(action);
                        publish(&store);
                    }
                    Some(FeedCommand::LoadPage(meta)) => {
                        store.load_page(meta);
                        publish(&store);
                    }
                    None => ctl_open = false,
                },
                _ = tick => {
                    if let Some(group) = batcher.poll(Instant::now()) {
                        store.dispatch(Action::received_batch(entity, group));
                        publish(&store);
                    }
                }
            }
        }
        info!("feed loop stopped");
        store
    });

    FeedHandle { snap, epoch_rx, ctl_tx, task }
}
