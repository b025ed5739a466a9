//! The notification dispatcher.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{ChangeConsumer, DispatcherConfig, Notification, OperationMode};
use crate::detect::{ChangeDetector, DetailedChangeDetector, PotentialChangeDetector};
use crate::model::{Attribute, ChangeSet, EntityRef, ModifiedObjects};
use crate::schema::DependencyKeyStore;
use crate::store::ObjectStore;

enum Detector {
    Detailed(DetailedChangeDetector),
    Potential(PotentialChangeDetector),
}

impl Detector {
    fn for_mode(mode: OperationMode, key_store: &Arc<DependencyKeyStore>) -> Self {
        match mode {
            OperationMode::Normal => {
                Detector::Detailed(DetailedChangeDetector::new(Arc::clone(key_store)))
            }
            OperationMode::Economical => Detector::Potential(PotentialChangeDetector::new()),
        }
    }

    fn detect_changes<S: ObjectStore + ?Sized>(&mut self, batch: &ModifiedObjects, store: &S) {
        match self {
            Detector::Detailed(d) => d.detect_changes(batch, store),
            Detector::Potential(d) => d.detect_changes(batch, store),
        }
    }

    fn add(&mut self, changes: ChangeSet, object: EntityRef) {
        match self {
            Detector::Detailed(d) => d.add(changes, object),
            Detector::Potential(d) => d.add(changes, object),
        }
    }

    fn reset(&mut self) {
        match self {
            Detector::Detailed(d) => d.reset(),
            Detector::Potential(d) => d.reset(),
        }
    }

    /// Drain the pending changes. Snapshots survive.
    fn drain(&mut self) -> Notification {
        match self {
            Detector::Detailed(d) => Notification::from_record(d.take_changes()),
            Detector::Potential(d) => Notification::from_potential(d.consume()),
        }
    }
}

struct DispatcherState {
    config: DispatcherConfig,
    detector: Detector,
}

/// Session object tying a store to its change consumers.
///
/// All methods take `&self`; the dispatcher can be shared behind an `Arc`.
pub struct NotificationDispatcher {
    key_store: Arc<DependencyKeyStore>,
    state: Mutex<DispatcherState>,
    consumers: RwLock<Vec<Weak<dyn ChangeConsumer>>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher with the default configuration.
    pub fn new(key_store: Arc<DependencyKeyStore>) -> Self {
        Self::with_config(key_store, DispatcherConfig::default())
    }

    /// Create a dispatcher with `config`.
    pub fn with_config(key_store: Arc<DependencyKeyStore>, config: DispatcherConfig) -> Self {
        let detector = Detector::for_mode(config.operation_mode, &key_store);
        Self {
            key_store,
            state: Mutex::new(DispatcherState { config, detector }),
            consumers: RwLock::new(Vec::new()),
        }
    }

    /// The shared dependency table.
    pub fn key_store(&self) -> &Arc<DependencyKeyStore> {
        &self.key_store
    }

    /// Current configuration.
    pub fn config(&self) -> DispatcherConfig {
        self.state.lock().config
    }

    /// Current operation mode.
    pub fn operation_mode(&self) -> OperationMode {
        self.state.lock().config.operation_mode
    }

    /// Whether changes are being collected.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().config.enabled
    }

    /// Register a consumer. The dispatcher only keeps a weak reference.
    pub fn register<C: ChangeConsumer + 'static>(&self, consumer: &Arc<C>) {
        let weak: Weak<C> = Arc::downgrade(consumer);
        let weak: Weak<dyn ChangeConsumer> = weak;
        self.consumers.write().push(weak);
    }

    /// Number of consumers still alive.
    pub fn consumer_count(&self) -> usize {
        self.consumers
            .read()
            .iter()
            .filter(|c| c.strong_count() > 0)
            .count()
    }

    /// Process one tick of the store.
    pub fn objects_did_change<S: ObjectStore + ?Sized>(&self, batch: &ModifiedObjects, store: &S) {
        let mut state = self.state.lock();
        if !state.config.enabled {
            return;
        }
        state.detector.detect_changes(batch, store);
    }

    /// Process objects whose data was reloaded from another context, then
    /// fire.
    pub fn did_merge_changes<S, I>(&self, objects: I, store: &S)
    where
        S: ObjectStore + ?Sized,
        I: IntoIterator<Item = EntityRef>,
    {
        {
            let mut state = self.state.lock();
            if !state.config.enabled {
                return;
            }
            let batch = ModifiedObjects::new().with_refreshed(objects);
            state.detector.detect_changes(&batch, store);
        }
        self.fire();
    }

    /// Record changes to state that lives outside the store. They are
    /// delivered with the next [`fire`](Self::fire).
    pub fn notify_non_store_change<I, K>(&self, object: EntityRef, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Attribute>,
    {
        let mut state = self.state.lock();
        if !state.config.enabled {
            return;
        }
        state.detector.add(ChangeSet::from_keys(keys), object);
    }

    /// Deliver all pending changes to the live consumers.
    ///
    /// Returns the number of changed objects delivered.
    pub fn fire(&self) -> usize {
        let notification = {
            let mut state = self.state.lock();
            if !state.config.enabled {
                return 0;
            }
            state.detector.drain()
        };
        self.deliver(notification)
    }

    /// Switch accumulator strategy.
    ///
    /// Leaving economical mode fires what was collected so far. Entering it
    /// drops all snapshots; pending detailed changes are kept as plain
    /// updates.
    pub fn set_operation_mode(&self, mode: OperationMode) {
        let pending = {
            let mut state = self.state.lock();
            let previous = state.config.operation_mode;
            if previous == mode {
                return;
            }
            debug!(from = ?previous, to = ?mode, "Switching operation mode");
            state.config.operation_mode = mode;

            match mode {
                OperationMode::Normal => {
                    let pending = state.detector.drain();
                    state.detector = Detector::for_mode(mode, &self.key_store);
                    Some(pending).filter(|_| state.config.enabled)
                }
                OperationMode::Economical => {
                    let mut potential = PotentialChangeDetector::new();
                    if let Detector::Detailed(detailed) = &mut state.detector {
                        for (object, changes) in detailed.take_changes() {
                            potential.add(changes, object);
                        }
                    }
                    state.detector = Detector::Potential(potential);
                    None
                }
            }
        };

        if let Some(notification) = pending {
            self.deliver(notification);
        }
    }

    /// Enable or disable the dispatcher.
    ///
    /// Disabling drops pending changes and snapshots and tells consumers to
    /// stop observing. Re-enabling tells them to start again.
    pub fn set_enabled(&self, enabled: bool) {
        {
            let mut state = self.state.lock();
            if state.config.enabled == enabled {
                return;
            }
            state.config.enabled = enabled;
            if !enabled {
                state.detector.reset();
            }
        }

        debug!(enabled, "Dispatcher toggled");
        for consumer in self.live_consumers() {
            if enabled {
                consumer.start_observing();
            } else {
                consumer.stop_observing();
            }
        }
    }

    fn deliver(&self, notification: Notification) -> usize {
        let count = notification.len();
        if count == 0 {
            return 0;
        }

        let consumers = self.live_consumers();
        debug!(
            objects = count,
            kinds = notification.kinds().len(),
            consumers = consumers.len(),
            "Firing notifications"
        );
        for consumer in consumers {
            consumer.objects_did_change(&notification);
        }
        count
    }

    /// Upgrade the registered consumers, pruning dropped ones.
    fn live_consumers(&self) -> Vec<Arc<dyn ChangeConsumer>> {
        let mut consumers = self.consumers.write();
        consumers.retain(|c| c.strong_count() > 0);
        consumers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("config", &self.config())
            .field("consumers", &self.consumer_count())
            .finish()
    }
}
