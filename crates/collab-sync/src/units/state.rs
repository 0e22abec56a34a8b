//! Published unit state: `{data, loading, error}` snapshots.

use std::sync::Mutex;

use collab_core::error::AppError;

use crate::observer::{Publisher, Subscription};

/// Snapshot published to UI consumers.
#[derive(Debug, Clone)]
pub struct UnitState<T> {
    /// The unit's current data view.
    pub data: T,
    /// Whether a refresh or mutation is in flight.
    pub loading: bool,
    /// Last mutation/refresh failure, cleared by the next success.
    pub error: Option<AppError>,
}

/// Owner of one unit's state, with synchronous republication.
pub struct StateCell<T> {
    state: Mutex<UnitState<T>>,
    publisher: Publisher<UnitState<T>>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    /// Create a cell with initial data, not loading, no error.
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(UnitState {
                data,
                loading: false,
                error: None,
            }),
            publisher: Publisher::new(),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> UnitState<T> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Observe every state change. Delivery is synchronous with the
    /// mutation, after the lock is released.
    pub fn subscribe(&self, cb: impl Fn(&UnitState<T>) + Send + Sync + 'static) -> Subscription {
        self.publisher.subscribe(cb)
    }

    /// Mutate the state and republish the result.
    pub fn update(&self, f: impl FnOnce(&mut UnitState<T>)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut state);
            state.clone()
        };
        self.publisher.emit(&snapshot);
    }
}
