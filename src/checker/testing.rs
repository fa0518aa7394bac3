// src/checker/testing.rs
// =============================================================================
// Test helpers: a ResourceLoader that never touches the network.
//
// SpyLoader
// - records every fetch it is asked for (the "fetch-count spy")
// - answers with scripted outcomes (unknown sources count as broken)
// - can hold a fetch until the test releases its gate, to force the order
//   in which probes confirm
// =============================================================================

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::loader::ResourceLoader;

#[derive(Clone, Default)]
pub struct SpyLoader {
    state: Arc<SpyState>,
}

#[derive(Default)]
struct SpyState {
    outcomes: Mutex<HashMap<String, bool>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fetches: Mutex<Vec<String>>,
}

impl SpyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(&self, source: &str) {
        self.state.outcomes.lock().unwrap().insert(source.to_string(), true);
    }

    pub fn fail(&self, source: &str) {
        self.state.outcomes.lock().unwrap().insert(source.to_string(), false);
    }

    /// Fetches of `source` wait until the returned gate is notified
    pub fn gate(&self, source: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .gates
            .lock()
            .unwrap()
            .insert(source.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetches.lock().unwrap().len()
    }

    pub fn fetches_of(&self, source: &str) -> usize {
        self.state
            .fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|fetched| fetched.as_str() == source)
            .count()
    }
}

impl ResourceLoader for SpyLoader {
    fn load(&self, source: &str) -> BoxFuture<'static, bool> {
        let state = Arc::clone(&self.state);
        let source = source.to_string();
        state.fetches.lock().unwrap().push(source.clone());

        async move {
            let gate = state.gates.lock().unwrap().get(&source).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            state
                .outcomes
                .lock()
                .unwrap()
                .get(&source)
                .copied()
                .unwrap_or(false)
        }
        .boxed()
    }
}
