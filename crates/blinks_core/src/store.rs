use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::filter::BlinkFilter;
use crate::types::Blink;

struct StoreInner {
    blinks: Vec<Blink>,
    generation: u64,
}

struct Memo {
    filter: BlinkFilter,
    generation: u64,
    view: Arc<Vec<Blink>>,
}

/// Shared list of blinks, handed to every consumer that needs it.
///
/// Cloning gives another handle onto the same list. Filtered views are
/// memoized per filter until the next mutation.
#[derive(Clone)]
pub struct BlinkStore {
    inner: Arc<RwLock<StoreInner>>,
    memo: Arc<Mutex<Option<Memo>>>,
}

impl Default for BlinkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlinkStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner { blinks: Vec::new(), generation: 0 })),
            memo: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn replace_all(&self, blinks: Vec<Blink>) {
        let mut inner = self.inner.write().await;
        inner.blinks = blinks;
        inner.generation += 1;
    }

    /// Append a fetched page, replacing blinks already present by id.
    pub async fn extend(&self, blinks: Vec<Blink>) {
        let mut inner = self.inner.write().await;
        for blink in blinks {
            upsert_in(&mut inner.blinks, blink);
        }
        inner.generation += 1;
    }

    pub async fn upsert(&self, blink: Blink) {
        let mut inner = self.inner.write().await;
        upsert_in(&mut inner.blinks, blink);
        inner.generation += 1;
    }

    pub async fn get(&self, id: &str) -> Option<Blink> {
        let inner = self.inner.read().await;
        inner.blinks.iter().find(|b| b.id == id).cloned()
    }

    pub async fn all(&self) -> Vec<Blink> {
        self.inner.read().await.blinks.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.blinks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.blinks.is_empty()
    }

    pub async fn filtered(&self, filter: &BlinkFilter) -> Arc<Vec<Blink>> {
        let mut memo = self.memo.lock().await;
        let inner = self.inner.read().await;

        if let Some(cached) = memo.as_ref() {
            if cached.generation == inner.generation && &cached.filter == filter {
                return cached.view.clone();
            }
        }

        let view = Arc::new(filter.apply(&inner.blinks));
        *memo = Some(Memo {
            filter: filter.clone(),
            generation: inner.generation,
            view: view.clone(),
        });
        view
    }
}

fn upsert_in(blinks: &mut Vec<Blink>, blink: Blink) {
    if let Some(existing) = blinks.iter_mut().find(|b| b.id == blink.id) {
        *existing = blink;
    } else {
        blinks.push(blink);
    }
}
