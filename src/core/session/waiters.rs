//! Correlation between outbound commands and inbound feedback.
//!
//! A waiter is a pending subscription for the next inbound entry matching a
//! pattern set. Every waiter leaves the registry exactly once: matched by an
//! entry, expired by its deadline, or drained by teardown. Whoever removes it
//! owns the outcome.

use super::chat::ChatEntry;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Ordered list of case-insensitive signatures.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compiles each source with the `(?i)` flag.
    pub fn case_insensitive(sources: &[&str]) -> Result<Self, regex::Error> {
        let patterns = sources
            .iter()
            .map(|source| Regex::new(&format!("(?i){source}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }

    /// Concatenates sets, preserving order.
    pub fn chain<'a>(sets: impl IntoIterator<Item = &'a PatternSet>) -> Self {
        Self {
            patterns: sets
                .into_iter()
                .flat_map(|set| set.patterns.iter().cloned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

pub(crate) type WaiterId = u64;

struct Waiter {
    id: WaiterId,
    patterns: Arc<PatternSet>,
    system_only: bool,
    tx: oneshot::Sender<Option<ChatEntry>>,
}

/// Active waiters in registration order.
#[derive(Default)]
pub(crate) struct WaiterRegistry {
    next_id: WaiterId,
    waiters: Vec<Waiter>,
}

impl WaiterRegistry {
    pub(crate) fn register(
        &mut self,
        patterns: Arc<PatternSet>,
        system_only: bool,
    ) -> (WaiterId, oneshot::Receiver<Option<ChatEntry>>) {
        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        self.waiters.push(Waiter {
            id,
            patterns,
            system_only,
            tx,
        });
        (id, rx)
    }

    /// Offers an entry to the newest waiter first. At most one waiter is
    /// resolved per entry; returns its id.
    pub(crate) fn dispatch(&mut self, entry: &ChatEntry, is_system: bool) -> Option<WaiterId> {
        let index = self.waiters.iter().rposition(|waiter| {
            (!waiter.system_only || is_system) && waiter.patterns.is_match(&entry.text)
        })?;
        let waiter = self.waiters.remove(index);
        // a dropped receiver means the caller already gave up
        let _ = waiter.tx.send(Some(entry.clone()));
        Some(waiter.id)
    }

    /// Removes a waiter whose deadline elapsed. `false` if it was already resolved.
    pub(crate) fn expire(&mut self, id: WaiterId) -> bool {
        match self.waiters.iter().position(|waiter| waiter.id == id) {
            Some(index) => {
                let waiter = self.waiters.remove(index);
                let _ = waiter.tx.send(None);
                true
            }
            None => false,
        }
    }

    /// Resolves every waiter with `None` and empties the registry.
    pub(crate) fn resolve_all(&mut self) -> usize {
        let drained = self.waiters.len();
        for waiter in self.waiters.drain(..) {
            let _ = waiter.tx.send(None);
        }
        drained
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: WaiterId) -> bool {
        self.waiters.iter().any(|waiter| waiter.id == id)
    }
}
