use crate::game::ControlDirection;
use std::collections::HashMap;
use tokio::task::AbortHandle;

/// Pending auto-release timers, at most one per direction.
///
/// The timer tasks only hold a weak reference to the session, so a pending
/// timer never keeps a dropped session alive; teardown aborts all of them.
#[derive(Default)]
pub(crate) struct ControlTimers {
    next_id: u64,
    timers: HashMap<ControlDirection, ControlTimer>,
}

struct ControlTimer {
    id: u64,
    handle: AbortHandle,
}

impl ControlTimers {
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Records a freshly spawned timer; any previous one for the direction is aborted.
    pub(crate) fn insert(&mut self, direction: ControlDirection, id: u64, handle: AbortHandle) {
        if let Some(previous) = self.timers.insert(direction, ControlTimer { id, handle }) {
            previous.handle.abort();
        }
    }

    pub(crate) fn cancel(&mut self, direction: ControlDirection) -> bool {
        match self.timers.remove(&direction) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        count
    }

    /// Claims the timer when it fires. Fails if it was cancelled or replaced.
    pub(crate) fn take_if_current(&mut self, direction: ControlDirection, id: u64) -> bool {
        match self.timers.get(&direction) {
            Some(timer) if timer.id == id => {
                self.timers.remove(&direction);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, direction: ControlDirection) -> bool {
        self.timers.contains_key(&direction)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}
