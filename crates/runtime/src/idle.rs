//! Idle-time task queue with a timeout fallback.

/// Queues work for a moment when the host reports the main thread idle,
/// bounded by a per-task fallback deadline so every task eventually runs
/// even under continuous load.
///
/// The host signals idleness by calling [`IdleQueue::drain_idle`];
/// [`IdleQueue::poll`] (driven by the normal tick path) force-runs any
/// task whose deadline has passed.
pub struct IdleQueue {
    timeout_ms: i64,
    tasks: Vec<(i64, Box<dyn FnOnce() + Send>)>,
}

impl IdleQueue {
    pub fn new(timeout_ms: i64) -> Self {
        IdleQueue {
            timeout_ms,
            tasks: Vec::new(),
        }
    }

    pub fn push(&mut self, task: impl FnOnce() + Send + 'static, now_ms: i64) {
        self.tasks.push((now_ms + self.timeout_ms, Box::new(task)));
    }

    /// Run everything; the host is idle.
    pub fn drain_idle(&mut self) {
        for (_, task) in self.tasks.drain(..) {
            task();
        }
    }

    /// Run tasks whose fallback deadline has passed.
    pub fn poll(&mut self, now_ms: i64) {
        let mut due = Vec::new();
        self.tasks.retain_mut(|(deadline, task)| {
            if now_ms >= *deadline {
                // retain_mut cannot move the closure out; swap in a no-op.
                let task = std::mem::replace(task, Box::new(|| {}));
                due.push(task);
                false
            } else {
                true
            }
        });
        for task in due {
            task();
        }
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.tasks.iter().map(|(d, _)| *d).min()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drain_runs_everything() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut q = IdleQueue::new(1_000);
        for _ in 0..3 {
            let ran = ran.clone();
            q.push(move || { ran.fetch_add(1, Ordering::SeqCst); }, 0);
        }
        q.drain_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn fallback_deadline_forces_execution() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut q = IdleQueue::new(1_000);
        let r = ran.clone();
        q.push(move || { r.fetch_add(1, Ordering::SeqCst); }, 0);

        q.poll(999);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(q.next_deadline(), Some(1_000));

        q.poll(1_000);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(q.is_empty());
    }
}
