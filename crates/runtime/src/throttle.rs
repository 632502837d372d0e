//! Leading+trailing throttle over deadline polling.

/// Bounds how often an action fires while guaranteeing the final payload
/// is never lost.
///
/// A call outside the interval fires immediately; calls inside the
/// interval coalesce into exactly one trailing fire (carrying the latest
/// payload) at `last_fire + interval`, delivered by [`Throttle::poll`].
/// Ten calls within one interval therefore produce exactly two fires:
/// the first, and one trailing with the final arguments.
#[derive(Debug)]
pub struct Throttle<T> {
    interval_ms: i64,
    last_fire_ms: Option<i64>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval_ms: i64) -> Self {
        Throttle {
            interval_ms,
            last_fire_ms: None,
            pending: None,
        }
    }

    /// Submit a payload. Returns `Some(payload)` when the caller should
    /// execute now; otherwise the payload is held (replacing any earlier
    /// held payload) for the trailing fire.
    pub fn call(&mut self, payload: T, now_ms: i64) -> Option<T> {
        match self.last_fire_ms {
            Some(last) if now_ms - last < self.interval_ms => {
                self.pending = Some(payload);
                None
            }
            _ => {
                self.last_fire_ms = Some(now_ms);
                Some(payload)
            }
        }
    }

    /// Release a due trailing payload, if any.
    pub fn poll(&mut self, now_ms: i64) -> Option<T> {
        let last = self.last_fire_ms?;
        if self.pending.is_some() && now_ms - last >= self.interval_ms {
            self.last_fire_ms = Some(now_ms);
            self.pending.take()
        } else {
            None
        }
    }

    /// When the held trailing payload is due, if one is held.
    pub fn next_deadline(&self) -> Option<i64> {
        match (&self.pending, self.last_fire_ms) {
            (Some(_), Some(last)) => Some(last + self.interval_ms),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_fires_immediately() {
        let mut t = Throttle::new(500);
        assert_eq!(t.call(1, 0), Some(1));
    }

    #[test]
    fn ten_calls_in_one_interval_fire_exactly_twice() {
        let mut t = Throttle::new(500);
        let mut fired = Vec::new();

        for i in 0..10 {
            if let Some(v) = t.call(i, i * 10) {
                fired.push(v);
            }
        }
        assert_eq!(fired, vec![0]);

        // Nothing due mid-interval.
        assert_eq!(t.poll(400), None);
        // Trailing fire carries the latest payload.
        assert_eq!(t.poll(500), Some(9));
        assert_eq!(t.poll(600), None);
    }

    #[test]
    fn call_after_interval_fires_again() {
        let mut t = Throttle::new(500);
        assert_eq!(t.call("a", 0), Some("a"));
        assert_eq!(t.call("b", 600), Some("b"));
    }

    #[test]
    fn trailing_fire_resets_the_window() {
        let mut t = Throttle::new(500);
        t.call(1, 0);
        t.call(2, 100);
        assert_eq!(t.poll(500), Some(2));

        // The trailing fire at t=500 opens a new window.
        assert_eq!(t.call(3, 700), None);
        assert_eq!(t.next_deadline(), Some(1_000));
        assert_eq!(t.poll(1_000), Some(3));
    }

    #[test]
    fn no_deadline_without_pending() {
        let mut t = Throttle::new(500);
        assert_eq!(t.next_deadline(), None);
        t.call((), 0);
        assert_eq!(t.next_deadline(), None);
        t.call((), 1);
        assert_eq!(t.next_deadline(), Some(500));
    }
}
