#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

/// Groups individual transport messages into deliveries.
///
/// A group is ready once no message arrived for `debounce`, or `max_wait`
/// elapsed since its first message, whichever comes first. Order is preserved.
pub struct Batcher<T> {
    buf: Vec<T>,
    first_at: Option<Instant>,
    last_at: Option<Instant>,
    debounce: Duration,
    max_wait: Duration,
}

impl<T> Batcher<T> {
    pub fn new(debounce: Duration, max_wait: Duration) -> Self {
        Self { buf: Vec::new(), first_at: None, last_at: None, debounce, max_wait: max_wait.max(debounce) }
    }

    pub fn len(&self) -> usize { self.buf.len() }
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    pub fn push(&mut self, item: T, now: Instant) {
        if self.first_at.is_none() {
            self.first_at = Some(now);
        }
        self.last_at = Some(now);
        self.buf.push(item);
    }

    /// When the current group becomes ready; `None` while empty.
    pub fn deadline(&self) -> Option<Instant> {
        let (first, last) = (self.first_at?, self.last_at?);
        Some((last + self.debounce).min(first + self.max_wait))
    }

    /// Take the group if it is ready at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<T>> {
        match self.deadline() {
            Some(d) if now >= d => Some(self.flush()),
            _ => None,
        }
    }

    /// Take whatever is buffered, ready or not.
    pub fn flush(&mut self) -> Vec<T> {
        self.first_at = None;
        self.last_at = None;
        std::mem::take(&mut self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn empty_batcher_has_no_deadline() {
        let mut b: Batcher<u32> = Batcher::new(ms(100), ms(500));
        assert!(b.deadline().is_none());
        assert!(b.poll(Instant::now()).is_none());
    }

    #[test]
    fn debounce_restarts_on_each_message() {
        let t0 = Instant::now();
        let mut b = Batcher::new(ms(100), ms(500));
        b.push(1, t0);
        b.push(2, t0 + ms(80));
        assert!(b.poll(t0 + ms(120)).is_none());
        assert_eq!(b.poll(t0 + ms(180)), Some(vec![1, 2]));
        assert!(b.is_empty());
    }

    #[test]
    fn max_wait_bounds_a_busy_stream() {
        let t0 = Instant::now();
        let mut b = Batcher::new(ms(100), ms(250));
        for i in 0..5u64 {
            b.push(i, t0 + ms(i * 60));
        }
        assert_eq!(b.deadline(), Some(t0 + ms(250)));
        assert_eq!(b.poll(t0 + ms(250)).map(|g| g.len()), Some(5));
    }

    #[test]
    fn flush_resets_timers() {
        let t0 = Instant::now();
        let mut b = Batcher::new(ms(100), ms(500));
        b.push("a", t0);
        assert_eq!(b.flush(), vec!["a"]);
        b.push("b", t0 + ms(1000));
        assert_eq!(b.deadline(), Some(t0 + ms(1100)));
    }
}
