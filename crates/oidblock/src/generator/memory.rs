use portable_atomic::{AtomicI64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{DEFAULT_START_ID, Error, IdFormat, IdentifierProducer, Result};

/// A lock-free, purely in-memory counter.
///
/// Values start at `start_id` and increase by one per call; the last value
/// handed out is `i64::MAX - 1`, after which calls fail with
/// [`Error::Exhausted`]. Nothing is persisted, so a restarted process starts
/// over; use a [`BlockAllocator`] when the sequence must survive restarts or
/// be shared between processes.
///
/// # Example
/// ```
/// use oidblock::{IdFormat, IdentifierProducer, MemoryCounter};
///
/// let counter = MemoryCounter::new(500, IdFormat::new(4));
/// assert_eq!(counter.new_identifier().unwrap(), "0500");
/// assert_eq!(counter.next_identifier().unwrap(), 501);
/// ```
///
/// [`BlockAllocator`]: crate::BlockAllocator
#[derive(Debug)]
pub struct MemoryCounter {
    next: AtomicI64,
    format: IdFormat,
}

impl Default for MemoryCounter {
    fn default() -> Self {
        Self::new(DEFAULT_START_ID, IdFormat::default())
    }
}

impl MemoryCounter {
    pub fn new(start_id: i64, format: IdFormat) -> Self {
        Self {
            next: AtomicI64::new(start_id),
            format,
        }
    }

    /// The value the next call will return.
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl IdentifierProducer for MemoryCounter {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn next_identifier(&self) -> Result<i64> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| next.checked_add(1))
            .map_err(|next| Error::Exhausted { last: next - 1 })
    }

    fn id_format(&self) -> &IdFormat {
        &self.format
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread::scope};

    use super::*;

    #[test]
    fn formats_like_the_configured_width() {
        let counter = MemoryCounter::new(1, IdFormat::new(3));
        let ids: Vec<_> = (0..4).map(|_| counter.new_identifier().unwrap()).collect();
        assert_eq!(ids, ["001", "002", "003", "004"]);

        let counter = MemoryCounter::new(200, IdFormat::new(2));
        let ids: Vec<_> = (0..4).map(|_| counter.new_identifier().unwrap()).collect();
        assert_eq!(ids, ["200", "201", "202", "203"]);
    }

    #[test]
    fn unique_across_threads() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let counter = MemoryCounter::default();
        let seen = scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        (0..PER_THREAD)
                            .map(|_| counter.next_identifier().unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<HashSet<_>>()
        });

        assert_eq!(seen.len(), THREADS * PER_THREAD);
        assert_eq!(counter.peek(), 1 + (THREADS * PER_THREAD) as i64);
    }

    #[test]
    fn stops_at_the_top_instead_of_wrapping() {
        let counter = MemoryCounter::new(i64::MAX - 2, IdFormat::default());
        assert_eq!(counter.next_identifier().unwrap(), i64::MAX - 2);
        assert_eq!(counter.next_identifier().unwrap(), i64::MAX - 1);

        for _ in 0..2 {
            let err = counter.next_identifier().unwrap_err();
            assert!(matches!(err, Error::Exhausted { last } if last == i64::MAX - 1));
        }
        assert_eq!(counter.peek(), i64::MAX);
    }
}
