//! Writer buffer pool (§5): a bounded free-list so request/response-style
//! callers can reuse allocations across encode calls instead of allocating a
//! fresh `Writer` every time.

use parking_lot::Mutex;

use crate::limits::Limits;
use crate::writer::Writer;

/// Bounded pool of [`Writer`]s. Writers are reset (buffer cleared, error and
/// frozen flags cleared) before being handed out and before being returned,
/// so a poisoned or frozen writer never leaks out to the next caller.
pub struct WriterPool {
    free: Mutex<Vec<Writer>>,
    capacity: usize,
    limits: Limits,
}

impl WriterPool {
    /// Creates a pool that retains at most `capacity` writers, each created
    /// with `limits` when the pool must allocate a new one.
    pub fn new(capacity: usize, limits: Limits) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            limits,
        }
    }

    /// Takes a writer from the pool, or allocates a fresh one if the pool is
    /// empty.
    pub fn get_writer(&self) -> Writer {
        let mut writer = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Writer::with_limits(self.limits));
        writer.reset();
        writer
    }

    /// Returns a writer to the pool for reuse, dropping it instead if the
    /// pool is already at capacity.
    pub fn put_writer(&self, mut writer: Writer) {
        writer.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(writer);
        }
    }

    /// Number of writers currently held in the pool.
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WriterPool {
    fn default() -> Self {
        Self::new(16, Limits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_writer_is_reset() {
        let pool = WriterPool::new(4, Limits::default());
        let mut w = pool.get_writer();
        w.write_bool(true).unwrap();
        assert!(!w.is_empty());
        pool.put_writer(w);

        let w2 = pool.get_writer();
        assert!(w2.is_empty());
    }

    #[test]
    fn pool_respects_capacity() {
        let pool = WriterPool::new(1, Limits::default());
        pool.put_writer(Writer::new());
        pool.put_writer(Writer::new());
        assert_eq!(pool.len(), 1);
    }
}
