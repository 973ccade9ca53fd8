//! Canvas pool for export surfaces.
//!
//! Reuses pixmaps between export attempts so repeated exports at the same
//! size do not reallocate their backing buffers. Entries are bucketed by
//! exact `width x height` and cleared on release.

use std::collections::VecDeque;

use tiny_skia::{Color, Pixmap};

use crate::error::{RenderError, RenderResult};

/// Configuration for the canvas pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of idle surfaces kept across all buckets.
    pub max_entries: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_entries: 4 }
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served from the pool.
    pub hits: u64,
    /// Acquisitions that allocated a new surface.
    pub misses: u64,
    /// Idle surfaces dropped to respect `max_entries`.
    pub evictions: u64,
}

/// Pool of reusable drawing surfaces.
///
/// Acquire, draw, release; one surface is never handed out twice without a
/// release in between because [`CanvasPool::acquire`] moves it out.
#[derive(Debug, Default)]
pub struct CanvasPool {
    /// Idle surfaces, oldest release first.
    idle: VecDeque<Pixmap>,
    config: PoolConfig,
    stats: PoolStats,
}

impl CanvasPool {
    /// Create a pool with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with custom configuration.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            idle: VecDeque::new(),
            config,
            stats: PoolStats::default(),
        }
    }

    /// Get a transparent `width x height` surface.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Allocation`] if a new surface cannot be
    /// allocated.
    pub fn acquire(&mut self, width: u32, height: u32) -> RenderResult<Pixmap> {
        let position = self
            .idle
            .iter()
            .rposition(|p| p.width() == width && p.height() == height);

        if let Some(pixmap) = position.and_then(|i| self.idle.remove(i)) {
            self.stats.hits += 1;
            tracing::trace!(width, height, "Canvas pool hit");
            return Ok(pixmap);
        }

        self.stats.misses += 1;
        tracing::trace!(width, height, "Canvas pool miss");
        Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })
    }

    /// Return a surface to the pool. Its pixels are cleared first.
    pub fn release(&mut self, mut pixmap: Pixmap) {
        if self.config.max_entries == 0 {
            self.stats.evictions += 1;
            return;
        }
        pixmap.fill(Color::TRANSPARENT);
        self.idle.push_back(pixmap);
        while self.idle.len() > self.config.max_entries {
            self.idle.pop_front();
            self.stats.evictions += 1;
        }
    }

    /// Drop every idle surface.
    pub fn clear(&mut self) {
        self.idle.clear();
    }

    /// Number of idle surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// Whether the pool holds no idle surfaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    /// Bytes held by idle surfaces.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.idle.iter().map(|p| p.data().len()).sum()
    }

    /// Pool statistics.
    #[must_use]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tiny_skia::Paint;

    use super::*;

    fn dirty(pixmap: &mut Pixmap) {
        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 0, 0, 255);
        let rect = tiny_skia::Rect::from_xywh(0.0, 0.0, 8.0, 8.0).expect("rect");
        pixmap.fill_rect(rect, &paint, tiny_skia::Transform::identity(), None);
    }

    #[test]
    fn test_reacquire_is_cleared() {
        let mut pool = CanvasPool::new();
        let mut pixmap = pool.acquire(8, 8).expect("acquire");
        dirty(&mut pixmap);
        assert!(pixmap.data().iter().any(|&b| b != 0));
        pool.release(pixmap);

        let pixmap = pool.acquire(8, 8).expect("reacquire");
        assert!(pixmap.data().iter().all(|&b| b == 0));
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn test_buckets_are_exact() {
        let mut pool = CanvasPool::new();
        let pixmap = pool.acquire(10, 10).expect("acquire");
        pool.release(pixmap);

        let other = pool.acquire(10, 11).expect("acquire");
        assert_eq!((other.width(), other.height()), (10, 11));
        assert_eq!(pool.stats().misses, 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_released() {
        let mut pool = CanvasPool::with_config(PoolConfig { max_entries: 2 });
        let a = pool.acquire(1, 1).expect("a");
        let b = pool.acquire(2, 2).expect("b");
        let c = pool.acquire(3, 3).expect("c");
        pool.release(a);
        pool.release(b);
        pool.release(c);

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.stats().evictions, 1);
        // 1x1 was released first and is gone.
        pool.acquire(1, 1).expect("a again");
        assert_eq!(pool.stats().hits, 0);
        pool.acquire(3, 3).expect("c again");
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut pool = CanvasPool::with_config(PoolConfig { max_entries: 0 });
        let pixmap = pool.acquire(4, 4).expect("acquire");
        pool.release(pixmap);
        assert!(pool.is_empty());
        assert_eq!(pool.size_bytes(), 0);
    }

    #[test]
    fn test_allocation_failure() {
        let mut pool = CanvasPool::new();
        assert!(matches!(
            pool.acquire(0, 10),
            Err(RenderError::Allocation { width: 0, height: 10 })
        ));
    }

    proptest! {
        #[test]
        fn prop_pool_never_exceeds_cap(
            cap in 0usize..5,
            sizes in proptest::collection::vec((1u32..6, 1u32..6), 0..20),
        ) {
            let mut pool = CanvasPool::with_config(PoolConfig { max_entries: cap });
            for (w, h) in sizes {
                let pixmap = pool.acquire(w, h).expect("acquire");
                prop_assert_eq!((pixmap.width(), pixmap.height()), (w, h));
                prop_assert!(pixmap.data().iter().all(|&b| b == 0));
                pool.release(pixmap);
                prop_assert!(pool.len() <= cap);
            }
        }
    }
}
