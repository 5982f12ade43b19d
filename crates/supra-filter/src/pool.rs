//! Output surface pool.
//!
//! Surfaces are produced by an allocator callback and recycled
//! least-recently-used: returned surfaces join the back of the free list,
//! reuse takes from the front.  `clear()` bumps a generation counter so
//! surfaces still riding inside in-flight frames free themselves on drop
//! instead of re-entering a pool sized for different parameters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use supra_core::error::Result;
use supra_core::hw::GpuSurface;
use supra_core::types::PixelFormat;

/// Allocator callback invoked on pool misses.
pub type SurfaceAllocator = Box<dyn Fn(PixelFormat, u32, u32) -> Result<Arc<dyn GpuSurface>>>;

/// Lock-free pool access counters.
#[derive(Default)]
pub struct PoolStats {
    pub allocated: AtomicU64,
    pub hits: AtomicU64,
    pub recycled: AtomicU64,
    pub discarded: AtomicU64,
}

/// Point-in-time copy of the counters, for reports.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolStatsSnapshot {
    pub allocated: u64,
    pub hits: u64,
    pub recycled: u64,
    pub discarded: u64,
}

struct PoolInner {
    free: VecDeque<Arc<dyn GpuSurface>>,
    generation: u64,
    format: PixelFormat,
    width: u32,
    height: u32,
}

/// Geometry-keyed LRU surface pool.
pub struct SurfacePool {
    inner: Arc<Mutex<PoolInner>>,
    allocator: SurfaceAllocator,
    stats: Arc<PoolStats>,
}

impl SurfacePool {
    pub fn new(allocator: SurfaceAllocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                free: VecDeque::new(),
                generation: 0,
                format: PixelFormat::Nv12,
                width: 0,
                height: 0,
            })),
            allocator,
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Take a surface of the given geometry, recycling when possible.
    pub fn acquire(&self, format: PixelFormat, width: u32, height: u32) -> Result<PooledSurface> {
        let generation;
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.format != format || inner.width != width || inner.height != height {
                // stale-sized buffers must never be reused
                let dropped = inner.free.len();
                if dropped > 0 {
                    debug!(dropped, width, height, "pool retargeted, dropping surfaces");
                }
                inner.free.clear();
                inner.format = format;
                inner.width = width;
                inner.height = height;
            }
            generation = inner.generation;
            if let Some(surface) = inner.free.pop_front() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(PooledSurface {
                    surface,
                    pool: Arc::downgrade(&self.inner),
                    stats: self.stats.clone(),
                    generation,
                });
            }
        }

        let surface = (self.allocator)(format, width, height)?;
        self.stats.allocated.fetch_add(1, Ordering::Relaxed);
        Ok(PooledSurface {
            surface,
            pool: Arc::downgrade(&self.inner),
            stats: self.stats.clone(),
            generation,
        })
    }

    /// Drop every cached surface and orphan outstanding ones.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.free.clear();
        inner.generation += 1;
    }

    /// Number of surfaces currently waiting for reuse.
    pub fn free_len(&self) -> usize {
        self.inner.lock().unwrap().free.len()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            allocated: self.stats.allocated.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            recycled: self.stats.recycled.load(Ordering::Relaxed),
            discarded: self.stats.discarded.load(Ordering::Relaxed),
        }
    }
}

/// A surface on loan from the pool.  Dropping it returns the surface to
/// the recycle list, unless the pool was cleared in the meantime.
pub struct PooledSurface {
    surface: Arc<dyn GpuSurface>,
    pool: Weak<Mutex<PoolInner>>,
    stats: Arc<PoolStats>,
    generation: u64,
}

impl PooledSurface {
    pub fn surface(&self) -> Arc<dyn GpuSurface> {
        self.surface.clone()
    }
}

impl Drop for PooledSurface {
    fn drop(&mut self) {
        let Some(pool) = self.pool.upgrade() else {
            return;
        };
        let mut inner = pool.lock().unwrap();
        if inner.generation == self.generation {
            inner.free.push_back(self.surface.clone());
            self.stats.recycled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::AtomicU32;
    use supra_core::hw::{TextureDesc, TextureUsage};

    struct FakeSurface {
        desc: TextureDesc,
        serial: u32,
    }

    impl GpuSurface for FakeSurface {
        fn desc(&self) -> TextureDesc {
            self.desc
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn counting_pool() -> (SurfacePool, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let count_cb = count.clone();
        let pool = SurfacePool::new(Box::new(move |format, width, height| {
            let serial = count_cb.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(FakeSurface {
                desc: TextureDesc {
                    width,
                    height,
                    format,
                    usage: TextureUsage::RenderTarget,
                },
                serial,
            }))
        }));
        (pool, count)
    }

    fn serial(surface: &Arc<dyn GpuSurface>) -> u32 {
        surface
            .as_any()
            .downcast_ref::<FakeSurface>()
            .unwrap()
            .serial
    }

    #[test]
    fn recycles_instead_of_reallocating() {
        let (pool, count) = counting_pool();
        let first = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        let first_serial = serial(&first.surface());
        drop(first);

        let second = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        assert_eq!(serial(&second.surface()), first_serial);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        let stats = pool.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn recycle_order_is_least_recently_used() {
        let (pool, _) = counting_pool();
        let a = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        let b = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        let a_serial = serial(&a.surface());
        let b_serial = serial(&b.surface());
        drop(a);
        drop(b);

        let first = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        let second = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        assert_eq!(serial(&first.surface()), a_serial);
        assert_eq!(serial(&second.surface()), b_serial);
    }

    #[test]
    fn clear_orphans_outstanding_surfaces() {
        let (pool, count) = counting_pool();
        let held = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        pool.clear();
        drop(held);

        assert_eq!(pool.free_len(), 0, "cleared pool must stay empty");
        assert_eq!(pool.stats().discarded, 1);

        let fresh = pool.acquire(PixelFormat::Nv12, 64, 64).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 2);
        drop(fresh);
    }

    #[test]
    fn geometry_change_drops_cached_surfaces() {
        let (pool, count) = counting_pool();
        drop(pool.acquire(PixelFormat::Nv12, 64, 64).unwrap());
        assert_eq!(pool.free_len(), 1);

        let bigger = pool.acquire(PixelFormat::Nv12, 128, 128).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 2);
        assert_eq!(bigger.surface().desc().width, 128);
    }

    #[test]
    fn allocator_errors_surface_to_the_caller() {
        let pool = SurfacePool::new(Box::new(|_, _, _| {
            Err(supra_core::error::FilterError::Allocation(
                "out of video memory".into(),
            ))
        }));
        assert!(pool.acquire(PixelFormat::Nv12, 64, 64).is_err());
        assert_eq!(pool.stats().allocated, 0);
    }
}
