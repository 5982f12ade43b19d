//! Filter state machine and lifecycle.
//!
//! The host scheduler calls [`SuperResFilter::process`] once per cycle.
//! Check order is fixed (reinit, then buffering sufficiency, then
//! dimension parity) because failures are observed in this order.  With the
//! mode off every frame passes through as a new reference with zero GPU
//! work; otherwise the render pipeline produces a new GPU-resident frame
//! (or nothing for this cycle).

use std::sync::Arc;

use tracing::{error, info};

use supra_core::error::{FilterError, Result};
use supra_core::hw::{HwRegistry, HwSession, TextureDesc, TextureUsage};
use supra_core::options::SuperResOptions;
use supra_core::policy;
use supra_core::types::{FrameParams, PixelFormat, Rect, VideoFrame};

use crate::enhance::Enhancement;
use crate::pool::{PoolStatsSnapshot, SurfacePool};
use crate::queue::FrameQueue;
use crate::vproc::ProcessorManager;

/// Per-instance frame accounting.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterCounters {
    /// Frames rendered through the video processor.
    pub rendered: u64,
    /// Frames passed through untouched (mode off).
    pub passed: u64,
    /// Cycles that produced no frame (benign skip or per-frame failure).
    pub skipped: u64,
}

/// GPU video post-processing filter with optional super-resolution.
pub struct SuperResFilter {
    pub(crate) opts: SuperResOptions,
    pub(crate) enhance: Enhancement,
    // Teardown releases in field order: processor and enumerator first,
    // then the frame queue, the surface pool, and finally the session
    // (context before device).
    pub(crate) vproc: ProcessorManager,
    pub(crate) queue: FrameQueue,
    pub(crate) pool: SurfacePool,
    pub(crate) in_params: Option<FrameParams>,
    pub(crate) out_params: Option<FrameParams>,
    failed: bool,
    counters: FilterCounters,
    pub(crate) session: HwSession,
}

impl std::fmt::Debug for SuperResFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperResFilter")
            .field("opts", &self.opts)
            .field("enhance", &self.enhance)
            .field("in_params", &self.in_params)
            .field("out_params", &self.out_params)
            .field("failed", &self.failed)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl SuperResFilter {
    /// Bind the filter to a video device from the host registry.
    ///
    /// Fails when the registry has no device for GPU-resident NV12
    /// surfaces; construction is refused and nothing is retained.
    pub fn new(opts: SuperResOptions, registry: &dyn HwRegistry) -> Result<Self> {
        let session = registry
            .session_for_format(PixelFormat::Nv12)
            .ok_or_else(|| {
                FilterError::BindFailed("no video device for NV12 GPU surfaces".into())
            })?;

        let device = session.device.clone();
        let pool = SurfacePool::new(Box::new(move |format, width, height| {
            device.create_texture(&TextureDesc {
                width,
                height,
                format,
                usage: TextureUsage::RenderTarget,
            })
        }));

        let queue = FrameQueue::new(&[PixelFormat::Yuv420p, PixelFormat::Nv12]);

        info!(mode = ?opts.mode, scale = ?opts.scale, "super-resolution filter bound");
        Ok(Self {
            opts,
            enhance: Enhancement::from(opts.mode),
            vproc: ProcessorManager::new(),
            queue,
            pool,
            in_params: None,
            out_params: None,
            failed: false,
            counters: FilterCounters::default(),
            session,
        })
    }

    /// Queue one decoded frame from the input pin.
    pub fn push_frame(&mut self, frame: Arc<VideoFrame>) -> Result<()> {
        self.queue.push(frame)
    }

    /// Drain one produced frame for the output pin.
    pub fn take_output(&mut self) -> Option<Arc<VideoFrame>> {
        self.queue.take_output()
    }

    /// One cooperative scheduling cycle.
    ///
    /// Returns an error only for stream-fatal conditions; per-frame
    /// failures are logged and cost the frame.
    pub fn process(&mut self) -> Result<()> {
        if self.failed {
            return Err(FilterError::StreamFailed("stream already failed".into()));
        }

        if let Some(params) = self.queue.execute_reinit() {
            self.apply_reinit(params);
        }

        if !self.queue.can_output() {
            return Ok(());
        }

        let Some(in_params) = self.in_params.clone() else {
            return Ok(());
        };

        if in_params.width % 2 != 0 || in_params.height % 2 != 0 {
            // NV12 chroma is subsampled 2x2; odd sizes cannot be represented
            error!(
                width = in_params.width,
                height = in_params.height,
                "cannot process video with odd width or height"
            );
            self.failed = true;
            return Err(FilterError::StreamFailed(format!(
                "odd input dimensions {}x{}",
                in_params.width, in_params.height
            )));
        }

        if !self.opts.mode.enabled() {
            if let Some(frame) = self.queue.get(0) {
                // a new reference to the input image, zero GPU work
                self.queue.write_output(Some(frame));
                self.counters.passed += 1;
            }
            return Ok(());
        }

        match self.render() {
            Ok(Some(frame)) => {
                self.queue.write_output(Some(frame));
                self.counters.rendered += 1;
            }
            Ok(None) => {
                self.queue.write_output(None);
                self.counters.skipped += 1;
            }
            Err(err) => {
                error!(%err, "render failed, dropping frame");
                self.queue.write_output(None);
                self.counters.skipped += 1;
            }
        }
        Ok(())
    }

    /// Drop queued frames after a seek.  The processor state is keyed by
    /// geometry, not stream identity, so it survives a reset.
    pub fn reset(&mut self) {
        self.queue.flush();
    }

    fn apply_reinit(&mut self, params: FrameParams) {
        self.pool.clear();
        self.vproc.invalidate();

        let mut out = params.clone();
        if self.opts.mode.enabled() {
            let (target_w, target_h) = self.opts.scale.resolve(params.width, params.height);
            let (out_w, out_h) =
                policy::render_size(params.width, params.height, target_w, target_h);
            out.width = out_w;
            out.height = out_h;
            out.crop = Rect::sized(out_w, out_h);
            out.format = PixelFormat::Nv12;
        }

        info!(
            in_width = params.width,
            in_height = params.height,
            out_width = out.width,
            out_height = out.height,
            "stream parameters reconfigured"
        );
        self.in_params = Some(params);
        self.out_params = Some(out);
    }

    pub fn counters(&self) -> FilterCounters {
        self.counters
    }

    pub fn pool_stats(&self) -> PoolStatsSnapshot {
        self.pool.stats()
    }

    /// Successful processor rebuilds since bind.
    pub fn rebuild_count(&self) -> u64 {
        self.vproc.rebuild_count()
    }

    /// Derived output parameters, available after the first reinit.
    pub fn output_params(&self) -> Option<&FrameParams> {
        self.out_params.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}
