//! Video-processor lifecycle manager.
//!
//! Owns the processor and its capability enumerator, keyed by source
//! surface geometry.  The processor is rebuilt from scratch on any
//! geometry change, never updated incrementally, and left absent when a
//! rebuild fails so the next frame retries automatically.

use std::sync::Arc;

use tracing::{debug, warn};

use supra_core::error::{FilterError, Result};
use supra_core::hw::{
    ColorSpaceDesc, HwSession, OutputRate, ProcessorContentDesc, ProcessorEnumerator,
    VideoProcessor,
};
use supra_core::types::{FrameParams, Rect};

/// Live processor handles plus the geometry they were built for.
///
/// Field order is the release order: the processor drops before the
/// enumerator it was created from.
pub struct ProcessorState {
    pub processor: Box<dyn VideoProcessor>,
    pub enumerator: Arc<dyn ProcessorEnumerator>,
    pub src_width: u32,
    pub src_height: u32,
}

/// Exclusive owner of the [`ProcessorState`].
#[derive(Default)]
pub struct ProcessorManager {
    state: Option<ProcessorState>,
    rebuilds: u64,
}

impl ProcessorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild trigger: no state, or recorded geometry differs from the
    /// current surface's actual dimensions.
    pub fn needs_rebuild(&self, src_width: u32, src_height: u32) -> bool {
        match &self.state {
            None => true,
            Some(s) => s.src_width != src_width || s.src_height != src_height,
        }
    }

    /// Drop the current state; the next frame rebuilds lazily.
    pub fn invalidate(&mut self) {
        self.state = None;
    }

    pub fn state(&self) -> Option<&ProcessorState> {
        self.state.as_ref()
    }

    /// Total successful rebuilds over the manager's lifetime.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Ensure a processor exists for the given source surface geometry,
    /// rebuilding when the trigger predicate fires.
    pub fn ensure(
        &mut self,
        session: &HwSession,
        src_width: u32,
        src_height: u32,
        stream: &FrameParams,
        output: &FrameParams,
    ) -> Result<&ProcessorState> {
        if self.needs_rebuild(src_width, src_height) {
            // release the old processor/enumerator before building anew
            self.state = None;
            let state = build(session, src_width, src_height, stream, output)
                .inspect_err(|err| {
                    warn!(%err, src_width, src_height, "video processor rebuild failed");
                })?;
            self.rebuilds += 1;
            debug!(
                src_width,
                src_height,
                out_width = output.width,
                out_height = output.height,
                "video processor rebuilt"
            );
            self.state = Some(state);
        }
        self.state
            .as_ref()
            .ok_or_else(|| FilterError::Processor("processor state missing after rebuild".into()))
    }
}

fn build(
    session: &HwSession,
    src_width: u32,
    src_height: u32,
    stream: &FrameParams,
    output: &FrameParams,
) -> Result<ProcessorState> {
    let desc = ProcessorContentDesc {
        input_width: src_width,
        input_height: src_height,
        output_width: output.width,
        output_height: output.height,
    };
    let enumerator = session.device.create_enumerator(&desc)?;

    // validity gate only; the capability bits are not interpreted here
    session.device.query_caps(enumerator.as_ref())?;

    let processor = session.device.create_processor(&enumerator)?;
    let ctx = &session.context;

    // the accelerated decode path cannot crop at the input
    ctx.set_stream_source_rect(
        processor.as_ref(),
        Rect::sized(stream.width, stream.height),
    );
    ctx.set_stream_auto_processing(processor.as_ref(), false);
    ctx.set_stream_output_rate(processor.as_ref(), OutputRate::Normal);

    let csp = ColorSpaceDesc::from_colorimetry(stream.colorimetry);
    ctx.set_stream_color_space(processor.as_ref(), &csp);
    ctx.set_output_color_space(processor.as_ref(), &csp);

    Ok(ProcessorState {
        processor,
        enumerator,
        src_width,
        src_height,
    })
}
