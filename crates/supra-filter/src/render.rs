//! Per-frame render pipeline.
//!
//! Orchestrates one processing operation: output surface acquisition,
//! frame ingest, metadata propagation, geometry-triggered processor
//! rebuild, view binding, vendor enhancement, and submission.  Every
//! failure here costs at most the current frame: the partially built
//! output is discarded and its surface returns to the pool.

use std::sync::Arc;

use tracing::{error, warn};

use supra_core::error::Result;
use supra_core::hw::{FrameFormat, ProcessorStream};
use supra_core::types::{FrameMeta, FrameStorage, VideoFrame};

use crate::filter::SuperResFilter;
use crate::upload;

impl SuperResFilter {
    pub(crate) fn render(&mut self) -> Result<Option<Arc<VideoFrame>>> {
        let (Some(in_params), Some(out_params)) =
            (self.in_params.clone(), self.out_params.clone())
        else {
            return Ok(None);
        };

        let acquired = self
            .pool
            .acquire(out_params.format, out_params.width, out_params.height);
        let pooled = match acquired {
            Ok(pooled) => pooled,
            Err(err) => {
                warn!(%err, "failed to allocate output frame");
                return Ok(None);
            }
        };

        let Some(input) = self.queue.get(0) else {
            return Ok(None);
        };

        // GPU-resident input is used directly; planar input is staged
        // through a dynamic NV12 texture
        let (in_surface, subresource) = match &input.storage {
            FrameStorage::Gpu {
                surface,
                subresource,
            } => (surface.clone(), *subresource),
            FrameStorage::Planar(buf) => (
                upload::upload_planar(&self.session, &input.params, buf)?,
                0,
            ),
        };

        let out_surface = pooled.surface();
        let mut out = VideoFrame::gpu_with_release(
            out_params.clone(),
            FrameMeta::default(),
            out_surface.clone(),
            0,
            move || drop(pooled),
        );

        let backup_crop = out.params.crop;
        out.copy_attributes_from(&input);
        if self.opts.mode.enabled() {
            // the metadata copy overwrote the render geometry with the
            // input's; restore the configured output size and crop
            out.params.width = out_params.width;
            out.params.height = out_params.height;
            out.params.crop = backup_crop;
        }

        // geometry decisions key off the surface itself, which may be
        // padded beyond the frame parameters by the decoder
        let surface_desc = in_surface.desc();
        let state = self.vproc.ensure(
            &self.session,
            surface_desc.width,
            surface_desc.height,
            &in_params,
            &out_params,
        )?;

        self.session
            .context
            .set_stream_frame_format(state.processor.as_ref(), FrameFormat::Progressive);

        let in_view = self
            .session
            .device
            .create_input_view(in_surface.as_ref(), subresource, state.enumerator.as_ref())
            .inspect_err(|err| error!(%err, "could not create processor input view"))?;
        let out_view = self
            .session
            .device
            .create_output_view(out_surface.as_ref(), state.enumerator.as_ref())
            .inspect_err(|err| error!(%err, "could not create processor output view"))?;

        self.enhance.apply(&self.session, state.processor.as_ref());

        let stream = ProcessorStream {
            input_view: in_view.as_ref(),
            second_field: self.queue.second_field(),
        };
        self.session
            .context
            .submit(state.processor.as_ref(), out_view.as_ref(), &stream)
            .inspect_err(|err| error!(%err, "video processing submission failed"))?;

        // transient views release here; the surfaces they bound live on
        Ok(Some(Arc::new(out)))
    }
}
