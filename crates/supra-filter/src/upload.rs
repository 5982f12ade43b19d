//! CPU-to-GPU frame ingest.
//!
//! Decoded frames that are still CPU-resident (planar 4:2:0) are staged
//! into a dynamic NV12 texture: the luma plane is copied row by row and
//! the two chroma planes are interleaved sample pair by sample pair, both
//! honoring the destination row pitch, which may exceed the frame width.

use std::sync::Arc;

use supra_core::error::{FilterError, Result};
use supra_core::hw::{GpuSurface, HwSession, TextureDesc, TextureUsage};
use supra_core::types::{FrameParams, PixelFormat, PlanarBuf};

/// Synthesize an NV12 GPU surface from planar 4:2:0 frame data.
pub fn upload_planar(
    session: &HwSession,
    params: &FrameParams,
    buf: &PlanarBuf,
) -> Result<Arc<dyn GpuSurface>> {
    let desc = TextureDesc {
        width: params.width,
        height: params.height,
        format: PixelFormat::Nv12,
        usage: TextureUsage::Dynamic,
    };
    let surface = session.device.create_texture(&desc)?;

    let width = params.width as usize;
    let height = params.height as usize;

    session.context.write_surface(surface.as_ref(), &mut |dst, pitch| {
        let needed = pitch * height * 3 / 2;
        if dst.len() < needed {
            return Err(FilterError::Upload(format!(
                "mapped surface too small: {} < {needed}",
                dst.len()
            )));
        }
        if pitch < width {
            return Err(FilterError::Upload(format!(
                "row pitch {pitch} below frame width {width}"
            )));
        }

        for row in 0..height {
            let src = &buf.planes[0][row * buf.strides[0]..][..width];
            dst[row * pitch..row * pitch + width].copy_from_slice(src);
        }

        // chroma samples interleave U,V after the luma region
        let chroma_base = pitch * height;
        for row in 0..height / 2 {
            let u = &buf.planes[1][row * buf.strides[1]..];
            let v = &buf.planes[2][row * buf.strides[2]..];
            let out = &mut dst[chroma_base + row * pitch..][..width];
            for col in 0..width / 2 {
                out[2 * col] = u[col];
                out[2 * col + 1] = v[col];
            }
        }
        Ok(())
    })?;

    Ok(surface)
}
