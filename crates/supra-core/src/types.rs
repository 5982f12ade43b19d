//! Frame, colorimetry, and image types shared across the workspace.
//!
//! A [`VideoFrame`] is either CPU-resident planar 4:2:0 or a GPU surface
//! reference.  Frames are shared as `Arc<VideoFrame>`; an optional release
//! callback runs when the last reference drops, which is how pooled output
//! surfaces find their way back to the recycle list.

use std::fmt;
use std::sync::Arc;

use crate::hw::GpuSurface;

/// Pixel storage layout of a frame or surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar 4:2:0, three CPU-resident planes (Y, U, V).
    Yuv420p,
    /// Packed luma plane followed by interleaved chroma samples.  The
    /// layout used by GPU video-processor surfaces.
    Nv12,
}

/// YCbCr matrix coefficients of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorSystem {
    Bt601,
    #[default]
    Bt709,
    Bt2020,
}

/// Quantization range of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorRange {
    #[default]
    Limited,
    Full,
}

/// Color metadata carried with stream parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Colorimetry {
    pub system: ColorSystem,
    pub range: ColorRange,
}

/// Axis-aligned pixel rectangle, `x1`/`y1` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    /// Full-frame rectangle anchored at the origin.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})x[{},{})", self.x0, self.x1, self.y0, self.y1)
    }
}

/// Image parameters of one side of the stream (input or output).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameParams {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub colorimetry: Colorimetry,
    pub crop: Rect,
}

impl FrameParams {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            colorimetry: Colorimetry::default(),
            crop: Rect::sized(width, height),
        }
    }
}

/// Presentation metadata carried from input to output frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameMeta {
    /// Presentation timestamp in microseconds.
    pub pts: i64,
}

/// CPU-resident planar pixel data (one `Vec` per plane).
#[derive(Clone, Debug)]
pub struct PlanarBuf {
    pub planes: [Vec<u8>; 3],
    pub strides: [usize; 3],
}

impl PlanarBuf {
    /// Allocate zeroed 4:2:0 planes with tight strides.
    pub fn alloc_yuv420(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self {
            planes: [
                vec![0u8; w * h],
                vec![0u8; (w / 2) * (h / 2)],
                vec![0u8; (w / 2) * (h / 2)],
            ],
            strides: [w, w / 2, w / 2],
        }
    }
}

/// Pixel storage of a [`VideoFrame`].
pub enum FrameStorage {
    /// CPU-resident planar data.
    Planar(PlanarBuf),
    /// GPU surface reference plus the sub-resource (array slice) index
    /// embedded by the decoder.
    Gpu {
        surface: Arc<dyn GpuSurface>,
        subresource: u32,
    },
}

impl fmt::Debug for FrameStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planar(_) => f.write_str("Planar"),
            Self::Gpu { subresource, .. } => {
                write!(f, "Gpu {{ subresource: {subresource} }}")
            }
        }
    }
}

/// One decoded or rendered video frame.
pub struct VideoFrame {
    pub params: FrameParams,
    pub meta: FrameMeta,
    pub storage: FrameStorage,
    release: Option<Box<dyn FnOnce()>>,
}

impl VideoFrame {
    /// CPU-resident planar frame.
    pub fn planar(params: FrameParams, meta: FrameMeta, buf: PlanarBuf) -> Self {
        Self {
            params,
            meta,
            storage: FrameStorage::Planar(buf),
            release: None,
        }
    }

    /// GPU-resident frame referencing an existing surface.
    pub fn gpu(
        params: FrameParams,
        meta: FrameMeta,
        surface: Arc<dyn GpuSurface>,
        subresource: u32,
    ) -> Self {
        Self {
            params,
            meta,
            storage: FrameStorage::Gpu {
                surface,
                subresource,
            },
            release: None,
        }
    }

    /// GPU-resident frame with a callback that runs when the frame is
    /// destroyed (pooled surfaces use this to return to the recycle list).
    pub fn gpu_with_release(
        params: FrameParams,
        meta: FrameMeta,
        surface: Arc<dyn GpuSurface>,
        subresource: u32,
        release: impl FnOnce() + 'static,
    ) -> Self {
        Self {
            params,
            meta,
            storage: FrameStorage::Gpu {
                surface,
                subresource,
            },
            release: Some(Box::new(release)),
        }
    }

    /// Copy presentation attributes (timestamps, colorimetry, size, crop)
    /// from another frame, the way a pass-through copy would.
    ///
    /// Note this overwrites the destination dimensions and crop; callers
    /// that rendered to a different output size must re-apply them.
    pub fn copy_attributes_from(&mut self, src: &VideoFrame) {
        self.meta = src.meta;
        self.params.colorimetry = src.params.colorimetry;
        self.params.width = src.params.width;
        self.params.height = src.params.height;
        self.params.crop = src.params.crop;
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("params", &self.params)
            .field("meta", &self.meta)
            .field("storage", &self.storage)
            .finish()
    }
}

impl Drop for VideoFrame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
