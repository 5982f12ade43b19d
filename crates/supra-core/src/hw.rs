//! Hardware abstraction for the platform video-processing unit.
//!
//! These traits are the neutral seam between the filter logic and the
//! vendor video API: `supra-d3d11` implements them over the D3D11 video
//! pipeline on Windows and provides a scriptable mock everywhere.  The
//! trait surface mirrors the underlying API one-to-one so the real backend
//! stays a thin translation layer.
//!
//! The video context is not safe for concurrent use; one thread owns a
//! session at a time and no locking happens behind these traits.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Colorimetry, ColorRange, ColorSystem, PixelFormat, Rect};

/// 16-byte vendor interface identifier for private driver extensions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

/// How a texture will be accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureUsage {
    /// CPU-writable staging texture for software frame upload.
    Dynamic,
    /// Render-target and shader-resource capable output surface.
    RenderTarget,
}

/// Creation parameters for a GPU texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
}

/// Geometry the capability enumerator is created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessorContentDesc {
    pub input_width: u32,
    pub input_height: u32,
    pub output_width: u32,
    pub output_height: u32,
}

/// Capability bits reported by the enumerator.  Queried as a validity
/// check before processor creation; the filter does not interpret them.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessorCaps {
    pub device_caps: u32,
    pub feature_caps: u32,
}

/// Scan layout of a submitted stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Progressive,
    InterlacedTopFieldFirst,
    InterlacedBottomFieldFirst,
}

/// Output frame-rate conversion mode of the processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputRate {
    /// One output per input; no rate conversion.
    Normal,
    Half,
}

/// Color-space descriptor applied to the input stream and the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorSpaceDesc {
    /// Set for every matrix except BT.601.
    pub ycbcr_matrix_bt709: bool,
    /// 1 for limited (studio) range, 2 for full range.
    pub nominal_range: u32,
}

impl ColorSpaceDesc {
    pub fn from_colorimetry(c: Colorimetry) -> Self {
        Self {
            ycbcr_matrix_bt709: c.system != ColorSystem::Bt601,
            nominal_range: match c.range {
                ColorRange::Limited => 1,
                ColorRange::Full => 2,
            },
        }
    }
}

/// Opaque handle to pixel storage in graphics memory.
pub trait GpuSurface {
    /// Actual dimensions/format/usage of the underlying texture.  Output
    /// geometry decisions key off these, not the frame parameters.
    fn desc(&self) -> TextureDesc;
    fn as_any(&self) -> &dyn Any;
}

/// Capability enumerator for a fixed input/output geometry.
pub trait ProcessorEnumerator {
    fn as_any(&self) -> &dyn Any;
}

/// Instantiated hardware video processor.
pub trait VideoProcessor {
    fn as_any(&self) -> &dyn Any;
}

/// Transient per-frame view binding a surface to the processor.  Dropping
/// the view releases it; the underlying surface is unaffected.
pub trait ProcessorView {
    fn as_any(&self) -> &dyn Any;
}

/// Single-stream submission descriptor.
pub struct ProcessorStream<'a> {
    pub input_view: &'a dyn ProcessorView,
    /// Field-parity flag from the frame queue.  Always false under a
    /// zero-reference window; kept in the contract for interlaced hosts.
    pub second_field: bool,
}

/// Creation half of the video API (device-scoped objects).
pub trait VideoDevice {
    fn create_enumerator(&self, desc: &ProcessorContentDesc)
    -> Result<Arc<dyn ProcessorEnumerator>>;

    fn query_caps(&self, enumerator: &dyn ProcessorEnumerator) -> Result<ProcessorCaps>;

    fn create_processor(
        &self,
        enumerator: &Arc<dyn ProcessorEnumerator>,
    ) -> Result<Box<dyn VideoProcessor>>;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn GpuSurface>>;

    fn create_input_view(
        &self,
        surface: &dyn GpuSurface,
        subresource: u32,
        enumerator: &dyn ProcessorEnumerator,
    ) -> Result<Box<dyn ProcessorView>>;

    fn create_output_view(
        &self,
        surface: &dyn GpuSurface,
        enumerator: &dyn ProcessorEnumerator,
    ) -> Result<Box<dyn ProcessorView>>;
}

/// Per-stream configuration and submission half of the video API.
pub trait VideoContext {
    fn set_stream_source_rect(&self, processor: &dyn VideoProcessor, rect: Rect);

    /// Driver auto-tuning heuristics must not override explicit settings.
    fn set_stream_auto_processing(&self, processor: &dyn VideoProcessor, enabled: bool);

    fn set_stream_output_rate(&self, processor: &dyn VideoProcessor, rate: OutputRate);

    fn set_stream_color_space(&self, processor: &dyn VideoProcessor, csp: &ColorSpaceDesc);

    fn set_output_color_space(&self, processor: &dyn VideoProcessor, csp: &ColorSpaceDesc);

    fn set_stream_frame_format(&self, processor: &dyn VideoProcessor, format: FrameFormat);

    /// Private per-stream driver extension, addressed by vendor GUID with
    /// an opaque payload.
    fn set_stream_extension(
        &self,
        processor: &dyn VideoProcessor,
        guid: &Guid,
        payload: &[u8],
    ) -> Result<()>;

    /// Private output driver extension, addressed by vendor GUID.
    fn set_output_extension(
        &self,
        processor: &dyn VideoProcessor,
        guid: &Guid,
        payload: &[u8],
    ) -> Result<()>;

    /// Submit one processing operation.  Synchronous from the caller's
    /// perspective even if the driver queues the work.
    fn submit(
        &self,
        processor: &dyn VideoProcessor,
        output_view: &dyn ProcessorView,
        stream: &ProcessorStream<'_>,
    ) -> Result<()>;

    /// Map a dynamic texture for writing and hand the mapped bytes plus
    /// the destination row pitch to `writer`.  The pitch may exceed the
    /// logical row width; `writer` must honor it.  Unmaps on return.
    fn write_surface(
        &self,
        surface: &dyn GpuSurface,
        writer: &mut dyn FnMut(&mut [u8], usize) -> Result<()>,
    ) -> Result<()>;
}

/// One bound device/context pair acquired from the registry.
///
/// Field order is the release order: the context drops before the device.
#[derive(Clone)]
pub struct HwSession {
    pub context: Arc<dyn VideoContext>,
    pub device: Arc<dyn VideoDevice>,
}

/// Description of one video adapter, for probing.
#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: String,
    pub vram_bytes: u64,
}

/// Host hardware registry: hands out sessions bound to a GPU image format.
pub trait HwRegistry {
    /// A session whose device can operate on surfaces of `format`, or
    /// `None` when no such device exists (bind-time failure).
    fn session_for_format(&self, format: PixelFormat) -> Option<HwSession>;

    /// Adapters visible to this registry.
    fn adapters(&self) -> Vec<AdapterInfo>;
}
