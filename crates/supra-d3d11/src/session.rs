//! D3D11 video-processor session.
//!
//! Thin translation from the hardware traits in `supra-core::hw` onto
//! `ID3D11VideoDevice`/`ID3D11VideoContext`.  Device creation targets the
//! best hardware adapter visible through DXGI; WARP and the Basic Render
//! Driver are skipped because they advertise a video pipeline but fall
//! back to software paths.
//!
//! The immediate context is owned by exactly one thread; callers sharing
//! a session across pipeline stages must serialize access by convention.

use std::any::Any;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::{debug, info, warn};
use windows::Win32::Foundation::{BOOL, HMODULE, RECT};
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_UNKNOWN;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_BIND_DECODER, D3D11_BIND_RENDER_TARGET, D3D11_BIND_SHADER_RESOURCE,
    D3D11_CPU_ACCESS_WRITE, D3D11_CREATE_DEVICE_VIDEO_SUPPORT, D3D11_MAP_WRITE_DISCARD,
    D3D11_MAPPED_SUBRESOURCE, D3D11_SDK_VERSION, D3D11_TEX2D_VPIV, D3D11_TEX2D_VPOV,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT, D3D11_USAGE_DYNAMIC,
    D3D11_VIDEO_FRAME_FORMAT_INTERLACED_BOTTOM_FIELD_FIRST,
    D3D11_VIDEO_FRAME_FORMAT_INTERLACED_TOP_FIELD_FIRST, D3D11_VIDEO_FRAME_FORMAT_PROGRESSIVE,
    D3D11_VIDEO_PROCESSOR_CONTENT_DESC, D3D11_VIDEO_PROCESSOR_COLOR_SPACE,
    D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC, D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC_0,
    D3D11_VIDEO_PROCESSOR_OUTPUT_RATE_HALF, D3D11_VIDEO_PROCESSOR_OUTPUT_RATE_NORMAL,
    D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC, D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC_0,
    D3D11_VIDEO_PROCESSOR_STREAM, D3D11_VIDEO_USAGE_PLAYBACK_NORMAL,
    D3D11_VPIV_DIMENSION_TEXTURE2D, D3D11_VPOV_DIMENSION_TEXTURE2D, D3D11CreateDevice,
    ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D, ID3D11VideoContext, ID3D11VideoDevice,
    ID3D11VideoProcessor, ID3D11VideoProcessorEnumerator, ID3D11VideoProcessorInputView,
    ID3D11VideoProcessorOutputView,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_NV12, DXGI_RATIONAL, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, IDXGIAdapter, IDXGIFactory1};
use windows::core::{GUID, Interface};

use supra_core::error::{FilterError, Result};
use supra_core::hw::{
    AdapterInfo, ColorSpaceDesc, FrameFormat, GpuSurface, Guid, HwRegistry, HwSession,
    OutputRate, ProcessorCaps, ProcessorContentDesc, ProcessorEnumerator, ProcessorStream,
    ProcessorView, TextureDesc, TextureUsage, VideoContext, VideoDevice, VideoProcessor,
};
use supra_core::types::{PixelFormat, Rect};

const VENDOR_ID_MICROSOFT: u32 = 0x1414;

fn to_win_guid(guid: &Guid) -> GUID {
    GUID {
        data1: guid.data1,
        data2: guid.data2,
        data3: guid.data3,
        data4: guid.data4,
    }
}

fn adapter_description(adapter: &IDXGIAdapter) -> Option<(String, u32, u64)> {
    // SAFETY: GetDesc writes a DXGI_ADAPTER_DESC on success.
    let desc = unsafe { adapter.GetDesc() }.ok()?;
    let name = String::from_utf16_lossy(
        &desc
            .Description
            .iter()
            .take_while(|&&c| c != 0)
            .copied()
            .collect::<Vec<_>>(),
    );
    Some((name, desc.VendorId, desc.DedicatedVideoMemory as u64))
}

fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x10de => "NVIDIA",
        0x1002 | 0x1022 => "AMD",
        0x8086 => "Intel",
        VENDOR_ID_MICROSOFT => "Microsoft",
        _ => "Unknown",
    }
}

fn is_software_adapter(name: &str, vendor_id: u32) -> bool {
    vendor_id == VENDOR_ID_MICROSOFT
        && (name.contains("Basic Render") || name.contains("WARP"))
}

/// Registry over the local D3D11 video pipeline.
pub struct D3d11Registry {
    device: ID3D11Device,
    immediate: ID3D11DeviceContext,
    video_device: ID3D11VideoDevice,
    video_context: ID3D11VideoContext,
    adapters: Vec<AdapterInfo>,
}

impl D3d11Registry {
    /// Create a video-capable device on the best hardware adapter.
    pub fn new() -> Result<Self> {
        // SAFETY: standard DXGI factory creation.
        let factory: IDXGIFactory1 = unsafe { CreateDXGIFactory1() }
            .map_err(|e| FilterError::BindFailed(format!("DXGI factory: {e:?}")))?;

        let mut adapters = Vec::new();
        let mut best: Option<(IDXGIAdapter, String, u64)> = None;
        let mut index = 0u32;
        loop {
            // SAFETY: EnumAdapters fails with DXGI_ERROR_NOT_FOUND past the end.
            let adapter: IDXGIAdapter = match unsafe { factory.EnumAdapters(index) } {
                Ok(a) => a,
                Err(_) => break,
            };
            index += 1;

            let Some((name, vendor_id, vram)) = adapter_description(&adapter) else {
                continue;
            };
            if is_software_adapter(&name, vendor_id) {
                debug!(adapter = %name, "skipping software adapter");
                continue;
            }
            adapters.push(AdapterInfo {
                name: name.clone(),
                vendor: vendor_name(vendor_id).into(),
                vram_bytes: vram,
            });
            let better = best.as_ref().map(|(_, _, b)| vram > *b).unwrap_or(true);
            if better {
                best = Some((adapter, name, vram));
            }
        }

        let (adapter, name, _) = best.ok_or_else(|| {
            FilterError::BindFailed("no hardware video adapter found".into())
        })?;
        info!(adapter = %name, "creating D3D11 video device");

        let mut device = None;
        let mut immediate = None;
        // SAFETY: out pointers are valid; the adapter outlives the call.
        unsafe {
            D3D11CreateDevice(
                &adapter,
                D3D_DRIVER_TYPE_UNKNOWN,
                HMODULE::default(),
                D3D11_CREATE_DEVICE_VIDEO_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut immediate),
            )
        }
        .map_err(|e| FilterError::BindFailed(format!("D3D11CreateDevice on {name}: {e:?}")))?;

        let device = device
            .ok_or_else(|| FilterError::BindFailed("D3D11 device was null".into()))?;
        let immediate = immediate
            .ok_or_else(|| FilterError::BindFailed("D3D11 immediate context was null".into()))?;

        let video_device: ID3D11VideoDevice = device.cast().map_err(|e| {
            FilterError::BindFailed(format!("device has no ID3D11VideoDevice: {e:?}"))
        })?;
        let video_context: ID3D11VideoContext = immediate.cast().map_err(|e| {
            FilterError::BindFailed(format!("context has no ID3D11VideoContext: {e:?}"))
        })?;

        Ok(Self {
            device,
            immediate,
            video_device,
            video_context,
            adapters,
        })
    }
}

impl HwRegistry for D3d11Registry {
    fn session_for_format(&self, format: PixelFormat) -> Option<HwSession> {
        if format != PixelFormat::Nv12 {
            return None;
        }
        Some(HwSession {
            context: Arc::new(D3d11Context {
                immediate: self.immediate.clone(),
                video_context: self.video_context.clone(),
            }),
            device: Arc::new(D3d11Device {
                device: self.device.clone(),
                video_device: self.video_device.clone(),
            }),
        })
    }

    fn adapters(&self) -> Vec<AdapterInfo> {
        self.adapters.clone()
    }
}

// ─── Handle wrappers ─────────────────────────────────────────────────────

struct D3d11Surface {
    texture: ID3D11Texture2D,
    desc: TextureDesc,
}

impl GpuSurface for D3d11Surface {
    fn desc(&self) -> TextureDesc {
        self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct D3d11Enumerator {
    raw: ID3D11VideoProcessorEnumerator,
}

impl ProcessorEnumerator for D3d11Enumerator {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct D3d11Processor {
    raw: ID3D11VideoProcessor,
}

impl VideoProcessor for D3d11Processor {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct D3d11InputView {
    raw: ID3D11VideoProcessorInputView,
}

impl ProcessorView for D3d11InputView {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct D3d11OutputView {
    raw: ID3D11VideoProcessorOutputView,
}

impl ProcessorView for D3d11OutputView {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn downcast_processor<'a>(processor: &'a dyn VideoProcessor) -> &'a D3d11Processor {
    processor
        .as_any()
        .downcast_ref::<D3d11Processor>()
        .expect("processor created by another backend")
}

fn dxgi_format(format: PixelFormat) -> Result<windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT> {
    match format {
        PixelFormat::Nv12 => Ok(DXGI_FORMAT_NV12),
        PixelFormat::Yuv420p => Err(FilterError::Allocation(
            "planar 4:2:0 is not a GPU surface format".into(),
        )),
    }
}

/// Pack a [`ColorSpaceDesc`] into the D3D11 color-space bitfield
/// (bit 2: YCbCr_Matrix, bits 4-5: Nominal_Range).
fn color_space_bits(csp: &ColorSpaceDesc) -> D3D11_VIDEO_PROCESSOR_COLOR_SPACE {
    let mut bits = 0u32;
    if csp.ycbcr_matrix_bt709 {
        bits |= 1 << 2;
    }
    bits |= (csp.nominal_range & 0x3) << 4;
    D3D11_VIDEO_PROCESSOR_COLOR_SPACE { _bitfield: bits }
}

// ─── Device ──────────────────────────────────────────────────────────────

struct D3d11Device {
    device: ID3D11Device,
    video_device: ID3D11VideoDevice,
}

impl VideoDevice for D3d11Device {
    fn create_enumerator(
        &self,
        desc: &ProcessorContentDesc,
    ) -> Result<Arc<dyn ProcessorEnumerator>> {
        let content = D3D11_VIDEO_PROCESSOR_CONTENT_DESC {
            InputFrameFormat: D3D11_VIDEO_FRAME_FORMAT_PROGRESSIVE,
            InputFrameRate: DXGI_RATIONAL {
                Numerator: 0,
                Denominator: 0,
            },
            InputWidth: desc.input_width,
            InputHeight: desc.input_height,
            OutputFrameRate: DXGI_RATIONAL {
                Numerator: 0,
                Denominator: 0,
            },
            OutputWidth: desc.output_width,
            OutputHeight: desc.output_height,
            Usage: D3D11_VIDEO_USAGE_PLAYBACK_NORMAL,
        };
        // SAFETY: content desc is fully initialized above.
        let raw = unsafe { self.video_device.CreateVideoProcessorEnumerator(&content) }
            .map_err(|e| {
                FilterError::Processor(format!("CreateVideoProcessorEnumerator: {e:?}"))
            })?;
        Ok(Arc::new(D3d11Enumerator { raw }))
    }

    fn query_caps(&self, enumerator: &dyn ProcessorEnumerator) -> Result<ProcessorCaps> {
        let enumerator = enumerator
            .as_any()
            .downcast_ref::<D3d11Enumerator>()
            .ok_or_else(|| FilterError::Processor("foreign enumerator".into()))?;
        // SAFETY: enumerator handle is valid for its lifetime.
        let caps = unsafe { enumerator.raw.GetVideoProcessorCaps() }
            .map_err(|e| FilterError::Processor(format!("GetVideoProcessorCaps: {e:?}")))?;
        Ok(ProcessorCaps {
            device_caps: caps.DeviceCaps,
            feature_caps: caps.FeatureCaps,
        })
    }

    fn create_processor(
        &self,
        enumerator: &Arc<dyn ProcessorEnumerator>,
    ) -> Result<Box<dyn VideoProcessor>> {
        let raw_enum = enumerator
            .as_any()
            .downcast_ref::<D3d11Enumerator>()
            .ok_or_else(|| FilterError::Processor("foreign enumerator".into()))?;
        // SAFETY: enumerator outlives the call; rate-conversion index 0.
        let raw = unsafe { self.video_device.CreateVideoProcessor(&raw_enum.raw, 0) }
            .map_err(|e| FilterError::Processor(format!("CreateVideoProcessor: {e:?}")))?;
        Ok(Box::new(D3d11Processor { raw }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn GpuSurface>> {
        let (usage, bind, cpu) = match desc.usage {
            TextureUsage::Dynamic => (
                D3D11_USAGE_DYNAMIC,
                D3D11_BIND_DECODER.0 as u32,
                D3D11_CPU_ACCESS_WRITE.0 as u32,
            ),
            TextureUsage::RenderTarget => (
                D3D11_USAGE_DEFAULT,
                (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
                0,
            ),
        };
        let tex_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.width,
            Height: desc.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: dxgi_format(desc.format)?,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: usage,
            BindFlags: bind,
            CPUAccessFlags: cpu,
            MiscFlags: 0,
        };
        let mut texture: Option<ID3D11Texture2D> = None;
        // SAFETY: out pointer valid; no initial data.
        unsafe { self.device.CreateTexture2D(&tex_desc, None, Some(&mut texture)) }
            .map_err(|e| FilterError::Allocation(format!("CreateTexture2D: {e:?}")))?;
        let texture = texture
            .ok_or_else(|| FilterError::Allocation("CreateTexture2D returned null".into()))?;
        Ok(Arc::new(D3d11Surface {
            texture,
            desc: *desc,
        }))
    }

    fn create_input_view(
        &self,
        surface: &dyn GpuSurface,
        subresource: u32,
        enumerator: &dyn ProcessorEnumerator,
    ) -> Result<Box<dyn ProcessorView>> {
        let surface = surface
            .as_any()
            .downcast_ref::<D3d11Surface>()
            .ok_or_else(|| FilterError::View("foreign surface".into()))?;
        let enumerator = enumerator
            .as_any()
            .downcast_ref::<D3d11Enumerator>()
            .ok_or_else(|| FilterError::View("foreign enumerator".into()))?;
        let view_desc = D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC {
            FourCC: 0,
            ViewDimension: D3D11_VPIV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_VIDEO_PROCESSOR_INPUT_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_VPIV {
                    MipSlice: 0,
                    ArraySlice: subresource,
                },
            },
        };
        let mut view: Option<ID3D11VideoProcessorInputView> = None;
        // SAFETY: surface and enumerator outlive the call.
        unsafe {
            self.video_device.CreateVideoProcessorInputView(
                &surface.texture,
                &enumerator.raw,
                &view_desc,
                Some(&mut view),
            )
        }
        .map_err(|e| FilterError::View(format!("CreateVideoProcessorInputView: {e:?}")))?;
        let raw = view
            .ok_or_else(|| FilterError::View("input view was null".into()))?;
        Ok(Box::new(D3d11InputView { raw }))
    }

    fn create_output_view(
        &self,
        surface: &dyn GpuSurface,
        enumerator: &dyn ProcessorEnumerator,
    ) -> Result<Box<dyn ProcessorView>> {
        let surface = surface
            .as_any()
            .downcast_ref::<D3d11Surface>()
            .ok_or_else(|| FilterError::View("foreign surface".into()))?;
        let enumerator = enumerator
            .as_any()
            .downcast_ref::<D3d11Enumerator>()
            .ok_or_else(|| FilterError::View("foreign enumerator".into()))?;
        let view_desc = D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC {
            ViewDimension: D3D11_VPOV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_VIDEO_PROCESSOR_OUTPUT_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_VPOV { MipSlice: 0 },
            },
        };
        let mut view: Option<ID3D11VideoProcessorOutputView> = None;
        // SAFETY: surface and enumerator outlive the call.
        unsafe {
            self.video_device.CreateVideoProcessorOutputView(
                &surface.texture,
                &enumerator.raw,
                &view_desc,
                Some(&mut view),
            )
        }
        .map_err(|e| FilterError::View(format!("CreateVideoProcessorOutputView: {e:?}")))?;
        let raw = view
            .ok_or_else(|| FilterError::View("output view was null".into()))?;
        Ok(Box::new(D3d11OutputView { raw }))
    }
}

// ─── Context ─────────────────────────────────────────────────────────────

struct D3d11Context {
    immediate: ID3D11DeviceContext,
    video_context: ID3D11VideoContext,
}

impl VideoContext for D3d11Context {
    fn set_stream_source_rect(&self, processor: &dyn VideoProcessor, rect: Rect) {
        let proc = downcast_processor(processor);
        let rc = RECT {
            left: rect.x0 as i32,
            top: rect.y0 as i32,
            right: rect.x1 as i32,
            bottom: rect.y1 as i32,
        };
        // SAFETY: processor and rect are valid for the duration of the call.
        unsafe {
            self.video_context.VideoProcessorSetStreamSourceRect(
                &proc.raw,
                0,
                BOOL::from(true),
                Some(&rc),
            );
        }
    }

    fn set_stream_auto_processing(&self, processor: &dyn VideoProcessor, enabled: bool) {
        let proc = downcast_processor(processor);
        // SAFETY: plain per-stream state write.
        unsafe {
            self.video_context.VideoProcessorSetStreamAutoProcessingMode(
                &proc.raw,
                0,
                BOOL::from(enabled),
            );
        }
    }

    fn set_stream_output_rate(&self, processor: &dyn VideoProcessor, rate: OutputRate) {
        let proc = downcast_processor(processor);
        let d3d_rate = match rate {
            OutputRate::Normal => D3D11_VIDEO_PROCESSOR_OUTPUT_RATE_NORMAL,
            OutputRate::Half => D3D11_VIDEO_PROCESSOR_OUTPUT_RATE_HALF,
        };
        // SAFETY: plain per-stream state write; no custom rate.
        unsafe {
            self.video_context.VideoProcessorSetStreamOutputRate(
                &proc.raw,
                0,
                d3d_rate,
                BOOL::from(false),
                None,
            );
        }
    }

    fn set_stream_color_space(&self, processor: &dyn VideoProcessor, csp: &ColorSpaceDesc) {
        let proc = downcast_processor(processor);
        let bits = color_space_bits(csp);
        // SAFETY: plain per-stream state write.
        unsafe {
            self.video_context
                .VideoProcessorSetStreamColorSpace(&proc.raw, 0, &bits);
        }
    }

    fn set_output_color_space(&self, processor: &dyn VideoProcessor, csp: &ColorSpaceDesc) {
        let proc = downcast_processor(processor);
        let bits = color_space_bits(csp);
        // SAFETY: plain output state write.
        unsafe {
            self.video_context
                .VideoProcessorSetOutputColorSpace(&proc.raw, &bits);
        }
    }

    fn set_stream_frame_format(&self, processor: &dyn VideoProcessor, format: FrameFormat) {
        let proc = downcast_processor(processor);
        let d3d_format = match format {
            FrameFormat::Progressive => D3D11_VIDEO_FRAME_FORMAT_PROGRESSIVE,
            FrameFormat::InterlacedTopFieldFirst => {
                D3D11_VIDEO_FRAME_FORMAT_INTERLACED_TOP_FIELD_FIRST
            }
            FrameFormat::InterlacedBottomFieldFirst => {
                D3D11_VIDEO_FRAME_FORMAT_INTERLACED_BOTTOM_FIELD_FIRST
            }
        };
        // SAFETY: plain per-stream state write.
        unsafe {
            self.video_context
                .VideoProcessorSetStreamFrameFormat(&proc.raw, 0, d3d_format);
        }
    }

    fn set_stream_extension(
        &self,
        processor: &dyn VideoProcessor,
        guid: &Guid,
        payload: &[u8],
    ) -> Result<()> {
        let proc = downcast_processor(processor);
        let win_guid = to_win_guid(guid);
        // SAFETY: payload pointer/length describe a live buffer for the call.
        let hr = unsafe {
            self.video_context.VideoProcessorSetStreamExtension(
                &proc.raw,
                0,
                &win_guid,
                payload.len() as u32,
                payload.as_ptr() as *const c_void,
            )
        };
        hr.ok()
            .map_err(|e| FilterError::Extension(format!("stream extension {guid:?}: {e:?}")))
    }

    fn set_output_extension(
        &self,
        processor: &dyn VideoProcessor,
        guid: &Guid,
        payload: &[u8],
    ) -> Result<()> {
        let proc = downcast_processor(processor);
        let win_guid = to_win_guid(guid);
        // SAFETY: payload pointer/length describe a live buffer for the call.
        let hr = unsafe {
            self.video_context.VideoProcessorSetOutputExtension(
                &proc.raw,
                &win_guid,
                payload.len() as u32,
                payload.as_ptr() as *const c_void,
            )
        };
        hr.ok()
            .map_err(|e| FilterError::Extension(format!("output extension {guid:?}: {e:?}")))
    }

    fn submit(
        &self,
        processor: &dyn VideoProcessor,
        output_view: &dyn ProcessorView,
        stream: &ProcessorStream<'_>,
    ) -> Result<()> {
        let proc = downcast_processor(processor);
        let out_view = output_view
            .as_any()
            .downcast_ref::<D3d11OutputView>()
            .ok_or_else(|| FilterError::Submit("foreign output view".into()))?;
        let in_view = stream
            .input_view
            .as_any()
            .downcast_ref::<D3d11InputView>()
            .ok_or_else(|| FilterError::Submit("foreign input view".into()))?;

        let d3d_stream = D3D11_VIDEO_PROCESSOR_STREAM {
            Enable: true.into(),
            OutputIndex: 0,
            InputFrameOrField: 0,
            PastFrames: 0,
            FutureFrames: 0,
            ppPastSurfaces: std::ptr::null_mut(),
            // SAFETY: borrowed copy of the view pointer; ManuallyDrop keeps
            // the refcount untouched for the duration of the Blt.
            pInputSurface: unsafe { std::mem::transmute_copy(&in_view.raw) },
            ppFutureSurfaces: std::ptr::null_mut(),
            ppPastSurfacesRight: std::ptr::null_mut(),
            pInputSurfaceRight: ManuallyDrop::new(None),
            ppFutureSurfacesRight: std::ptr::null_mut(),
        };
        // SAFETY: views and processor are alive; single-stream submission.
        unsafe {
            self.video_context.VideoProcessorBlt(
                &proc.raw,
                &out_view.raw,
                u32::from(stream.second_field),
                &[d3d_stream],
            )
        }
        .map_err(|e| FilterError::Submit(format!("VideoProcessorBlt: {e:?}")))
    }

    fn write_surface(
        &self,
        surface: &dyn GpuSurface,
        writer: &mut dyn FnMut(&mut [u8], usize) -> Result<()>,
    ) -> Result<()> {
        let surface = surface
            .as_any()
            .downcast_ref::<D3d11Surface>()
            .ok_or_else(|| FilterError::Upload("foreign surface".into()))?;
        if surface.desc.usage != TextureUsage::Dynamic {
            return Err(FilterError::Upload("surface is not CPU-writable".into()));
        }

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        // SAFETY: dynamic texture with CPU write access; WRITE_DISCARD
        // invalidates previous contents.
        unsafe {
            self.immediate.Map(
                &surface.texture,
                0,
                D3D11_MAP_WRITE_DISCARD,
                0,
                Some(&mut mapped),
            )
        }
        .map_err(|e| FilterError::Upload(format!("Map: {e:?}")))?;

        // SAFETY: DepthPitch covers the whole mapped subresource.
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(mapped.pData as *mut u8, mapped.DepthPitch as usize)
        };
        let result = writer(bytes, mapped.RowPitch as usize);
        if let Err(err) = &result {
            warn!(%err, "surface writer failed; unmapping anyway");
        }
        // SAFETY: balances the Map above.
        unsafe { self.immediate.Unmap(&surface.texture, 0) };
        result
    }
}
