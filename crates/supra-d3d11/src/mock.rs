//! In-memory mock video session.
//!
//! Implements the full hardware trait surface over plain byte buffers,
//! records every configuration call, and lets tests script failures at
//! each step.  Also backs the CLI synthetic runner on hosts without a
//! real video device.
//!
//! Mock textures carry a deliberately padded row pitch (aligned to
//! [`MockState::pitch_align`]) so stride-handling bugs in upload code
//! surface in tests.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

use supra_core::error::{FilterError, Result};
use supra_core::hw::{
    AdapterInfo, ColorSpaceDesc, FrameFormat, GpuSurface, Guid, HwRegistry, HwSession,
    OutputRate, ProcessorCaps, ProcessorContentDesc, ProcessorEnumerator, ProcessorStream,
    ProcessorView, TextureDesc, TextureUsage, VideoContext, VideoDevice, VideoProcessor,
};
use supra_core::types::{PixelFormat, Rect};

/// One recorded call against the mock context.
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    SourceRect(Rect),
    AutoProcessing(bool),
    OutputRate(OutputRate),
    StreamColorSpace(ColorSpaceDesc),
    OutputColorSpace(ColorSpaceDesc),
    FrameFormat(FrameFormat),
    StreamExtension { guid: Guid, payload: Vec<u8> },
    OutputExtension { guid: Guid, payload: Vec<u8> },
    Submit { second_field: bool },
}

/// Scripted failure switches, one per fallible operation.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockFailures {
    pub create_enumerator: bool,
    pub query_caps: bool,
    pub create_processor: bool,
    pub create_texture: bool,
    pub input_view: bool,
    pub output_view: bool,
    pub submit: bool,
    pub stream_extension: bool,
    /// Fail the n-th `set_output_extension` call (1-based), counted over
    /// the session lifetime.
    pub output_extension_on: Option<u64>,
}

/// Monotonic creation/submission counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockCounters {
    pub enumerators: u64,
    pub processors: u64,
    pub textures: u64,
    pub input_views: u64,
    pub output_views: u64,
    pub submits: u64,
    pub uploads: u64,
    pub output_extensions: u64,
}

/// Shared mutable state behind every mock object.
pub struct MockState {
    pub failures: MockFailures,
    pub counters: MockCounters,
    pub calls: Vec<MockCall>,
    pub textures: Vec<Arc<MockSurface>>,
    /// Row-pitch alignment applied to mock textures.
    pub pitch_align: usize,
    /// When false the registry has no device for any format.
    pub available: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            failures: MockFailures::default(),
            counters: MockCounters::default(),
            calls: Vec::new(),
            textures: Vec::new(),
            pitch_align: 64,
            available: true,
        }
    }
}

/// Handle to the mock hardware; doubles as the registry.
#[derive(Clone, Default)]
pub struct MockHw {
    state: Arc<Mutex<MockState>>,
}

impl MockHw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the shared state (failure flags, pitch alignment, ...).
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn set_failures(&self, f: impl FnOnce(&mut MockFailures)) {
        f(&mut self.lock().failures);
    }

    pub fn counters(&self) -> MockCounters {
        self.lock().counters
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn textures(&self) -> Vec<Arc<MockSurface>> {
        self.lock().textures.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl HwRegistry for MockHw {
    fn session_for_format(&self, format: PixelFormat) -> Option<HwSession> {
        let state = self.lock();
        if !state.available || format != PixelFormat::Nv12 {
            return None;
        }
        drop(state);
        Some(HwSession {
            context: Arc::new(MockContext {
                state: self.state.clone(),
            }),
            device: Arc::new(MockDevice {
                state: self.state.clone(),
            }),
        })
    }

    fn adapters(&self) -> Vec<AdapterInfo> {
        if !self.lock().available {
            return Vec::new();
        }
        vec![AdapterInfo {
            name: "Mock Video Adapter".into(),
            vendor: "supra".into(),
            vram_bytes: 256 * 1024 * 1024,
        }]
    }
}

// ─── Surfaces ────────────────────────────────────────────────────────────

/// Mock texture: a padded NV12 byte buffer.
pub struct MockSurface {
    desc: TextureDesc,
    row_pitch: usize,
    data: Mutex<Vec<u8>>,
}

impl MockSurface {
    fn new(desc: TextureDesc, pitch_align: usize) -> Self {
        let pitch = (desc.width as usize).div_ceil(pitch_align) * pitch_align;
        let len = pitch * desc.height as usize * 3 / 2;
        Self {
            desc,
            row_pitch: pitch,
            data: Mutex::new(vec![0u8; len]),
        }
    }

    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Copy of the current surface bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl GpuSurface for MockSurface {
    fn desc(&self) -> TextureDesc {
        self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─── Processor objects ───────────────────────────────────────────────────

struct MockEnumerator {
    desc: ProcessorContentDesc,
}

impl ProcessorEnumerator for MockEnumerator {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MockProcessor {
    id: u64,
}

impl VideoProcessor for MockProcessor {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MockView;

impl ProcessorView for MockView {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─── Device ──────────────────────────────────────────────────────────────

struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl VideoDevice for MockDevice {
    fn create_enumerator(
        &self,
        desc: &ProcessorContentDesc,
    ) -> Result<Arc<dyn ProcessorEnumerator>> {
        let mut state = self.lock();
        if state.failures.create_enumerator {
            return Err(FilterError::Processor("mock: enumerator refused".into()));
        }
        state.counters.enumerators += 1;
        Ok(Arc::new(MockEnumerator { desc: *desc }))
    }

    fn query_caps(&self, enumerator: &dyn ProcessorEnumerator) -> Result<ProcessorCaps> {
        let state = self.lock();
        if state.failures.query_caps {
            return Err(FilterError::Processor("mock: caps query refused".into()));
        }
        let mock = enumerator
            .as_any()
            .downcast_ref::<MockEnumerator>()
            .ok_or_else(|| FilterError::Processor("mock: foreign enumerator".into()))?;
        let _ = mock.desc;
        Ok(ProcessorCaps {
            device_caps: 0x1,
            feature_caps: 0x1,
        })
    }

    fn create_processor(
        &self,
        enumerator: &Arc<dyn ProcessorEnumerator>,
    ) -> Result<Box<dyn VideoProcessor>> {
        let mut state = self.lock();
        if state.failures.create_processor {
            return Err(FilterError::Processor("mock: processor refused".into()));
        }
        enumerator
            .as_any()
            .downcast_ref::<MockEnumerator>()
            .ok_or_else(|| FilterError::Processor("mock: foreign enumerator".into()))?;
        state.counters.processors += 1;
        Ok(Box::new(MockProcessor {
            id: state.counters.processors,
        }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn GpuSurface>> {
        let mut state = self.lock();
        if state.failures.create_texture {
            return Err(FilterError::Allocation("mock: texture refused".into()));
        }
        if desc.format != PixelFormat::Nv12 {
            return Err(FilterError::Allocation(format!(
                "mock: unsupported texture format {:?}",
                desc.format
            )));
        }
        state.counters.textures += 1;
        let surface = Arc::new(MockSurface::new(*desc, state.pitch_align));
        state.textures.push(surface.clone());
        Ok(surface)
    }

    fn create_input_view(
        &self,
        surface: &dyn GpuSurface,
        _subresource: u32,
        _enumerator: &dyn ProcessorEnumerator,
    ) -> Result<Box<dyn ProcessorView>> {
        let mut state = self.lock();
        if state.failures.input_view {
            return Err(FilterError::View("mock: input view refused".into()));
        }
        surface
            .as_any()
            .downcast_ref::<MockSurface>()
            .ok_or_else(|| FilterError::View("mock: foreign surface".into()))?;
        state.counters.input_views += 1;
        Ok(Box::new(MockView))
    }

    fn create_output_view(
        &self,
        surface: &dyn GpuSurface,
        _enumerator: &dyn ProcessorEnumerator,
    ) -> Result<Box<dyn ProcessorView>> {
        let mut state = self.lock();
        if state.failures.output_view {
            return Err(FilterError::View("mock: output view refused".into()));
        }
        surface
            .as_any()
            .downcast_ref::<MockSurface>()
            .ok_or_else(|| FilterError::View("mock: foreign surface".into()))?;
        state.counters.output_views += 1;
        Ok(Box::new(MockView))
    }
}

// ─── Context ─────────────────────────────────────────────────────────────

struct MockContext {
    state: Arc<Mutex<MockState>>,
}

impl MockContext {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: MockCall) {
        self.lock().calls.push(call);
    }
}

impl VideoContext for MockContext {
    fn set_stream_source_rect(&self, processor: &dyn VideoProcessor, rect: Rect) {
        debug_assert!(processor.as_any().downcast_ref::<MockProcessor>().is_some());
        self.record(MockCall::SourceRect(rect));
    }

    fn set_stream_auto_processing(&self, _processor: &dyn VideoProcessor, enabled: bool) {
        self.record(MockCall::AutoProcessing(enabled));
    }

    fn set_stream_output_rate(&self, _processor: &dyn VideoProcessor, rate: OutputRate) {
        self.record(MockCall::OutputRate(rate));
    }

    fn set_stream_color_space(&self, _processor: &dyn VideoProcessor, csp: &ColorSpaceDesc) {
        self.record(MockCall::StreamColorSpace(*csp));
    }

    fn set_output_color_space(&self, _processor: &dyn VideoProcessor, csp: &ColorSpaceDesc) {
        self.record(MockCall::OutputColorSpace(*csp));
    }

    fn set_stream_frame_format(&self, _processor: &dyn VideoProcessor, format: FrameFormat) {
        self.record(MockCall::FrameFormat(format));
    }

    fn set_stream_extension(
        &self,
        _processor: &dyn VideoProcessor,
        guid: &Guid,
        payload: &[u8],
    ) -> Result<()> {
        let mut state = self.lock();
        if state.failures.stream_extension {
            return Err(FilterError::Extension("mock: stream extension refused".into()));
        }
        state.calls.push(MockCall::StreamExtension {
            guid: *guid,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn set_output_extension(
        &self,
        _processor: &dyn VideoProcessor,
        guid: &Guid,
        payload: &[u8],
    ) -> Result<()> {
        let mut state = self.lock();
        state.counters.output_extensions += 1;
        if state.failures.output_extension_on == Some(state.counters.output_extensions) {
            return Err(FilterError::Extension("mock: output extension refused".into()));
        }
        state.calls.push(MockCall::OutputExtension {
            guid: *guid,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn submit(
        &self,
        processor: &dyn VideoProcessor,
        _output_view: &dyn ProcessorView,
        stream: &ProcessorStream<'_>,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.failures.submit {
            return Err(FilterError::Submit("mock: submission refused".into()));
        }
        let proc = processor
            .as_any()
            .downcast_ref::<MockProcessor>()
            .ok_or_else(|| FilterError::Submit("mock: foreign processor".into()))?;
        let _ = proc.id;
        state.counters.submits += 1;
        state.calls.push(MockCall::Submit {
            second_field: stream.second_field,
        });
        Ok(())
    }

    fn write_surface(
        &self,
        surface: &dyn GpuSurface,
        writer: &mut dyn FnMut(&mut [u8], usize) -> Result<()>,
    ) -> Result<()> {
        let mock = surface
            .as_any()
            .downcast_ref::<MockSurface>()
            .ok_or_else(|| FilterError::Upload("mock: foreign surface".into()))?;
        if mock.desc.usage != TextureUsage::Dynamic {
            return Err(FilterError::Upload(
                "mock: surface is not CPU-writable".into(),
            ));
        }
        self.lock().counters.uploads += 1;
        let mut data = mock.data.lock().unwrap();
        writer(&mut data, mock.row_pitch)
    }
}
