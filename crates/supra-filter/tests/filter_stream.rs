//! End-to-end filter behavior against the mock video session.

use std::sync::Arc;

use supra_core::error::FilterError;
use supra_core::hw::{FrameFormat, GpuSurface, HwRegistry, OutputRate, TextureDesc, TextureUsage};
use supra_core::options::{ScaleTarget, SuperResMode, SuperResOptions};
use supra_core::types::{
    FrameMeta, FrameParams, PixelFormat, PlanarBuf, Rect, VideoFrame,
};
use supra_d3d11::mock::{MockCall, MockHw};
use supra_filter::SuperResFilter;
use supra_filter::enhance::{INTEL_VPE_INTERFACE, NVIDIA_PPE_INTERFACE};

fn sr_options(mode: SuperResMode, scale: ScaleTarget) -> SuperResOptions {
    SuperResOptions { mode, scale }
}

fn planar_frame(width: u32, height: u32, pts: i64) -> Arc<VideoFrame> {
    Arc::new(VideoFrame::planar(
        FrameParams::new(PixelFormat::Yuv420p, width, height),
        FrameMeta { pts },
        PlanarBuf::alloc_yuv420(width, height),
    ))
}

/// Decoder-style GPU frame; the surface may be padded past the frame size.
fn gpu_frame(hw: &MockHw, width: u32, height: u32, surface_h: u32, pts: i64) -> Arc<VideoFrame> {
    let session = hw.session_for_format(PixelFormat::Nv12).unwrap();
    let surface = session
        .device
        .create_texture(&TextureDesc {
            width,
            height: surface_h,
            format: PixelFormat::Nv12,
            usage: TextureUsage::Dynamic,
        })
        .unwrap();
    Arc::new(VideoFrame::gpu(
        FrameParams::new(PixelFormat::Nv12, width, height),
        FrameMeta { pts },
        surface,
        0,
    ))
}

fn run_cycle(filter: &mut SuperResFilter, frame: Arc<VideoFrame>) -> Option<Arc<VideoFrame>> {
    filter.push_frame(frame).unwrap();
    filter.process().unwrap();
    filter.take_output()
}

#[test]
fn bind_fails_without_a_device() {
    let hw = MockHw::new();
    hw.with_state(|s| s.available = false);
    let err = SuperResFilter::new(SuperResOptions::default(), &hw).unwrap_err();
    assert!(matches!(err, FilterError::BindFailed(_)));
}

#[test]
fn odd_dimensions_fail_the_stream_before_any_gpu_allocation() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    filter.push_frame(planar_frame(641, 360, 0)).unwrap();
    let err = filter.process().unwrap_err();
    assert!(matches!(err, FilterError::StreamFailed(_)));
    assert!(filter.is_failed());
    assert_eq!(hw.counters().textures, 0, "no GPU allocation may happen");
    assert_eq!(filter.pool_stats().allocated, 0);

    // terminal: further cycles keep failing
    assert!(filter.process().is_err());
}

#[test]
fn mode_off_passes_references_through_with_zero_gpu_work() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(SuperResOptions::default(), &hw).unwrap();

    for pts in 0..8 {
        let input = planar_frame(640, 360, pts);
        let output = run_cycle(&mut filter, input.clone()).expect("pass-through frame");
        assert!(
            Arc::ptr_eq(&input, &output),
            "pass-through must be a reference to the input image"
        );
    }

    assert_eq!(filter.counters().passed, 8);
    assert_eq!(filter.counters().rendered, 0);
    assert_eq!(filter.pool_stats().allocated, 0);
    assert_eq!(hw.counters().textures, 0);
    assert_eq!(hw.counters().submits, 0);
}

#[test]
fn renders_upscaled_frames_with_stable_processor() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    for pts in 0..5 {
        let frame = gpu_frame(&hw, 1280, 720, 720, pts);
        let output = run_cycle(&mut filter, frame).expect("rendered frame");
        assert_eq!(output.params.width, 1920);
        assert_eq!(output.params.height, 1080);
        assert_eq!(output.params.format, PixelFormat::Nv12);
        assert_eq!(output.meta.pts, pts);
        assert_eq!(output.params.crop, Rect::sized(1920, 1080));
    }

    // one rebuild for five frames of stable geometry
    assert_eq!(filter.rebuild_count(), 1);
    assert_eq!(hw.counters().processors, 1);
    assert_eq!(hw.counters().submits, 5);
    assert_eq!(filter.counters().rendered, 5);
}

#[test]
fn first_render_configures_the_processor_in_order() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0)).expect("rendered frame");

    let calls = hw.calls();
    assert_eq!(calls[0], MockCall::SourceRect(Rect::sized(1280, 720)));
    assert_eq!(calls[1], MockCall::AutoProcessing(false));
    assert_eq!(calls[2], MockCall::OutputRate(OutputRate::Normal));
    match (&calls[3], &calls[4]) {
        (MockCall::StreamColorSpace(stream), MockCall::OutputColorSpace(output)) => {
            // BT.709 limited: matrix flag set, nominal range 1
            assert!(stream.ycbcr_matrix_bt709);
            assert_eq!(stream.nominal_range, 1);
            assert_eq!(stream, output);
        }
        other => panic!("unexpected color-space calls: {other:?}"),
    }
    assert_eq!(calls[5], MockCall::FrameFormat(FrameFormat::Progressive));
    assert!(matches!(
        &calls[6],
        MockCall::StreamExtension { guid, .. } if *guid == NVIDIA_PPE_INTERFACE
    ));
    assert_eq!(
        calls[7],
        MockCall::Submit {
            second_field: false
        }
    );
}

#[test]
fn surface_padding_triggers_rebuild_without_reinit() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0)).unwrap();
    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 1)).unwrap();
    assert_eq!(filter.rebuild_count(), 1);

    // same stream parameters, but the decoder padded the surface height
    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 768, 2)).unwrap();
    assert_eq!(filter.rebuild_count(), 2);
}

#[test]
fn geometry_change_rebuilds_processor_and_pool() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    run_cycle(&mut filter, gpu_frame(&hw, 640, 360, 360, 0)).unwrap();
    let stats = filter.pool_stats();
    assert_eq!(stats.allocated, 1);

    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 1)).unwrap();
    assert_eq!(filter.rebuild_count(), 2);
    let stats = filter.pool_stats();
    assert_eq!(
        stats.allocated, 2,
        "no previously issued surface may be reused after a reinit"
    );
    assert_eq!(stats.hits, 0);
}

#[test]
fn pool_recycles_surfaces_across_stable_frames() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    for pts in 0..6 {
        let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, pts));
        drop(output);
    }

    let stats = filter.pool_stats();
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.hits, 5);
    assert_eq!(stats.recycled, 6);
}

#[test]
fn vendor_adapter_failure_does_not_cost_the_frame() {
    let hw = MockHw::new();
    hw.set_failures(|f| f.stream_extension = true);
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0));
    assert!(output.is_some(), "frame must complete without enhancement");
    assert_eq!(hw.counters().submits, 1);
    assert_eq!(filter.counters().rendered, 1);
}

#[test]
fn intel_negotiation_runs_version_mode_scaling() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Intel, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0)).expect("rendered frame");

    let intel_calls: Vec<_> = hw
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                MockCall::OutputExtension { guid, .. } | MockCall::StreamExtension { guid, .. }
                    if *guid == INTEL_VPE_INTERFACE
            )
        })
        .collect();
    assert_eq!(intel_calls.len(), 3);
    assert!(matches!(
        &intel_calls[0],
        MockCall::OutputExtension { payload, .. } if payload[0..4] == 0x01u32.to_le_bytes()
    ));
    assert!(matches!(
        &intel_calls[1],
        MockCall::OutputExtension { payload, .. } if payload[0..4] == 0x20u32.to_le_bytes()
    ));
    assert!(matches!(
        &intel_calls[2],
        MockCall::StreamExtension { payload, .. } if payload[0..4] == 0x37u32.to_le_bytes()
    ));
}

#[test]
fn intel_negotiation_aborts_on_first_failure() {
    let hw = MockHw::new();
    hw.set_failures(|f| f.output_extension_on = Some(1));
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Intel, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0));
    assert!(output.is_some(), "enhancement failure never fails the frame");

    let intel_calls = hw
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                MockCall::OutputExtension { guid, .. } | MockCall::StreamExtension { guid, .. }
                    if *guid == INTEL_VPE_INTERFACE
            )
        })
        .count();
    assert_eq!(
        intel_calls, 0,
        "remaining negotiation steps must not run after the first failure"
    );
}

#[test]
fn submission_failure_drops_the_frame_but_keeps_the_stream() {
    let hw = MockHw::new();
    hw.set_failures(|f| f.submit = true);
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0));
    assert!(output.is_none());
    assert_eq!(filter.counters().skipped, 1);
    assert!(!filter.is_failed());

    hw.set_failures(|f| f.submit = false);
    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 1));
    assert!(output.is_some(), "the next cycle is the implicit retry");
}

#[test]
fn rebuild_failure_is_retried_next_frame() {
    let hw = MockHw::new();
    hw.set_failures(|f| f.create_enumerator = true);
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0));
    assert!(output.is_none());
    assert_eq!(filter.rebuild_count(), 0);

    hw.set_failures(|f| f.create_enumerator = false);
    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 1));
    assert!(output.is_some());
    assert_eq!(filter.rebuild_count(), 1);
}

#[test]
fn view_failure_drops_the_frame_only() {
    let hw = MockHw::new();
    hw.set_failures(|f| f.input_view = true);
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0));
    assert!(output.is_none());
    assert!(!filter.is_failed());
    assert_eq!(hw.counters().submits, 0);
}

#[test]
fn planar_input_is_staged_through_a_dynamic_texture() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, planar_frame(640, 360, 7)).expect("rendered frame");
    assert_eq!(output.params.width, 1920);
    assert_eq!(output.meta.pts, 7);

    let textures = hw.textures();
    assert_eq!(textures.len(), 2, "one staging texture plus one pool surface");
    let usages: Vec<_> = textures.iter().map(|t| t.desc().usage).collect();
    assert!(usages.contains(&TextureUsage::Dynamic));
    assert!(usages.contains(&TextureUsage::RenderTarget));
    assert_eq!(hw.counters().uploads, 1);
}

#[test]
fn sources_at_or_above_target_keep_their_size() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::P720),
        &hw,
    )
    .unwrap();

    let output = run_cycle(&mut filter, gpu_frame(&hw, 1920, 1080, 1080, 0)).unwrap();
    assert_eq!((output.params.width, output.params.height), (1920, 1080));
    // the processor-friendly output format is still forced
    assert_eq!(output.params.format, PixelFormat::Nv12);
}

#[test]
fn reset_flushes_frames_but_keeps_processor_state() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 0)).unwrap();
    assert_eq!(filter.rebuild_count(), 1);

    filter.reset();
    assert!(filter.take_output().is_none());

    run_cycle(&mut filter, gpu_frame(&hw, 1280, 720, 720, 1)).unwrap();
    assert_eq!(
        filter.rebuild_count(),
        1,
        "processor state is keyed by geometry and survives a reset"
    );
}

#[test]
fn insufficient_input_returns_without_side_effects() {
    let hw = MockHw::new();
    let mut filter = SuperResFilter::new(
        sr_options(SuperResMode::Nvidia, ScaleTarget::Auto),
        &hw,
    )
    .unwrap();

    filter.process().unwrap();
    assert!(filter.take_output().is_none());
    assert_eq!(hw.counters().textures, 0);
    assert_eq!(filter.counters().skipped, 0);
}
