//! Vendor super-resolution adapters.
//!
//! Two mutually exclusive driver-private protocols, both spoken through
//! generic extension calls addressed by vendor GUID.  Adapters are applied
//! on every frame right before submission; the calls are idempotent and
//! no "already enabled" state is cached.  A failing adapter never fails
//! the frame; processing continues without (or with only part of) the
//! enhancement.

use tracing::error;

use supra_core::hw::{Guid, HwSession, VideoProcessor};
use supra_core::options::SuperResMode;

/// NVIDIA post-processing extension interface.
pub const NVIDIA_PPE_INTERFACE: Guid = Guid::new(
    0xd43c_e1b3,
    0x1f4b,
    0x48ac,
    [0xba, 0xee, 0xc3, 0xc2, 0x53, 0x75, 0xe6, 0xf7],
);

/// Intel VPE extension interface.
pub const INTEL_VPE_INTERFACE: Guid = Guid::new(
    0xedd1_d4b9,
    0x8659,
    0x4cbc,
    [0xa4, 0xd6, 0x98, 0x31, 0xa2, 0x16, 0x3a, 0xc3],
);

const NVIDIA_STREAM_EXTENSION_VERSION_V1: u32 = 0x1;
const NVIDIA_METHOD_SUPER_RESOLUTION: u32 = 0x2;

const INTEL_VPE_FN_VERSION: u32 = 0x01;
const INTEL_VPE_FN_MODE: u32 = 0x20;
const INTEL_VPE_FN_SCALING: u32 = 0x37;
const INTEL_VPE_VERSION_3: u32 = 0x0003;
const INTEL_VPE_MODE_PREPROC: u32 = 0x01;
const INTEL_VPE_SCALING_SUPER_RESOLUTION: u32 = 0x2;

/// Polymorphic enhancement capability selected by the filter mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enhancement {
    None,
    NvidiaSuperRes,
    IntelVpe,
}

impl From<SuperResMode> for Enhancement {
    fn from(mode: SuperResMode) -> Self {
        match mode {
            SuperResMode::Off => Self::None,
            SuperResMode::Nvidia => Self::NvidiaSuperRes,
            SuperResMode::Intel => Self::IntelVpe,
        }
    }
}

impl Enhancement {
    /// Activate the enhancement on the processor.  Failures are logged
    /// and swallowed.
    pub fn apply(self, session: &HwSession, processor: &dyn VideoProcessor) {
        match self {
            Self::None => {}
            Self::NvidiaSuperRes => apply_nvidia(session, processor),
            Self::IntelVpe => apply_intel(session, processor),
        }
    }
}

/// `{version, method, enable}` as little-endian u32 triple.
fn nvidia_payload() -> [u8; 12] {
    let mut payload = [0u8; 12];
    payload[0..4].copy_from_slice(&NVIDIA_STREAM_EXTENSION_VERSION_V1.to_le_bytes());
    payload[4..8].copy_from_slice(&NVIDIA_METHOD_SUPER_RESOLUTION.to_le_bytes());
    payload[8..12].copy_from_slice(&1u32.to_le_bytes());
    payload
}

/// `{function, param}` as little-endian u32 pair.
fn intel_payload(function: u32, param: u32) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[0..4].copy_from_slice(&function.to_le_bytes());
    payload[4..8].copy_from_slice(&param.to_le_bytes());
    payload
}

fn apply_nvidia(session: &HwSession, processor: &dyn VideoProcessor) {
    if let Err(err) =
        session
            .context
            .set_stream_extension(processor, &NVIDIA_PPE_INTERFACE, &nvidia_payload())
    {
        error!(%err, "failed to enable NVIDIA RTX super resolution");
    }
}

/// Three-step VPE negotiation; each step must succeed before the next is
/// attempted.
fn apply_intel(session: &HwSession, processor: &dyn VideoProcessor) {
    let ctx = &session.context;

    if let Err(err) = ctx.set_output_extension(
        processor,
        &INTEL_VPE_INTERFACE,
        &intel_payload(INTEL_VPE_FN_VERSION, INTEL_VPE_VERSION_3),
    ) {
        error!(%err, "failed to negotiate Intel VPE version");
        return;
    }

    if let Err(err) = ctx.set_output_extension(
        processor,
        &INTEL_VPE_INTERFACE,
        &intel_payload(INTEL_VPE_FN_MODE, INTEL_VPE_MODE_PREPROC),
    ) {
        error!(%err, "failed to set Intel VPE preprocessing mode");
        return;
    }

    if let Err(err) = ctx.set_stream_extension(
        processor,
        &INTEL_VPE_INTERFACE,
        &intel_payload(INTEL_VPE_FN_SCALING, INTEL_VPE_SCALING_SUPER_RESOLUTION),
    ) {
        error!(%err, "failed to select Intel VPE super-resolution scaling");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nvidia_payload_is_version_method_enable() {
        let payload = nvidia_payload();
        assert_eq!(&payload[0..4], &1u32.to_le_bytes());
        assert_eq!(&payload[4..8], &2u32.to_le_bytes());
        assert_eq!(&payload[8..12], &1u32.to_le_bytes());
    }

    #[test]
    fn intel_payload_packs_function_then_param() {
        let payload = intel_payload(INTEL_VPE_FN_SCALING, INTEL_VPE_SCALING_SUPER_RESOLUTION);
        assert_eq!(&payload[0..4], &0x37u32.to_le_bytes());
        assert_eq!(&payload[4..8], &0x2u32.to_le_bytes());
    }

    #[test]
    fn enhancement_tracks_mode() {
        assert_eq!(Enhancement::from(SuperResMode::Off), Enhancement::None);
        assert_eq!(
            Enhancement::from(SuperResMode::Nvidia),
            Enhancement::NvidiaSuperRes
        );
        assert_eq!(Enhancement::from(SuperResMode::Intel), Enhancement::IntelVpe);
    }
}
