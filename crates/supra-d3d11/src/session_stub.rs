#![allow(missing_docs)]
//! Stub for hosts without a D3D11 video pipeline.

use supra_core::error::{FilterError, Result};
use supra_core::hw::{AdapterInfo, HwRegistry, HwSession};
use supra_core::types::PixelFormat;

/// Stub registry used when `supra-d3d11` is built for a non-Windows host.
pub struct D3d11Registry;

impl D3d11Registry {
    pub fn new() -> Result<Self> {
        Err(FilterError::BindFailed(
            "supra-d3d11 built in stub mode: no D3D11 video pipeline on this host".into(),
        ))
    }
}

impl HwRegistry for D3d11Registry {
    fn session_for_format(&self, _format: PixelFormat) -> Option<HwSession> {
        None
    }

    fn adapters(&self) -> Vec<AdapterInfo> {
        Vec::new()
    }
}
