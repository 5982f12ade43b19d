//! Zero-reference frame queue.
//!
//! A strict one-in-one-out sliding window between the host pins and the
//! filter: no look-ahead, no look-back.  The queue detects stream
//! reconfiguration by comparing the parameters of the next pending frame
//! against the last configured parameters.

use std::collections::VecDeque;
use std::sync::Arc;

use supra_core::error::{FilterError, Result};
use supra_core::types::{FrameParams, PixelFormat, VideoFrame};

/// Sliding-window frame queue configured for zero forward/backward
/// references.
pub struct FrameQueue {
    accepted: Vec<PixelFormat>,
    input: VecDeque<Arc<VideoFrame>>,
    output: VecDeque<Arc<VideoFrame>>,
    configured: Option<FrameParams>,
}

impl FrameQueue {
    pub fn new(accepted: &[PixelFormat]) -> Self {
        Self {
            accepted: accepted.to_vec(),
            input: VecDeque::new(),
            output: VecDeque::new(),
            configured: None,
        }
    }

    /// Queue one decoded frame from the input pin.
    pub fn push(&mut self, frame: Arc<VideoFrame>) -> Result<()> {
        if !self.accepted.contains(&frame.params.format) {
            return Err(FilterError::UnsupportedFormat(frame.params.format));
        }
        self.input.push_back(frame);
        Ok(())
    }

    /// Detect a pending stream reconfiguration.
    ///
    /// Returns the new input parameters when the next frame's parameters
    /// differ from the configured ones, updating the configured state.
    pub fn execute_reinit(&mut self) -> Option<FrameParams> {
        let front = self.input.front()?;
        if self.configured.as_ref() == Some(&front.params) {
            return None;
        }
        let params = front.params.clone();
        self.configured = Some(params.clone());
        Some(params)
    }

    /// Whether enough input is buffered to produce output this cycle.
    pub fn can_output(&self) -> bool {
        !self.input.is_empty()
    }

    /// Frame at `offset` from the current position (only offset 0 exists
    /// under a zero-reference window).
    pub fn get(&self, offset: usize) -> Option<Arc<VideoFrame>> {
        self.input.get(offset).cloned()
    }

    /// Submit the produced frame (or nothing, for a dropped frame) to the
    /// output pin and advance past the current input frame.
    pub fn write_output(&mut self, frame: Option<Arc<VideoFrame>>) {
        self.input.pop_front();
        if let Some(frame) = frame {
            self.output.push_back(frame);
        }
    }

    /// Drain one produced frame for the host output pin.
    pub fn take_output(&mut self) -> Option<Arc<VideoFrame>> {
        self.output.pop_front()
    }

    /// Field parity of the current frame.  A zero-reference window never
    /// yields field pairs, so this is always false here.
    pub fn second_field(&self) -> bool {
        false
    }

    /// Drop all queued frames.  Configured parameters survive a flush so
    /// a seek within the same stream does not force a reinit.
    pub fn flush(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn pending_output(&self) -> usize {
        self.output.len()
    }
}
