// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-frame state machine shared by all devices.

use std::time::Instant;

/// Where a device is within its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    /// No frame in progress.
    #[default]
    Idle,
    /// Between `begin_frame` and `end_frame`; draws are accepted.
    Recording,
    /// `end_frame` ran; waiting for `flush`/`present`.
    Ended,
}

/// Tracks the frame phase and rejects out-of-frame work with a diagnostic.
#[derive(Debug)]
pub struct FrameTracker {
    owner: &'static str,
    phase: FramePhase,
    started: Option<Instant>,
    out_of_frame_reported: bool,
}

impl FrameTracker {
    /// A tracker whose diagnostics are prefixed with `owner`.
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            phase: FramePhase::Idle,
            started: None,
            out_of_frame_reported: false,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Whether draws are currently accepted.
    pub fn is_recording(&self) -> bool {
        self.phase == FramePhase::Recording
    }

    /// Enters `Recording`. Returns `false` if a frame is already recording.
    pub fn begin(&mut self) -> bool {
        if self.phase == FramePhase::Recording {
            log::warn!("{}: begin_frame called while a frame is recording; ignored", self.owner);
            return false;
        }
        self.phase = FramePhase::Recording;
        self.started = Some(Instant::now());
        self.out_of_frame_reported = false;
        true
    }

    /// Leaves `Recording`. Returns the CPU frame time in milliseconds, or
    /// `None` if no frame was recording.
    pub fn end(&mut self) -> Option<f32> {
        if self.phase != FramePhase::Recording {
            log::warn!("{}: end_frame called without begin_frame; ignored", self.owner);
            return None;
        }
        self.phase = FramePhase::Ended;
        self.started.take().map(|t| t.elapsed().as_secs_f32() * 1000.0)
    }

    /// Returns to `Idle` after the frame was submitted.
    pub fn submitted(&mut self) {
        if self.phase == FramePhase::Ended {
            self.phase = FramePhase::Idle;
        }
    }

    /// Checks that `operation` may run now. The first rejection of a frame is
    /// logged as a warning, later ones at debug level.
    pub fn allows(&mut self, operation: &str) -> bool {
        if self.is_recording() {
            return true;
        }
        if self.out_of_frame_reported {
            log::debug!("{}: {operation} outside begin_frame/end_frame; skipped", self.owner);
        } else {
            log::warn!("{}: {operation} outside begin_frame/end_frame; skipped", self.owner);
            self.out_of_frame_reported = true;
        }
        false
    }
}
