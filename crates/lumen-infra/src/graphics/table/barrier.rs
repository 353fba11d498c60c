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

//! Per-texture resource state tracking.

use lumen_core::ResourceState;
use std::collections::HashMap;

/// A transition that must be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Texture object.
    pub texture: u64,
    /// State the texture was left in.
    pub before: ResourceState,
    /// State it is moved to.
    pub after: ResourceState,
}

/// Last known state of every texture the device has touched.
///
/// Textures start in [`ResourceState::Unknown`]. A request for the state a
/// texture is already in produces no transition.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<u64, ResourceState>,
}

impl StateTracker {
    /// Records that `texture` must be in `after`, returning the transition
    /// to issue if its state changes.
    pub fn transition(&mut self, texture: u64, after: ResourceState) -> Option<Transition> {
        let before = self.state(texture);
        if before == after {
            return None;
        }
        self.states.insert(texture, after);
        Some(Transition { texture, before, after })
    }

    /// Current state of `texture`.
    pub fn state(&self, texture: u64) -> ResourceState {
        self.states.get(&texture).copied().unwrap_or(ResourceState::Unknown)
    }

    /// Drops a destroyed texture.
    pub fn forget(&mut self, texture: u64) {
        self.states.remove(&texture);
    }

    /// Number of tracked textures.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_state_needs_no_barrier() {
        let mut tracker = StateTracker::default();
        let first = tracker.transition(7, ResourceState::Read);
        assert_eq!(
            first,
            Some(Transition {
                texture: 7,
                before: ResourceState::Unknown,
                after: ResourceState::Read
            })
        );
        assert_eq!(tracker.transition(7, ResourceState::Read), None);
        assert_eq!(tracker.state(7), ResourceState::Read);
    }

    #[test]
    fn transitions_chain_previous_state() {
        let mut tracker = StateTracker::default();
        tracker.transition(1, ResourceState::Write);
        let next = tracker.transition(1, ResourceState::Read).unwrap();
        assert_eq!(next.before, ResourceState::Write);
        tracker.forget(1);
        assert_eq!(tracker.state(1), ResourceState::Unknown);
        assert!(tracker.is_empty());
    }
}
