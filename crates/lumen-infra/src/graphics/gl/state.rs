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

//! Redundant-call elimination for the immediate backend.

use super::api::GlApi;
use super::conversions::IntoGl;
use lumen_core::{BindingCategory, RenderState};
use std::collections::HashMap;

/// Remembers what is bound where, so binding the same object twice is free.
#[derive(Debug, Default)]
pub struct BindingCache {
    bound: HashMap<(BindingCategory, u32), u64>,
}

impl BindingCache {
    /// Records `raw` at `(category, slot)`. Returns `false` if it was
    /// already bound there.
    pub fn bind(&mut self, category: BindingCategory, slot: u32, raw: u64) -> bool {
        self.bound.insert((category, slot), raw) != Some(raw)
    }

    /// The object bound at `(category, slot)`.
    pub fn get(&self, category: BindingCategory, slot: u32) -> Option<u64> {
        self.bound.get(&(category, slot)).copied()
    }

    /// Drops every entry of `category` that refers to `raw`.
    pub fn forget_object(&mut self, category: BindingCategory, raw: u64) {
        self.bound.retain(|&(c, _), &mut r| c != category || r != raw);
    }

    /// Drops every entry of `category`, forcing the next bind through.
    pub fn forget_category(&mut self, category: BindingCategory) {
        self.bound.retain(|&(c, _), _| c != category);
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.bound.clear();
    }
}

/// Applies `next`, touching only the native state that differs from
/// `previous`. Returns the number of state calls issued.
pub fn apply_render_state<A: GlApi>(api: &mut A, previous: Option<&RenderState>, next: &RenderState) -> u32 {
    let changed = |f: fn(&RenderState) -> bool| previous.is_none_or(|p| f(p) != f(next));
    let mut calls = 0;

    if previous.is_none_or(|p| p.blend_mode != next.blend_mode) {
        match next.blend_mode.into_gl() {
            Some((src, dst)) => {
                api.set_enabled(glow::BLEND, true);
                api.blend_func(src, dst);
                calls += 2;
            }
            None => {
                api.set_enabled(glow::BLEND, false);
                calls += 1;
            }
        }
    }
    if changed(|s| s.depth_test) {
        api.set_enabled(glow::DEPTH_TEST, next.depth_test);
        calls += 1;
    }
    if changed(|s| s.depth_write) {
        api.depth_mask(next.depth_write);
        calls += 1;
    }
    if previous.is_none_or(|p| p.depth_func != next.depth_func) {
        api.depth_func(next.depth_func.into_gl());
        calls += 1;
    }
    if previous.is_none_or(|p| p.cull_mode != next.cull_mode) {
        match next.cull_mode.into_gl() {
            Some(face) => {
                api.set_enabled(glow::CULL_FACE, true);
                api.cull_face(face);
                calls += 2;
            }
            None => {
                api.set_enabled(glow::CULL_FACE, false);
                calls += 1;
            }
        }
    }
    if changed(|s| s.wireframe) {
        api.polygon_mode(if next.wireframe { glow::LINE } else { glow::FILL });
        calls += 1;
    }
    if previous.is_none_or(|p| p.msaa_samples != next.msaa_samples) {
        api.set_enabled(glow::MULTISAMPLE, next.msaa_samples.count() > 1);
        calls += 1;
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::HeadlessGl;
    use lumen_core::{BlendMode, CullMode};

    #[test]
    fn binding_the_same_object_twice_is_reported_once() {
        let mut cache = BindingCache::default();
        assert!(cache.bind(BindingCategory::Texture, 0, 7));
        assert!(!cache.bind(BindingCategory::Texture, 0, 7));
        assert!(cache.bind(BindingCategory::Texture, 1, 7));
        cache.forget_object(BindingCategory::Texture, 7);
        assert_eq!(cache.get(BindingCategory::Texture, 0), None);
        assert!(cache.bind(BindingCategory::Texture, 0, 7));
    }

    #[test]
    fn forgetting_a_category_keeps_the_others() {
        let mut cache = BindingCache::default();
        cache.bind(BindingCategory::Pipeline, 0, 3);
        cache.bind(BindingCategory::Framebuffer, 0, 4);
        cache.forget_category(BindingCategory::Framebuffer);
        assert_eq!(cache.get(BindingCategory::Pipeline, 0), Some(3));
        assert_eq!(cache.get(BindingCategory::Framebuffer, 0), None);
    }

    #[test]
    fn identical_state_issues_no_calls() {
        let mut gl = HeadlessGl::new();
        let state = RenderState::default();
        assert!(apply_render_state(&mut gl, None, &state) > 0);
        assert_eq!(apply_render_state(&mut gl, Some(&state), &state), 0);
    }

    #[test]
    fn only_changed_fields_are_applied() {
        let mut gl = HeadlessGl::new();
        let opaque = RenderState::default();
        let blended = RenderState {
            blend_mode: BlendMode::Additive,
            ..opaque
        };
        // enable + blend_func
        assert_eq!(apply_render_state(&mut gl, Some(&opaque), &blended), 2);
        let unculled = RenderState {
            cull_mode: CullMode::None,
            ..opaque
        };
        assert_eq!(apply_render_state(&mut gl, Some(&opaque), &unculled), 1);
    }
}
