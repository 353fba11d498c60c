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

//! CPU-side uniform values and the dirty-tracking cache a pipeline keeps.

use std::collections::{BTreeMap, BTreeSet};

/// A typed uniform value. Matrices are stored as 16 or 9 floats in the
/// majorness declared by the pipeline's `matrix_layout`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `float`.
    Float(f32),
    /// `vec2`.
    Vec2([f32; 2]),
    /// `vec3`.
    Vec3([f32; 3]),
    /// `vec4`.
    Vec4([f32; 4]),
    /// `int`.
    Int(i32),
    /// `uint`.
    UInt(u32),
    /// `bool`, uploaded as a 32-bit integer.
    Bool(bool),
    /// `mat3`.
    Mat3([f32; 9]),
    /// `mat4`.
    Mat4([f32; 16]),
}

impl UniformValue {
    /// Size of the value inside a uniform block (std140 rules: `mat3` columns
    /// are padded to 16 bytes).
    pub const fn size(&self) -> u32 {
        match self {
            UniformValue::Float(_) | UniformValue::Int(_) | UniformValue::UInt(_) | UniformValue::Bool(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) => 12,
            UniformValue::Vec4(_) => 16,
            UniformValue::Mat3(_) => 48,
            UniformValue::Mat4(_) => 64,
        }
    }

    /// Whether the value is a matrix.
    pub const fn is_matrix(&self) -> bool {
        matches!(self, UniformValue::Mat3(_) | UniformValue::Mat4(_))
    }

    /// Returns the value with matrix rows and columns swapped. Non-matrix
    /// values are returned unchanged.
    pub fn transposed(&self) -> Self {
        match *self {
            UniformValue::Mat3(m) => {
                let mut t = [0.0; 9];
                for c in 0..3 {
                    for r in 0..3 {
                        t[r * 3 + c] = m[c * 3 + r];
                    }
                }
                UniformValue::Mat3(t)
            }
            UniformValue::Mat4(m) => {
                let mut t = [0.0; 16];
                for c in 0..4 {
                    for r in 0..4 {
                        t[r * 4 + c] = m[c * 4 + r];
                    }
                }
                UniformValue::Mat4(t)
            }
            other => other,
        }
    }

    /// Bytes as laid out inside a uniform block, transposing matrices first
    /// when `transpose` is set.
    pub fn to_bytes(&self, transpose: bool) -> Vec<u8> {
        let value = if transpose { self.transposed() } else { *self };
        match value {
            UniformValue::Float(v) => v.to_ne_bytes().to_vec(),
            UniformValue::Vec2(v) => bytemuck::cast_slice(&v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(&v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(&v).to_vec(),
            UniformValue::Int(v) => v.to_ne_bytes().to_vec(),
            UniformValue::UInt(v) => v.to_ne_bytes().to_vec(),
            UniformValue::Bool(v) => (v as u32).to_ne_bytes().to_vec(),
            UniformValue::Mat3(m) => {
                let mut padded = [0.0f32; 12];
                for column in 0..3 {
                    padded[column * 4..column * 4 + 3].copy_from_slice(&m[column * 3..column * 3 + 3]);
                }
                bytemuck::cast_slice(&padded).to_vec()
            }
            UniformValue::Mat4(m) => bytemuck::cast_slice(&m).to_vec(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<[f32; 9]> for UniformValue {
    fn from(v: [f32; 9]) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<[f32; 16]> for UniformValue {
    fn from(v: [f32; 16]) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Named uniform values with per-name dirty tracking.
///
/// Setting a value equal to the cached one leaves it clean, so a commit only
/// ever writes values that actually changed.
#[derive(Debug, Default)]
pub struct ParameterCache {
    values: BTreeMap<String, UniformValue>,
    dirty: BTreeSet<String>,
}

impl ParameterCache {
    /// Stores `value` under `name`. Returns `true` if the entry became dirty.
    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        if self.values.get(name) == Some(&value) {
            return false;
        }
        self.values.insert(name.to_string(), value);
        self.dirty.insert(name.to_string());
        true
    }

    /// The cached value of `name`.
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    /// Whether any value changed since the last [`take_dirty`](Self::take_dirty).
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Returns the changed entries, sorted by name, and clears the dirty set.
    pub fn take_dirty(&mut self) -> Vec<(String, UniformValue)> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|name| self.values.get(&name).map(|v| (name.clone(), *v)))
            .collect()
    }

    /// Marks every cached entry dirty again.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = self.values.keys().cloned().collect();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    #[test]
    fn take_dirty_clears_the_dirty_set() {
        let mut cache = ParameterCache::default();
        assert!(cache.set("u_tint", [1.0, 0.5, 0.25, 1.0].into()));
        assert!(cache.is_dirty());
        assert_eq!(cache.take_dirty().len(), 1);
        assert!(!cache.is_dirty());
        assert!(cache.take_dirty().is_empty());
    }

    #[test]
    fn setting_the_same_value_stays_clean() {
        let mut cache = ParameterCache::default();
        cache.set("u_time", 1.0.into());
        cache.take_dirty();
        assert!(!cache.set("u_time", 1.0.into()));
        assert!(!cache.is_dirty());
        assert!(cache.set("u_time", 2.0.into()));
    }

    #[test]
    fn mark_all_dirty_reselects_every_entry() {
        let mut cache = ParameterCache::default();
        cache.set("a", 1.into());
        cache.set("b", true.into());
        cache.take_dirty();
        cache.mark_all_dirty();
        let names: Vec<_> = cache.take_dirty().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mat4_transpose_swaps_translation_row() {
        let mut m = IDENTITY;
        m[12] = 5.0; // column-major translation x
        let t = UniformValue::Mat4(m).transposed();
        match t {
            UniformValue::Mat4(t) => {
                assert_eq!(t[3], 5.0);
                assert_eq!(t[12], 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(UniformValue::Mat4(m).transposed().transposed(), UniformValue::Mat4(m));
    }

    #[test]
    fn mat3_bytes_are_column_padded() {
        let m = UniformValue::Mat3([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let bytes = m.to_bytes(false);
        assert_eq!(bytes.len() as u32, m.size());
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(&floats[0..4], &[1.0, 2.0, 3.0, 0.0]);
        assert_eq!(&floats[8..12], &[7.0, 8.0, 9.0, 0.0]);
    }

    #[test]
    fn scalar_sizes() {
        assert_eq!(UniformValue::Bool(true).to_bytes(false), 1u32.to_ne_bytes().to_vec());
        assert_eq!(UniformValue::Vec3([0.0; 3]).size(), 12);
        assert!(!UniformValue::Float(1.0).is_matrix());
    }
}
