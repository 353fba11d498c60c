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

//! Defines the hierarchy of error types for the render hardware interface.
//!
//! Creation failures are returned to the caller and logged by the device.
//! Protocol violations on command lists and queues are reported as
//! [`RecordingError`]/[`QueueError`] and leave the object untouched.

use crate::api::backend::GraphicsApi;
use std::fmt;

/// An error related to the compilation or reflection of a shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The backend compiler rejected the shader source.
    CompilationFailed {
        /// Debug name of the shader.
        label: String,
        /// Compiler output.
        log: String,
    },
    /// The payload kind (GLSL, WGSL, SPIR-V) is not consumed by this backend.
    UnsupportedSource {
        /// Debug name of the shader.
        label: String,
        /// Name of the rejecting backend.
        backend: String,
    },
    /// Binding metadata could not be extracted from the shader.
    ReflectionFailed {
        /// Debug name of the shader.
        label: String,
        /// Front-end diagnostics.
        details: String,
    },
    /// The requested entry point does not exist in the module.
    InvalidEntryPoint {
        /// Debug name of the shader.
        label: String,
        /// The entry point that was not found.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationFailed { label, log } => {
                write!(f, "Shader compilation failed for '{label}': {log}")
            }
            ShaderError::UnsupportedSource { label, backend } => {
                write!(f, "Shader '{label}' has a source kind the {backend} backend cannot consume")
            }
            ShaderError::ReflectionFailed { label, details } => {
                write!(f, "Shader reflection failed for '{label}': {details}")
            }
            ShaderError::InvalidEntryPoint { label, entry_point } => {
                write!(f, "Invalid entry point '{entry_point}' for shader '{label}'")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error raised while building a pipeline state object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// One of the stages failed to compile.
    Shader(ShaderError),
    /// The stages compiled but the program failed to link.
    LinkFailed {
        /// Debug name of the pipeline.
        label: String,
        /// Linker output.
        log: String,
    },
    /// A shader input has no matching attribute in the vertex layout.
    MissingVertexInput {
        /// Debug name of the pipeline.
        label: String,
        /// Input location expected by the vertex stage.
        location: u32,
        /// Input name, when the shader carries one.
        name: Option<String>,
    },
    /// A shader reads a binding the resource layout does not declare.
    UndeclaredBinding {
        /// Debug name of the pipeline.
        label: String,
        /// Descriptor set.
        set: u32,
        /// Binding index within the set.
        binding: u32,
    },
    /// The root signature or bind layout could not be created.
    LayoutCreationFailed(String),
    /// The descriptor is missing a mandatory stage.
    MissingStage {
        /// Debug name of the pipeline.
        label: String,
        /// Human readable stage name.
        stage: &'static str,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Shader(err) => write!(f, "{err}"),
            PipelineError::LinkFailed { label, log } => {
                write!(f, "Pipeline '{label}' failed to link: {log}")
            }
            PipelineError::MissingVertexInput {
                label,
                location,
                name,
            } => write!(
                f,
                "Pipeline '{label}': vertex input {} at location {location} has no matching attribute",
                name.as_deref().unwrap_or("<unnamed>")
            ),
            PipelineError::UndeclaredBinding {
                label,
                set,
                binding,
            } => write!(
                f,
                "Pipeline '{label}': shader binding (set {set}, binding {binding}) is not declared in the resource layout"
            ),
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::MissingStage { label, stage } => {
                write!(f, "Pipeline '{label}' has no {stage} stage")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ShaderError> for PipelineError {
    fn from(err: ShaderError) -> Self {
        PipelineError::Shader(err)
    }
}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// The descriptor is not valid for this resource kind.
    InvalidDescriptor(String),
    /// A write does not fit inside the resource.
    OutOfBounds {
        /// Byte offset of the write.
        offset: u64,
        /// Length of the write in bytes.
        len: u64,
        /// Size of the resource in bytes.
        size: u64,
    },
    /// The device does not implement this operation.
    Unsupported(String),
    /// An error originating from the native graphics API.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {msg}"),
            ResourceError::OutOfBounds { offset, len, size } => write!(
                f,
                "Resource access out of bounds: {len} bytes at offset {offset} exceed size {size}"
            ),
            ResourceError::Unsupported(msg) => write!(f, "Unsupported operation: {msg}"),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A protocol violation on a [`CommandBuffer`](crate::api::command::CommandBuffer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    /// `begin` was called while the buffer is already recording.
    AlreadyRecording(String),
    /// A command was added or `end` was called outside of recording.
    NotRecording(String),
    /// `execute` was called before `end`.
    StillRecording(String),
    /// The buffer is being executed on another thread.
    AlreadyExecuting(String),
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::AlreadyRecording(name) => {
                write!(f, "Command buffer '{name}' is already recording")
            }
            RecordingError::NotRecording(name) => {
                write!(f, "Command buffer '{name}' is not recording")
            }
            RecordingError::StillRecording(name) => {
                write!(f, "Command buffer '{name}' is still recording")
            }
            RecordingError::AlreadyExecuting(name) => {
                write!(f, "Command buffer '{name}' is already executing")
            }
        }
    }
}

impl std::error::Error for RecordingError {}

/// A rejected submission to a [`CommandQueue`](crate::api::command::CommandQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The buffer holds no commands.
    EmptyBuffer(String),
    /// The buffer has not been ended.
    StillRecording(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::EmptyBuffer(name) => {
                write!(f, "Refusing to submit empty command buffer '{name}'")
            }
            QueueError::StillRecording(name) => {
                write!(f, "Refusing to submit command buffer '{name}' while it is recording")
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// An error returned by the [`RenderThreadPool`](crate::threading::RenderThreadPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been shut down and no longer accepts tasks.
    ShutDown,
    /// A worker thread could not be spawned.
    SpawnFailed(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::ShutDown => write!(f, "Render thread pool is shut down"),
            PoolError::SpawnFailed(msg) => write!(f, "Failed to spawn render thread: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// An error raised while selecting or creating a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The requested API failed its support probe.
    BackendUnavailable {
        /// The API that was probed.
        api: GraphicsApi,
        /// Why the probe failed.
        reason: String,
    },
    /// Not even the fallback backend could be created.
    NoUsableBackend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::BackendUnavailable { api, reason } => {
                write!(f, "{api} backend unavailable: {reason}")
            }
            DeviceError::NoUsableBackend(reason) => {
                write!(f, "No usable graphics backend: {reason}")
            }
        }
    }
}

impl std::error::Error for DeviceError {}
