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

//! Replayable command lists.

use super::{
    BlitParams, ClearParams, Command, CommandKind, DrawIndexedParams, DrawParams, RenderPassParams,
    ScissorRect, Viewport,
};
use crate::api::framebuffer::Framebuffer;
use crate::api::pipeline::Pipeline;
use crate::api::texture::Texture;
use crate::api::util::ResourceState;
use crate::api::vertex_array::VertexArray;
use crate::error::RecordingError;
use crate::threading::lock;
use crate::traits::Device;
use std::sync::{Arc, Mutex};

/// Recording state of a [`CommandBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandBufferState {
    /// Not recording. Holds the commands of the last recording, if any.
    #[default]
    Idle,
    /// Between `begin` and `end`.
    Recording,
    /// `end` was called; ready to execute or submit.
    Recorded,
    /// Commands are being dispatched.
    Executing,
}

#[derive(Debug, Default)]
struct Inner {
    state: CommandBufferState,
    commands: Vec<Command>,
}

/// A linear, replayable sequence of [`Command`]s.
///
/// Recording and inspection are safe from any thread; only one recording may
/// be active at a time and a second `begin` is rejected. Executing keeps the
/// commands, so a list can be replayed until the next `begin` or `reset`.
#[derive(Debug)]
pub struct CommandBuffer {
    name: String,
    inner: Mutex<Inner>,
}

/// Returns the buffer to `Idle` when execution ends, also when a device
/// panics mid-dispatch.
struct ExecutingGuard<'a>(&'a CommandBuffer);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.0.inner).state = CommandBufferState::Idle;
    }
}

impl CommandBuffer {
    /// Creates an empty, idle command buffer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state.
    pub fn state(&self) -> CommandBufferState {
        lock(&self.inner).state
    }

    /// Whether the buffer is between `begin` and `end`.
    pub fn is_recording(&self) -> bool {
        self.state() == CommandBufferState::Recording
    }

    /// Whether no command is recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).commands.is_empty()
    }

    /// Number of recorded commands.
    pub fn command_count(&self) -> usize {
        lock(&self.inner).commands.len()
    }

    /// A copy of the recorded commands.
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.inner).commands.clone()
    }

    /// Tags of the recorded commands, in order.
    pub fn kinds(&self) -> Vec<CommandKind> {
        lock(&self.inner).commands.iter().map(Command::kind).collect()
    }

    /// Starts recording, discarding any previous commands.
    pub fn begin(&self) -> Result<(), RecordingError> {
        let mut inner = lock(&self.inner);
        match inner.state {
            CommandBufferState::Recording => Err(self.reject(RecordingError::AlreadyRecording(self.name.clone()))),
            CommandBufferState::Executing => Err(self.reject(RecordingError::AlreadyExecuting(self.name.clone()))),
            CommandBufferState::Idle | CommandBufferState::Recorded => {
                inner.commands.clear();
                inner.state = CommandBufferState::Recording;
                Ok(())
            }
        }
    }

    /// Finishes recording.
    pub fn end(&self) -> Result<(), RecordingError> {
        let mut inner = lock(&self.inner);
        if inner.state != CommandBufferState::Recording {
            return Err(self.reject(RecordingError::NotRecording(self.name.clone())));
        }
        inner.state = CommandBufferState::Recorded;
        Ok(())
    }

    /// Drops every command and returns to `Idle`.
    pub fn reset(&self) -> Result<(), RecordingError> {
        let mut inner = lock(&self.inner);
        if inner.state == CommandBufferState::Executing {
            return Err(self.reject(RecordingError::AlreadyExecuting(self.name.clone())));
        }
        inner.commands.clear();
        inner.state = CommandBufferState::Idle;
        Ok(())
    }

    /// Dispatches every recorded command to `device` in order and returns how
    /// many were dispatched. The lock is not held while the device runs.
    pub fn execute(&self, device: &mut dyn Device) -> Result<usize, RecordingError> {
        let commands = {
            let mut inner = lock(&self.inner);
            match inner.state {
                CommandBufferState::Recording => {
                    return Err(self.reject(RecordingError::StillRecording(self.name.clone())));
                }
                CommandBufferState::Executing => {
                    return Err(self.reject(RecordingError::AlreadyExecuting(self.name.clone())));
                }
                CommandBufferState::Idle | CommandBufferState::Recorded => {}
            }
            inner.state = CommandBufferState::Executing;
            inner.commands.clone()
        };

        let _executing = ExecutingGuard(self);
        for command in &commands {
            command.dispatch(device);
        }
        log::trace!("CommandBuffer '{}': executed {} commands", self.name, commands.len());
        Ok(commands.len())
    }

    /// Appends `command`.
    pub fn record(&self, command: Command) -> Result<(), RecordingError> {
        let mut inner = lock(&self.inner);
        if inner.state != CommandBufferState::Recording {
            return Err(self.reject(RecordingError::NotRecording(self.name.clone())));
        }
        inner.commands.push(command);
        Ok(())
    }

    /// Records [`Command::Clear`].
    pub fn clear(&self, params: ClearParams) -> Result<(), RecordingError> {
        self.record(Command::Clear(params))
    }

    /// Records [`Command::Draw`].
    pub fn draw(&self, params: DrawParams) -> Result<(), RecordingError> {
        self.record(Command::Draw(params))
    }

    /// Records [`Command::DrawIndexed`].
    pub fn draw_indexed(&self, params: DrawIndexedParams) -> Result<(), RecordingError> {
        self.record(Command::DrawIndexed(params))
    }

    /// Records [`Command::BindPipeline`].
    pub fn bind_pipeline(&self, pipeline: Option<Arc<Pipeline>>) -> Result<(), RecordingError> {
        self.record(Command::BindPipeline(pipeline))
    }

    /// Records [`Command::BindVertexArray`].
    pub fn bind_vertex_array(&self, vertex_array: Option<Arc<VertexArray>>) -> Result<(), RecordingError> {
        self.record(Command::BindVertexArray(vertex_array))
    }

    /// Records [`Command::BindTexture`].
    pub fn bind_texture(&self, texture: Option<Arc<Texture>>, slot: u32) -> Result<(), RecordingError> {
        self.record(Command::BindTexture { texture, slot })
    }

    /// Records [`Command::BindFramebuffer`].
    pub fn bind_framebuffer(&self, framebuffer: Option<Arc<Framebuffer>>) -> Result<(), RecordingError> {
        self.record(Command::BindFramebuffer(framebuffer))
    }

    /// Records [`Command::SetViewport`].
    pub fn set_viewport(&self, viewport: Viewport) -> Result<(), RecordingError> {
        self.record(Command::SetViewport(viewport))
    }

    /// Records [`Command::SetScissor`].
    pub fn set_scissor(&self, rect: Option<ScissorRect>) -> Result<(), RecordingError> {
        self.record(Command::SetScissor(rect))
    }

    /// Records [`Command::BeginRenderPass`].
    pub fn begin_render_pass(&self, params: RenderPassParams) -> Result<(), RecordingError> {
        self.record(Command::BeginRenderPass(params))
    }

    /// Records [`Command::EndRenderPass`].
    pub fn end_render_pass(&self) -> Result<(), RecordingError> {
        self.record(Command::EndRenderPass)
    }

    /// Records [`Command::ResourceBarrier`].
    pub fn resource_barrier(&self, texture: Arc<Texture>, state: ResourceState) -> Result<(), RecordingError> {
        self.record(Command::ResourceBarrier { texture, state })
    }

    /// Records [`Command::Blit`].
    pub fn blit(&self, params: BlitParams) -> Result<(), RecordingError> {
        self.record(Command::Blit(params))
    }

    fn reject(&self, err: RecordingError) -> RecordingError {
        log::warn!("CommandBuffer: {err}");
        err
    }
}
