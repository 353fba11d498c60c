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

//! The closed set of recordable commands, command lists and the queue.

pub mod list;
pub mod params;
pub mod queue;

pub use self::list::*;
pub use self::params::*;
pub use self::queue::*;

use crate::api::framebuffer::Framebuffer;
use crate::api::pipeline::Pipeline;
use crate::api::texture::Texture;
use crate::api::util::ResourceState;
use crate::api::vertex_array::VertexArray;
use crate::traits::Device;
use std::sync::Arc;

/// One recorded command. Immutable once recorded.
#[derive(Debug, Clone)]
pub enum Command {
    /// Clears the current render target.
    Clear(ClearParams),
    /// Draws non-indexed primitives.
    Draw(DrawParams),
    /// Draws indexed primitives.
    DrawIndexed(DrawIndexedParams),
    /// Binds (or unbinds) a pipeline.
    BindPipeline(Option<Arc<Pipeline>>),
    /// Binds (or unbinds) vertex input.
    BindVertexArray(Option<Arc<VertexArray>>),
    /// Binds a texture to a slot; `None` binds the default texture.
    BindTexture {
        /// Texture to bind.
        texture: Option<Arc<Texture>>,
        /// Texture slot.
        slot: u32,
    },
    /// Binds a framebuffer; `None` is the back buffer.
    BindFramebuffer(Option<Arc<Framebuffer>>),
    /// Sets the viewport.
    SetViewport(Viewport),
    /// Sets or disables the scissor rectangle.
    SetScissor(Option<ScissorRect>),
    /// Starts a render pass.
    BeginRenderPass(RenderPassParams),
    /// Ends the current render pass.
    EndRenderPass,
    /// Transitions a texture to a new usage state.
    ResourceBarrier {
        /// Texture to transition.
        texture: Arc<Texture>,
        /// Requested state.
        state: ResourceState,
    },
    /// Copies between framebuffers.
    Blit(BlitParams),
}

/// Tag of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CommandKind {
    Clear,
    Draw,
    DrawIndexed,
    BindPipeline,
    BindVertexArray,
    BindTexture,
    BindFramebuffer,
    SetViewport,
    SetScissor,
    BeginRenderPass,
    EndRenderPass,
    ResourceBarrier,
    Blit,
}

impl CommandKind {
    /// Every command kind.
    pub const ALL: [CommandKind; 13] = [
        CommandKind::Clear,
        CommandKind::Draw,
        CommandKind::DrawIndexed,
        CommandKind::BindPipeline,
        CommandKind::BindVertexArray,
        CommandKind::BindTexture,
        CommandKind::BindFramebuffer,
        CommandKind::SetViewport,
        CommandKind::SetScissor,
        CommandKind::BeginRenderPass,
        CommandKind::EndRenderPass,
        CommandKind::ResourceBarrier,
        CommandKind::Blit,
    ];

    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            CommandKind::Clear => "Clear",
            CommandKind::Draw => "Draw",
            CommandKind::DrawIndexed => "DrawIndexed",
            CommandKind::BindPipeline => "BindPipeline",
            CommandKind::BindVertexArray => "BindVertexArray",
            CommandKind::BindTexture => "BindTexture",
            CommandKind::BindFramebuffer => "BindFramebuffer",
            CommandKind::SetViewport => "SetViewport",
            CommandKind::SetScissor => "SetScissor",
            CommandKind::BeginRenderPass => "BeginRenderPass",
            CommandKind::EndRenderPass => "EndRenderPass",
            CommandKind::ResourceBarrier => "ResourceBarrier",
            CommandKind::Blit => "Blit",
        }
    }
}

impl Command {
    /// The tag of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Clear(_) => CommandKind::Clear,
            Command::Draw(_) => CommandKind::Draw,
            Command::DrawIndexed(_) => CommandKind::DrawIndexed,
            Command::BindPipeline(_) => CommandKind::BindPipeline,
            Command::BindVertexArray(_) => CommandKind::BindVertexArray,
            Command::BindTexture { .. } => CommandKind::BindTexture,
            Command::BindFramebuffer(_) => CommandKind::BindFramebuffer,
            Command::SetViewport(_) => CommandKind::SetViewport,
            Command::SetScissor(_) => CommandKind::SetScissor,
            Command::BeginRenderPass(_) => CommandKind::BeginRenderPass,
            Command::EndRenderPass => CommandKind::EndRenderPass,
            Command::ResourceBarrier { .. } => CommandKind::ResourceBarrier,
            Command::Blit(_) => CommandKind::Blit,
        }
    }

    /// Applies the command to `device`.
    pub fn dispatch(&self, device: &mut dyn Device) {
        log::trace!("dispatch {}", self.kind().name());
        match self {
            Command::Clear(params) => device.clear(params),
            Command::Draw(params) => device.draw(params),
            Command::DrawIndexed(params) => device.draw_indexed(params),
            Command::BindPipeline(pipeline) => device.bind_pipeline(pipeline.as_ref()),
            Command::BindVertexArray(vertex_array) => device.bind_vertex_array(vertex_array.as_ref()),
            Command::BindTexture { texture, slot } => device.bind_texture(texture.as_ref(), *slot),
            Command::BindFramebuffer(framebuffer) => device.bind_framebuffer(framebuffer.as_ref()),
            Command::SetViewport(viewport) => device.set_viewport(viewport),
            Command::SetScissor(rect) => device.set_scissor(rect.as_ref()),
            Command::BeginRenderPass(params) => device.begin_render_pass(params),
            Command::EndRenderPass => device.end_render_pass(),
            Command::ResourceBarrier { texture, state } => device.resource_barrier(texture, *state),
            Command::Blit(params) => device.blit(params),
        }
    }
}
