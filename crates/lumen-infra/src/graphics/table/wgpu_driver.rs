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

//! [`TableApi`] executed through `wgpu` on the DX12 backend.
//!
//! Root signatures become pipeline layouts with one bind group layout per
//! descriptor set, descriptor tables become bind groups, and fence values
//! are signaled from queue completion callbacks. Resource state is tracked
//! by `wgpu` itself, so transitions only reach the log.

use super::api::{
    BufferHeap, DescriptorResource, DescriptorWrite, TableApi, TableCopy, TableLimits, TablePass,
    TablePipelineDesc, TableStage, BACK_BUFFER,
};
use super::conversions::{buffer_heap, from_wgpu_format, IntoWgpu};
use anyhow::{anyhow, Result};
use lumen_core::{
    align_up, AdapterInfo, BufferDesc, DeviceConfig, DrawIndexedParams, DrawParams, IndexFormat, MatrixLayout,
    ResourceState, SamplerDesc, ScissorRect, ShaderDesc, ShaderResourceLayout, ShaderSource, ShaderStage,
    TextureDesc, TextureFormat, TextureType, Viewport, WindowSurface,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn vendor_name(vendor: u32) -> String {
    match vendor {
        0x10DE => "NVIDIA".to_string(),
        0x1002 => "AMD".to_string(),
        0x8086 => "Intel".to_string(),
        0x1414 => "Microsoft".to_string(),
        0x5143 => "Qualcomm".to_string(),
        other => format!("0x{other:04X}"),
    }
}

/// Pads `data` to the copy alignment with zeros.
fn padded(data: &[u8]) -> Cow<'_, [u8]> {
    let len = align_up(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize;
    if len == data.len() {
        Cow::Borrowed(data)
    } else {
        let mut owned = data.to_vec();
        owned.resize(len, 0);
        Cow::Owned(owned)
    }
}

struct TextureObject {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
    width: u32,
    height: u32,
}

enum WgpuObject {
    Buffer {
        buffer: wgpu::Buffer,
        size: u64,
    },
    Texture(TextureObject),
    Sampler(wgpu::Sampler),
    Module(wgpu::ShaderModule),
    RootSignature {
        layout: wgpu::PipelineLayout,
        groups: Vec<(u32, wgpu::BindGroupLayout)>,
    },
    PipelineState(wgpu::RenderPipeline),
    Heap {
        root_signature: u64,
        tables: u32,
        written: HashMap<u32, Vec<(u32, wgpu::BindGroup)>>,
    },
}

struct Attachment {
    view: wgpu::TextureView,
    format: TextureFormat,
    size: (u32, u32),
}

struct Swapchain {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

/// The DX12 driver. Without a window it renders into an offscreen back
/// buffer, which keeps the whole path usable on headless machines that
/// still expose a DX12 adapter.
pub struct WgpuTableDriver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    swapchain: Option<Swapchain>,
    offscreen: Option<wgpu::Texture>,
    frame: Option<wgpu::SurfaceTexture>,
    back_buffer_format: TextureFormat,
    back_buffer_size: (u32, u32),
    info: AdapterInfo,
    limits: TableLimits,
    line_mode: bool,
    objects: HashMap<u64, WgpuObject>,
    next_id: u64,
    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<wgpu::RenderPass<'static>>,
    pass_size: (u32, u32),
    submitted: u64,
    completed: Arc<AtomicU64>,
}

impl std::fmt::Debug for WgpuTableDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuTableDriver")
            .field("adapter", &self.info.device_name)
            .field("objects", &self.objects.len())
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

impl WgpuTableDriver {
    /// Opens a DX12 adapter and, when `window` is given, configures its
    /// surface as the swap chain.
    pub fn new(window: Option<Arc<dyn WindowSurface>>, config: &DeviceConfig) -> Result<Self> {
        let mut instance_desc = wgpu::InstanceDescriptor::new_without_display_handle();
        instance_desc.backends = wgpu::Backends::DX12;
        let instance = wgpu::Instance::new(instance_desc);

        let surface = match &window {
            Some(window) => Some(
                instance
                    .create_surface(Arc::clone(window))
                    .map_err(|e| anyhow!("failed to create a DX12 surface: {e}"))?,
            ),
            None => None,
        };

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface.as_ref(),
            force_fallback_adapter: false,
        }))
        .map_err(|e| anyhow!("no DX12 adapter: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "WgpuTableDriver: adapter \"{}\" ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        let features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("lumen.device"),
            required_features: features,
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .map_err(|e| anyhow!("failed to create the DX12 device: {e}"))?;

        device.on_uncaptured_error(Arc::new(|e: wgpu::Error| {
            log::error!("WgpuTableDriver: uncaptured error: {e}");
        }));

        let device_limits = device.limits();
        let supports_compute = adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);
        let limits = TableLimits {
            max_texture_size: device_limits.max_texture_dimension_2d,
            max_color_attachments: device_limits.max_color_attachments,
            max_vertex_attributes: device_limits.max_vertex_attributes,
            max_uniform_buffer_size: device_limits.max_uniform_buffer_binding_size.min(u32::MAX as u64) as u32,
            max_texture_slots: device_limits.max_sampled_textures_per_shader_stage,
            constant_alignment: device_limits.min_uniform_buffer_offset_alignment.max(256),
            supports_compute,
            matrix_layout: MatrixLayout::ColumnMajor,
        };

        let (width, height) = match &window {
            Some(window) => window.framebuffer_size(),
            None => (config.width, config.height),
        };
        let (width, height) = (width.max(1), height.max(1));

        let mut back_buffer_format = TextureFormat::Bgra8Unorm;
        let swapchain = match surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find_map(|f| from_wgpu_format(f).map(|engine| (f, engine)))
                    .ok_or_else(|| anyhow!("the surface offers no supported back buffer format"))?;
                back_buffer_format = format.1;
                let mut surface_config = surface
                    .get_default_config(&adapter, width, height)
                    .ok_or_else(|| anyhow!("the surface is not compatible with the adapter"))?;
                surface_config.format = format.0;
                surface_config.usage |= caps.usages & (wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST);
                surface_config.present_mode = if config.vsync {
                    wgpu::PresentMode::Fifo
                } else {
                    caps.present_modes
                        .iter()
                        .copied()
                        .find(|m| *m == wgpu::PresentMode::Immediate || *m == wgpu::PresentMode::Mailbox)
                        .unwrap_or(wgpu::PresentMode::Fifo)
                };
                surface_config.desired_maximum_frame_latency = config.frame_count() as u32;
                surface.configure(&device, &surface_config);
                Some(Swapchain {
                    surface,
                    config: surface_config,
                })
            }
            None => None,
        };

        let mut driver = Self {
            info: AdapterInfo {
                device_name: adapter_info.name.clone(),
                vendor_name: vendor_name(adapter_info.vendor),
                driver_version: format!("{} {}", adapter_info.driver, adapter_info.driver_info)
                    .trim()
                    .to_string(),
            },
            device,
            queue,
            offscreen: None,
            frame: None,
            back_buffer_format,
            back_buffer_size: (width, height),
            limits,
            line_mode: features.contains(wgpu::Features::POLYGON_MODE_LINE),
            objects: HashMap::new(),
            next_id: 1,
            encoder: None,
            pass: None,
            pass_size: (width, height),
            submitted: 0,
            completed: Arc::new(AtomicU64::new(0)),
            swapchain,
        };
        if driver.swapchain.is_none() {
            driver.offscreen = Some(driver.create_offscreen(width, height));
        }
        Ok(driver)
    }

    fn create_offscreen(&self, width: u32, height: u32) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen.offscreen_back_buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.back_buffer_format.into_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn insert(&mut self, object: WgpuObject) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    /// Runs `create` inside a validation error scope.
    fn scoped<R>(&self, what: &str, create: impl FnOnce(&wgpu::Device) -> R) -> Result<R, String> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(scope.pop()) {
            Some(err) => Err(format!("{what}: {err}")),
            None => Ok(value),
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen.frame"),
            })
        })
    }

    fn acquire(&mut self) -> Option<wgpu::Texture> {
        if let Some(frame) = &self.frame {
            return Some(frame.texture.clone());
        }
        let swapchain = self.swapchain.as_mut()?;
        let frame = match swapchain.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(frame) => frame,
            wgpu::CurrentSurfaceTexture::Suboptimal(frame) => {
                log::debug!("WgpuTableDriver: suboptimal swap chain image");
                frame
            }
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                log::warn!("WgpuTableDriver: swap chain out of date, reconfiguring");
                swapchain.surface.configure(&self.device, &swapchain.config);
                return None;
            }
            wgpu::CurrentSurfaceTexture::Timeout
            | wgpu::CurrentSurfaceTexture::Occluded
            | wgpu::CurrentSurfaceTexture::Validation => {
                log::debug!("WgpuTableDriver: no swap chain image this frame");
                return None;
            }
        };
        let texture = frame.texture.clone();
        self.frame = Some(frame);
        Some(texture)
    }

    fn back_buffer(&mut self) -> Option<wgpu::Texture> {
        if self.swapchain.is_some() {
            self.acquire()
        } else {
            self.offscreen.clone()
        }
    }

    fn attachment(&mut self, id: u64) -> Option<Attachment> {
        if id == BACK_BUFFER {
            let texture = self.back_buffer()?;
            return Some(Attachment {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                format: self.back_buffer_format,
                size: self.back_buffer_size,
            });
        }
        match self.objects.get(&id) {
            Some(WgpuObject::Texture(t)) => Some(Attachment {
                view: t.texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("lumen.attachment"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    base_array_layer: 0,
                    array_layer_count: Some(1),
                    ..Default::default()
                }),
                format: t.format,
                size: (t.width, t.height),
            }),
            _ => None,
        }
    }

    fn copy_texture_of(&mut self, id: u64) -> Option<wgpu::Texture> {
        if id == BACK_BUFFER {
            return self.back_buffer();
        }
        match self.objects.get(&id) {
            Some(WgpuObject::Texture(t)) => Some(t.texture.clone()),
            _ => None,
        }
    }

    fn stage_module<'s, 'd>(
        &'s self,
        stages: &[TableStage<'d>],
        stage: ShaderStage,
    ) -> Result<Option<(&'s wgpu::ShaderModule, &'d str)>, String> {
        let Some(s) = stages.iter().find(|s| s.stage == stage) else {
            return Ok(None);
        };
        match self.objects.get(&s.module) {
            Some(WgpuObject::Module(module)) => Ok(Some((module, s.entry_point))),
            _ => Err(format!("module {} does not exist", s.module)),
        }
    }

    fn buffer(&self, id: u64) -> Option<&wgpu::Buffer> {
        match self.objects.get(&id) {
            Some(WgpuObject::Buffer { buffer, .. }) => Some(buffer),
            _ => None,
        }
    }

    fn binding_resource(&self, resource: &DescriptorResource) -> Option<wgpu::BindingResource<'_>> {
        match *resource {
            DescriptorResource::ConstantBuffer { buffer, offset, size } => {
                Some(wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: self.buffer(buffer)?,
                    offset,
                    size: wgpu::BufferSize::new(size),
                }))
            }
            DescriptorResource::StorageBuffer(buffer) => {
                Some(wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: self.buffer(buffer)?,
                    offset: 0,
                    size: None,
                }))
            }
            DescriptorResource::Texture(texture) => match self.objects.get(&texture) {
                Some(WgpuObject::Texture(t)) => Some(wgpu::BindingResource::TextureView(&t.view)),
                _ => None,
            },
            DescriptorResource::Sampler(sampler) => match self.objects.get(&sampler) {
                Some(WgpuObject::Sampler(s)) => Some(wgpu::BindingResource::Sampler(s)),
                _ => None,
            },
        }
    }

    fn build_tables(
        &self,
        root_signature: u64,
        writes: &[DescriptorWrite],
    ) -> Result<Vec<(u32, wgpu::BindGroup)>, String> {
        let Some(WgpuObject::RootSignature { groups, .. }) = self.objects.get(&root_signature) else {
            return Err(format!("root signature {root_signature} does not exist"));
        };
        let mut tables = Vec::with_capacity(groups.len());
        for (set, layout) in groups {
            let mut entries = Vec::new();
            for write in writes.iter().filter(|w| w.set == *set) {
                let resource = self
                    .binding_resource(&write.resource)
                    .ok_or_else(|| format!("binding {} of set {set} names a missing object", write.binding))?;
                entries.push(wgpu::BindGroupEntry {
                    binding: write.binding,
                    resource,
                });
            }
            let group = self.scoped("descriptor table", |device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("lumen.descriptor_table"),
                    layout,
                    entries: &entries,
                })
            })?;
            tables.push((*set, group));
        }
        Ok(tables)
    }
}

impl TableApi for WgpuTableDriver {
    fn adapter_info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn limits(&self) -> TableLimits {
        self.limits
    }

    fn back_buffer_format(&self) -> TextureFormat {
        self.back_buffer_format
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        self.back_buffer_size
    }

    fn resize(&mut self, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if size == self.back_buffer_size {
            return;
        }
        self.end_pass();
        self.frame = None;
        self.back_buffer_size = size;
        match &mut self.swapchain {
            Some(swapchain) => {
                swapchain.config.width = size.0;
                swapchain.config.height = size.1;
                swapchain.surface.configure(&self.device, &swapchain.config);
            }
            None => {
                if let Some(old) = self.offscreen.take() {
                    old.destroy();
                }
                self.offscreen = Some(self.create_offscreen(size.0, size.1));
            }
        }
        log::info!("WgpuTableDriver: back buffer resized to {}x{}", size.0, size.1);
    }

    // --- Resources ---

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<u64, String> {
        let size = align_up(desc.size.max(wgpu::COPY_BUFFER_ALIGNMENT), wgpu::COPY_BUFFER_ALIGNMENT);
        let initial = desc.initial_data.as_deref().filter(|d| !d.is_empty());
        let map_at_creation = initial.is_some() && buffer_heap(desc.usage) == BufferHeap::Default;
        let buffer = self.scoped(&desc.debug_name, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&desc.debug_name),
                size,
                usage: desc.buffer_type.into_wgpu(),
                mapped_at_creation: map_at_creation,
            })
        })?;
        if let Some(data) = initial {
            let data = padded(data);
            if map_at_creation {
                buffer
                    .get_mapped_range_mut(..data.len() as u64)
                    .copy_from_slice(&data);
                buffer.unmap();
            } else {
                self.queue.write_buffer(&buffer, 0, &data);
            }
        }
        Ok(self.insert(WgpuObject::Buffer {
            buffer,
            size: desc.size,
        }))
    }

    fn write_buffer(&mut self, buffer: u64, offset: u64, data: &[u8]) {
        let Some(WgpuObject::Buffer { buffer: native, size }) = self.objects.get(&buffer) else {
            log::warn!("WgpuTableDriver: write to unknown buffer {buffer}");
            return;
        };
        if data.is_empty() {
            return;
        }
        let end = offset + data.len() as u64;
        // Padding is only allowed into the allocation's tail.
        let tail_aligned = end % wgpu::COPY_BUFFER_ALIGNMENT == 0 || end == *size;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || !tail_aligned {
            log::warn!(
                "WgpuTableDriver: buffer write of {} bytes at {offset} is not 4-byte aligned; dropped",
                data.len()
            );
            return;
        }
        self.queue.write_buffer(native, offset, &padded(data));
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<u64, String> {
        let layers = match desc.texture_type {
            TextureType::Texture3D => desc.depth,
            _ => desc.array_size,
        };
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING;
        if desc.render_target || desc.format.is_depth() {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if !desc.format.is_depth() {
            usage |= wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        }
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: layers,
        };
        let texture = self.scoped(&desc.debug_name, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&desc.debug_name),
                size,
                mip_level_count: desc.mip_levels,
                sample_count: 1,
                dimension: desc.texture_type.into_wgpu(),
                format: desc.format.into_wgpu(),
                usage,
                view_formats: &[],
            })
        })?;
        if let Some(data) = &desc.initial_data {
            if desc.format.is_depth() {
                log::warn!("WgpuTableDriver: initial data of depth texture '{}' ignored", desc.debug_name);
            } else {
                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    data,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(desc.width * desc.format.bytes_per_pixel()),
                        rows_per_image: Some(desc.height),
                    },
                    size,
                );
            }
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&desc.debug_name),
            dimension: Some(desc.texture_type.into_wgpu()),
            ..Default::default()
        });
        Ok(self.insert(WgpuObject::Texture(TextureObject {
            texture,
            view,
            format: desc.format,
            width: desc.width,
            height: desc.height,
        })))
    }

    fn write_texture_rows(&mut self, texture: u64, y: u32, rows: u32, data: &[u8]) {
        let Some(WgpuObject::Texture(t)) = self.objects.get(&texture) else {
            log::warn!("WgpuTableDriver: write to unknown texture {texture}");
            return;
        };
        if y + rows > t.height {
            log::warn!("WgpuTableDriver: rows {y}..{} exceed the texture height {}", y + rows, t.height);
            return;
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &t.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(t.width * t.format.bytes_per_pixel()),
                rows_per_image: Some(rows),
            },
            wgpu::Extent3d {
                width: t.width,
                height: rows,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<u64, String> {
        let sampler = self.scoped("sampler", |device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("lumen.sampler"),
                address_mode_u: desc.wrap_u.into_wgpu(),
                address_mode_v: desc.wrap_v.into_wgpu(),
                address_mode_w: desc.wrap_w.into_wgpu(),
                mag_filter: desc.mag_filter.into_wgpu(),
                min_filter: desc.min_filter.into_wgpu(),
                mipmap_filter: desc.min_filter.into_wgpu(),
                ..Default::default()
            })
        })?;
        Ok(self.insert(WgpuObject::Sampler(sampler)))
    }

    fn destroy(&mut self, object: u64) {
        match self.objects.remove(&object) {
            Some(WgpuObject::Buffer { buffer, .. }) => buffer.destroy(),
            Some(WgpuObject::Texture(t)) => t.texture.destroy(),
            Some(_) => {}
            None => log::warn!("WgpuTableDriver: destroy of unknown object {object}"),
        }
    }

    // --- Pipelines ---

    fn compile_module(&mut self, shader: &ShaderDesc) -> Result<u64, String> {
        let source = match &shader.source {
            ShaderSource::Wgsl(text) => wgpu::ShaderSource::Wgsl(Cow::Borrowed(text.as_str())),
            ShaderSource::SpirV(words) => wgpu::ShaderSource::SpirV(Cow::Borrowed(words.as_slice())),
            ShaderSource::Glsl(_) => return Err("GLSL cannot be compiled for DX12".to_string()),
        };
        let module = self.scoped(&shader.debug_name, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&shader.debug_name),
                source,
            })
        })?;
        Ok(self.insert(WgpuObject::Module(module)))
    }

    fn create_root_signature(&mut self, label: &str, layout: &ShaderResourceLayout) -> Result<u64, String> {
        let sets = layout.sets();
        let max_set = sets.last().copied().unwrap_or(0);
        if max_set >= self.device.limits().max_bind_groups {
            return Err(format!("set {max_set} exceeds the adapter's bind group limit"));
        }
        let mut groups = Vec::with_capacity(sets.len());
        for set in sets {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = layout
                .bindings
                .iter()
                .filter(|b| b.set == set)
                .map(|b| wgpu::BindGroupLayoutEntry {
                    binding: b.binding,
                    visibility: b.visibility.into_wgpu(),
                    ty: b.kind.into_wgpu(),
                    count: None,
                })
                .collect();
            let group = self.scoped(label, |device| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(label),
                    entries: &entries,
                })
            })?;
            groups.push((set, group));
        }
        let slots: Vec<Option<&wgpu::BindGroupLayout>> = (0..=max_set)
            .map(|set| groups.iter().find(|(s, _)| *s == set).map(|(_, g)| g))
            .collect();
        let pipeline_layout = self.scoped(label, |device| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &slots,
                immediate_size: 0,
            })
        })?;
        Ok(self.insert(WgpuObject::RootSignature {
            layout: pipeline_layout,
            groups,
        }))
    }

    fn create_pipeline_state(&mut self, desc: &TablePipelineDesc<'_>) -> Result<u64, String> {
        let Some(WgpuObject::RootSignature { layout, .. }) = self.objects.get(&desc.root_signature) else {
            return Err(format!("root signature {} does not exist", desc.root_signature));
        };
        let (vertex_module, vertex_entry) = self
            .stage_module(desc.stages, ShaderStage::Vertex)?
            .ok_or_else(|| "a vertex stage is required".to_string())?;
        let fragment = self.stage_module(desc.stages, ShaderStage::Fragment)?;

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_layout
            .map(|layout| {
                layout
                    .buffers
                    .iter()
                    .map(|buffer| {
                        buffer
                            .attributes
                            .iter()
                            .map(|a| wgpu::VertexAttribute {
                                format: a.format.into_wgpu(),
                                offset: a.offset,
                                shader_location: a.location,
                            })
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = desc
            .vertex_layout
            .map(|layout| {
                layout
                    .buffers
                    .iter()
                    .zip(&attributes)
                    .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                        array_stride: buffer.stride,
                        step_mode: buffer.step_mode.into_wgpu(),
                        attributes,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let state = desc.render_state;
        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .targets
            .colors
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: format.into_wgpu(),
                    blend: state.blend_mode.into_wgpu(),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let depth_stencil = desc.targets.depth.map(|format| wgpu::DepthStencilState {
            format: format.into_wgpu(),
            depth_write_enabled: Some(state.depth_test && state.depth_write),
            depth_compare: Some(if state.depth_test {
                state.depth_func.into_wgpu()
            } else {
                wgpu::CompareFunction::Always
            }),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        if state.wireframe && !self.line_mode {
            log::debug!("WgpuTableDriver: '{}' requests wireframe without line mode support", desc.label);
        }
        if state.msaa_samples.count() > 1 {
            log::debug!(
                "WgpuTableDriver: '{}' renders single-sampled, {}x MSAA is not available on table targets",
                desc.label,
                state.msaa_samples.count()
            );
        }

        let polygon_mode = if state.wireframe && self.line_mode {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        };
        let pipeline = self.scoped(desc.label, |device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some(vertex_entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &buffers,
                },
                primitive: wgpu::PrimitiveState {
                    topology: desc.primitive.into_wgpu(),
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: state.cull_mode.into_wgpu(),
                    unclipped_depth: false,
                    polygon_mode,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: fragment.map(|(module, entry_point)| wgpu::FragmentState {
                    module,
                    entry_point: Some(entry_point),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &targets,
                }),
                multiview_mask: None,
                cache: None,
            })
        })?;
        Ok(self.insert(WgpuObject::PipelineState(pipeline)))
    }

    fn create_descriptor_heap(&mut self, root_signature: u64, tables: u32) -> Result<u64, String> {
        if !matches!(self.objects.get(&root_signature), Some(WgpuObject::RootSignature { .. })) {
            return Err(format!("root signature {root_signature} does not exist"));
        }
        Ok(self.insert(WgpuObject::Heap {
            root_signature,
            tables,
            written: HashMap::new(),
        }))
    }

    fn write_descriptor_table(&mut self, heap: u64, table: u32, writes: &[DescriptorWrite]) {
        let root_signature = match self.objects.get(&heap) {
            Some(WgpuObject::Heap {
                root_signature, tables, ..
            }) if table < *tables => *root_signature,
            Some(WgpuObject::Heap { tables, .. }) => {
                log::warn!("WgpuTableDriver: table {table} is outside heap {heap} of {tables} tables");
                return;
            }
            _ => {
                log::warn!("WgpuTableDriver: write to unknown descriptor heap {heap}");
                return;
            }
        };
        let groups = match self.build_tables(root_signature, writes) {
            Ok(groups) => groups,
            Err(err) => {
                log::warn!("WgpuTableDriver: descriptor table {table} of heap {heap} not written: {err}");
                return;
            }
        };
        if let Some(WgpuObject::Heap { written, .. }) = self.objects.get_mut(&heap) {
            written.insert(table, groups);
        }
    }

    // --- Recording ---

    fn begin_pass(&mut self, pass: &TablePass<'_>) {
        self.end_pass();
        let mut colors = Vec::with_capacity(pass.colors.len());
        for &id in pass.colors {
            match self.attachment(id) {
                Some(attachment) => colors.push(attachment),
                None => {
                    log::debug!("WgpuTableDriver: pass '{}' skipped, color target {id} unavailable", pass.label);
                    return;
                }
            }
        }
        let depth = match pass.depth {
            Some(id) => match self.attachment(id) {
                Some(attachment) => Some(attachment),
                None => {
                    log::debug!("WgpuTableDriver: pass '{}' skipped, depth target {id} unavailable", pass.label);
                    return;
                }
            },
            None => None,
        };
        let size = colors
            .first()
            .or(depth.as_ref())
            .map_or(self.back_buffer_size, |a| a.size);

        let clear = pass.clear;
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = colors
            .iter()
            .map(|attachment| {
                let load = match clear {
                    Some(c) if c.clear_color => wgpu::LoadOp::Clear(wgpu::Color {
                        r: c.color[0] as f64,
                        g: c.color[1] as f64,
                        b: c.color[2] as f64,
                        a: c.color[3] as f64,
                    }),
                    _ => wgpu::LoadOp::Load,
                };
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        let depth_stencil_attachment = depth.as_ref().map(|attachment| wgpu::RenderPassDepthStencilAttachment {
            view: &attachment.view,
            depth_ops: Some(wgpu::Operations {
                load: match clear {
                    Some(c) if c.clear_depth => wgpu::LoadOp::Clear(c.depth),
                    _ => wgpu::LoadOp::Load,
                },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: attachment.format.has_stencil().then(|| wgpu::Operations {
                load: match clear {
                    Some(c) if c.clear_stencil => wgpu::LoadOp::Clear(c.stencil),
                    _ => wgpu::LoadOp::Load,
                },
                store: wgpu::StoreOp::Store,
            }),
        });

        let render_pass = self
            .encoder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        self.pass = Some(render_pass);
        self.pass_size = size;
    }

    fn end_pass(&mut self) {
        self.pass = None;
    }

    fn transition(&mut self, texture: u64, before: ResourceState, after: ResourceState) {
        log::trace!("WgpuTableDriver: {texture} {before:?} -> {after:?} tracked by wgpu");
    }

    fn set_pipeline_state(&mut self, pipeline_state: u64) {
        let (Some(pass), Some(WgpuObject::PipelineState(pipeline))) =
            (self.pass.as_mut(), self.objects.get(&pipeline_state))
        else {
            return;
        };
        pass.set_pipeline(pipeline);
    }

    fn set_descriptor_table(&mut self, heap: u64, table: u32) {
        let (Some(pass), Some(WgpuObject::Heap { written, .. })) = (self.pass.as_mut(), self.objects.get(&heap)) else {
            return;
        };
        let Some(groups) = written.get(&table) else {
            log::warn!("WgpuTableDriver: table {table} of heap {heap} bound before being written");
            return;
        };
        for (set, group) in groups {
            pass.set_bind_group(*set, group, &[]);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: u64) {
        let (Some(pass), Some(WgpuObject::Buffer { buffer, .. })) = (self.pass.as_mut(), self.objects.get(&buffer))
        else {
            return;
        };
        pass.set_vertex_buffer(slot, buffer.slice(..));
    }

    fn set_index_buffer(&mut self, buffer: u64, format: IndexFormat) {
        let (Some(pass), Some(WgpuObject::Buffer { buffer, .. })) = (self.pass.as_mut(), self.objects.get(&buffer))
        else {
            return;
        };
        pass.set_index_buffer(buffer.slice(..), format.into_wgpu());
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        let (width, height) = (self.pass_size.0 as f32, self.pass_size.1 as f32);
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        let x = viewport.x.clamp(0.0, width);
        let y = viewport.y.clamp(0.0, height);
        pass.set_viewport(
            x,
            y,
            viewport.width.min(width - x).max(0.0),
            viewport.height.min(height - y).max(0.0),
            viewport.min_depth.clamp(0.0, 1.0),
            viewport.max_depth.clamp(0.0, 1.0),
        );
    }

    fn set_scissor(&mut self, rect: &ScissorRect) {
        let (width, height) = self.pass_size;
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        let x = rect.x.min(width);
        let y = rect.y.min(height);
        pass.set_scissor_rect(x, y, rect.width.min(width - x), rect.height.min(height - y));
    }

    fn draw(&mut self, params: &DrawParams) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        pass.draw(
            params.first_vertex..params.first_vertex + params.vertex_count,
            params.first_instance..params.first_instance + params.instance_count,
        );
    }

    fn draw_indexed(&mut self, params: &DrawIndexedParams) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        pass.draw_indexed(
            params.first_index..params.first_index + params.index_count,
            params.base_vertex,
            params.first_instance..params.first_instance + params.instance_count,
        );
    }

    fn copy_texture(&mut self, copy: &TableCopy) {
        self.end_pass();
        let (Some(source), Some(destination)) =
            (self.copy_texture_of(copy.source), self.copy_texture_of(copy.destination))
        else {
            log::warn!("WgpuTableDriver: copy between {} and {} has a missing texture", copy.source, copy.destination);
            return;
        };
        self.encoder().copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: copy.source_origin.0,
                    y: copy.source_origin.1,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &destination,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: copy.destination_origin.0,
                    y: copy.destination_origin.1,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: copy.width,
                height: copy.height,
                depth_or_array_layers: 1,
            },
        );
    }

    // --- Submission ---

    fn submit(&mut self) -> u64 {
        self.end_pass();
        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen.empty"),
            }),
        };
        self.queue.submit(std::iter::once(encoder.finish()));
        self.submitted += 1;
        let value = self.submitted;
        let completed = Arc::clone(&self.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(value, Ordering::AcqRel);
        });
        value
    }

    fn completed_fence(&mut self) -> u64 {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("WgpuTableDriver: poll failed: {err}");
        }
        self.completed.load(Ordering::Acquire)
    }

    fn wait_for_fence(&mut self, value: u64) {
        if self.completed.load(Ordering::Acquire) >= value {
            return;
        }
        if let Err(err) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::error!("WgpuTableDriver: waiting for fence {value} failed: {err}");
        }
    }

    fn present(&mut self) {
        self.end_pass();
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
    }
}

impl Drop for WgpuTableDriver {
    fn drop(&mut self) {
        self.pass = None;
        self.frame = None;
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
    }
}
