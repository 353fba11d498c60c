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

mod common;

use anyhow::Result;
use lumen_core::{
    ClearParams, CommandBuffer, Device, DeviceConfig, DeviceError, DrawParams, GpuResource, GraphicsApi,
    PipelineDesc, RecordingError, ShaderDesc, ShaderResourceLayout, ShaderStage, TextureDesc, TextureFormat,
};
use lumen_infra::graphics::gl::GlDevice;
use lumen_infra::graphics::table::{DescriptorResource, TableDevice};
use lumen_infra::DeviceFactory;

const HEADLESS: [GraphicsApi; 2] = [GraphicsApi::OpenGl, GraphicsApi::Dx12];

#[test]
fn linked_pipelines_on_every_headless_backend() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        assert_eq!(device.backend_type(), api);
        let pipeline = common::unlit_pipeline(device.as_mut());
        assert!(pipeline.compile_log().is_empty(), "{api}");
        assert_eq!(device.stats().pipeline_count, 1, "{api}");
    }
    Ok(())
}

#[test]
fn a_missing_fragment_stage_fails_the_gl_link() -> Result<()> {
    let mut device = DeviceFactory::create(&DeviceConfig::headless(GraphicsApi::OpenGl), None)?;
    let desc = PipelineDesc::new("vertex-only").with_shader(ShaderDesc::glsl(
        "unlit.vert",
        ShaderStage::Vertex,
        common::GL_VERTEX,
    ));
    let pipeline = device.create_pipeline(&desc);
    assert!(!pipeline.is_linked());
    assert!(pipeline.compile_log().contains("fragment"), "{}", pipeline.compile_log());
    Ok(())
}

#[test]
fn a_fragment_that_does_not_compile_fails_the_pipeline() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        let desc = match api {
            GraphicsApi::OpenGl => PipelineDesc::new("broken-fragment")
                .with_shader(ShaderDesc::glsl("unlit.vert", ShaderStage::Vertex, common::GL_VERTEX))
                .with_shader(ShaderDesc::glsl(
                    "broken.frag",
                    ShaderStage::Fragment,
                    "#version 450\nlayout(location = 0) out vec4 o_color;\nvoid main() { o_color = oops; }\n",
                )),
            _ => PipelineDesc::new("broken-fragment")
                .with_shader(ShaderDesc::wgsl("unlit.vs", ShaderStage::Vertex, common::WGSL_UNLIT, "vs_main"))
                .with_shader(ShaderDesc::wgsl(
                    "broken.frag",
                    ShaderStage::Fragment,
                    "@fragment fn fs_main() -> @location(0) vec4<f32> { return oops; }",
                    "fs_main",
                )),
        };
        let pipeline = device.create_pipeline(&desc);
        assert!(!pipeline.is_linked(), "{api}");
        assert!(pipeline.compile_log().contains("broken.frag"), "{api}: {}", pipeline.compile_log());

        device.begin_frame();
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));
        device.end_frame();
        assert_eq!(device.stats().draw_calls, 0, "{api}");
    }
    Ok(())
}

#[test]
fn broken_wgsl_fails_the_table_build() -> Result<()> {
    let mut device = DeviceFactory::create(&DeviceConfig::headless(GraphicsApi::Dx12), None)?;
    let source = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return oops; }";
    let desc = PipelineDesc::new("broken")
        .with_shader(ShaderDesc::wgsl("broken.vs", ShaderStage::Vertex, source, "vs_main"))
        .with_shader(ShaderDesc::wgsl("unlit.fs", ShaderStage::Fragment, common::WGSL_UNLIT, "fs_main"));
    let pipeline = device.create_pipeline(&desc);
    assert!(!pipeline.is_linked());
    assert!(!pipeline.compile_log().is_empty());

    // A failed pipeline draws nothing.
    device.begin_frame();
    device.bind_pipeline(Some(&pipeline));
    device.draw(&DrawParams::new(3));
    device.end_frame();
    assert_eq!(device.stats().draw_calls, 0);
    Ok(())
}

#[test]
fn clear_then_draw_counts_one_call_and_three_vertices() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        let pipeline = common::unlit_pipeline(device.as_mut());
        let before = device.stats();

        device.begin_frame();
        device.clear(&ClearParams::color([0.0, 0.0, 0.0, 1.0]));
        device.bind_pipeline(Some(&pipeline));
        device.draw(&DrawParams::new(3));
        device.end_frame();
        device.present();

        let after = device.stats();
        assert_eq!(after.frame_number, before.frame_number + 1, "{api}");
        assert_eq!(after.draw_calls, 1, "{api}");
        assert_eq!(after.vertices, 3, "{api}");
        assert_eq!(after.triangles, 1, "{api}");
    }
    Ok(())
}

#[test]
fn a_recorded_clear_and_draw_without_a_pipeline_is_counted() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        device.begin_frame();
        let before = device.stats();

        let list = CommandBuffer::new("scene");
        list.begin()?;
        list.clear(ClearParams::color([0.0, 0.0, 0.0, 1.0]))?;
        list.draw(DrawParams::new(3))?;
        list.end()?;
        list.execute(device.as_mut())?;

        let after = device.stats();
        assert_eq!(after.draw_calls, before.draw_calls + 1, "{api}");
        assert_eq!(after.vertices, before.vertices + 3, "{api}");
        device.end_frame();
        device.present();
    }
    Ok(())
}

#[test]
fn recording_protocol_violations_are_reported() {
    let list = CommandBuffer::new("frame");
    list.begin().unwrap();
    assert!(matches!(list.begin(), Err(RecordingError::AlreadyRecording(_))));
    list.end().unwrap();
    assert!(matches!(list.end(), Err(RecordingError::NotRecording(_))));
    assert!(matches!(
        list.draw(DrawParams::new(3)),
        Err(RecordingError::NotRecording(_))
    ));
}

#[test]
fn nested_begin_frame_keeps_the_frame() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        device.begin_frame();
        device.begin_frame();
        assert_eq!(device.stats().frame_number, 1, "{api}");
        device.end_frame();
        device.end_frame();
        device.flush();
        assert_eq!(device.stats().frame_number, 1, "{api}");
    }
    Ok(())
}

#[test]
fn unbound_gl_slot_samples_the_default_texture() -> Result<()> {
    let mut device = GlDevice::headless(&DeviceConfig::headless(GraphicsApi::OpenGl))?;
    device.bind_texture(None, 2);
    assert_eq!(device.api().texture_on_unit(2) as u64, device.default_texture_raw());
    Ok(())
}

#[test]
fn unbound_table_slot_samples_the_default_texture() -> Result<()> {
    let config = DeviceConfig::headless(GraphicsApi::Dx12);
    let mut device = TableDevice::headless(&config)?;
    let pipeline = common::unlit_pipeline(&mut device);
    device.begin_frame();
    device.bind_pipeline(Some(&pipeline));
    device.draw(&DrawParams::new(3));

    let heap = device.pipeline_heap(&pipeline).expect("linked pipelines own a heap");
    let table = device.frame_index() as u32 * config.max_draws_per_pipeline;
    let writes = device.api().descriptor_table(heap, table).expect("the draw wrote a table");
    let albedo = writes.iter().find(|w| w.binding == 1).expect("albedo is bound");
    assert_eq!(albedo.resource, DescriptorResource::Texture(device.default_texture_raw()));
    Ok(())
}

#[test]
fn unbinding_a_gl_texture_restores_the_default() -> Result<()> {
    let mut device = GlDevice::headless(&DeviceConfig::headless(GraphicsApi::OpenGl))?;
    let desc = common::unlit_desc(GraphicsApi::OpenGl)
        .with_resource_layout(ShaderResourceLayout::new().texture("albedo", 0, 0));
    let pipeline = device.create_pipeline(&desc);
    assert!(pipeline.is_linked(), "{}", pipeline.compile_log());
    let albedo = device.create_texture(&TextureDesc::new_2d("albedo", TextureFormat::Rgba8Unorm, 4, 4))?;

    device.begin_frame();
    device.bind_pipeline(Some(&pipeline));
    device.bind_texture(Some(&albedo), 0);
    assert_eq!(device.api().texture_on_unit(0) as u64, albedo.raw());
    device.bind_texture(None, 0);
    drop(albedo);
    device.draw(&DrawParams::new(3));

    assert_eq!(device.api().texture_on_unit(0) as u64, device.default_texture_raw());
    assert_eq!(device.stats().draw_calls, 1);
    Ok(())
}

#[test]
fn unbinding_a_table_texture_restores_the_default() -> Result<()> {
    let config = DeviceConfig::headless(GraphicsApi::Dx12);
    let mut device = TableDevice::headless(&config)?;
    let pipeline = common::unlit_pipeline(&mut device);
    let albedo = device.create_texture(&TextureDesc::new_2d("albedo", TextureFormat::Rgba8Unorm, 4, 4))?;
    let albedo_raw = albedo.raw();

    device.begin_frame();
    device.bind_pipeline(Some(&pipeline));
    device.bind_texture(Some(&albedo), 0);
    device.draw(&DrawParams::new(3));
    device.bind_texture(None, 0);
    drop(albedo);
    device.draw(&DrawParams::new(3));

    let heap = device.pipeline_heap(&pipeline).expect("linked pipelines own a heap");
    let first = device.frame_index() as u32 * config.max_draws_per_pipeline;
    let sampled = |table: u32| {
        let writes = device.api().descriptor_table(heap, table).expect("the draw wrote a table");
        writes.iter().find(|w| w.binding == 1).map(|w| w.resource)
    };
    assert_eq!(sampled(first), Some(DescriptorResource::Texture(albedo_raw)));
    assert_eq!(
        sampled(first + 1),
        Some(DescriptorResource::Texture(device.default_texture_raw()))
    );
    assert_eq!(device.stats().draw_calls, 2);
    Ok(())
}

#[test]
fn vulkan_requests_fall_back_to_opengl() -> Result<()> {
    let (device, notice) = DeviceFactory::create_with_notice(&DeviceConfig::headless(GraphicsApi::Vulkan), None)?;
    assert_eq!(device.backend_type(), GraphicsApi::OpenGl);
    let Some(DeviceError::BackendUnavailable { api, reason }) = &notice else {
        panic!("the fallback was not reported: {notice:?}");
    };
    assert_eq!(*api, GraphicsApi::Vulkan);
    assert!(!reason.is_empty());
    Ok(())
}

#[test]
fn windowed_devices_need_a_window() {
    let mut config = DeviceConfig::headless(GraphicsApi::OpenGl);
    config.headless = false;
    assert!(matches!(
        DeviceFactory::create(&config, None),
        Err(DeviceError::NoUsableBackend(_))
    ));
}
