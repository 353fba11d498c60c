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
    ClearParams, CommandBuffer, Device, DeviceConfig, DrawParams, GraphicsApi, Pipeline, RenderStats, ResourceState,
    TextureDesc, TextureFormat,
};
use lumen_infra::graphics::gl::GlDevice;
use lumen_infra::graphics::table::TableDevice;
use lumen_infra::DeviceFactory;
use std::sync::Arc;

const HEADLESS: [GraphicsApi; 2] = [GraphicsApi::OpenGl, GraphicsApi::Dx12];

fn record_frame(list: &CommandBuffer, pipeline: &Arc<Pipeline>) {
    list.begin().unwrap();
    list.clear(ClearParams::color([0.2, 0.2, 0.2, 1.0])).unwrap();
    list.bind_pipeline(Some(Arc::clone(pipeline))).unwrap();
    list.draw(DrawParams::new(3)).unwrap();
    list.draw(DrawParams::new(6).instanced(2)).unwrap();
    list.end().unwrap();
}

fn run_frame(device: &mut dyn Device, list: &CommandBuffer) -> RenderStats {
    device.begin_frame();
    device.execute_command_list(list).unwrap();
    device.end_frame();
    device.flush();
    device.stats()
}

#[test]
fn re_recording_a_list_reproduces_its_effects() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        let pipeline = common::unlit_pipeline(device.as_mut());
        let list = CommandBuffer::new("frame");

        record_frame(&list, &pipeline);
        let first = run_frame(device.as_mut(), &list);
        record_frame(&list, &pipeline);
        let second = run_frame(device.as_mut(), &list);

        assert_eq!(list.command_count(), 4, "{api}");
        assert_eq!(first.draw_calls, 2, "{api}");
        assert_eq!(second.draw_calls, first.draw_calls, "{api}");
        assert_eq!(second.vertices, first.vertices, "{api}");
        assert_eq!(second.triangles, first.triangles, "{api}");
        assert_eq!(second.frame_number, first.frame_number + 1, "{api}");
    }
    Ok(())
}

#[test]
fn executing_a_recorded_list_twice_is_allowed() -> Result<()> {
    let mut device = DeviceFactory::create(&DeviceConfig::headless(GraphicsApi::OpenGl), None)?;
    let pipeline = common::unlit_pipeline(device.as_mut());
    let list = CommandBuffer::new("replay");
    record_frame(&list, &pipeline);

    let first = run_frame(device.as_mut(), &list);
    let second = run_frame(device.as_mut(), &list);
    assert_eq!(first.draw_calls, second.draw_calls);
    Ok(())
}

#[test]
fn gl_commits_are_idempotent() -> Result<()> {
    let mut device = GlDevice::headless(&DeviceConfig::headless(GraphicsApi::OpenGl))?;
    let pipeline = common::unlit_pipeline(&mut device);
    device.begin_frame();
    device.bind_pipeline(Some(&pipeline));

    pipeline.set_uniform("u_time", 0.5f32);
    pipeline.set_uniform("Globals.u_tint", [1.0f32, 0.0, 0.0, 1.0]);
    device.commit_parameters(&pipeline);
    let committed = device.api().counts();
    assert_eq!(committed.uniform_writes, 1);
    assert_eq!(committed.buffer_writes, 1);

    device.commit_parameters(&pipeline);
    pipeline.set_uniform("u_time", 0.5f32);
    device.commit_parameters(&pipeline);
    assert_eq!(device.api().counts(), committed);
    Ok(())
}

#[test]
fn table_commits_are_idempotent() -> Result<()> {
    let mut device = TableDevice::headless(&DeviceConfig::headless(GraphicsApi::Dx12))?;
    let pipeline = common::unlit_pipeline(&mut device);
    device.begin_frame();

    pipeline.set_uniform("tint", [0.0f32, 1.0, 0.0, 1.0]);
    device.commit_parameters(&pipeline);
    let writes = device.api().counts().buffer_writes;
    device.commit_parameters(&pipeline);
    device.commit_parameters(&pipeline);
    assert_eq!(device.api().counts().buffer_writes, writes);
    Ok(())
}

#[test]
fn barriers_to_the_current_state_are_dropped() -> Result<()> {
    let mut device = TableDevice::headless(&DeviceConfig::headless(GraphicsApi::Dx12))?;
    let target = device.create_texture(&TextureDesc::render_target("shadow", TextureFormat::Depth32Float, 64, 64))?;

    for _ in 0..3 {
        device.resource_barrier(&target, ResourceState::Write);
    }
    assert_eq!(device.api().counts().barriers, 1);

    device.resource_barrier(&target, ResourceState::Read);
    device.resource_barrier(&target, ResourceState::Read);
    assert_eq!(device.api().counts().barriers, 2);
    Ok(())
}

#[test]
fn every_texture_format_is_creatable() -> Result<()> {
    for api in HEADLESS {
        let mut device = DeviceFactory::create(&DeviceConfig::headless(api), None)?;
        for format in TextureFormat::ALL {
            let texture = device.create_texture(&TextureDesc::new_2d(format!("{format:?}"), format, 8, 8));
            assert!(texture.is_ok(), "{api} {format:?}: {:?}", texture.err());
        }
        assert_eq!(device.stats().texture_count as usize, TextureFormat::ALL.len(), "{api}");
    }
    Ok(())
}
