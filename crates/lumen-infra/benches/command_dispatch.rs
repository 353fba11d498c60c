use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lumen_core::{
    ClearParams, CommandBuffer, CommandQueue, Device, DeviceConfig, DrawParams, GraphicsApi, PipelineDesc, ShaderDesc,
    ShaderStage,
};
use lumen_infra::graphics::gl::GlDevice;
use std::sync::Arc;

const VERTEX: &str = r#"#version 450
layout(location = 0) in vec3 a_position;
layout(std140, binding = 0) uniform Globals {
    mat4 u_mvp;
    vec4 u_tint;
} globals;
void main() {
    gl_Position = globals.u_mvp * vec4(a_position, 1.0);
}
"#;

const FRAGMENT: &str = r#"#version 450
layout(location = 0) out vec4 o_color;
layout(std140, binding = 0) uniform Globals {
    mat4 u_mvp;
    vec4 u_tint;
} globals;
void main() {
    o_color = globals.u_tint;
}
"#;

fn record(list: &CommandBuffer, pipeline: &Arc<lumen_core::Pipeline>, draws: u32) {
    list.begin().unwrap();
    list.clear(ClearParams::default()).unwrap();
    list.bind_pipeline(Some(Arc::clone(pipeline))).unwrap();
    for i in 0..draws {
        list.draw(DrawParams::new(3 + i % 3)).unwrap();
    }
    list.end().unwrap();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut device = GlDevice::headless(&DeviceConfig::headless(GraphicsApi::OpenGl)).unwrap();
    let desc = PipelineDesc::new("bench")
        .with_shader(ShaderDesc::glsl("bench.vert", ShaderStage::Vertex, VERTEX))
        .with_shader(ShaderDesc::glsl("bench.frag", ShaderStage::Fragment, FRAGMENT));
    let pipeline = device.create_pipeline(&desc);
    assert!(pipeline.is_linked(), "{}", pipeline.compile_log());

    let mut group = c.benchmark_group("Command Dispatch");

    // 1,000 draws recorded once and replayed every frame
    let list = CommandBuffer::new("replayed");
    record(&list, &pipeline, 1_000);
    group.bench_function("Replay (1k draws)", |b| {
        b.iter(|| {
            device.begin_frame();
            let dispatched = device.execute_command_list(&list).unwrap();
            device.end_frame();
            device.flush();
            black_box(dispatched);
        });
    });

    group.bench_function("Record (1k draws)", |b| {
        let list = CommandBuffer::new("recorded");
        b.iter(|| {
            record(&list, &pipeline, 1_000);
            black_box(list.command_count());
        });
    });

    // 16 lists of 64 draws going through the queue
    let queue = CommandQueue::new();
    let lists: Vec<Arc<CommandBuffer>> = (0..16)
        .map(|i| queue.create_command_buffer(format!("chunk-{i}")))
        .collect();
    group.bench_function("Queue drain (16 x 64 draws)", |b| {
        b.iter(|| {
            for list in &lists {
                record(list, &pipeline, 64);
                queue.submit(Arc::clone(list)).unwrap();
            }
            device.begin_frame();
            let executed = queue.execute_all(&mut device);
            device.end_frame();
            device.flush();
            black_box(executed);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
