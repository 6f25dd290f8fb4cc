/*!
# wgpu Backend

Offscreen implementation of [`RenderBackend`]. Each record attribute lives in
its own instance-rate vertex buffer; per-panel uniforms are packed into one
buffer and selected with a dynamic offset, so every panel is one instanced
draw of a 4-vertex strip.
*/

use crate::frame::{FrameParams, GlobalUniforms, PanelUniforms};
use crate::shaders;
use crate::{ContextState, RenderBackend};
use image::RgbaImage;
use locusview_core::{Attribute, EngineError, EngineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wgpu::util::DeviceExt;

pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DENSITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

static INSTANCE_ATTRIBUTES: [[wgpu::VertexAttribute; 1]; 8] = [
    wgpu::vertex_attr_array![0 => Float32],
    wgpu::vertex_attr_array![1 => Float32],
    wgpu::vertex_attr_array![2 => Float32],
    wgpu::vertex_attr_array![3 => Float32],
    wgpu::vertex_attr_array![4 => Uint32],
    wgpu::vertex_attr_array![5 => Float32],
    wgpu::vertex_attr_array![6 => Float32],
    wgpu::vertex_attr_array![7 => Uint32],
];

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// One vertex buffer layout per [`Attribute`], in slot order.
pub fn instance_layouts() -> [wgpu::VertexBufferLayout<'static>; 8] {
    std::array::from_fn(|slot| wgpu::VertexBufferLayout {
        array_stride: Attribute::STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES[slot],
    })
}

struct Pipelines {
    globals_layout: wgpu::BindGroupLayout,
    density_layout: wgpu::BindGroupLayout,
    shapes: wgpu::RenderPipeline,
    accumulate: wgpu::RenderPipeline,
    blend: wgpu::RenderPipeline,
}

impl Pipelines {
    fn new(device: &wgpu::Device) -> Self {
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("LocusView Globals Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<GlobalUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<PanelUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let density_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("LocusView Density Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            }],
        });

        let base_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("LocusView Instance Pipeline Layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });
        let blend_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("LocusView Density Blend Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &density_layout],
            push_constant_ranges: &[],
        });

        let shapes = build_pipeline(
            device,
            "Shapes Pipeline",
            &base_layout,
            shaders::SHAPES_SHADER,
            "fs_main",
            TARGET_FORMAT,
            wgpu::BlendState::ALPHA_BLENDING,
        );
        let accumulate = build_pipeline(
            device,
            "Density Accumulate Pipeline",
            &base_layout,
            shaders::DENSITY_ACCUMULATE_SHADER,
            "fs_accumulate",
            DENSITY_FORMAT,
            ADDITIVE_BLEND,
        );
        let blend = build_pipeline(
            device,
            "Density Blend Pipeline",
            &blend_layout,
            shaders::DENSITY_BLEND_SHADER,
            "fs_blend",
            TARGET_FORMAT,
            wgpu::BlendState::ALPHA_BLENDING,
        );

        Self {
            globals_layout,
            density_layout,
            shapes,
            accumulate,
            blend,
        }
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    fragment_source: &str,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shaders::compose(fragment_source).into()),
    });
    let buffers = instance_layouts();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: fragment_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

struct RenderTarget {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            width,
            height,
            texture,
            view,
        }
    }
}

struct DensityTarget {
    target: RenderTarget,
    bind_group: wgpu::BindGroup,
}

struct Uniforms {
    globals: wgpu::Buffer,
    panels: wgpu::Buffer,
    panel_capacity: usize,
    bind_group: wgpu::BindGroup,
}

impl Uniforms {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        panel_capacity: usize,
        panel_stride: u64,
    ) -> Self {
        let panel_capacity = panel_capacity.max(1);
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("LocusView Globals"),
            size: std::mem::size_of::<GlobalUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let panels = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("LocusView Panel Uniforms"),
            size: panel_stride * panel_capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("LocusView Globals Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &panels,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<PanelUniforms>() as u64),
                    }),
                },
            ],
        });
        Self {
            globals,
            panels,
            panel_capacity,
            bind_group,
        }
    }
}

#[derive(Default)]
struct InstanceBuffer {
    buffer: Option<wgpu::Buffer>,
    len: u64,
}

struct Resources {
    target: RenderTarget,
    pipelines: Pipelines,
    uniforms: Uniforms,
    density: Option<DensityTarget>,
    buffers: [InstanceBuffer; 8],
}

impl Resources {
    /// Common instance count, or `None` while the buffers disagree.
    fn instance_count(&self) -> Option<u32> {
        let len = self.buffers[0].len;
        if self.buffers.iter().all(|b| b.len == len) {
            Some((len / Attribute::STRIDE) as u32)
        } else {
            log::debug!("Attribute buffers disagree in length; skipping instances this frame");
            None
        }
    }

    fn bind_instances<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        for (slot, instance) in self.buffers.iter().enumerate() {
            if let Some(buffer) = &instance.buffer {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
        }
    }

    fn draw_panels<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        frame: &FrameParams,
        count: u32,
        panel_stride: u64,
    ) {
        for (i, panel) in frame.panels.iter().enumerate() {
            let Some((x, y, w, h)) = panel.scissor(self.target.width, self.target.height) else {
                continue;
            };
            pass.set_bind_group(0, &self.uniforms.bind_group, &[(i as u64 * panel_stride) as u32]);
            pass.set_scissor_rect(x, y, w, h);
            pass.draw(0..4, 0..count);
        }
    }
}

fn clear_color(rgba: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: rgba[0] as f64,
        g: rgba[1] as f64,
        b: rgba[2] as f64,
        a: rgba[3] as f64,
    }
}

fn begin_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    label: &str,
    view: &'a wgpu::TextureView,
    clear: wgpu::Color,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

async fn request_device(adapter: &wgpu::Adapter) -> EngineResult<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("LocusView GPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        )
        .await
        .map_err(|e| EngineError::resource_init(format!("GPU device request failed: {}", e)))
}

fn watch_errors(device: &wgpu::Device, lost: Arc<AtomicBool>) {
    device.on_uncaught_error(Box::new(move |error| {
        log::error!("wgpu error: {}", error);
        if let wgpu::Error::OutOfMemory { .. } = error {
            lost.store(true, Ordering::SeqCst);
        }
    }));
}

pub struct WgpuBackend {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
    panel_stride: u64,
    resources: Option<Resources>,
}

impl WgpuBackend {
    /// Blocking constructor for command-line and test use.
    pub fn new_headless() -> EngineResult<Self> {
        pollster::block_on(Self::new())
    }

    pub async fn new() -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::resource_init("no compatible GPU adapter"))?;

        let (device, queue) = request_device(&adapter).await?;
        let lost = Arc::new(AtomicBool::new(false));
        watch_errors(&device, lost.clone());
        let panel_stride = panel_stride(&device);

        let backend = Self {
            adapter,
            device,
            queue,
            lost,
            panel_stride,
            resources: None,
        };
        log::info!("Using GPU adapter: {}", backend.device_info());
        Ok(backend)
    }

    pub fn device_info(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?}, {:?})", info.name, info.device_type, info.backend)
    }

    /// Color target of the last frame, for hosts that composite it.
    pub fn target_view(&self) -> Option<&wgpu::TextureView> {
        self.resources.as_ref().map(|r| &r.target.view)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn recreate_device(&mut self) -> EngineResult<()> {
        log::info!("Requesting a new GPU device after context loss");
        let (device, queue) = pollster::block_on(request_device(&self.adapter))?;
        self.lost = Arc::new(AtomicBool::new(false));
        watch_errors(&device, self.lost.clone());
        self.panel_stride = panel_stride(&device);
        self.device = device;
        self.queue = queue;
        Ok(())
    }

    fn ready_resources(&self) -> EngineResult<&Resources> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(EngineError::ContextLost);
        }
        self.resources
            .as_ref()
            .ok_or_else(|| EngineError::resource_init("wgpu backend used before initialize"))
    }

    fn write_uniforms(&mut self, frame: &FrameParams) -> EngineResult<()> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(EngineError::ContextLost);
        }
        let stride = self.panel_stride;
        let res = self
            .resources
            .as_mut()
            .ok_or_else(|| EngineError::resource_init("wgpu backend used before initialize"))?;

        if frame.panels.len() > res.uniforms.panel_capacity {
            res.uniforms = Uniforms::new(
                &self.device,
                &res.pipelines.globals_layout,
                frame.panels.len().next_power_of_two(),
                stride,
            );
        }

        self.queue
            .write_buffer(&res.uniforms.globals, 0, bytemuck::bytes_of(&frame.globals));
        if !frame.panels.is_empty() {
            let mut staging = vec![0u8; stride as usize * frame.panels.len()];
            for (i, panel) in frame.panels.iter().enumerate() {
                let start = i * stride as usize;
                let bytes = bytemuck::bytes_of(panel);
                staging[start..start + bytes.len()].copy_from_slice(bytes);
            }
            self.queue.write_buffer(&res.uniforms.panels, 0, &staging);
        }
        Ok(())
    }

    fn ensure_density_target(&mut self) -> EngineResult<()> {
        let res = self
            .resources
            .as_mut()
            .ok_or_else(|| EngineError::resource_init("wgpu backend used before initialize"))?;
        let (width, height) = (res.target.width, res.target.height);
        let current = res
            .density
            .as_ref()
            .map(|d| (d.target.width, d.target.height));
        if current == Some((width, height)) {
            return Ok(());
        }

        let target = RenderTarget::new(
            &self.device,
            "LocusView Density Target",
            width,
            height,
            DENSITY_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("LocusView Density Bind Group"),
            layout: &res.pipelines.density_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&target.view),
            }],
        });
        res.density = Some(DensityTarget { target, bind_group });
        log::debug!("Allocated {}x{} density target", width, height);
        Ok(())
    }
}

fn panel_stride(device: &wgpu::Device) -> u64 {
    let align = device.limits().min_uniform_buffer_offset_alignment.max(1) as u64;
    let size = std::mem::size_of::<PanelUniforms>() as u64;
    (size + align - 1) / align * align
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn state(&self) -> ContextState {
        if self.lost.load(Ordering::SeqCst) {
            ContextState::Lost
        } else {
            ContextState::Ready
        }
    }

    fn size(&self) -> (u32, u32) {
        self.resources
            .as_ref()
            .map_or((0, 0), |r| (r.target.width, r.target.height))
    }

    fn initialize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::resource_init(format!(
                "render target must be non-empty, got {}x{}",
                width, height
            )));
        }
        if self.lost.load(Ordering::SeqCst) {
            self.resources = None;
            self.recreate_device()?;
        }

        let pipelines = Pipelines::new(&self.device);
        let target = RenderTarget::new(
            &self.device,
            "LocusView Color Target",
            width,
            height,
            TARGET_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let uniforms = Uniforms::new(&self.device, &pipelines.globals_layout, 4, self.panel_stride);
        self.resources = Some(Resources {
            target,
            pipelines,
            uniforms,
            density: None,
            buffers: Default::default(),
        });
        log::debug!("wgpu backend initialized at {}x{}", width, height);
        Ok(())
    }

    fn reallocate(&mut self, attribute: Attribute, data: &[u8]) -> EngineResult<()> {
        self.ready_resources()?;
        if data.len() as u64 % Attribute::STRIDE != 0 {
            return Err(EngineError::invalid_buffer_write(
                attribute.name(),
                format!("{} bytes is not a whole number of elements", data.len()),
            ));
        }
        let buffer = (!data.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(attribute.name()),
                    contents: data,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                })
        });
        if let Some(res) = self.resources.as_mut() {
            res.buffers[attribute.slot() as usize] = InstanceBuffer {
                buffer,
                len: data.len() as u64,
            };
        }
        Ok(())
    }

    fn write(&mut self, attribute: Attribute, offset: u64, data: &[u8]) -> EngineResult<()> {
        let res = self.ready_resources()?;
        let stride = Attribute::STRIDE;
        if offset % stride != 0 || data.len() as u64 % stride != 0 {
            return Err(EngineError::invalid_buffer_write(
                attribute.name(),
                format!("offset {} / length {} not aligned to {}", offset, data.len(), stride),
            ));
        }
        let instance = &res.buffers[attribute.slot() as usize];
        let end = offset + data.len() as u64;
        match &instance.buffer {
            Some(buffer) if end <= instance.len => {
                self.queue.write_buffer(buffer, offset, data);
                Ok(())
            }
            _ => Err(EngineError::invalid_buffer_write(
                attribute.name(),
                format!("write ending at {} exceeds buffer of {} bytes", end, instance.len),
            )),
        }
    }

    fn draw_shapes(&mut self, frame: &FrameParams) -> EngineResult<()> {
        self.write_uniforms(frame)?;
        let res = self.ready_resources()?;
        let count = res.instance_count().unwrap_or(0);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("LocusView Shapes Encoder"),
        });
        {
            let mut pass = begin_pass(
                &mut encoder,
                "Shapes Pass",
                &res.target.view,
                clear_color(frame.background),
            );
            if count > 0 {
                pass.set_pipeline(&res.pipelines.shapes);
                res.bind_instances(&mut pass);
                res.draw_panels(&mut pass, frame, count, self.panel_stride);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn draw_density(&mut self, frame: &FrameParams) -> EngineResult<()> {
        self.write_uniforms(frame)?;
        self.ensure_density_target()?;
        let res = self.ready_resources()?;
        let density = res
            .density
            .as_ref()
            .ok_or_else(|| EngineError::resource_init("density target missing"))?;
        let count = res.instance_count().unwrap_or(0);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("LocusView Density Encoder"),
        });
        {
            let mut pass = begin_pass(
                &mut encoder,
                "Density Accumulate Pass",
                &density.target.view,
                wgpu::Color::TRANSPARENT,
            );
            if count > 0 {
                pass.set_pipeline(&res.pipelines.accumulate);
                res.bind_instances(&mut pass);
                res.draw_panels(&mut pass, frame, count, self.panel_stride);
            }
        }
        {
            let mut pass = begin_pass(
                &mut encoder,
                "Density Blend Pass",
                &res.target.view,
                clear_color(frame.background),
            );
            if count > 0 {
                pass.set_pipeline(&res.pipelines.blend);
                pass.set_bind_group(1, &density.bind_group, &[]);
                res.bind_instances(&mut pass);
                res.draw_panels(&mut pass, frame, count, self.panel_stride);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_pixels(&mut self) -> EngineResult<RgbaImage> {
        let res = self.ready_resources()?;
        let (width, height) = (res.target.width, res.target.height);

        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = (unpadded_bytes_per_row + align - 1) / align * align;
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("LocusView Readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("LocusView Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &res.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = output.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| EngineError::resource_init("readback channel closed"))?
            .map_err(|e| EngineError::resource_init(format!("readback map failed: {}", e)))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        output.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| EngineError::resource_init("readback size mismatch"))
    }

    fn simulate_loss(&mut self) {
        log::warn!("wgpu context lost");
        self.lost.store(true, Ordering::SeqCst);
        self.resources = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_layouts_follow_attribute_slots() {
        let layouts = instance_layouts();
        for attribute in Attribute::ALL {
            let layout = &layouts[attribute.slot() as usize];
            assert_eq!(layout.array_stride, 4);
            assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
            assert_eq!(layout.attributes[0].shader_location, attribute.slot());
        }
        assert_eq!(layouts[4].attributes[0].format, wgpu::VertexFormat::Uint32);
        assert_eq!(layouts[7].attributes[0].format, wgpu::VertexFormat::Uint32);
    }

    #[test]
    fn test_headless_round_trip_when_available() {
        let mut backend = match WgpuBackend::new_headless() {
            Ok(b) => b,
            Err(e) => {
                eprintln!("skipping: {}", e);
                return;
            }
        };
        backend.initialize(8, 8).unwrap();
        let frame = FrameParams {
            globals: GlobalUniforms {
                viewport_width: 8.0,
                viewport_height: 8.0,
                point_size: 4.0,
                outline_width: 0.25,
                outline_color: [0.0, 0.0, 0.0, 1.0],
            },
            panels: Vec::new(),
            background: [1.0, 1.0, 1.0, 1.0],
        };
        backend.draw_shapes(&frame).unwrap();
        let img = backend.read_pixels().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}
