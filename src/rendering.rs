//! Rendering system with wgpu pipelines for the gradient background and point sprites.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::Projection;
use crate::engine::RenderBackend;
use crate::error::{EngineError, Result};
use crate::sync::{PointBuffers, SceneBuffers};
use crate::theme::ThemeDescriptor;

/// Uniform buffer shared by every sprite draw
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Globals {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    /// Surface size in device pixels
    pub viewport: [f32; 2],
    pub point_scale: f32,
    pub pixel_ratio: f32,
}

/// Per-population sprite look
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct SpriteStyle {
    /// White light added at the sprite center, scaled by the sprite's brightest channel
    pub glow: f32,
    /// How fast the glow drops off with distance from the center
    pub glow_falloff: f32,
    pub alpha: f32,
    /// Normalized radius where alpha starts to fall off (0 = fade from the center)
    pub edge_start: f32,
}

/// Styles in population order: wave, bokeh, trails, heads
pub const POPULATION_STYLES: [SpriteStyle; 4] = [
    SpriteStyle {
        glow: 0.5,
        glow_falloff: 3.0,
        alpha: 0.8,
        edge_start: 0.0,
    },
    SpriteStyle {
        glow: 0.0,
        glow_falloff: 0.0,
        alpha: 0.3,
        edge_start: 0.2,
    },
    SpriteStyle {
        glow: 0.0,
        glow_falloff: 0.0,
        alpha: 0.8,
        edge_start: 0.0,
    },
    SpriteStyle {
        glow: 0.8,
        glow_falloff: 2.0,
        alpha: 1.0,
        edge_start: 0.0,
    },
];

const POPULATION_LABELS: [&str; 4] = ["Wave", "Bokeh", "Trail", "Head"];

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const SIZE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32];

/// Uniform buffer for the background shader (colors padded to vec4)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct BackgroundUniforms {
    pub top: [f32; 4],
    pub bottom: [f32; 4],
}

impl BackgroundUniforms {
    pub fn from_theme(theme: &ThemeDescriptor) -> Self {
        let [tr, tg, tb] = theme.background_top;
        let [br, bg, bb] = theme.background_bottom;
        Self {
            top: [tr, tg, tb, 1.0],
            bottom: [br, bg, bb, 1.0],
        }
    }
}

/// Device buffers for one population
struct PopulationGpu {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    sizes: wgpu::Buffer,
    style_buffer: wgpu::Buffer,
    style_bind_group: wgpu::BindGroup,
    count: u32,
}

impl PopulationGpu {
    fn destroy(&self) {
        self.positions.destroy();
        self.colors.destroy();
        self.sizes.destroy();
        self.style_buffer.destroy();
    }
}

/// Everything the rendering system holds on the device
struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    background_pipeline: wgpu::RenderPipeline,
    background_uniform_buffer: wgpu::Buffer,
    background_bind_group: wgpu::BindGroup,
    sprite_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    style_bind_group_layout: wgpu::BindGroupLayout,
    populations: Vec<PopulationGpu>,
    projection: Option<Projection>,
}

impl GpuState {
    async fn new(window: Arc<Window>, theme: &ThemeDescriptor) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Create surface (window must have 'static lifetime via Arc)
        let surface = instance.create_surface(window).map_err(|e| {
            EngineError::BackendUnavailable(format!("Failed to create surface: {}", e))
        })?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                EngineError::BackendUnavailable("Failed to find suitable GPU adapter".to_string())
            })?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| {
                EngineError::BackendUnavailable(format!("Failed to request device: {}", e))
            })?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| {
                EngineError::BackendUnavailable("Surface reports no texture formats".to_string())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        tracing::debug!(
            adapter = %adapter.get_info().name,
            backend = ?adapter.get_info().backend,
            format = ?surface_format,
            "GPU adapter selected"
        );

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sprite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("particles.wgsl").into()),
        });

        let background_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Background Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("background.wgsl").into()),
        });

        // Background uniforms and bind group
        let background_uniform_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Background Uniform Buffer"),
                contents: bytemuck::cast_slice(&[BackgroundUniforms::from_theme(theme)]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let background_bind_group_layout =
            uniform_layout(&device, "Background Bind Group Layout", wgpu::ShaderStages::FRAGMENT);

        let background_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Background Bind Group"),
            layout: &background_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: background_uniform_buffer.as_entire_binding(),
            }],
        });

        let background_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Background Pipeline Layout"),
                bind_group_layouts: &[&background_bind_group_layout],
                push_constant_ranges: &[],
            });

        let background_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Background Pipeline"),
            layout: Some(&background_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &background_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &background_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Sprite globals (group 0) and per-population style (group 1)
        let globals = Globals {
            view: Mat4::IDENTITY.to_cols_array_2d(),
            proj: Mat4::IDENTITY.to_cols_array_2d(),
            viewport: [config.width as f32, config.height as f32],
            point_scale: 1.0,
            pixel_ratio: 1.0,
        };

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals Buffer"),
            contents: bytemuck::cast_slice(&[globals]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let globals_bind_group_layout =
            uniform_layout(&device, "Globals Bind Group Layout", wgpu::ShaderStages::VERTEX);

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &globals_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let style_bind_group_layout =
            uniform_layout(&device, "Style Bind Group Layout", wgpu::ShaderStages::FRAGMENT);

        let sprite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Sprite Pipeline Layout"),
                bind_group_layouts: &[&globals_bind_group_layout, &style_bind_group_layout],
                push_constant_ranges: &[],
            });

        // Additive: overlapping sprites brighten instead of occluding
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let sprite_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&sprite_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &sprite_shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    instance_layout(std::mem::size_of::<[f32; 3]>(), &POSITION_ATTRIBUTES),
                    instance_layout(std::mem::size_of::<[f32; 3]>(), &COLOR_ATTRIBUTES),
                    instance_layout(std::mem::size_of::<f32>(), &SIZE_ATTRIBUTES),
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &sprite_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            background_pipeline,
            background_uniform_buffer,
            background_bind_group,
            sprite_pipeline,
            globals_buffer,
            globals_bind_group,
            style_bind_group_layout,
            populations: Vec::new(),
            projection: None,
        })
    }

    fn create_population(
        &self,
        label: &str,
        points: &PointBuffers,
        style: SpriteStyle,
    ) -> PopulationGpu {
        let positions =
            self.create_vertex_buffer(label, "Positions", bytemuck::cast_slice(points.positions()));
        let colors =
            self.create_vertex_buffer(label, "Colors", bytemuck::cast_slice(points.colors()));
        let sizes = self.create_vertex_buffer(label, "Sizes", bytemuck::cast_slice(points.sizes()));

        let style_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Style Buffer", label)),
                contents: bytemuck::cast_slice(&[style]),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let style_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Style Bind Group", label)),
            layout: &self.style_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: style_buffer.as_entire_binding(),
            }],
        });

        PopulationGpu {
            positions,
            colors,
            sizes,
            style_buffer,
            style_bind_group,
            count: points.len() as u32,
        }
    }

    /// Vertex buffer holding `contents`; never zero-sized so empty populations stay valid
    fn create_vertex_buffer(&self, label: &str, attribute: &str, contents: &[u8]) -> wgpu::Buffer {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} {} Buffer", label, attribute)),
            size: contents.len().max(4) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !contents.is_empty() {
            self.queue.write_buffer(&buffer, 0, contents);
        }
        buffer
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn write_globals(&self, view: Mat4) {
        let Some(projection) = self.projection else {
            return;
        };
        let globals = Globals {
            view: view.to_cols_array_2d(),
            proj: projection.matrix().to_cols_array_2d(),
            viewport: [self.config.width as f32, self.config.height as f32],
            point_scale: projection.point_scale,
            pixel_ratio: projection.pixel_ratio,
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[globals]));
    }

    fn allocate(&mut self, buffers: &mut SceneBuffers) {
        self.release_populations();

        let populations: Vec<PopulationGpu> = buffers
            .populations()
            .iter()
            .zip(POPULATION_LABELS)
            .zip(POPULATION_STYLES)
            .map(|((points, label), style)| self.create_population(label, points, style))
            .collect();
        self.populations = populations;

        for points in buffers.populations_mut() {
            points.clear_dirty();
        }

        tracing::debug!(
            wave = buffers.wave.len(),
            bokeh = buffers.bokeh.len(),
            trails = buffers.trails.len(),
            heads = buffers.heads.len(),
            "Particle buffers allocated"
        );
    }

    fn upload(&mut self, buffers: &mut SceneBuffers) {
        for (gpu, points) in self.populations.iter().zip(buffers.populations_mut()) {
            let dirty = points.dirty();
            if dirty.positions && !points.is_empty() {
                self.queue
                    .write_buffer(&gpu.positions, 0, bytemuck::cast_slice(points.positions()));
            }
            if dirty.colors && !points.is_empty() {
                self.queue
                    .write_buffer(&gpu.colors, 0, bytemuck::cast_slice(points.colors()));
            }
            if dirty.sizes && !points.is_empty() {
                self.queue
                    .write_buffer(&gpu.sizes, 0, bytemuck::cast_slice(points.sizes()));
            }
            points.clear_dirty();
        }
    }

    fn set_projection(&mut self, projection: &Projection) {
        let (width, height) = (projection.viewport.width, projection.viewport.height);
        if width > 0 && height > 0 && (width, height) != (self.config.width, self.config.height) {
            self.config.width = width;
            self.config.height = height;
            self.reconfigure();
        }
        self.projection = Some(*projection);
    }

    fn draw(&mut self, view: Mat4) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                tracing::warn!("Surface {:?}, reconfiguring and skipping frame", e);
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(EngineError::Surface(e.to_string())),
        };

        self.write_globals(view);

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Background first
            render_pass.set_pipeline(&self.background_pipeline);
            render_pass.set_bind_group(0, &self.background_bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Fullscreen triangle

            // Particles: six vertices per instance
            render_pass.set_pipeline(&self.sprite_pipeline);
            render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
            for population in self.populations.iter().filter(|p| p.count > 0) {
                render_pass.set_bind_group(1, &population.style_bind_group, &[]);
                render_pass.set_vertex_buffer(0, population.positions.slice(..));
                render_pass.set_vertex_buffer(1, population.colors.slice(..));
                render_pass.set_vertex_buffer(2, population.sizes.slice(..));
                render_pass.draw(0..6, 0..population.count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn release_populations(&mut self) {
        for population in self.populations.drain(..) {
            population.destroy();
        }
    }

    /// Free every buffer, then the device itself; pipelines, bind groups and
    /// the surface go with `self`
    fn destroy(mut self) {
        self.release_populations();
        self.globals_buffer.destroy();
        self.background_uniform_buffer.destroy();
        self.device.destroy();
    }
}

/// Rendering system managing wgpu device, pipelines, and buffers
///
/// Once released it holds nothing on the device and refuses further use.
pub struct RenderSystem {
    gpu: Option<GpuState>,
}

impl RenderSystem {
    /// Create new rendering system
    pub async fn new(window: Arc<Window>, theme: &ThemeDescriptor) -> Result<Self> {
        let gpu = GpuState::new(window, theme).await?;
        Ok(Self { gpu: Some(gpu) })
    }

    /// Whether device resources have been released
    pub fn is_released(&self) -> bool {
        self.gpu.is_none()
    }
}

impl RenderBackend for RenderSystem {
    fn allocate(&mut self, buffers: &mut SceneBuffers) -> Result<()> {
        let gpu = self.gpu.as_mut().ok_or(EngineError::Disposed)?;
        gpu.allocate(buffers);
        Ok(())
    }

    fn upload(&mut self, buffers: &mut SceneBuffers) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.upload(buffers);
        }
    }

    fn set_projection(&mut self, projection: &Projection) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.set_projection(projection);
        }
    }

    fn draw(&mut self, view: Mat4) -> Result<()> {
        self.gpu.as_mut().ok_or(EngineError::Disposed)?.draw(view)
    }

    fn release(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
            tracing::debug!("GPU resources released");
        }
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        self.release();
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// One tightly packed per-instance attribute stream
fn instance_layout(
    stride: usize,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes,
    }
}
