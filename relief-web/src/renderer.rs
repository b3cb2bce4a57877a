/// WGPU renderer for terrain meshes
use std::sync::Arc;

use anyhow::{anyhow, Context};
use nalgebra::Matrix4;
use relief_core::{DrawCall, Frame, Mesh, ReliefError, Scene, SceneMesh};
use tracing::{debug, info, trace, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

const SHADER: &str = include_str!("terrain.wgsl");
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.2,
    b: 0.2,
    a: 1.0,
};

/// Remaps OpenGL clip depth (-1..1) to the 0..1 range wgpu expects.
#[rustfmt::skip]
pub fn opengl_to_wgpu() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Uniform block matching `Uniforms` in terrain.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub model_view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl Uniforms {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            model_view: frame.model_view.into(),
            projection: (opengl_to_wgpu() * frame.projection).into(),
        }
    }

    fn identity() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        Self {
            model_view: identity,
            projection: identity,
        }
    }
}

/// Vertex and index buffer sizes in bytes for a `width` x `height` field
pub fn heightfield_buffer_sizes(width: usize, height: usize) -> (u64, u64) {
    let (w, h) = (width as u64, height as u64);
    let vertex_bytes = w * h * std::mem::size_of::<[f32; 3]>() as u64;
    let index_bytes =
        6 * w.saturating_sub(1) * h.saturating_sub(1) * std::mem::size_of::<u32>() as u64;
    (vertex_bytes, index_bytes)
}

/// Reject a field whose buffers exceed the device's `max_buffer_size`.
pub fn check_buffer_limit(width: usize, height: usize, limit: u64) -> relief_core::Result<()> {
    let (vertex_bytes, index_bytes) = heightfield_buffer_sizes(width, height);
    let bytes = vertex_bytes.max(index_bytes);
    if bytes > limit {
        return Err(ReliefError::BufferTooLarge { bytes, limit });
    }
    Ok(())
}

/// GPU copy of the scene's mesh. Replacing it drops the old buffers.
pub enum GpuMesh {
    NoMesh {
        vertex_buffer: wgpu::Buffer,
        vertex_count: u32,
    },
    HeightfieldMesh {
        vertex_buffer: wgpu::Buffer,
        index_buffer: wgpu::Buffer,
        index_count: u32,
        revision: u64,
    },
}

impl GpuMesh {
    fn fallback(device: &wgpu::Device, mesh: &Mesh) -> Self {
        GpuMesh::NoMesh {
            vertex_buffer: vertex_buffer(device, mesh, "fallback box vertices"),
            vertex_count: mesh.vertex_count() as u32,
        }
    }

    fn heightfield(device: &wgpu::Device, mesh: &Mesh, revision: u64) -> Self {
        let indices = mesh.indices.as_deref().unwrap_or_default();
        // A one-row field has no indices; keep a non-empty buffer anyway
        let contents: &[u32] = if indices.is_empty() { &[0] } else { indices };

        GpuMesh::HeightfieldMesh {
            vertex_buffer: vertex_buffer(device, mesh, "terrain vertices"),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("terrain indices"),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: indices.len() as u32,
            revision,
        }
    }

    fn draw_call(&self) -> DrawCall {
        match self {
            GpuMesh::NoMesh { vertex_count, .. } => DrawCall::NonIndexed {
                vertex_count: *vertex_count,
            },
            GpuMesh::HeightfieldMesh { index_count, .. } => DrawCall::Indexed {
                index_count: *index_count,
            },
        }
    }

    fn revision(&self) -> Option<u64> {
        match self {
            GpuMesh::NoMesh { .. } => None,
            GpuMesh::HeightfieldMesh { revision, .. } => Some(*revision),
        }
    }
}

fn vertex_buffer(device: &wgpu::Device, mesh: &Mesh, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&mesh.positions),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    mesh: GpuMesh,
    rejected_revision: Option<u64>,
}

impl GpuRenderer {
    pub async fn new(window: Arc<Window>, fallback: &Mesh) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("creating drawing surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no compatible graphics adapter"))?;
        info!(adapter = ?adapter.get_info().name, "using graphics adapter");

        let required_limits = if cfg!(target_arch = "wasm32") {
            wgpu::Limits::downlevel_webgl2_defaults()
        } else {
            wgpu::Limits::default()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("relief device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                },
                None,
            )
            .await
            .context("requesting graphics device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no texture formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniforms"),
            contents: bytemuck::bytes_of(&Uniforms::identity()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terrain pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Both sides of the terrain are visible
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let depth_view = create_depth_view(&device, &config);
        let mesh = GpuMesh::fallback(&device, fallback);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            depth_view,
            mesh,
            rejected_revision: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, &self.config);
        debug!(width, height, "surface resized");
    }

    /// Reconfigure with the current size after the surface was lost
    pub fn reconfigure(&mut self) {
        self.resize(self.config.width, self.config.height);
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// Upload the scene's mesh if it changed since the last upload.
    ///
    /// A mesh too large for the device is refused once; the previous GPU
    /// mesh stays on screen.
    pub fn sync_mesh(&mut self, scene: &Scene) -> relief_core::Result<()> {
        let SceneMesh::HeightfieldMesh {
            mesh,
            width,
            height,
        } = scene.mesh()
        else {
            return Ok(());
        };
        let revision = scene.revision();
        if self.mesh.revision() == Some(revision) || self.rejected_revision == Some(revision) {
            return Ok(());
        }

        if let Err(e) = check_buffer_limit(*width, *height, self.device.limits().max_buffer_size) {
            warn!(revision, error = %e, "terrain too large for the GPU");
            self.rejected_revision = Some(revision);
            return Err(e);
        }

        self.mesh = GpuMesh::heightfield(&self.device, mesh, revision);
        debug!(revision, "uploaded terrain buffers");
        Ok(())
    }

    pub fn render(&self, frame: &Frame) -> Result<(), wgpu::SurfaceError> {
        // Uploaded every frame, changed or not
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms::from_frame(frame)),
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("terrain pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            if self.mesh.draw_call() != frame.draw {
                trace!(held = ?self.mesh.draw_call(), wanted = ?frame.draw, "drawing previous mesh");
            }
            match &self.mesh {
                GpuMesh::HeightfieldMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count,
                    ..
                } => {
                    if *index_count > 0 {
                        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..*index_count, 0, 0..1);
                    }
                }
                GpuMesh::NoMesh {
                    vertex_buffer,
                    vertex_count,
                } => {
                    pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                    pass.draw(0..*vertex_count, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;
    use relief_core::viewer::compute_frame;
    use relief_core::ViewParams;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 128);
    }

    #[test]
    fn test_depth_remap() {
        let m = opengl_to_wgpu();
        let near = m * Vector4::new(0.0, 0.0, -1.0, 1.0);
        let far = m * Vector4::new(0.0, 0.0, 1.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-6);
        assert!((far.z / far.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_uniforms_are_column_major() {
        let frame = compute_frame(
            &ViewParams {
                pan_x: 7.0,
                ..ViewParams::default()
            },
            None,
            1.0,
            DrawCall::NonIndexed { vertex_count: 36 },
        );
        let uniforms = Uniforms::from_frame(&frame);

        // Translation lives in the fourth column
        assert!((uniforms.model_view[3][0] - frame.model_view[(0, 3)]).abs() < 1e-6);
        assert!((uniforms.model_view[3][0] - 7.0).abs() < 1e-3);
        assert_eq!(uniforms.projection[2][3], -1.0);
    }

    #[test]
    fn test_buffer_sizes_match_mesh() {
        let field = relief_core::Heightfield::new(5, 3, vec![0.25; 15]);
        let mesh = Mesh::from_heightfield(&field);
        let (vertex_bytes, index_bytes) = heightfield_buffer_sizes(5, 3);

        assert_eq!(vertex_bytes, bytemuck::cast_slice::<_, u8>(&mesh.positions).len() as u64);
        assert_eq!(index_bytes, (mesh.index_count() * 4) as u64);
        assert_eq!(heightfield_buffer_sizes(1, 9).1, 0);
    }

    #[test]
    fn test_large_heightmap_exceeds_default_limit() {
        let limit = wgpu::Limits::default().max_buffer_size;
        assert_eq!(heightfield_buffer_sizes(4096, 4096).1, 402_420_600);

        match check_buffer_limit(4096, 4096, limit) {
            Err(ReliefError::BufferTooLarge { bytes, limit: l }) => {
                assert_eq!(bytes, 402_420_600);
                assert_eq!(l, limit);
            }
            other => panic!("expected a size error, got {:?}", other),
        }
        assert!(check_buffer_limit(1024, 1024, limit).is_ok());
        assert!(check_buffer_limit(
            1024,
            1024,
            wgpu::Limits::downlevel_webgl2_defaults().max_buffer_size
        )
        .is_ok());
    }
}
