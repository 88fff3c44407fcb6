//! The GPU compositor (C9): rasterizes the terminal + overlay layers into a
//! CPU-side RGBA framebuffer (via `Font::render_cell` and the overlay
//! blitter) and presents it as a single textured quad, optionally passed
//! through a user-supplied WGSL shader chain, via a plain `wgpu`
//! device/surface/texture present path.

pub mod gpu;
pub mod shader;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use winit::window::Window;

use gpu::GpuContext;
use shader::{ShaderChain, ShaderPass};

const BLIT_SHADER_SOURCE: &str = include_str!("shaders/blit.wgsl");

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

impl Vertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x2 },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

const QUAD: [Vertex; 4] = [
    Vertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("squall-offscreen"),
            size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, width, height }
    }
}

pub struct Compositor {
    gpu: GpuContext,
    vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    blit: ShaderPass,
    shader_chain: ShaderChain,
    frame_texture: Option<wgpu::Texture>,
    frame_view: Option<wgpu::TextureView>,
    frame_size: (u32, u32),
    ping: Option<OffscreenTarget>,
    pong: Option<OffscreenTarget>,
}

impl Compositor {
    pub async fn new(window: Arc<Window>, shader_paths: &[PathBuf]) -> Result<Self> {
        let gpu = GpuContext::new(window).await?;
        let vertex_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("squall-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("squall-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let blit = ShaderPass::from_source(&gpu.device, gpu.config.format, BLIT_SHADER_SOURCE, "blit");
        let shader_chain = ShaderChain::load(&gpu.device, gpu.config.format, shader_paths)?;

        Ok(Self {
            gpu,
            vertex_buffer,
            sampler,
            blit,
            shader_chain,
            frame_texture: None,
            frame_view: None,
            frame_size: (0, 0),
            ping: None,
            pong: None,
        })
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    fn ensure_frame_texture(&mut self, width: u32, height: u32) {
        if self.frame_size == (width, height) && self.frame_texture.is_some() {
            return;
        }
        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("squall-frame"),
            size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.frame_texture = Some(texture);
        self.frame_view = Some(view);
        self.frame_size = (width, height);
        if !self.shader_chain.is_empty() {
            self.ping = Some(OffscreenTarget::new(&self.gpu.device, self.gpu.config.format, width, height));
            self.pong = Some(OffscreenTarget::new(&self.gpu.device, self.gpu.config.format, width, height));
        }
    }

    fn bind_group_for(&self, layout: &wgpu::BindGroupLayout, view: &wgpu::TextureView) -> wgpu::BindGroup {
        self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("squall-frame-bind-group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        })
    }

    fn run_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &ShaderPass,
        source_view: &wgpu::TextureView,
        target_view: &wgpu::TextureView,
    ) {
        let bind_group = self.bind_group_for(&pass.bind_group_layout, source_view);
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("squall-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(wgpu::Color::BLACK), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&pass.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.draw(0..4, 0..1);
    }

    /// Upload the rasterized frame and present it, applying the shader
    /// chain (if any) between the frame texture and the final blit.
    pub fn present(&mut self, framebuffer_rgba: &[u8], fb_width: u32, fb_height: u32) -> Result<()> {
        self.ensure_frame_texture(fb_width, fb_height);
        let texture = self.frame_texture.as_ref().unwrap();
        self.gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            framebuffer_rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * fb_width),
                rows_per_image: Some(fb_height),
            },
            wgpu::Extent3d { width: fb_width, height: fb_height, depth_or_array_layers: 1 },
        );

        let surface_texture = self.gpu.surface.get_current_texture()?;
        let surface_view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("squall-encoder"),
        });

        if self.shader_chain.is_empty() {
            self.run_pass(&mut encoder, &self.blit, self.frame_view.as_ref().unwrap(), &surface_view);
        } else {
            let passes = self.shader_chain.passes();
            let mut source = self.frame_view.as_ref().unwrap();
            let ping_view = &self.ping.as_ref().unwrap().view;
            let pong_view = &self.pong.as_ref().unwrap().view;
            let targets = [ping_view, pong_view];
            for (i, pass) in passes.iter().enumerate() {
                let is_last = i + 1 == passes.len();
                let target = if is_last { &surface_view } else { targets[i % 2] };
                self.run_pass(&mut encoder, pass, source, target);
                source = targets[i % 2];
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }
}
