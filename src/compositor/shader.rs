//! Optional post-process shader chain (C9): user-supplied WGSL files
//! (`-s/--shader`, repeatable) are compiled into a ping-ponged pipeline
//! chain applied to the rasterized frame texture before the final present.
//! Each shader is expected to expose `vs_main`/`fs_main` sampling
//! `@group(0) @binding(0)` texture / `@binding(1)` sampler, matching the
//! built-in blit shader's layout.

use std::path::Path;

use anyhow::{Context, Result};

use super::Vertex;

pub struct ShaderPass {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    label: String,
}

impl ShaderPass {
    pub fn load(device: &wgpu::Device, format: wgpu::TextureFormat, path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading shader {}", path.display()))?;
        let label = path.file_stem().and_then(|s| s.to_str()).unwrap_or("shader").to_owned();
        Ok(Self::from_source(device, format, &source, &label))
    }

    pub fn from_source(device: &wgpu::Device, format: wgpu::TextureFormat, source: &str, label: &str) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}-bgl")),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}-layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline, bind_group_layout, label: label.to_owned() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A chain of user shader passes executed in sequence, ping-ponging between
/// two offscreen render targets. An empty chain means the rasterized frame
/// is blitted directly with no post-processing.
pub struct ShaderChain {
    passes: Vec<ShaderPass>,
}

impl ShaderChain {
    pub fn load(device: &wgpu::Device, format: wgpu::TextureFormat, paths: &[std::path::PathBuf]) -> Result<Self> {
        let passes = paths
            .iter()
            .map(|p| ShaderPass::load(device, format, p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { passes })
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn passes(&self) -> &[ShaderPass] {
        &self.passes
    }
}
