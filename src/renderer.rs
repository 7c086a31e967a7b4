use std::num::NonZeroU32;
use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::backend::{fit_to_limit, FrameInputs, SceneBackend};
use crate::error::GradientError;
use crate::mouse_trail::{BrushInstance, TrailPass, BRUSH_POOL_SIZE};
use crate::scene::{GradientUniforms, PlaneGeometry, PlaneVertex};
use crate::shaders::{gradient_program, BLIT_WGSL, TRAIL_WGSL};
use crate::texture_gen::ProceduralBitmap;

const BACKBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const PROCEDURAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TrailCameraUniform {
    half_extent: [f32; 2],
    _padding: [f32; 2],
}

/// Adapter, device and queue, shared by the scene and its window surface.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(GradientError::NoAdapter)?;
        Self::from_adapter(instance, adapter).await
    }

    pub async fn for_surface(instance: wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(surface),
            })
            .await
            .ok_or(GradientError::NoAdapter)?;
        Self::from_adapter(instance, adapter).await
    }

    async fn from_adapter(instance: wgpu::Instance, adapter: wgpu::Adapter) -> Result<Self> {
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("neat-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to request wgpu device")?;
        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

struct MaskTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct ProceduralTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    triangles: wgpu::Buffer,
    triangle_count: u32,
    lines: wgpu::Buffer,
    line_count: u32,
}

impl MeshBuffers {
    fn destroy(&self) {
        self.vertices.destroy();
        self.triangles.destroy();
        self.lines.destroy();
    }
}

struct Backbuffer {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

struct PresentTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

/// wgpu backend. Renders into an offscreen backbuffer, then blits it to the
/// window surface when one is attached.
pub struct GpuScene {
    context: GpuContext,
    width: u32,
    height: u32,
    preserve_drawing_buffer: bool,

    mask: MaskTarget,
    trail_camera: wgpu::Buffer,
    trail_bind_group: wgpu::BindGroup,
    trail_pipeline: wgpu::RenderPipeline,
    brush_instances: wgpu::Buffer,
    brush_count: u32,

    procedural: ProceduralTexture,

    uniforms: wgpu::Buffer,
    material_layout: wgpu::BindGroupLayout,
    material: wgpu::BindGroup,
    mask_sampler: wgpu::Sampler,
    procedural_sampler: wgpu::Sampler,
    fill_pipeline: wgpu::RenderPipeline,
    wire_pipeline: wgpu::RenderPipeline,

    mesh: MeshBuffers,
    backbuffer: Backbuffer,
    blit_sampler: wgpu::Sampler,
    present: Option<PresentTarget>,

    rendered: bool,
    disposed: bool,
}

impl GpuScene {
    pub fn headless(
        width: u32,
        height: u32,
        plane: &PlaneGeometry,
        preserve_drawing_buffer: bool,
    ) -> Result<Self> {
        let context = pollster::block_on(GpuContext::headless())?;
        Self::build(context, width, height, plane, preserve_drawing_buffer, None)
    }

    #[cfg(feature = "play")]
    pub fn for_window(
        window: std::sync::Arc<winit::window::Window>,
        width: u32,
        height: u32,
        plane: &PlaneGeometry,
        preserve_drawing_buffer: bool,
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;
        let context = pollster::block_on(GpuContext::for_surface(instance, &surface))?;
        Self::build(
            context,
            width,
            height,
            plane,
            preserve_drawing_buffer,
            Some(surface),
        )
    }

    fn build(
        context: GpuContext,
        width: u32,
        height: u32,
        plane: &PlaneGeometry,
        preserve_drawing_buffer: bool,
        surface: Option<wgpu::Surface<'static>>,
    ) -> Result<Self> {
        let (width, height) = clamp_to_device(&context.device, width, height);
        let device = &context.device;

        // The mask must exist before the material that samples it.
        let mask = create_mask_target(device, width, height);
        let trail_camera = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("neat-trail-camera"),
            contents: bytemuck::bytes_of(&trail_camera_uniform(width, height)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let trail_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("neat-trail-bind-group-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<TrailCameraUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let trail_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("neat-trail-bind-group"),
            layout: &trail_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: trail_camera.as_entire_binding(),
            }],
        });
        let trail_pipeline = create_trail_pipeline(device, &trail_layout);
        let brush_instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("neat-brush-instances"),
            size: (BRUSH_POOL_SIZE * std::mem::size_of::<BrushInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let procedural = create_placeholder_texture(device, &context.queue);

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("neat-gradient-uniforms"),
            contents: bytemuck::bytes_of(&GradientUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_layout = create_material_layout(device);
        let mask_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("neat-mask-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let procedural_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("neat-procedural-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });
        let material = create_material(
            device,
            &material_layout,
            &uniforms,
            &mask.view,
            &mask_sampler,
            &procedural.view,
            &procedural_sampler,
        );
        let program = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("neat-gradient-shader"),
            source: wgpu::ShaderSource::Wgsl(gradient_program().into()),
        });
        let fill_pipeline = create_gradient_pipeline(
            device,
            &material_layout,
            &program,
            wgpu::PrimitiveTopology::TriangleList,
        );
        let wire_pipeline = create_gradient_pipeline(
            device,
            &material_layout,
            &program,
            wgpu::PrimitiveTopology::LineList,
        );

        let mesh = create_mesh(device, plane);
        let backbuffer = create_backbuffer(device, width, height, preserve_drawing_buffer);
        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("neat-blit-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let present = match surface {
            Some(surface) => Some(create_present_target(
                &context,
                surface,
                width,
                height,
                &backbuffer.color_view,
                &blit_sampler,
            )?),
            None => None,
        };

        debug!(
            width,
            height,
            subdivisions = plane.subdivisions,
            adapter = %context.adapter.get_info().name,
            "gpu scene built"
        );

        Ok(Self {
            context,
            width,
            height,
            preserve_drawing_buffer,
            mask,
            trail_camera,
            trail_bind_group,
            trail_pipeline,
            brush_instances,
            brush_count: 0,
            procedural,
            uniforms,
            material_layout,
            material,
            mask_sampler,
            procedural_sampler,
            fill_pipeline,
            wire_pipeline,
            mesh,
            backbuffer,
            blit_sampler,
            present,
            rendered: false,
            disposed: false,
        })
    }

    pub fn adapter_name(&self) -> String {
        self.context.adapter.get_info().name
    }

    fn rebuild_material(&mut self) {
        self.material = create_material(
            &self.context.device,
            &self.material_layout,
            &self.uniforms,
            &self.mask.view,
            &self.mask_sampler,
            &self.procedural.view,
            &self.procedural_sampler,
        );
    }

    fn encode_trail_pass(&mut self, encoder: &mut wgpu::CommandEncoder, frame: &FrameInputs<'_>) {
        if frame.trail_pass == TrailPass::Draw {
            let instances = frame.trail.instances();
            self.brush_count = instances.len().min(BRUSH_POOL_SIZE) as u32;
            self.context.queue.write_buffer(
                &self.brush_instances,
                0,
                bytemuck::cast_slice(&instances[..self.brush_count as usize]),
            );
        } else {
            self.brush_count = 0;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("neat-trail-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.mask.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        if self.brush_count > 0 {
            pass.set_pipeline(&self.trail_pipeline);
            pass.set_bind_group(0, &self.trail_bind_group, &[]);
            pass.set_vertex_buffer(0, self.brush_instances.slice(..));
            pass.draw(0..4, 0..self.brush_count);
        }
    }

    fn present_backbuffer(&mut self) -> Result<()> {
        let Some(present) = &mut self.present else {
            return Ok(());
        };

        let frame = match present.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                present
                    .surface
                    .configure(&self.context.device, &present.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("surface out of memory"));
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("neat-blit-encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("neat-blit-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&present.pipeline);
            pass.set_bind_group(0, &present.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl SceneBackend for GpuScene {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn max_dimension(&self) -> u32 {
        self.context.device.limits().max_texture_dimension_2d
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        let (width, height) = clamp_to_device(&self.context.device, width, height);
        let device = &self.context.device;

        self.backbuffer.color.destroy();
        self.backbuffer.depth.destroy();
        self.backbuffer = create_backbuffer(device, width, height, self.preserve_drawing_buffer);

        self.mask.texture.destroy();
        self.mask = create_mask_target(device, width, height);
        self.context.queue.write_buffer(
            &self.trail_camera,
            0,
            bytemuck::bytes_of(&trail_camera_uniform(width, height)),
        );

        if let Some(present) = &mut self.present {
            present.config.width = width.max(1);
            present.config.height = height.max(1);
            present.surface.configure(device, &present.config);
            present.bind_group = create_blit_bind_group(
                device,
                &present.layout,
                &self.backbuffer.color_view,
                &self.blit_sampler,
            );
        }

        self.width = width;
        self.height = height;
        self.rendered = false;
        self.rebuild_material();
        Ok(())
    }

    fn rebuild_mesh(&mut self, plane: &PlaneGeometry) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.mesh.destroy();
        self.mesh = create_mesh(&self.context.device, plane);
        Ok(())
    }

    fn upload_texture(&mut self, bitmap: &ProceduralBitmap) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        let levels = bitmap.mip_chain()?;
        let device = &self.context.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("neat-procedural-texture"),
            size: wgpu::Extent3d {
                width: bitmap.width,
                height: bitmap.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PROCEDURAL_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip_level, level) in levels.iter().enumerate() {
            let (level_width, level_height) = level.dimensions();
            let bytes_per_row = NonZeroU32::new(level_width.saturating_mul(4))
                .ok_or_else(|| anyhow!("mip level {mip_level} has invalid width"))?;
            self.context.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                level.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row.get()),
                    rows_per_image: Some(level_height),
                },
                wgpu::Extent3d {
                    width: level_width,
                    height: level_height,
                    depth_or_array_layers: 1,
                },
            );
        }

        self.procedural.texture.destroy();
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.procedural = ProceduralTexture { texture, view };
        self.rebuild_material();
        Ok(())
    }

    fn render(&mut self, frame: &FrameInputs<'_>) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.context
            .queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(frame.uniforms));

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("neat-render-encoder"),
                });

        if frame.trail_pass != TrailPass::Skip {
            self.encode_trail_pass(&mut encoder, frame);
        }

        {
            let clear = wgpu::Color {
                r: f64::from(frame.background.r),
                g: f64::from(frame.background.g),
                b: f64::from(frame.background.b),
                a: f64::from(frame.background_alpha),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("neat-gradient-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.backbuffer.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.backbuffer.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let (pipeline, indices, count) = if frame.wireframe {
                (&self.wire_pipeline, &self.mesh.lines, self.mesh.line_count)
            } else {
                (
                    &self.fill_pipeline,
                    &self.mesh.triangles,
                    self.mesh.triangle_count,
                )
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.material, &[]);
            pass.set_vertex_buffer(0, self.mesh.vertices.slice(..));
            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..count, 0, 0..1);
        }

        self.context.queue.submit(Some(encoder.finish()));
        self.rendered = true;
        self.present_backbuffer()
    }

    fn read_pixels(&mut self) -> Result<Vec<u8>> {
        if self.disposed {
            return Err(GradientError::Destroyed.into());
        }
        if !self.preserve_drawing_buffer {
            return Err(GradientError::DrawingBufferNotPreserved.into());
        }
        if !self.rendered {
            return Err(GradientError::NothingRendered.into());
        }

        let device = &self.context.device;
        let unpadded_bytes_per_row = self
            .width
            .checked_mul(4)
            .ok_or_else(|| anyhow!("frame width overflow when computing row bytes"))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let rows_per_image = NonZeroU32::new(self.height)
            .ok_or_else(|| anyhow!("invalid render height {}", self.height))?;
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("neat-readback-buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("neat-readback-encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.backbuffer.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(rows_per_image.get()),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(Some(encoder.finish()));

        let buffer_slice = readback_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| anyhow!("failed receiving GPU map callback"))?
            .context("GPU buffer mapping failed")?;

        let mapped = buffer_slice.get_mapped_range();
        let mut frame = vec![0_u8; unpadded_bytes_per_row as usize * self.height as usize];
        for (row_index, chunk) in mapped
            .chunks(padded_bytes_per_row as usize)
            .take(self.height as usize)
            .enumerate()
        {
            let dst_start = row_index * unpadded_bytes_per_row as usize;
            let dst_end = dst_start + unpadded_bytes_per_row as usize;
            frame[dst_start..dst_end].copy_from_slice(&chunk[..unpadded_bytes_per_row as usize]);
        }

        drop(mapped);
        readback_buffer.unmap();
        readback_buffer.destroy();
        Ok(frame)
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.present = None;
        self.mesh.destroy();
        self.backbuffer.color.destroy();
        self.backbuffer.depth.destroy();
        self.mask.texture.destroy();
        self.procedural.texture.destroy();
        self.uniforms.destroy();
        self.trail_camera.destroy();
        self.brush_instances.destroy();
        debug!("gpu scene disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Texture sizes past the device limit fail validation, so scale down first.
fn clamp_to_device(device: &wgpu::Device, width: u32, height: u32) -> (u32, u32) {
    let limit = device.limits().max_texture_dimension_2d;
    let fitted = fit_to_limit(width, height, limit);
    if fitted != (width, height) {
        warn!(
            width,
            height,
            limit,
            fitted_width = fitted.0,
            fitted_height = fitted.1,
            "canvas exceeds the device texture limit; scaling down"
        );
    }
    fitted
}

fn create_backbuffer(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    preserve_drawing_buffer: bool,
) -> Backbuffer {
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    if preserve_drawing_buffer {
        usage |= wgpu::TextureUsages::COPY_SRC;
    }
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("neat-backbuffer"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: BACKBUFFER_FORMAT,
        usage,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("neat-depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Backbuffer {
        color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
        depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        color,
        depth,
    }
}

/// Half-resolution mask the brushes are drawn into.
fn create_mask_target(device: &wgpu::Device, width: u32, height: u32) -> MaskTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("neat-mouse-mask"),
        size: wgpu::Extent3d {
            width: (width / 2).max(1),
            height: (height / 2).max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: MASK_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    MaskTarget { texture, view }
}

/// Mask camera in pointer space: half the canvas extent either way.
fn trail_camera_uniform(width: u32, height: u32) -> TrailCameraUniform {
    TrailCameraUniform {
        half_extent: [width.max(1) as f32 / 2.0, height.max(1) as f32 / 2.0],
        _padding: [0.0; 2],
    }
}

fn create_placeholder_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> ProceduralTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("neat-procedural-placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PROCEDURAL_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &[0, 0, 0, 255],
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    ProceduralTexture { texture, view }
}

fn create_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("neat-material-bind-group-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<GradientUniforms>() as u64,
                    ),
                },
                count: None,
            },
            texture_entry(1),
            sampler_entry(2),
            texture_entry(3),
            sampler_entry(4),
        ],
    })
}

fn create_material(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    mask_view: &wgpu::TextureView,
    mask_sampler: &wgpu::Sampler,
    procedural_view: &wgpu::TextureView,
    procedural_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("neat-material-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(mask_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(mask_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(procedural_view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(procedural_sampler),
            },
        ],
    })
}

fn create_gradient_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("neat-gradient-pipeline-layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let label = match topology {
        wgpu::PrimitiveTopology::LineList => "neat-gradient-wire-pipeline",
        _ => "neat-gradient-fill-pipeline",
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<PlaneVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x2,
                    2 => Float32x3
                ],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: BACKBUFFER_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
    })
}

fn create_trail_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("neat-trail-shader"),
        source: wgpu::ShaderSource::Wgsl(TRAIL_WGSL.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("neat-trail-pipeline-layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("neat-trail-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<BrushInstance>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x2,
                    1 => Float32,
                    2 => Float32,
                    3 => Float32
                ],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: MASK_FORMAT,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
    })
}

fn create_mesh(device: &wgpu::Device, plane: &PlaneGeometry) -> MeshBuffers {
    let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("neat-plane-vertices"),
        contents: bytemuck::cast_slice(&plane.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let triangles = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("neat-plane-triangles"),
        contents: bytemuck::cast_slice(&plane.triangles),
        usage: wgpu::BufferUsages::INDEX,
    });
    let lines = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("neat-plane-lines"),
        contents: bytemuck::cast_slice(&plane.lines),
        usage: wgpu::BufferUsages::INDEX,
    });
    MeshBuffers {
        vertices,
        triangles,
        triangle_count: plane.triangles.len() as u32,
        lines,
        line_count: plane.lines.len() as u32,
    }
}

fn create_present_target(
    context: &GpuContext,
    surface: wgpu::Surface<'static>,
    width: u32,
    height: u32,
    backbuffer_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> Result<PresentTarget> {
    let caps = surface.get_capabilities(&context.adapter);
    let format = pick_surface_format(&caps.formats)?;
    let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Mailbox) {
        wgpu::PresentMode::Mailbox
    } else {
        wgpu::PresentMode::Fifo
    };
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&context.device, &config);

    let device = &context.device;
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("neat-blit-bind-group-layout"),
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
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("neat-blit-shader"),
        source: wgpu::ShaderSource::Wgsl(BLIT_WGSL.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("neat-blit-pipeline-layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("neat-blit-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
    });
    let bind_group = create_blit_bind_group(device, &layout, backbuffer_view, sampler);

    Ok(PresentTarget {
        surface,
        config,
        pipeline,
        layout,
        bind_group,
    })
}

fn create_blit_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("neat-blit-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// The backbuffer already holds display values, so a linear surface format
/// avoids a second encode.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Result<wgpu::TextureFormat> {
    let first = formats
        .first()
        .copied()
        .ok_or(GradientError::SurfaceUnsupported)?;
    let format = formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .unwrap_or_else(|| {
            warn!(?first, "surface offers only sRGB formats; colors will be re-encoded");
            first
        });
    Ok(format)
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_alignment_rounds_up() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn surface_format_prefers_linear() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            pick_surface_format(&formats).expect("format should be chosen"),
            wgpu::TextureFormat::Bgra8Unorm
        );
    }

    #[test]
    fn empty_surface_format_list_is_unsupported() {
        let error = pick_surface_format(&[]).expect_err("no formats");
        assert_eq!(
            error.downcast_ref::<GradientError>(),
            Some(&GradientError::SurfaceUnsupported)
        );
    }

    #[test]
    fn trail_camera_covers_half_canvas() {
        let uniform = trail_camera_uniform(800, 600);
        assert_eq!(uniform.half_extent, [400.0, 300.0]);
    }

    #[test]
    fn uniform_sizes_are_aligned() {
        assert_eq!(std::mem::size_of::<TrailCameraUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<BrushInstance>(), 32);
    }
}
