//! GPU-accelerated variable-size batched LU factorization using wgpu.
//!
//! All phases of all panels are recorded into a single command buffer: per
//! panel one `panel_getf2` pass (one workgroup per matrix), one `laswp`
//! pass, one `trsm` pass and one `gemm` pass. Each panel's parameters live
//! at their own dynamic offset in a uniform buffer, so nothing has to be
//! written between passes. Results are read back once at the end.

use crate::context::WgpuContext;
use crate::error::{Result, WgpuError};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use vbatch_core::MatrixDesc;
use wgpu::util::DeviceExt;

/// Largest batch a single dispatch dimension can cover.
pub const MAX_BATCH: usize = 65535;

const PANEL_WORKGROUP: u32 = 64;
const GEMM_TILE: u32 = 8;

/// Per-panel parameters (uniform, one copy per panel).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Params {
    j: u32,
    nb: u32,
    batch: u32,
    stride: u32,
}

/// Matrix descriptor as seen by the shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct GpuDesc {
    m: u32,
    n: u32,
    ld: u32,
    offset: u32,
    piv_offset: u32,
    _pad: [u32; 3],
}

impl GpuDesc {
    fn from_desc(d: &MatrixDesc) -> Result<Self> {
        let narrow = |v: usize, what: &str| {
            u32::try_from(v)
                .map_err(|_| WgpuError::InvalidDimension(format!("{} {} exceeds u32", what, v)))
        };
        Ok(Self {
            m: narrow(d.rows, "rows")?,
            n: narrow(d.cols, "cols")?,
            ld: narrow(d.ld, "ld")?,
            offset: narrow(d.offset, "offset")?,
            piv_offset: narrow(d.pivot_offset, "pivot offset")?,
            _pad: [0; 3],
        })
    }
}

struct Pipelines {
    panel: wgpu::ComputePipeline,
    laswp: wgpu::ComputePipeline,
    trsm: wgpu::ComputePipeline,
    gemm: wgpu::ComputePipeline,
}

/// Batched LU factorization on a WebGPU device (f32).
pub struct WgpuBatchedLu {
    ctx: Arc<WgpuContext>,
    pipelines: Pipelines,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl WgpuBatchedLu {
    const SHADER_SOURCE: &'static str = include_str!("batched_lu.wgsl");

    /// Compile the kernels on `ctx`.
    pub fn new(ctx: Arc<WgpuContext>) -> Result<Self> {
        let device = &ctx.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Batched LU Shader"),
            source: wgpu::ShaderSource::Wgsl(Self::SHADER_SOURCE.into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Batched LU Bind Group Layout"),
            entries: &[
                // Per-panel parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Params>() as u64),
                    },
                    count: None,
                },
                // Packed matrices
                storage(1, false),
                // Descriptors
                storage(2, true),
                // Global pivots
                storage(3, false),
                // Per-matrix status
                storage(4, false),
                // Local panel pivots
                storage(5, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Batched LU Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let pipelines = Pipelines {
            panel: pipeline("panel_getf2"),
            laswp: pipeline("laswp"),
            trsm: pipeline("trsm"),
            gemm: pipeline("gemm"),
        };

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(WgpuError::Validation {
                kernel: "pipeline creation".into(),
                message: e.to_string(),
            });
        }

        log::info!("Created batched LU kernels (GPU: {})", ctx.adapter_name());

        Ok(Self {
            ctx,
            pipelines,
            bind_group_layout,
        })
    }

    /// Context the kernels run on.
    pub fn context(&self) -> &Arc<WgpuContext> {
        &self.ctx
    }

    /// Factor every matrix described by `descs` in place.
    ///
    /// `data`, `pivots` and `info` follow the host layout; `nb` is the panel
    /// width and `max_min_mn` the largest `min(M, N)` of the batch. The
    /// descriptors must already be validated.
    pub fn factorize(
        &self,
        descs: &[MatrixDesc],
        data: &mut [f32],
        pivots: &mut [i32],
        info: &mut [i32],
        nb: usize,
        max_min_mn: usize,
    ) -> Result<()> {
        let batch = descs.len();
        if batch == 0 || batch > MAX_BATCH {
            return Err(WgpuError::InvalidDimension(format!(
                "batch of {} matrices outside 1..={}",
                batch, MAX_BATCH
            )));
        }
        if info.len() < batch {
            return Err(WgpuError::InvalidDimension(format!(
                "status array holds {} entries for {} matrices",
                info.len(),
                batch
            )));
        }

        let max_binding = self.ctx.max_storage_buffer_binding_size();
        let required = std::mem::size_of_val(data) as u64;
        if required > max_binding {
            return Err(WgpuError::BufferTooLarge {
                required,
                max_buffer: max_binding,
            });
        }

        let gpu_descs = descs
            .iter()
            .map(GpuDesc::from_desc)
            .collect::<Result<Vec<_>>>()?;
        let max_m = descs.iter().map(|d| d.rows).max().unwrap_or(0) as u32;
        let max_n = descs.iter().map(|d| d.cols).max().unwrap_or(0) as u32;
        let stride = max_min_mn.max(1);
        let nb = nb.max(1);

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;

        // Uniform parameters for every panel, each at an aligned offset.
        let panels: Vec<usize> = (0..max_min_mn).step_by(nb).collect();
        let align = self.ctx.uniform_offset_alignment().max(std::mem::size_of::<Params>() as u64);
        let mut uniform_bytes = vec![0u8; (panels.len().max(1) as u64 * align) as usize];
        for (slot, &j) in panels.iter().enumerate() {
            let params = Params {
                j: j as u32,
                nb: nb as u32,
                batch: batch as u32,
                stride: stride as u32,
            };
            let start = slot * align as usize;
            uniform_bytes[start..start + std::mem::size_of::<Params>()]
                .copy_from_slice(bytemuck::bytes_of(&params));
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batched LU Params"),
            contents: &uniform_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let data_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batched LU Data"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let desc_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batched LU Descriptors"),
            contents: bytemuck::cast_slice(&gpu_descs),
            usage: wgpu::BufferUsages::STORAGE,
        });
        // Storage bindings must not be empty.
        let pivots_init: Vec<i32> = if pivots.is_empty() { vec![0] } else { pivots.to_vec() };
        let pivot_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batched LU Pivots"),
            contents: bytemuck::cast_slice(&pivots_init),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let info_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batched LU Info"),
            contents: bytemuck::cast_slice(&vec![0i32; batch]),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let pivinfo_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Batched LU Pivot Workspace"),
            size: (batch * stride * std::mem::size_of::<i32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Batched LU Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &params_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<Params>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: data_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: desc_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: pivot_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: info_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: pivinfo_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Batched LU Encoder"),
        });

        let column_groups = max_n.div_ceil(PANEL_WORKGROUP);
        let gemm_groups = (max_m.div_ceil(GEMM_TILE), max_n.div_ceil(GEMM_TILE));
        for slot in 0..panels.len() {
            let offset = [(slot as u64 * align) as u32];
            let phases: [(&str, &wgpu::ComputePipeline, (u32, u32, u32)); 4] = [
                ("panel_getf2", &self.pipelines.panel, (batch as u32, 1, 1)),
                ("laswp", &self.pipelines.laswp, (column_groups, batch as u32, 1)),
                ("trsm", &self.pipelines.trsm, (column_groups, batch as u32, 1)),
                ("gemm", &self.pipelines.gemm, (gemm_groups.0, gemm_groups.1, batch as u32)),
            ];
            for (label, pipeline, (x, y, z)) in phases {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &offset);
                pass.dispatch_workgroups(x, y, z);
            }
        }

        let data_staging = staging(device, "Data Staging", std::mem::size_of_val(data));
        let pivot_staging = staging(device, "Pivot Staging", std::mem::size_of_val(pivots_init.as_slice()));
        let info_staging = staging(device, "Info Staging", batch * std::mem::size_of::<i32>());
        encoder.copy_buffer_to_buffer(&data_buffer, 0, &data_staging, 0, data_staging.size());
        encoder.copy_buffer_to_buffer(&pivot_buffer, 0, &pivot_staging, 0, pivot_staging.size());
        encoder.copy_buffer_to_buffer(&info_buffer, 0, &info_staging, 0, info_staging.size());

        queue.submit(std::iter::once(encoder.finish()));

        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(e) = validation.or(oom) {
            log::error!("Batched LU submission failed: {}", e);
            return Err(WgpuError::Validation {
                kernel: "getrf_vbatched".into(),
                message: e.to_string(),
            });
        }

        log::debug!(
            "Submitted {} panels x 4 passes for {} matrices (max {}x{}, nb={})",
            panels.len(),
            batch,
            max_m,
            max_n,
            nb
        );

        read_back(&self.ctx, &data_staging, data)?;
        let mut pivots_out = vec![0i32; pivots_init.len()];
        read_back(&self.ctx, &pivot_staging, &mut pivots_out)?;
        pivots.copy_from_slice(&pivots_out[..pivots.len()]);
        read_back(&self.ctx, &info_staging, &mut info[..batch])?;

        self.ctx.synchronize()
    }
}

fn staging(device: &wgpu::Device, label: &str, bytes: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: bytes as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn read_back<T: Pod>(ctx: &WgpuContext, staging: &wgpu::Buffer, out: &mut [T]) -> Result<()> {
    let buffer_slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    receiver
        .recv()
        .map_err(|e| WgpuError::Buffer(format!("Failed to receive map result: {}", e)))?
        .map_err(|e| WgpuError::Buffer(format!("Buffer mapping failed: {:?}", e)))?;

    {
        let mapped = buffer_slice.get_mapped_range();
        out.copy_from_slice(bytemuck::cast_slice(&mapped));
    }
    staging.unmap();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbatch_core::{BatchBuffers, BatchLayout, MatRef, lu_residual};

    fn try_create() -> Option<WgpuBatchedLu> {
        let ctx = WgpuContext::new().ok()?;
        WgpuBatchedLu::new(Arc::new(ctx)).ok()
    }

    fn factor(lu: &WgpuBatchedLu, buffers: &mut BatchBuffers<f32>, nb: usize) -> Vec<i32> {
        let layout = buffers.layout().clone();
        let max_min = layout.aggregates().max_min_dim;
        let mut info = vec![-1; layout.len()];
        let (descs, data, pivots) = buffers.view_mut().into_parts();
        lu.factorize(descs, data, pivots, &mut info, nb, max_min).unwrap();
        info
    }

    #[test]
    fn test_three_by_three() {
        let Some(lu) = try_create() else {
            eprintln!("Skipping test: no GPU available");
            return;
        };

        let layout = BatchLayout::new(&[3], &[3]).unwrap();
        let mut buffers = BatchBuffers::<f32>::new(layout);
        buffers.write_matrix(0, &[1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 10.0], 3);

        let info = factor(&lu, &mut buffers, 64);
        assert_eq!(info, vec![0]);
        assert_eq!(buffers.matrix_pivots(0), &[3, 3, 3]);
        let u = buffers.read_matrix(0);
        assert!((u[0] - 7.0).abs() < 1e-5);
        assert!((u[8] + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_mixed_sizes_small_panels() {
        let Some(lu) = try_create() else {
            eprintln!("Skipping test: no GPU available");
            return;
        };

        let rows = [7, 3, 12, 1];
        let cols = [5, 9, 12, 4];
        let layout = BatchLayout::builder().ld_alignment(4).build(&rows, &cols).unwrap();
        let mut buffers = BatchBuffers::<f32>::new(layout);
        let mut originals = Vec::new();
        for (idx, (&m, &n)) in rows.iter().zip(&cols).enumerate() {
            let a: Vec<f32> = (0..m * n)
                .map(|k| (((k * 13 + idx * 5) % 17) as f32 + 1.0) / 17.0)
                .collect();
            buffers.write_matrix(idx, &a, m);
            originals.push(a);
        }

        // nb = 2 forces several panels with trailing updates.
        let info = factor(&lu, &mut buffers, 2);
        for idx in 0..rows.len() {
            if info[idx] != 0 {
                continue;
            }
            let original = MatRef::compact(rows[idx], cols[idx], &originals[idx]);
            let r = lu_residual(original, buffers.matrix(idx), buffers.matrix_pivots(idx)).unwrap();
            assert!(r < 1e-5, "matrix {} residual {}", idx, r);
        }
    }

    #[test]
    fn test_zero_column_status() {
        let Some(lu) = try_create() else {
            eprintln!("Skipping test: no GPU available");
            return;
        };

        let layout = BatchLayout::new(&[2, 2], &[2, 2]).unwrap();
        let mut buffers = BatchBuffers::<f32>::new(layout);
        buffers.write_matrix(0, &[1.0, 0.0, 0.0, 1.0], 2);
        buffers.write_matrix(1, &[1.0, 2.0, 2.0, 4.0], 2);

        let info = factor(&lu, &mut buffers, 64);
        assert_eq!(info, vec![0, 2]);
    }
}
