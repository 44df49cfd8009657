//! WebGPU device context management.

use crate::error::{Result, WgpuError};
use std::sync::{Arc, Mutex};

/// WebGPU context holding device and queue.
///
/// Create one context and reuse it across batches; pipeline creation and
/// adapter selection are the expensive parts.
pub struct WgpuContext {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    lost: Arc<Mutex<Option<String>>>,
}

impl WgpuContext {
    /// Create a context on the best available adapter.
    pub fn new() -> Result<Self> {
        Self::with_power_preference(wgpu::PowerPreference::HighPerformance)
    }

    /// Create a context with a specific power preference.
    pub fn with_power_preference(power_preference: wgpu::PowerPreference) -> Result<Self> {
        pollster::block_on(Self::new_async(power_preference))
    }

    async fn new_async(power_preference: wgpu::PowerPreference) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::DX12,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(WgpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vbatch device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| WgpuError::DeviceInit(e.to_string()))?;

        let lost = Arc::new(Mutex::new(None));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({:?}): {}", reason, message);
            *flag.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
        });

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            lost,
        })
    }

    /// Check if a WebGPU-capable GPU is available on this system.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::DX12,
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .is_some()
        })
    }

    /// Get the adapter name.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Get the backend being used (Metal, Vulkan, etc.).
    pub fn backend(&self) -> wgpu::Backend {
        self.adapter_info.backend
    }

    /// Maximum storage buffer binding size in bytes.
    pub fn max_storage_buffer_binding_size(&self) -> u64 {
        self.device.limits().max_storage_buffer_binding_size as u64
    }

    /// Required alignment of dynamic uniform offsets.
    pub(crate) fn uniform_offset_alignment(&self) -> u64 {
        self.device.limits().min_uniform_buffer_offset_alignment as u64
    }

    /// Wait for submitted work and report a lost device.
    pub fn synchronize(&self) -> Result<()> {
        self.device.poll(wgpu::Maintain::Wait);
        match self.lost.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(message) => Err(WgpuError::DeviceLost(message)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}
