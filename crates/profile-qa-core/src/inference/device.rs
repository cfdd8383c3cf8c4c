//! Device selection for inference.

use candle_core::Device;
use tracing::info;

/// Picks the device models are loaded onto.
///
/// With the `metal` or `cuda` feature enabled the first GPU is tried before
/// falling back to the CPU. `force_cpu` skips the GPU probe.
#[must_use]
pub fn select_device(force_cpu: bool) -> Device {
    if force_cpu {
        info!("Inference pinned to CPU");
        return Device::Cpu;
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal device for inference");
                return device;
            }
            Err(e) => tracing::debug!("Metal unavailable: {e}"),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA device for inference");
                return device;
            }
            Err(e) => tracing::debug!("CUDA unavailable: {e}"),
        }
    }

    info!("Using CPU for inference");
    Device::Cpu
}
