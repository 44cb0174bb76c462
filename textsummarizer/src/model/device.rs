//! Compute device selection.

use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;

use crate::config::DeviceChoice;
use crate::errors::{Result, SummarizerError};

/// Maps a configured device choice to a candle device.
///
/// `Auto` prefers CUDA, then Metal, then the CPU.
pub fn select_device(choice: DeviceChoice) -> Result<Device> {
    let device = match choice {
        DeviceChoice::Cpu => Device::Cpu,
        DeviceChoice::Cuda => Device::new_cuda(0)
            .map_err(|e| SummarizerError::Model(format!("CUDA device unavailable: {e}")))?,
        DeviceChoice::Metal => Device::new_metal(0)
            .map_err(|e| SummarizerError::Model(format!("Metal device unavailable: {e}")))?,
        DeviceChoice::Auto if cuda_is_available() => Device::new_cuda(0)?,
        DeviceChoice::Auto if metal_is_available() => Device::new_metal(0)?,
        DeviceChoice::Auto => Device::Cpu,
    };
    tracing::debug!(?choice, device = ?device, "Selected compute device");
    Ok(device)
}
