use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ===== DEVICE ENUM =====

/// Compute device tensors and parameters live on.
///
/// Only the CPU backend is compiled in. The enum stays open so a resolved
/// context can name where work happens in logs and checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    CPU,
}

impl Device {
    pub fn name(&self) -> &'static str {
        match self {
            Device::CPU => "cpu",
        }
    }
}

/// Device requested by configuration, resolved once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

// ===== EXECUTION CONTEXT =====

/// Explicit execution context threaded through network construction,
/// batch production and the training loop.
///
/// Owns the resolved device and the seeded random source used for weight
/// initialization, latent sampling and shuffling.
pub struct ExecutionContext {
    device: Device,
    seed: u64,
    rng: StdRng,
}

impl ExecutionContext {
    /// Resolve the device preference and seed the random source.
    ///
    /// With no seed a fresh one is drawn from the OS so that the run is still
    /// reproducible from the logged value.
    pub fn resolve(preference: DevicePreference, seed: Option<u64>) -> Self {
        let device = match preference {
            DevicePreference::Cpu => Device::CPU,
            DevicePreference::Auto | DevicePreference::Gpu => {
                warn!("No GPU backend available, training on CPU");
                Device::CPU
            }
        };
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        info!(device = device.name(), seed, "resolved execution context");
        Self::with_device(device, seed)
    }

    /// CPU context with a fixed seed, without logging.
    pub fn seeded(seed: u64) -> Self {
        Self::with_device(Device::CPU, seed)
    }

    fn with_device(device: Device, seed: u64) -> Self {
        ExecutionContext {
            device,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Derive an independent seed for a component with its own random source
    /// (e.g. the data loader's shuffler).
    pub fn derive_seed(&mut self) -> u64 {
        self.rng.random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_preference_falls_back_to_cpu() {
        let ctx = ExecutionContext::resolve(DevicePreference::Gpu, Some(7));
        assert_eq!(ctx.device(), Device::CPU);
        assert_eq!(ctx.seed(), 7);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = ExecutionContext::seeded(42);
        let mut b = ExecutionContext::seeded(42);
        let xa: Vec<u32> = (0..8).map(|_| a.rng().random()).collect();
        let xb: Vec<u32> = (0..8).map(|_| b.rng().random()).collect();
        assert_eq!(xa, xb);
    }
}
