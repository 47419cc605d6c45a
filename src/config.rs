use std::fs;

use candle_core::Device;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diffusion::GaussianDiffusion;
use crate::schedulers::BetaSchedule;

/// Settings of a toy diffusion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    pub schedule: BetaSchedule,
    pub n_steps: usize,
    pub beta_start: f64,
    pub beta_end: f64,
    pub batch_size: usize,
    /// Standard deviation of the jitter added to the swiss roll.
    pub data_noise: f64,
    pub seed: u64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            schedule: BetaSchedule::Sigmoid,
            n_steps: 100,
            beta_start: 1e-5,
            beta_end: 0.5e-2,
            batch_size: 128,
            data_noise: 0.5,
            seed: 9527,
        }
    }
}

impl DiffusionConfig {
    pub fn from_file<T: AsRef<std::path::Path>>(path: T) -> anyhow::Result<Self> {
        let file = fs::read_to_string(path)?;
        let cfg: DiffusionConfig = toml::from_str(&file)?;
        Ok(cfg)
    }

    pub fn build(&self, device: &Device) -> anyhow::Result<GaussianDiffusion> {
        for (name, bound) in [("beta_start", self.beta_start), ("beta_end", self.beta_end)] {
            if !(bound > 0.0 && bound < 1.0) {
                warn!("{name} = {bound} is outside (0, 1), coefficients may be non-finite");
            }
        }
        let diffusion = GaussianDiffusion::new(
            self.schedule,
            self.n_steps,
            self.beta_start,
            self.beta_end,
            device,
        )?;
        Ok(diffusion)
    }
}
