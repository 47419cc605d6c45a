//! # Denoising diffusion (DDPM) over batches of vectors.
//!
//! [`GaussianDiffusion`] holds the lookup tables derived from a beta
//! schedule. The forward process and the training loss live in `forward`,
//! ancestral sampling in `reverse`.
use candle_core::{DType, Device, Tensor};

use crate::error::{DiffusionError, Result};
use crate::schedulers::{beta_values, BetaSchedule};

mod forward;
mod reverse;
pub mod types;

pub use forward::mirrored_timesteps;
pub use types::NoiseModel;

/// Gathers `input[t[i]]` for every sample and reshapes the result to
/// `(B, 1, .., 1)` so it broadcasts against a tensor of `shape`.
pub fn extract(input: &Tensor, t: &Tensor, shape: &[usize]) -> Result<Tensor> {
    if shape.is_empty() {
        return Err(DiffusionError::InvalidArgument(
            "cannot extract coefficients for a rank 0 target".to_string(),
        ));
    }
    if input.rank() != 1 || t.rank() != 1 {
        return Err(DiffusionError::InvalidArgument(format!(
            "expected 1-D lookup table and timesteps, got {:?} and {:?}",
            input.dims(),
            t.dims()
        )));
    }
    if t.dtype().is_float() {
        return Err(DiffusionError::InvalidArgument(format!(
            "timesteps must have an integer dtype, got {:?}",
            t.dtype()
        )));
    }
    let len = input.dim(0)?;
    let indices = t.to_dtype(DType::I64)?.to_vec1::<i64>()?;
    if let Some(&index) = indices.iter().find(|&&i| i < 0 || i as usize >= len) {
        return Err(DiffusionError::IndexOutOfBounds { index, len });
    }
    let t = t.to_dtype(DType::U32)?.to_device(input.device())?;
    let out = input.index_select(&t, 0)?;
    let mut reshape = vec![1usize; shape.len()];
    reshape[0] = indices.len();
    Ok(out.reshape(reshape)?)
}

pub(crate) fn check_model_output(xs: &Tensor, output: &Tensor) -> Result<()> {
    if xs.dims() != output.dims() {
        return Err(DiffusionError::ShapeMismatch {
            expected: xs.dims().to_vec(),
            got: output.dims().to_vec(),
        });
    }
    Ok(())
}

/// Precomputed coefficient tables of a Gaussian diffusion process, all 1-D
/// f32 tensors of length `n_steps` indexed by timestep.
#[derive(Debug, Clone)]
pub struct GaussianDiffusion {
    pub betas: Tensor,
    pub alphas: Tensor,
    /// Alpha-bar, the cumulative product of `alphas`.
    pub alphas_prod: Tensor,
    /// Alpha-bar of the previous step, starting at 1.
    pub alphas_prod_p: Tensor,
    pub alphas_bar_sqrt: Tensor,
    pub one_minus_alphas_bar_log: Tensor,
    pub one_minus_alphas_bar_sqrt: Tensor,
    n_steps: usize,
    device: Device,
}

impl GaussianDiffusion {
    pub fn new(
        schedule: BetaSchedule,
        n_steps: usize,
        beta_start: f64,
        beta_end: f64,
        device: &Device,
    ) -> Result<Self> {
        let betas = beta_values(schedule, n_steps, beta_start, beta_end)?;
        Self::from_beta_values(&betas, device)
    }

    /// Builds the tables from an existing 1-D beta tensor.
    pub fn from_betas(betas: &Tensor) -> Result<Self> {
        let values = betas.to_dtype(DType::F64)?.to_vec1::<f64>()?;
        Self::from_beta_values(&values, betas.device())
    }

    fn from_beta_values(betas: &[f64], device: &Device) -> Result<Self> {
        let n_steps = betas.len();
        if n_steps == 0 {
            return Err(DiffusionError::InvalidArgument(
                "a diffusion process needs at least one step".to_string(),
            ));
        }
        let alphas: Vec<f64> = betas.iter().map(|b| 1.0 - b).collect();
        let mut alphas_prod = Vec::with_capacity(n_steps);
        let mut cum_prod = 1.0f64;
        for &a in &alphas {
            cum_prod *= a;
            alphas_prod.push(cum_prod);
        }
        let mut alphas_prod_p = Vec::with_capacity(n_steps);
        alphas_prod_p.push(1.0);
        alphas_prod_p.extend_from_slice(&alphas_prod[..n_steps - 1]);

        let table = |values: Vec<f64>| -> Result<Tensor> {
            let values: Vec<f32> = values.into_iter().map(|v| v as f32).collect();
            Ok(Tensor::from_vec(values, n_steps, device)?)
        };
        Ok(Self {
            betas: table(betas.to_vec())?,
            alphas_bar_sqrt: table(alphas_prod.iter().map(|a| a.sqrt()).collect())?,
            one_minus_alphas_bar_log: table(alphas_prod.iter().map(|a| (1.0 - a).ln()).collect())?,
            one_minus_alphas_bar_sqrt: table(alphas_prod.iter().map(|a| (1.0 - a).sqrt()).collect())?,
            alphas: table(alphas)?,
            alphas_prod: table(alphas_prod)?,
            alphas_prod_p: table(alphas_prod_p)?,
            n_steps,
            device: device.clone(),
        })
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Moves every table to `device`.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        Ok(Self {
            betas: self.betas.to_device(device)?,
            alphas: self.alphas.to_device(device)?,
            alphas_prod: self.alphas_prod.to_device(device)?,
            alphas_prod_p: self.alphas_prod_p.to_device(device)?,
            alphas_bar_sqrt: self.alphas_bar_sqrt.to_device(device)?,
            one_minus_alphas_bar_log: self.one_minus_alphas_bar_log.to_device(device)?,
            one_minus_alphas_bar_sqrt: self.one_minus_alphas_bar_sqrt.to_device(device)?,
            n_steps: self.n_steps,
            device: device.clone(),
        })
    }

    pub(crate) fn check_timestep(&self, t: usize) -> Result<()> {
        if t >= self.n_steps {
            return Err(DiffusionError::IndexOutOfBounds {
                index: t as i64,
                len: self.n_steps,
            });
        }
        Ok(())
    }
}
