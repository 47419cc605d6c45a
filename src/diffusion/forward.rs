use candle_core::{DType, Tensor};
use rand::Rng;
use tracing::debug;

use super::{check_model_output, extract, GaussianDiffusion, NoiseModel};
use crate::error::{DiffusionError, Result};
use crate::utils::randn_like;

/// Draws `ceil(batch_size / 2)` timesteps uniformly in `[0, n_steps)` and
/// appends their reflections `n_steps - 1 - t`, truncated to `batch_size`.
pub fn mirrored_timesteps<R: Rng + ?Sized>(
    batch_size: usize,
    n_steps: usize,
    rng: &mut R,
) -> Result<Vec<u32>> {
    if n_steps == 0 {
        return Err(DiffusionError::InvalidArgument(
            "cannot draw timesteps from an empty schedule".to_string(),
        ));
    }
    let n_steps = u32::try_from(n_steps).map_err(|_| {
        DiffusionError::InvalidArgument(format!("{n_steps} timesteps do not fit in u32"))
    })?;
    let drawn: Vec<u32> = (0..(batch_size + 1) / 2)
        .map(|_| rng.gen_range(0..n_steps))
        .collect();
    let mirrored = drawn.iter().map(|t| n_steps - 1 - t);
    Ok(drawn.iter().copied().chain(mirrored).take(batch_size).collect())
}

impl GaussianDiffusion {
    /// Noises `x_0` to the per-sample timesteps `t`:
    /// `x_0 * sqrt(alpha_bar[t]) + noise * sqrt(1 - alpha_bar[t])`.
    pub fn q_sample(&self, x_0: &Tensor, t: &Tensor, noise: &Tensor) -> Result<Tensor> {
        if x_0.dims() != noise.dims() {
            return Err(DiffusionError::InvalidArgument(format!(
                "noise shape {:?} differs from sample shape {:?}",
                noise.dims(),
                x_0.dims()
            )));
        }
        let batch_size = x_0.dim(0)?;
        if t.dims() != &[batch_size] {
            return Err(DiffusionError::InvalidArgument(format!(
                "expected {batch_size} timesteps, got shape {:?}",
                t.dims()
            )));
        }
        // x0 multiplier
        let a = extract(&self.alphas_bar_sqrt, t, x_0.dims())?;
        // eps multiplier
        let am1 = extract(&self.one_minus_alphas_bar_sqrt, t, x_0.dims())?;
        Ok((x_0.broadcast_mul(&a)? + noise.broadcast_mul(&am1)?)?)
    }

    /// Noise-prediction objective on a batch of clean samples. Returns the
    /// mean squared error between the injected and the predicted noise as a
    /// rank 0 tensor.
    pub fn noise_estimation_loss<M, R>(&self, model: &M, x_0: &Tensor, rng: &mut R) -> Result<Tensor>
    where
        M: NoiseModel + ?Sized,
        R: Rng + ?Sized,
    {
        let x_0 = x_0.to_dtype(DType::F32)?;
        let batch_size = x_0.dim(0)?;
        let t = mirrored_timesteps(batch_size, self.n_steps(), rng)?;
        let t = Tensor::from_vec(t, batch_size, x_0.device())?;
        let e = randn_like(&x_0, rng)?;
        let x = self.q_sample(&x_0, &t, &e)?;
        let output = model.forward(&x, &t)?;
        check_model_output(&x, &output)?;
        let loss = (e - output)?.sqr()?.mean_all()?;
        debug!(batch_size, "computed noise estimation loss");
        Ok(loss)
    }
}
