use candle_core::Tensor;
use rand::Rng;
use tracing::debug;

use super::{check_model_output, extract, GaussianDiffusion, NoiseModel};
use crate::error::Result;
use crate::utils::{randn, randn_like};

impl GaussianDiffusion {
    /// Standard deviation of the noise added by the reverse step at `t`.
    pub fn sigma(&self, t: usize) -> Result<f32> {
        self.check_timestep(t)?;
        Ok(self.betas.get(t)?.sqrt()?.to_scalar::<f32>()?)
    }

    /// One ancestral sampling step from timestep `t` to `t - 1`, with `t`
    /// shared by the whole batch.
    pub fn p_sample<M, R>(&self, model: &M, x: &Tensor, t: usize, rng: &mut R) -> Result<Tensor>
    where
        M: NoiseModel + ?Sized,
        R: Rng + ?Sized,
    {
        self.check_timestep(t)?;
        let shape = x.dims();
        let t = Tensor::new(&[t as u32], self.device())?;
        let alpha_t = extract(&self.alphas, &t, shape)?;
        // Factor to the model output
        let eps_factor = (alpha_t.affine(-1.0, 1.0)? / extract(&self.one_minus_alphas_bar_sqrt, &t, shape)?)?;
        let eps_theta = model.forward(x, &t)?;
        check_model_output(x, &eps_theta)?;
        let mean = (x - eps_theta.broadcast_mul(&eps_factor)?)?.broadcast_mul(&alpha_t.sqrt()?.recip()?)?;
        let z = randn_like(x, rng)?;
        // Fixed sigma
        let sigma_t = extract(&self.betas, &t, shape)?.sqrt()?;
        Ok((mean + z.broadcast_mul(&sigma_t)?)?)
    }

    /// Denoises standard-normal noise of `shape` through every timestep,
    /// from `n_steps - 1` down to 0. The returned trajectory starts with the
    /// initial noise and holds `n_steps + 1` states.
    pub fn p_sample_loop<M, R>(&self, model: &M, shape: &[usize], rng: &mut R) -> Result<Vec<Tensor>>
    where
        M: NoiseModel + ?Sized,
        R: Rng + ?Sized,
    {
        let mut cur_x = randn(shape.to_vec(), self.device(), rng)?;
        let mut x_seq = Vec::with_capacity(self.n_steps() + 1);
        x_seq.push(cur_x.clone());
        for t in (0..self.n_steps()).rev() {
            cur_x = self.p_sample(model, &cur_x, t, rng)?;
            debug!(timestep = t, "reverse diffusion step");
            x_seq.push(cur_x.clone());
        }
        Ok(x_seq)
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::error::DiffusionError;
    use crate::schedulers::BetaSchedule;
    use crate::utils::has_non_finite;

    fn zero_model(xs: &Tensor, _t: &Tensor) -> candle_core::Result<Tensor> {
        xs.zeros_like()
    }

    #[test]
    fn test_single_step() -> Result<()> {
        let device = Device::Cpu;
        let diffusion = GaussianDiffusion::new(BetaSchedule::Linear, 1, 0.02, 0.02, &device)?;
        let sigma = diffusion.sigma(0)?;
        assert!((sigma - 0.02f32.sqrt()).abs() < 1e-6);

        let x = randn((3, 2), &device, &mut StdRng::seed_from_u64(0))?;
        let next = diffusion.p_sample(&zero_model, &x, 0, &mut StdRng::seed_from_u64(1))?;
        assert_eq!(next.dims(), &[3, 2]);

        // with a zero prediction the step is x / sqrt(alpha) + sigma * z
        let z = randn_like(&x, &mut StdRng::seed_from_u64(1))?;
        let expected = ((&x / (0.98f64).sqrt())? + (z * sigma as f64)?)?;
        let diff = (next - expected)?.abs()?.flatten_all()?.max(0)?.to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        Ok(())
    }

    #[test]
    fn test_step_scales_model_output() -> Result<()> {
        let device = Device::Cpu;
        let diffusion = GaussianDiffusion::new(BetaSchedule::Linear, 10, 1e-3, 0.1, &device)?;
        let ones_model = |xs: &Tensor, _t: &Tensor| xs.ones_like();
        let x = Tensor::zeros((4, 2), DType::F32, &device)?;
        let t = 5;
        let next = diffusion.p_sample(&ones_model, &x, t, &mut StdRng::seed_from_u64(2))?;
        let z = randn_like(&x, &mut StdRng::seed_from_u64(2))?;

        let alpha = diffusion.alphas.to_vec1::<f32>()?[t] as f64;
        let am1 = diffusion.one_minus_alphas_bar_sqrt.to_vec1::<f32>()?[t] as f64;
        let sigma = diffusion.sigma(t)? as f64;
        let mean = -((1.0 - alpha) / am1) / alpha.sqrt();
        let expected = ((z * sigma)? + mean)?;
        let diff = (next - expected)?.abs()?.flatten_all()?.max(0)?.to_scalar::<f32>()?;
        assert!(diff < 1e-5);
        Ok(())
    }

    #[test]
    fn test_sample_loop_trajectory() -> Result<()> {
        let device = Device::Cpu;
        let diffusion = GaussianDiffusion::new(BetaSchedule::Sigmoid, 20, 1e-5, 5e-3, &device)?;
        let mut rng = StdRng::seed_from_u64(9527);
        let x_seq = diffusion.p_sample_loop(&zero_model, &[16, 2], &mut rng)?;
        assert_eq!(x_seq.len(), 21);
        for x in &x_seq {
            assert_eq!(x.dims(), &[16, 2]);
            assert!(!has_non_finite(x)?);
        }

        let mut rng = StdRng::seed_from_u64(9527);
        let first = randn((16, 2), &device, &mut rng)?;
        assert_eq!(x_seq[0].to_vec2::<f32>()?, first.to_vec2::<f32>()?);
        Ok(())
    }

    #[test]
    fn test_sample_loop_visits_every_timestep() -> Result<()> {
        let device = Device::Cpu;
        let diffusion = GaussianDiffusion::new(BetaSchedule::Quad, 5, 1e-4, 2e-2, &device)?;
        let seen = std::cell::RefCell::new(Vec::new());
        let model = |xs: &Tensor, t: &Tensor| -> candle_core::Result<Tensor> {
            seen.borrow_mut().extend(t.to_vec1::<u32>()?);
            xs.zeros_like()
        };
        diffusion.p_sample_loop(&model, &[2, 2], &mut StdRng::seed_from_u64(0))?;
        assert_eq!(*seen.borrow(), vec![4, 3, 2, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_errors() -> Result<()> {
        let device = Device::Cpu;
        let diffusion = GaussianDiffusion::new(BetaSchedule::Linear, 3, 1e-4, 2e-2, &device)?;
        let x = Tensor::zeros((2, 2), DType::F32, &device)?;
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            diffusion.p_sample(&zero_model, &x, 3, &mut rng),
            Err(DiffusionError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        assert!(diffusion.sigma(3).is_err());
        let flat_model = |xs: &Tensor, _t: &Tensor| xs.flatten_all();
        assert!(matches!(
            diffusion.p_sample(&flat_model, &x, 0, &mut rng),
            Err(DiffusionError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_zero_start_propagates_nan() -> Result<()> {
        let device = Device::Cpu;
        // beta[0] = 0 leaves 1 - alpha_bar[0] = 0 and the eps factor at 0 / 0
        let diffusion = GaussianDiffusion::new(BetaSchedule::Linear, 4, 0.0, 2e-2, &device)?;
        let x = Tensor::ones((2, 2), DType::F32, &device)?;
        let next = diffusion.p_sample(&zero_model, &x, 0, &mut StdRng::seed_from_u64(0))?;
        assert!(has_non_finite(&next)?);
        Ok(())
    }
}
