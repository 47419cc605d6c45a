use candle_core::{Device, Tensor};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{DiffusionError, Result};

/// Samples `size` points of a 2-D swiss roll, shape `(size, 2)`.
///
/// Points follow scikit-learn's `make_swiss_roll` projected on its x and z
/// axes: position `t = 1.5 pi (1 + 2u)` along the spiral plus Gaussian
/// jitter of standard deviation `noise`, scaled down by 10. The height axis
/// is dropped and never drawn.
pub fn sample_batch<R: Rng + ?Sized>(
    size: usize,
    noise: f64,
    device: &Device,
    rng: &mut R,
) -> Result<Tensor> {
    if noise < 0.0 {
        return Err(DiffusionError::InvalidArgument(format!(
            "swiss roll noise must be non-negative, got {noise}"
        )));
    }
    let mut points = Vec::with_capacity(size * 2);
    for _ in 0..size {
        let t = 1.5 * std::f64::consts::PI * (1.0 + 2.0 * rng.gen::<f64>());
        let x = t * t.cos() + noise * rng.sample::<f64, _>(StandardNormal);
        let z = t * t.sin() + noise * rng.sample::<f64, _>(StandardNormal);
        points.push((x / 10.0) as f32);
        points.push((z / 10.0) as f32);
    }
    Ok(Tensor::from_vec(points, (size, 2), device)?)
}
