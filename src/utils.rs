use candle_core::{DType, Device, Shape, Tensor};
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::{info, warn};

pub fn get_device(use_cuda: bool) -> Device {
    if use_cuda {
        match Device::cuda_if_available(0) {
            Ok(device) if device.is_cuda() => {
                info!("Using CUDA device 0");
                return device;
            }
            Ok(_) => warn!("CUDA requested but not available, falling back to CPU"),
            Err(e) => warn!("Failed to initialize CUDA: {e}, falling back to CPU"),
        }
    }
    info!("Using CPU device");
    Device::Cpu
}

/// Standard-normal f32 tensor drawn from `rng`.
pub fn randn<S: Into<Shape>, R: Rng + ?Sized>(
    shape: S,
    device: &Device,
    rng: &mut R,
) -> candle_core::Result<Tensor> {
    let shape = shape.into();
    let values: Vec<f32> = (0..shape.elem_count())
        .map(|_| rng.sample(StandardNormal))
        .collect();
    Tensor::from_vec(values, shape, device)
}

pub fn randn_like<R: Rng + ?Sized>(xs: &Tensor, rng: &mut R) -> candle_core::Result<Tensor> {
    randn(xs.shape().clone(), xs.device(), rng)
}

/// Number of NaN or infinite entries, checked in the tensor's own precision.
/// Integer tensors are always finite.
pub fn count_non_finite(xs: &Tensor) -> candle_core::Result<usize> {
    let xs = xs.flatten_all()?;
    let count = match xs.dtype() {
        DType::F64 => xs.to_vec1::<f64>()?.iter().filter(|v| !v.is_finite()).count(),
        DType::F32 => xs.to_vec1::<f32>()?.iter().filter(|v| !v.is_finite()).count(),
        // f16/bf16 overflow is already inf, so widening keeps the count
        dtype if dtype.is_float() => xs
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?
            .iter()
            .filter(|v| !v.is_finite())
            .count(),
        _ => 0,
    };
    Ok(count)
}

pub fn has_non_finite(xs: &Tensor) -> candle_core::Result<bool> {
    Ok(count_non_finite(xs)? > 0)
}
