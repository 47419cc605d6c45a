use candle_core::Tensor;

/// A denoiser predicting the noise that was mixed into `xs` at timestep `t`.
///
/// `t` holds one u32 timestep per sample, or a single timestep shared by
/// the whole batch. The returned tensor must have the shape of `xs`.
pub trait NoiseModel {
    fn forward(&self, xs: &Tensor, t: &Tensor) -> candle_core::Result<Tensor>;
}

impl<F> NoiseModel for F
where
    F: Fn(&Tensor, &Tensor) -> candle_core::Result<Tensor>,
{
    fn forward(&self, xs: &Tensor, t: &Tensor) -> candle_core::Result<Tensor> {
        self(xs, t)
    }
}
