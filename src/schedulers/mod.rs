use std::str::FromStr;

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, Result};

/// This represents how beta ranges from its minimum value to the maximum
/// during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetaSchedule {
    /// Linear interpolation.
    Linear,
    /// Linear interpolation of the square root of beta.
    #[serde(alias = "quadratic")]
    Quad,
    /// Logistic curve over [-6, 6] rescaled into [start, end].
    Sigmoid,
}

impl FromStr for BetaSchedule {
    type Err = DiffusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(BetaSchedule::Linear),
            "quad" | "quadratic" => Ok(BetaSchedule::Quad),
            "sigmoid" => Ok(BetaSchedule::Sigmoid),
            other => Err(DiffusionError::InvalidArgument(format!(
                "unknown beta schedule '{other}', expected one of linear, quad, sigmoid"
            ))),
        }
    }
}

/// `n` evenly spaced values over `[start, end]`.
///
/// The first half is stepped forward from `start` and the second half
/// backward from `end`, so both endpoints are reproduced exactly.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => return Vec::new(),
        1 => return vec![start],
        _ => {}
    }
    let step = (end - start) / (n - 1) as f64;
    let half = n / 2;
    (0..n)
        .map(|i| {
            if i < half {
                start + step * i as f64
            } else {
                end - step * (n - 1 - i) as f64
            }
        })
        .collect()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Beta values of a schedule as plain f64, before they are moved to a device.
pub fn beta_values(schedule: BetaSchedule, n_steps: usize, start: f64, end: f64) -> Result<Vec<f64>> {
    if n_steps == 0 {
        return Err(DiffusionError::InvalidArgument(
            "a beta schedule needs at least one step".to_string(),
        ));
    }
    let betas = match schedule {
        BetaSchedule::Linear => linspace(start, end, n_steps),
        BetaSchedule::Quad => linspace(start.sqrt(), end.sqrt(), n_steps)
            .into_iter()
            .map(|b| b * b)
            .collect(),
        BetaSchedule::Sigmoid => linspace(-6., 6., n_steps)
            .into_iter()
            .map(|x| sigmoid(x) * (end - start) + start)
            .collect(),
    };
    Ok(betas)
}

/// Builds the 1-D tensor of `n_steps` betas for the given policy.
pub fn make_beta_schedule(
    schedule: BetaSchedule,
    n_steps: usize,
    start: f64,
    end: f64,
    device: &Device,
) -> Result<Tensor> {
    let betas: Vec<f32> = beta_values(schedule, n_steps, start, end)?
        .into_iter()
        .map(|b| b as f32)
        .collect();
    Ok(Tensor::from_vec(betas, n_steps, device)?)
}

/// Same as [`make_beta_schedule`] with the policy given by name.
pub fn make_beta_schedule_from_tag(
    tag: &str,
    n_steps: usize,
    start: f64,
    end: f64,
    device: &Device,
) -> Result<Tensor> {
    make_beta_schedule(tag.parse()?, n_steps, start, end, device)
}
