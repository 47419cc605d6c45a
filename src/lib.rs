pub mod config;
pub mod data;
pub mod diffusion;
pub mod error;
pub mod schedulers;
pub mod utils;
pub mod visual;

pub use config::DiffusionConfig;
pub use diffusion::{extract, GaussianDiffusion, NoiseModel};
pub use error::{DiffusionError, Result};
pub use schedulers::{make_beta_schedule, BetaSchedule};
