use std::collections::HashMap;
use std::time::SystemTime;

use anyhow::Context;
use candle_core::Tensor;
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use toy_ddpm::{data::sample_batch, utils::{count_non_finite, get_device}, BetaSchedule, DiffusionConfig};
use tracing::info;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with the diffusion settings, defaults are used when absent.
    #[arg(long)]
    config: Option<String>,

    /// Beta schedule: linear, quad or sigmoid.
    #[arg(long)]
    schedule: Option<String>,

    #[arg(long)]
    n_steps: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Where the denoising trajectory is written.
    #[arg(long, default_value = "./trajectory.safetensors")]
    output: String,

    /// Run on CUDA device 0 when available.
    #[arg(long)]
    cuda: bool,

    /// Enable tracing (generates a trace-timestamp.json file).
    #[arg(long)]
    tracing: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => DiffusionConfig::from_file(path)
            .with_context(|| format!("error loading config {path}"))?,
        None => DiffusionConfig::default(),
    };
    if let Some(schedule) = &args.schedule {
        cfg.schedule = schedule.parse::<BetaSchedule>()?;
    }
    if let Some(n_steps) = args.n_steps {
        cfg.n_steps = n_steps;
    }
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(batch_size) = args.batch_size {
        cfg.batch_size = batch_size;
    }
    info!(?cfg, "configuration");

    let device = get_device(args.cuda);
    let diffusion = cfg.build(&device)?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    // Untrained placeholder predicting no noise.
    let model = |xs: &Tensor, _t: &Tensor| xs.zeros_like();

    let start = SystemTime::now();
    let x_0 = sample_batch(cfg.batch_size, cfg.data_noise, &device, &mut rng)?;
    let loss = diffusion.noise_estimation_loss(&model, &x_0, &mut rng)?;
    info!("noise estimation loss: {:.6}", loss.to_scalar::<f32>()?);

    let x_seq = diffusion.p_sample_loop(&model, x_0.dims(), &mut rng)?;
    for (i, x) in x_seq.iter().enumerate().step_by((x_seq.len() / 10).max(1)) {
        let rms = x.sqr()?.mean_all()?.sqrt()?.to_scalar::<f32>()?;
        info!(state = i, rms, non_finite = count_non_finite(x)?, "trajectory");
    }

    let tensors: HashMap<String, Tensor> = x_seq
        .into_iter()
        .enumerate()
        .map(|(i, x)| (format!("x_{i:03}"), x))
        .collect();
    candle_core::safetensors::save(&tensors, &args.output)?;
    info!(
        "wrote {} states to {} in {:?}",
        tensors.len(),
        args.output,
        SystemTime::now().duration_since(start)?
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = if args.tracing {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().build();
        tracing_subscriber::registry().with(chrome_layer).init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().init();
        None
    };
    run(args)
}
