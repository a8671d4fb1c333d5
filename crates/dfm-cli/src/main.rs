//! dfm CLI

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dfm_inference::{History, KalmanConfig, SingularPolicy, StateSpaceModel};
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dfm")]
#[command(about = "Kalman filter, RTS smoother and EM E-step for linear-Gaussian state-space models")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Kalman filter
    Filter(RunArgs),

    /// Kalman filter followed by the RTS smoother (with lag-one covariances)
    Smooth(RunArgs),

    /// E-step sufficient statistics for EM
    Estep(RunArgs),

    /// Simulate (states, observations) from the model in the input JSON
    Simulate {
        /// Input JSON file (`x` may be omitted)
        #[arg(short, long)]
        input: PathBuf,

        /// Number of timesteps (>0)
        #[arg(long)]
        t_max: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Input JSON file: `{ "model": {a, c, q, r, f0, p0}, "x": [[...]] }`
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for results (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to do when an innovation or prior covariance is singular
    #[arg(long, value_enum, default_value_t = SingularArg::Propagate)]
    singular: SingularArg,

    /// Singular-value cutoff for the pseudo-inverse fallback
    #[arg(long, default_value = "1e-12")]
    pinv_eps: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum SingularArg {
    /// Continue with the pseudo-inverse
    Propagate,
    /// Stop with an error
    Fail,
}

impl RunArgs {
    fn config(&self) -> KalmanConfig {
        KalmanConfig {
            singular: match self.singular {
                SingularArg::Propagate => SingularPolicy::Propagate,
                SingularArg::Fail => SingularPolicy::FailFast,
            },
            pinv_eps: self.pinv_eps,
            ..KalmanConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Filter(args) => cmd_filter(&args),
        Commands::Smooth(args) => cmd_smooth(&args),
        Commands::Estep(args) => cmd_estep(&args),
        Commands::Simulate { input, t_max, seed, output } => {
            cmd_simulate(&input, t_max, seed, output.as_ref())
        }
        Commands::Version => {
            println!("dfm {}", dfm_core::VERSION);
            Ok(())
        }
    }
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
struct ModelJson {
    /// `null` entries in the first row mark unloaded state dimensions.
    a: Vec<Vec<Option<f64>>>,
    c: Vec<Vec<f64>>,
    q: Vec<Vec<f64>>,
    r: Vec<Vec<f64>>,
    f0: Vec<f64>,
    p0: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct InputJson {
    model: ModelJson,
    #[serde(default)]
    x: Vec<Vec<Option<f64>>>,
}

fn check_rectangular<T>(name: &str, rows: &[Vec<T>]) -> Result<(usize, usize)> {
    if rows.is_empty() {
        anyhow::bail!("{name} must be non-empty");
    }
    let ncols = rows[0].len();
    if ncols == 0 {
        anyhow::bail!("{name} rows must be non-empty");
    }
    for (i, r) in rows.iter().enumerate() {
        if r.len() != ncols {
            anyhow::bail!(
                "{name} must be rectangular: row {i} has len {}, expected {}",
                r.len(),
                ncols
            );
        }
    }
    Ok((rows.len(), ncols))
}

fn dmatrix_from_nested(name: &str, rows: Vec<Vec<f64>>) -> Result<DMatrix<f64>> {
    let (nrows, ncols) = check_rectangular(name, &rows)?;
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        anyhow::bail!("{name} must contain only finite values");
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(DMatrix::from_row_slice(nrows, ncols, &flat))
}

/// `null` cells become NaN.
fn dmatrix_from_opt_nested(name: &str, rows: Vec<Vec<Option<f64>>>) -> Result<DMatrix<f64>> {
    let (nrows, ncols) = check_rectangular(name, &rows)?;
    let flat: Vec<f64> = rows.into_iter().flatten().map(|v| v.unwrap_or(f64::NAN)).collect();
    Ok(DMatrix::from_row_slice(nrows, ncols, &flat))
}

fn dvector_from_vec(name: &str, v: Vec<f64>) -> Result<DVector<f64>> {
    if v.is_empty() {
        anyhow::bail!("{name} must be non-empty");
    }
    if v.iter().any(|x| !x.is_finite()) {
        anyhow::bail!("{name} must contain only finite values");
    }
    Ok(DVector::from_vec(v))
}

fn dvector_to_vec(v: &DVector<f64>) -> Vec<f64> {
    v.iter().copied().collect()
}

fn dmatrix_to_nested(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows()).map(|i| m.row(i).iter().copied().collect()).collect()
}

fn history_means(h: &History) -> Vec<Vec<f64>> {
    h.iter().map(|m| m.iter().copied().collect()).collect()
}

fn history_covs(h: &History) -> Vec<Vec<Vec<f64>>> {
    (0..h.len()).map(|t| dmatrix_to_nested(&h.matrix(t))).collect()
}

fn load_input(path: &PathBuf, need_x: bool) -> Result<(StateSpaceModel, DMatrix<f64>)> {
    tracing::info!(path = %path.display(), "loading input");
    let bytes = std::fs::read(path)?;
    let input: InputJson = serde_json::from_slice(&bytes)?;

    let m = input.model;
    let model = StateSpaceModel::new(
        dmatrix_from_nested("c", m.c)?,
        dmatrix_from_nested("q", m.q)?,
        dmatrix_from_nested("r", m.r)?,
        dmatrix_from_opt_nested("a", m.a)?,
        dvector_from_vec("f0", m.f0)?,
        dmatrix_from_nested("p0", m.p0)?,
    )
    .map_err(|e| anyhow::anyhow!("invalid model: {e}"))?;

    let x = if input.x.is_empty() {
        if need_x {
            anyhow::bail!("x must be non-empty");
        }
        DMatrix::zeros(0, model.n_obs())
    } else {
        dmatrix_from_opt_nested("x", input.x)?
    };

    tracing::info!(
        n_state = model.n_state(),
        n_obs = model.n_obs(),
        t = x.nrows(),
        loaded = model.loaded_states().len(),
        "input loaded"
    );
    Ok((model, x))
}

fn cmd_filter(args: &RunArgs) -> Result<()> {
    let (model, x) = load_input(&args.input, true)?;
    let fr = dfm_inference::kalman_filter_with_config(&model, &x, &args.config())
        .map_err(|e| anyhow::anyhow!("kalman_filter failed: {e}"))?;
    tracing::info!(log_likelihood = fr.log_likelihood, "filter complete");

    let output_json = serde_json::json!({
        "log_likelihood": fr.log_likelihood,
        "log_likelihood_terms": fr.log_likelihood_terms,
        "predicted_means": history_means(&fr.predicted_means),
        "predicted_covs": history_covs(&fr.predicted_covs),
        "filtered_means": history_means(&fr.filtered_means),
        "filtered_covs": history_covs(&fr.filtered_covs),
        "forecast_mean": dvector_to_vec(&fr.forecast_mean),
        "forecast_cov": dmatrix_to_nested(&fr.forecast_cov),
    });

    write_json(args.output.as_ref(), output_json)
}

fn cmd_smooth(args: &RunArgs) -> Result<()> {
    let (model, x) = load_input(&args.input, true)?;
    let fs = dfm_inference::kalman_filter_smoother_with_config(&model, &x, &args.config())
        .map_err(|e| anyhow::anyhow!("kalman_filter_smoother failed: {e}"))?;
    tracing::info!(log_likelihood = fs.log_likelihood(), "smoother complete");

    let (fr, sr) = (&fs.filter, &fs.smoother);
    let output_json = serde_json::json!({
        "log_likelihood": fr.log_likelihood,
        "filtered_means": history_means(&fr.filtered_means),
        "filtered_covs": history_covs(&fr.filtered_covs),
        "smoothed_means": history_means(&sr.smoothed_means),
        "smoothed_covs": history_covs(&sr.smoothed_covs),
        "lag_one_covs": history_covs(&sr.lag_one_covs),
    });

    write_json(args.output.as_ref(), output_json)
}

fn cmd_estep(args: &RunArgs) -> Result<()> {
    let (model, x) = load_input(&args.input, true)?;
    let es = dfm_inference::e_step_with_config(&model, &x, &args.config())
        .map_err(|e| anyhow::anyhow!("e_step failed: {e}"))?;
    tracing::info!(log_likelihood = es.log_likelihood, "e-step complete");

    let output_json = serde_json::json!({
        "log_likelihood": es.log_likelihood,
        "beta": dmatrix_to_nested(&es.beta),
        "gamma": dmatrix_to_nested(&es.gamma),
        "delta": dmatrix_to_nested(&es.delta),
        "gamma1": dmatrix_to_nested(&es.gamma1),
        "gamma2": dmatrix_to_nested(&es.gamma2),
        "f0": dvector_to_vec(&es.f0),
        "p0": dmatrix_to_nested(&es.p0),
    });

    write_json(args.output.as_ref(), output_json)
}

fn cmd_simulate(input: &PathBuf, t_max: usize, seed: u64, output: Option<&PathBuf>) -> Result<()> {
    let (model, _x) = load_input(input, false)?;
    let sim = dfm_inference::simulate(&model, t_max, seed)
        .map_err(|e| anyhow::anyhow!("simulate failed: {e}"))?;
    tracing::info!(t_max, seed, "simulation complete");

    let output_json = serde_json::json!({
        "states": dmatrix_to_nested(&sim.states),
        "x": dmatrix_to_nested(&sim.observations),
    });

    write_json(output, output_json)
}
