use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use asv_denoise::io::{read_uniques, write_error_model, write_uniques, write_variants};
use asv_denoise::simulate::AmpliconSimulator;
use asv_denoise::{denoise, DenoiseConfig};

#[derive(Parser, Debug)]
#[command(name = "asv-denoise", about = "Amplicon sequence variant inference")]
struct Cli {
    /// Log debug output (per-promotion detail) to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Learn an error model and infer variants from a uniques TSV.
    Denoise {
        /// Input (`sample<TAB>sequence<TAB>abundance<TAB>q1,q2,...` per line).
        input: PathBuf,
        /// Variants output (default: stdout).
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Write the learned error model here.
        #[arg(long)]
        model_out: Option<PathBuf>,
        /// Maximum learning iterations.
        #[arg(long, default_value_t = 10)]
        max_iterations: usize,
        /// Maximum promotions per sample pass.
        #[arg(long, default_value_t = 10_000)]
        sample_max_iterations: usize,
        /// Significance threshold for new variants.
        #[arg(long, default_value_t = 1e-40)]
        omega_a: f64,
        /// Minimum fold of observed over expected abundance.
        #[arg(long, default_value_t = 1.0)]
        min_fold: f64,
        /// Convergence tolerance on the error model.
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
        /// Number of quality buckets (default: one per score).
        #[arg(long)]
        quality_buckets: Option<usize>,
        /// Re-estimation pseudocount.
        #[arg(long, default_value_t = 1.0)]
        pseudocount: f64,
        /// Leave rows with fewer observations undefined.
        #[arg(long, default_value_t = 0)]
        min_row_observations: u64,
        /// Worker threads (default: all cores).
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Generate synthetic samples as a uniques TSV.
    Simulate {
        /// Per-sample read counts per template, e.g. `s1=2000,1000,500`.
        #[arg(long = "sample", required = true)]
        samples: Vec<String>,
        /// Number of random templates.
        #[arg(long, default_value_t = 3)]
        templates: usize,
        /// Template length.
        #[arg(long, default_value_t = 100)]
        length: usize,
        /// Per-base substitution probability.
        #[arg(long, default_value_t = 0.005)]
        rate: f64,
        /// Quality score assigned to every base.
        #[arg(long, default_value_t = 30)]
        quality: u8,
        /// Random seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output (default: stdout).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Denoise {
            input,
            output,
            model_out,
            max_iterations,
            sample_max_iterations,
            omega_a,
            min_fold,
            tolerance,
            quality_buckets,
            pseudocount,
            min_row_observations,
            threads,
        } => {
            let config = DenoiseConfig::default()
                .with_max_iterations(max_iterations)
                .with_sample_max_iterations(sample_max_iterations)
                .with_omega_a(omega_a)
                .with_min_fold(min_fold)
                .with_convergence_tolerance(tolerance)
                .with_quality_bucket_count(quality_buckets)
                .with_pseudocount(pseudocount)
                .with_min_row_observations(min_row_observations)
                .with_threads(threads);
            run_denoise(input, output, model_out, config)?
        }
        Commands::Simulate {
            samples,
            templates,
            length,
            rate,
            quality,
            seed,
            output,
        } => run_simulate(&samples, templates, length, rate, quality, seed, output)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn run_denoise(
    input: PathBuf,
    output: Option<PathBuf>,
    model_out: Option<PathBuf>,
    config: DenoiseConfig,
) -> Result<()> {
    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("failed to open {}", input.display()))?,
    );
    let samples =
        read_uniques(reader).with_context(|| format!("failed to parse {}", input.display()))?;

    let result = denoise(samples, config).context("denoising failed")?;
    for warning in &result.diagnostics.warnings {
        tracing::warn!("{warning}");
    }
    for (sample, err) in &result.diagnostics.failed_samples {
        tracing::warn!(%sample, "excluded: {err}");
    }

    let mut out = open_output(output.as_ref())?;
    write_variants(&mut out, &result)?;

    if let Some(path) = model_out {
        let mut writer = BufWriter::new(
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?,
        );
        write_error_model(&mut writer, &result.error_model)?;
    }

    Ok(())
}

fn run_simulate(
    samples: &[String],
    templates: usize,
    length: usize,
    rate: f64,
    quality: u8,
    seed: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    let layout = samples
        .iter()
        .map(|entry| parse_layout(entry))
        .collect::<Result<Vec<_>>>()?;

    let sequences = AmpliconSimulator::random_templates(templates, length, seed);
    let simulator = AmpliconSimulator::new(sequences, rate, quality, seed.wrapping_add(1))?;
    let stores = simulator.generate(&layout)?;

    let mut out = open_output(output.as_ref())?;
    write_uniques(&mut out, &stores)?;
    Ok(())
}

fn parse_layout(layout: &str) -> Result<(String, Vec<u64>)> {
    let Some((id, counts)) = layout.split_once('=') else {
        bail!("sample layout '{layout}' must look like id=n1,n2,...");
    };
    let counts = counts
        .split(',')
        .map(|n| n.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid read counts in '{layout}'"))?;
    Ok((id.to_string(), counts))
}
