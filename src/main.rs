use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use cytoclust::clustering::{
    AgglomerativeParams, GaussianMixture, HierarchicalBackend, KMeansInit, KMeansParams,
    LinfaBackend, Linkage, MahalanobisScorer, Metric, MixtureInit, NativeBackend,
    PartitionBackend,
};
use cytoclust::container::{CellData, CellRepository};
use cytoclust::features::FeatureSelector;
use cytoclust::io::{read_centers_csv, read_matrix_csv, write_labels_csv, write_record_json};
use cytoclust::tools::{fit_agglomerative, fit_kmeans, fit_mixture, kmeans_inertias};

// Name of the channel mask built from --channels.
const CHANNEL_MASK_KEY: &str = "use_for_clustering";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Gaussian mixture clustering
    Mixture(MixtureArgs),
    /// K-means clustering
    Kmeans(KMeansArgs),
    /// Agglomerative (hierarchical) clustering
    Agglomerative(AgglomerativeArgs),
    /// Print k-means inertia for a range of cluster counts
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Cell-by-channel matrix, CSV with a header row (may be gzipped)
    matrix_csv: String,

    /// Comma-separated channels to cluster on (default: all)
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<String>>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Key the labels and metadata are stored under
    #[arg(long)]
    key: Option<String>,

    #[arg(long, default_value = "labels.csv")]
    labels_out: String,

    #[arg(long, default_value = None)]
    metadata_out: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Native,
    Linfa,
}

impl Backend {
    fn partition(self) -> Box<dyn PartitionBackend> {
        match self {
            Backend::Native => Box::new(NativeBackend),
            Backend::Linfa => Box::new(LinfaBackend),
        }
    }
}

fn parse_init(s: &str) -> Result<MixtureInit, String> {
    MixtureInit::from_str(s).map_err(|err| err.to_string())
}

#[derive(Args, Debug)]
struct MixtureArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[arg(short = 'k', long)]
    n_clusters: usize,

    /// Initialization: kmeans or random
    #[arg(long, value_parser = parse_init, default_value = "kmeans")]
    init: MixtureInit,

    /// Explicit initial centers (CSV, one row per component, header optional); overrides --init
    #[arg(long, default_value = None)]
    centers: Option<String>,

    #[arg(long, default_value_t = 100)]
    max_steps: usize,

    #[arg(long, default_value = None)]
    seed: Option<u64>,

    /// Score components with the Mahalanobis distance
    #[arg(long, default_value_t = false)]
    mahalanobis: bool,

    /// Backend for the k-means initialization pass
    #[arg(long, value_enum, default_value_t = Backend::Native)]
    backend: Backend,
}

#[derive(Args, Debug)]
struct KMeansArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[arg(short = 'k', long)]
    n_clusters: usize,

    #[command(flatten)]
    kmeans: KMeansOptions,
}

#[derive(Args, Debug)]
struct KMeansOptions {
    #[arg(long, value_enum, default_value_t = KMeansInit::KMeansPlusPlus)]
    init: KMeansInit,

    #[arg(long, default_value_t = 10)]
    n_init: usize,

    #[arg(long, default_value_t = 300)]
    max_iter: usize,

    #[arg(long, default_value_t = 1e-4)]
    tolerance: f64,

    #[arg(long, default_value = None)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Backend::Native)]
    backend: Backend,
}

impl KMeansOptions {
    fn params(&self, n_clusters: usize) -> KMeansParams {
        let params = KMeansParams::new(n_clusters)
            .init(self.init)
            .n_init(self.n_init)
            .max_iter(self.max_iter)
            .tolerance(self.tolerance);
        match self.seed {
            Some(seed) => params.seed(seed),
            None => params,
        }
    }
}

#[derive(Args, Debug)]
struct AgglomerativeArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[arg(short = 'k', long, conflicts_with = "distance_threshold")]
    n_clusters: Option<usize>,

    #[arg(long)]
    distance_threshold: Option<f64>,

    #[arg(long, value_enum, default_value_t = Linkage::Ward)]
    linkage: Linkage,

    #[arg(long, value_enum, default_value_t = Metric::Euclidean)]
    metric: Metric,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Comma-separated cluster counts
    #[arg(long, value_delimiter = ',', required = true)]
    ks: Vec<usize>,

    #[command(flatten)]
    kmeans: KMeansOptions,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Mixture(args) => run_mixture(args),
        Command::Kmeans(args) => run_kmeans(args),
        Command::Agglomerative(args) => run_agglomerative(args),
        Command::Sweep(args) => run_sweep(args),
    }
}

fn load(input: &InputArgs) -> Result<(CellData, FeatureSelector)> {
    let mut data = read_matrix_csv(&input.matrix_csv)
        .with_context(|| format!("reading {}", input.matrix_csv))?;
    info!("Read {} cells, {} channels", data.n_obs(), data.n_vars());

    let selector = match &input.channels {
        Some(channels) => {
            data.insert_channel_mask(CHANNEL_MASK_KEY, channels)?;
            FeatureSelector::all().use_channel_mask(CHANNEL_MASK_KEY)
        }
        None => FeatureSelector::all(),
    };
    Ok((data, selector))
}

fn write_outputs(data: &CellData, key: &str, output: &OutputArgs) -> Result<()> {
    if let Some(labels) = data.obs_column(key).and_then(|c| c.as_int()) {
        write_labels_csv(&output.labels_out, key, labels)
            .with_context(|| format!("writing {}", output.labels_out))?;
    }
    if let (Some(path), Some(record)) = (&output.metadata_out, data.result(key)) {
        write_record_json(path, record).with_context(|| format!("writing {}", path))?;
    }
    Ok(())
}

fn run_mixture(args: MixtureArgs) -> Result<()> {
    let (mut data, selector) = load(&args.input)?;
    let key = args.output.key.as_deref().unwrap_or("gmm");

    let init = match &args.centers {
        Some(path) => {
            let centers = read_centers_csv(path).with_context(|| format!("reading {}", path))?;
            MixtureInit::Centers(centers)
        }
        None => args.init,
    };

    let mut gmm = GaussianMixture::params(args.n_clusters)
        .init(init)
        .max_steps(args.max_steps)
        .seeder(args.backend.partition());
    if let Some(seed) = args.seed {
        gmm = gmm.seed(seed);
    }

    let fit = if args.mahalanobis {
        fit_mixture(&mut data, &gmm.scorer(MahalanobisScorer), key, &selector)?
    } else {
        fit_mixture(&mut data, &gmm, key, &selector)?
    };

    println!(
        "{} components, {} steps, converged: {}, stale components: {:?}",
        args.n_clusters,
        fit.steps,
        fit.converged,
        fit.stale_components()
    );
    write_outputs(&data, key, &args.output)
}

fn run_kmeans(args: KMeansArgs) -> Result<()> {
    let (mut data, selector) = load(&args.input)?;
    let key = args.output.key.as_deref().unwrap_or("kmeans");

    let params = args.kmeans.params(args.n_clusters);
    let backend = args.kmeans.backend.partition();
    let fit = fit_kmeans(&mut data, backend.as_ref(), &params, key, &selector)?;

    println!("{} clusters, inertia: {}", args.n_clusters, fit.inertia);
    write_outputs(&data, key, &args.output)
}

fn run_agglomerative(args: AgglomerativeArgs) -> Result<()> {
    let (mut data, selector) = load(&args.input)?;
    let key = args.output.key.as_deref().unwrap_or("agglomerative");

    let params = AgglomerativeParams {
        n_clusters: args.n_clusters,
        distance_threshold: args.distance_threshold,
        linkage: args.linkage,
        metric: args.metric,
    };
    let backend: &dyn HierarchicalBackend = &NativeBackend;
    let fit = fit_agglomerative(&mut data, backend, &params, key, &selector)?;

    println!("{} clusters from {} cells", fit.n_clusters, fit.n_leaves);
    write_outputs(&data, key, &args.output)
}

fn run_sweep(args: SweepArgs) -> Result<()> {
    let (data, selector) = load(&args.input)?;
    let backend = args.kmeans.backend.partition();

    let prog = ProgressBar::new(args.ks.len() as u64);
    prog.set_style(
        ProgressStyle::with_template("{prefix:>10} {bar:40} {pos}/{len}")?.progress_chars("##-"),
    );
    prog.set_prefix("k-means");

    let mut inertias = Vec::with_capacity(args.ks.len());
    for &k in &args.ks {
        let params = args.kmeans.params(k);
        inertias.extend(kmeans_inertias(&data, backend.as_ref(), &[k], &params, &selector)?);
        prog.inc(1);
    }
    prog.finish_and_clear();

    for (k, inertia) in args.ks.iter().zip(&inertias) {
        println!("{}\t{}", k, inertia);
    }
    Ok(())
}
