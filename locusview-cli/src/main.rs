use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use locusview_core::*;
use locusview_gpu::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "locusview")]
#[command(about = "LocusView - Multi-panel genome coordinate visualization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./locusview.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render records to a PNG image
    Render {
        #[command(flatten)]
        view: ViewArgs,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Override the configured render mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Hover the pointer before rendering, as "PANEL:X,Y" or "X,Y"
        #[arg(long)]
        hover: Option<String>,

        /// Render on the GPU when an adapter is available
        #[arg(long)]
        gpu: bool,
    },

    /// Print the record nearest to a panel-local pixel as JSON
    Hit {
        #[command(flatten)]
        view: ViewArgs,

        /// Panel index
        #[arg(long, default_value = "0")]
        panel: usize,

        /// Panel-local x in pixels
        #[arg(short, allow_hyphen_values = true)]
        x: f64,

        /// Panel-local y in pixels
        #[arg(short, allow_hyphen_values = true)]
        y: f64,
    },

    /// Show the effective configuration
    Config {
        /// Print an example configuration with every default filled in
        #[arg(long)]
        example: bool,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// Records as a JSON array
    #[arg(short, long)]
    records: PathBuf,

    /// Panel domain, repeatable ("1000-2000", "chr17:7.5M-7.7M")
    #[arg(short, long = "domain")]
    domains: Vec<String>,

    /// Viewport width in pixels
    #[arg(long, default_value = "1200")]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value = "400")]
    height: u32,

    /// Genome build used for the coordinate extent and chromosome names
    #[arg(long, value_enum, default_value = "grch37")]
    genome: GenomeBuild,

    /// Value range shared by every panel, as "MIN,MAX"
    #[arg(long, allow_hyphen_values = true)]
    value_range: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum GenomeBuild {
    Grch37,
    Grch38,
    None,
}

impl GenomeBuild {
    fn info(self) -> Option<GenomeInfo> {
        match self {
            GenomeBuild::Grch37 => Some(GenomeInfo::grch37()),
            GenomeBuild::Grch38 => Some(GenomeInfo::grch38()),
            GenomeBuild::None => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Shapes,
    Density,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Shapes => RenderMode::Shapes,
            ModeArg::Density => RenderMode::Density,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            view,
            output,
            mode,
            hover,
            gpu,
        } => cmd_render(config, &view, &output, mode, hover.as_deref(), gpu),
        Commands::Hit { view, panel, x, y } => cmd_hit(config, &view, panel, x, y),
        Commands::Config { example } => cmd_config(&config, example),
    }
}

fn cmd_render(
    mut config: EngineConfig,
    args: &ViewArgs,
    output: &Path,
    mode: Option<ModeArg>,
    hover: Option<&str>,
    gpu: bool,
) -> Result<()> {
    if let Some(mode) = mode {
        config.render.mode = mode.into();
    }

    if gpu {
        #[cfg(feature = "webgpu")]
        {
            match WgpuBackend::new_headless() {
                Ok(backend) => {
                    log::info!("Using GPU: {}", backend.device_info());
                    return render_with(backend, config, args, hover, output);
                }
                Err(e) => log::warn!("GPU initialization failed: {}, falling back to software", e),
            }
        }
        #[cfg(not(feature = "webgpu"))]
        {
            log::warn!("Built without the `webgpu` feature, rendering in software");
        }
    }

    render_with(SoftwareBackend::new(), config, args, hover, output)
}

fn render_with<B: RenderBackend>(
    backend: B,
    config: EngineConfig,
    args: &ViewArgs,
    hover: Option<&str>,
    output: &Path,
) -> Result<()> {
    let genome = args.genome.info();
    let mut view = build_view(backend, config, args, genome)?;

    if let Some(spec) = hover {
        let (panel, x, y) = parse_hover(spec)?;
        view.pointer_move(x, y, panel, Instant::now())?;
        match view.hovered() {
            Some(index) => log::info!("Hovering record {} ({})", index, view.records()[index].id),
            None => log::info!("No record under the pointer at {}", spec),
        }
    }

    view.render()?;
    let image = view.read_pixels()?;
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::info!(
        "Rendered {} records across {} panels to {}",
        view.records().len(),
        view.controller().len(),
        output.display()
    );
    Ok(())
}

fn cmd_hit(config: EngineConfig, args: &ViewArgs, panel: usize, x: f64, y: f64) -> Result<()> {
    let genome = args.genome.info();
    let mut view = build_view(SoftwareBackend::new(), config, args, genome.clone())?;

    match view.click(x, y, panel)? {
        Some(index) => {
            let tooltip = Tooltip::for_record(index, &view.records()[index], genome.as_ref());
            println!("{}", serde_json::to_string_pretty(&tooltip)?);
        }
        None => {
            log::info!("No record within {} px of ({}, {})", view.config().interaction.hit_radius_px, x, y);
            println!("null");
        }
    }
    Ok(())
}

fn cmd_config(config: &EngineConfig, example: bool) -> Result<()> {
    if example {
        println!("{}", EngineConfig::example_toml()?);
    } else {
        println!("{}", serde_json::to_string_pretty(config)?);
    }
    Ok(())
}

fn build_view<B: RenderBackend>(
    backend: B,
    config: EngineConfig,
    args: &ViewArgs,
    genome: Option<GenomeInfo>,
) -> Result<GenomeView<B>> {
    let value_range = args
        .value_range
        .as_deref()
        .map(parse_value_range)
        .transpose()?;
    let domains = args
        .domains
        .iter()
        .map(|spec| parse_domain(spec, genome.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let mut view = GenomeView::new(backend, config, ViewportSize::new(args.width, args.height))?;
    if let Some(genome) = genome {
        view.set_genome(genome);
    }
    view.load_records(read_records(&args.records)?)?;
    view.set_common_value_range(value_range);

    if domains.is_empty() {
        let extent = view.controller().full_extent();
        view.set_domains(&[extent]);
    } else {
        view.set_domains(&domains);
    }
    Ok(view)
}

fn read_records(path: &Path) -> Result<Vec<IntervalRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open records file {}", path.display()))?;
    let records: Vec<IntervalRecord> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse records from {}", path.display()))?;
    log::info!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse "START-END" in genome-wide coordinates, or "CHR:START-END" in
/// chromosome-local coordinates. Positions accept `k`/`M` suffixes.
fn parse_domain(spec: &str, genome: Option<&GenomeInfo>) -> Result<Domain> {
    let (chromosome, range) = match spec.split_once(':') {
        Some((name, range)) => (Some(name.trim()), range),
        None => (None, spec),
    };
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| anyhow!("Invalid domain '{}': expected START-END", spec))?;
    let start = parse_position(start)?;
    let end = parse_position(end)?;
    if start >= end {
        bail!("Invalid domain '{}': start must be before end", spec);
    }

    let (start, end) = match chromosome {
        None => (start, end),
        Some(name) => {
            let genome = genome.ok_or_else(|| {
                anyhow!("Domain '{}' names a chromosome but no genome build is selected", spec)
            })?;
            let to_global = |pos| {
                genome
                    .local_to_global(name, pos)
                    .ok_or_else(|| anyhow!("Position {} is not on chromosome '{}'", pos, name))
            };
            (to_global(start)?, to_global(end)?)
        }
    };
    Ok(Domain::new(start as f64, end as f64))
}

fn parse_position(s: &str) -> Result<u64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    let (number, multiplier) = match cleaned.chars().last() {
        Some('k') | Some('K') => (&cleaned[..cleaned.len() - 1], 1e3),
        Some('m') | Some('M') => (&cleaned[..cleaned.len() - 1], 1e6),
        _ => (cleaned.as_str(), 1.0),
    };
    let value: f64 = number
        .parse()
        .with_context(|| format!("Invalid position '{}'", s))?;
    if !value.is_finite() || value < 0.0 {
        bail!("Invalid position '{}'", s);
    }
    Ok((value * multiplier).round() as u64)
}

fn parse_value_range(spec: &str) -> Result<Domain> {
    let (min, max) = spec
        .split_once(',')
        .ok_or_else(|| anyhow!("Invalid value range '{}': expected MIN,MAX", spec))?;
    let min: f64 = min.trim().parse().with_context(|| format!("Invalid value range '{}'", spec))?;
    let max: f64 = max.trim().parse().with_context(|| format!("Invalid value range '{}'", spec))?;
    let range = Domain::new(min, max);
    if !range.is_valid() {
        bail!("Invalid value range '{}': min must be below max", spec);
    }
    Ok(range)
}

/// Parse "PANEL:X,Y" or "X,Y" (panel 0).
fn parse_hover(spec: &str) -> Result<(usize, f64, f64)> {
    let (panel, point) = match spec.split_once(':') {
        Some((panel, point)) => (
            panel
                .trim()
                .parse()
                .with_context(|| format!("Invalid panel in '{}'", spec))?,
            point,
        ),
        None => (0, spec),
    };
    let (x, y) = point
        .split_once(',')
        .ok_or_else(|| anyhow!("Invalid pointer '{}': expected X,Y", spec))?;
    let x = x.trim().parse().with_context(|| format!("Invalid x in '{}'", spec))?;
    let y = y.trim().parse().with_context(|| format!("Invalid y in '{}'", spec))?;
    Ok((panel, x, y))
}
