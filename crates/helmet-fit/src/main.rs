//! Command line front end for helmet fitting.
//!
//! # Commands
//!
//! - `helmet-fit segment <volume> -o <mesh>` - Extract the skin surface
//! - `helmet-fit fit --head <mesh> --template flat [-o helmet.stl]` - Position, carve and save
//! - `helmet-fit inspect <mesh>` - Print a validation report

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use helmet_fit::{
    parse_actions, HelmetFitConfig, SaveTarget, Session, TemplateCatalog, TemplateKind,
};
use mesh_io::{load_mesh, save_mesh};
use mesh_repair::validate_mesh;
use mesh_types::{MeshBounds, MeshTopology};
use mesh_volume::{load_volume, segment_skin};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fit a printable helmet to a CT-scanned head.
#[derive(Parser)]
#[command(name = "helmet-fit")]
#[command(about = "CT scan to custom helmet", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment the skin surface from a CT volume
    Segment {
        /// NIfTI file, DICOM file or DICOM directory
        volume: PathBuf,

        /// Output mesh (.stl, .ply or .vtk)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Position a head in a helmet template, carve and save
    Fit(FitArgs),

    /// Print a validation report for a mesh
    Inspect {
        /// Mesh file
        mesh: PathBuf,
    },
}

#[derive(Args)]
struct FitArgs {
    /// Head mesh
    #[arg(long, conflicts_with = "volume", required_unless_present = "volume")]
    head: Option<PathBuf>,

    /// CT volume to segment the head from
    #[arg(long)]
    volume: Option<PathBuf>,

    /// Helmet template
    #[arg(long, value_enum, default_value = "flat")]
    template: TemplateArg,

    /// Carve the chin piece too
    #[arg(long)]
    chin: bool,

    /// Whitespace-separated actions, e.g. "rx+ rx+ s+ tz-"
    #[arg(long, default_value = "")]
    actions: String,

    /// Subject identifier used in the file names
    #[arg(long, default_value = "subject")]
    subject: String,

    /// Output directory (defaults to the configured one)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Explicit helmet file, replacing the derived name. The chin piece is
    /// written beside it.
    #[arg(short, long, conflicts_with = "out")]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TemplateArg {
    Flat,
    Winged,
}

impl From<TemplateArg> for TemplateKind {
    fn from(arg: TemplateArg) -> Self {
        match arg {
            TemplateArg::Flat => Self::Flat,
            TemplateArg::Winged => Self::Winged,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<HelmetFitConfig> {
    match path {
        Some(path) => HelmetFitConfig::load(path).context("Failed to load configuration"),
        None => Ok(HelmetFitConfig::default()),
    }
}

fn segment(config: &HelmetFitConfig, volume: &Path, output: &Path) -> Result<()> {
    let grid = load_volume(volume).with_context(|| format!("Failed to load {}", volume.display()))?;
    let (mesh, summary) = segment_skin(&grid, &config.segmentation).context("Segmentation failed")?;
    save_mesh(&mesh, output).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{summary}");
    println!("Wrote {}", output.display());
    Ok(())
}

fn fit(config: HelmetFitConfig, args: FitArgs) -> Result<()> {
    let actions = parse_actions(&args.actions)?;
    let catalog = TemplateCatalog::new(&config.paths.templates);
    let template = catalog
        .load(args.template.into())
        .context("Failed to load helmet template")?;
    let out = args.out.unwrap_or_else(|| config.paths.output.clone());

    let mut session = match (&args.head, &args.volume) {
        (Some(head), _) => {
            let mesh = load_mesh(head).with_context(|| format!("Failed to read {}", head.display()))?;
            Session::new(config, template, mesh)?
        }
        (None, Some(volume)) => {
            let grid = load_volume(volume).with_context(|| format!("Failed to load {}", volume.display()))?;
            Session::from_volume(config, template, grid)?
        }
        (None, None) => bail!("either --head or --volume is required"),
    };
    info!(summary = %session.prepare_summary(), "session ready");

    session.set_chin_enabled(args.chin);
    session.apply_actions(actions);
    println!("Pose: {:?}", session.pose().counts());

    let artifact = session.commit().context("Carving failed")?;
    println!("{artifact}");

    let mut target = SaveTarget::new(out, args.subject);
    if let Some(path) = args.output {
        target = target.with_output(path);
    }
    let report = session.save(&target)?;
    let layers = session.viewport().backend().layers();
    info!(redraws = session.viewport().redraw_count(), ?layers, "viewport state");
    println!("{report}");
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let mesh = load_mesh(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let bounds = mesh.bounds();
    println!("{}: {} vertices, {} faces", path.display(), mesh.vertex_count(), mesh.face_count());
    println!("Bounds: {:?} .. {:?}", bounds.min.coords.as_slice(), bounds.max.coords.as_slice());
    println!("Volume: {:.3}", mesh.volume());
    println!("{}", validate_mesh(&mesh));
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Segment { volume, output } => segment(&config, &volume, &output),
        Commands::Fit(args) => fit(config, args),
        Commands::Inspect { mesh } => inspect(&mesh),
    }
}
