use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use vesture::{
    AspectRatio, ConstraintPolicy, GarmentTopology, PipelineConfig, Resolution, SceneChoice,
    TryOnPipeline, TryOnRequest,
};

#[derive(Parser, Debug)]
#[command(name = "vesture", version)]
struct Cli {
    /// Pipeline config JSON. Flags override individual fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print coverage, body profile and lighting of a person photo as JSON.
    Analyze(AnalyzeArgs),
    /// Compile a try-on instruction for a person photo and a garment photo.
    Compile(CompileArgs),
    /// List catalog scenes, or print one scene block.
    Scenes(ScenesArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Person photo (PNG or JPEG).
    #[arg(long)]
    person: PathBuf,
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Person photo (PNG or JPEG).
    #[arg(long)]
    person: PathBuf,

    /// Garment photo (PNG or JPEG).
    #[arg(long)]
    garment: PathBuf,

    /// Extra photo of the same person, for identity only. Repeatable.
    #[arg(long)]
    identity: Vec<PathBuf>,

    /// Declared garment category; skips classification.
    #[arg(long)]
    topology: Option<GarmentTopology>,

    /// Short garment description, e.g. "a navy linen shirt".
    #[arg(long)]
    description: Option<String>,

    /// Catalog scene id or a freeform environment description.
    #[arg(long)]
    scene: Option<String>,

    #[arg(long)]
    aspect: Option<AspectRatio>,

    #[arg(long, default_value = "standard")]
    resolution: Resolution,

    #[arg(long)]
    policy: Option<ConstraintPolicy>,

    /// Escalate identity strictness after a drifted attempt.
    #[arg(long)]
    retry: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write output here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ScenesArgs {
    /// Print the scene block for this id.
    id: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Instruction, analysis and stage report.
    Json,
    /// Instruction text only.
    Text,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    match cli.cmd {
        Command::Analyze(args) => cmd_analyze(config, args),
        Command::Compile(args) => cmd_compile(config, args),
        Command::Scenes(args) => cmd_scenes(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))
}

fn cmd_analyze(config: PipelineConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    let pipeline = TryOnPipeline::new(config)?;
    let person = read_image(&args.person)?;
    let analysis = pipeline.analyze_person(&person);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn cmd_compile(mut config: PipelineConfig, args: CompileArgs) -> anyhow::Result<()> {
    if let Some(p) = args.policy {
        config.constraint_policy = p;
    }
    let pipeline = TryOnPipeline::new(config)?;

    let req = TryOnRequest {
        person: read_image(&args.person)?,
        identity_images: args
            .identity
            .iter()
            .map(|p| read_image(p))
            .collect::<anyhow::Result<Vec<_>>>()?,
        garment: read_image(&args.garment)?,
        garment_hint: args.topology,
        garment_description: args.description,
        scene: SceneChoice::from_user_input(args.scene.as_deref()),
        aspect_ratio: args.aspect,
        resolution: args.resolution,
        retry_mode: args.retry,
        ..TryOnRequest::default()
    };

    let prepared = match pipeline.prepare(&req) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    let rendered = match args.format {
        OutputFormat::Text => prepared.instruction.text(),
        OutputFormat::Json => {
            let mut s = serde_json::to_string_pretty(&serde_json::json!({
                "fingerprint": prepared.instruction.fingerprint().to_string(),
                "mode": prepared.instruction.mode,
                "downgrade": prepared.downgrade,
                "person": prepared.person,
                "garment": prepared.garment,
                "report": prepared.report,
                "instruction": prepared.instruction.text(),
                "control": prepared.instruction.control,
            }))?;
            s.push('\n');
            s
        }
    };

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("write '{}'", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn cmd_scenes(args: ScenesArgs) -> anyhow::Result<()> {
    match args.id {
        Some(id) => {
            let scene = vesture::scene::library::lookup(&id)
                .with_context(|| format!("unknown scene '{id}'"))?;
            print!("{}", vesture::build_scene_prompt(scene));
        }
        None => {
            for s in vesture::scene::library::all() {
                println!("{}\t{}\tv{}", s.id, s.name, s.version);
            }
        }
    }
    Ok(())
}
