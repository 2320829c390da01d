use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use timetrace_core::PipelineConfig;
use timetrace_core::collapse::collapse_trace;
use timetrace_core::parsers::chrome::parse_time_trace;
use timetrace_core::pipeline::{render_input, run};
use timetrace_core::views::FlameGraphOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "combined-traces.json";
const DEFAULT_REPORT: &str = "time-trace-report.md";

/// Combine clang `-ftime-trace` files, summarize where compile time goes and
/// render it as a flame graph.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// More logging (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine every trace in a build directory and write the combined
    /// trace, a Markdown report and a flame graph
    Analyze(AnalyzeArgs),

    /// Render a flame graph from a Chrome trace or folded stacks
    Flamegraph {
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON file with flame graph options
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Fold a Chrome trace into `frame;frame value` lines
    Collapse {
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Project source root
    #[arg(long, default_value = ".")]
    source_dir: PathBuf,

    /// Directory holding the object files and their traces
    #[arg(long, default_value = ".")]
    build_dir: PathBuf,

    /// Combined trace, relative to the build directory
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Markdown report, relative to the build directory
    #[arg(long, default_value = DEFAULT_REPORT)]
    report: PathBuf,

    /// Flame graph [default: <OUTPUT>.svg]
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Also write the folded stacks
    #[arg(long)]
    folded: Option<PathBuf>,

    /// Compile command database (searched from the build directory upwards
    /// when not given)
    #[arg(long)]
    compile_commands: Option<PathBuf>,

    /// Project include directory
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// System include directory
    #[arg(long = "isystem", value_name = "DIR")]
    system_include_dirs: Vec<PathBuf>,

    /// JSON file with flame graph options
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so outputs written to stdout stay clean.
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,timetrace_core={level},timetrace={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Analyze(args) => analyze(args),
        Commands::Flamegraph {
            input,
            output,
            config,
        } => {
            let options = load_options(config.as_deref())?;
            let data = read(&input)?;
            let svg = render_input(&data, &options)
                .with_context(|| format!("rendering {}", input.display()))?;
            emit(output.as_deref(), svg.as_bytes())
        }
        Commands::Collapse { input, output } => {
            let data = read(&input)?;
            let document = parse_time_trace(&data)
                .with_context(|| format!("parsing {}", input.display()))?;
            let stacks = collapse_trace(&document);
            emit(output.as_deref(), stacks.to_folded().as_bytes())
        }
    }
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let mut config = PipelineConfig::new(&args.source_dir, &args.build_dir);
    config.compile_commands = args.compile_commands;
    config.include_dirs = args.include_dirs;
    config.system_include_dirs = args.system_include_dirs;
    config.flame_graph = load_options(args.config.as_deref())?;

    let output = run(&config)
        .with_context(|| format!("analyzing {}", args.build_dir.display()))?;

    let trace_path = args.build_dir.join(&args.output);
    let report_path = args.build_dir.join(&args.report);
    let svg_path = args
        .build_dir
        .join(args.svg.unwrap_or_else(|| svg_name(&args.output)));

    let trace = serde_json::to_vec(&output.combined.document)?;
    write(&trace_path, &trace)?;
    write(&report_path, output.report.as_bytes())?;
    write(&svg_path, output.svg.as_bytes())?;
    if let Some(folded) = args.folded {
        write(&args.build_dir.join(folded), output.stacks.to_folded().as_bytes())?;
    }
    Ok(())
}

/// `combined-traces.json` -> `combined-traces.json.svg`
fn svg_name(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".svg");
    PathBuf::from(name)
}

fn load_options(path: Option<&Path>) -> Result<FlameGraphOptions> {
    let Some(path) = path else {
        return Ok(FlameGraphOptions::default());
    };
    let data = read(path)?;
    serde_json::from_slice(&data).with_context(|| format!("parsing config {}", path.display()))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = data.len(), "output.written");
    Ok(())
}

fn emit(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => write(path, data),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}
