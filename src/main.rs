use canvasjob::imaging::{Align, ResizeMethod, ResizeSpec, VerticalAlign, compute_layout};
use canvasjob::{config, output, process, recipe};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "canvasjob")]
#[command(about = "Queued resize, crop, fit and text jobs for raster images")]
#[command(long_about = "\
Queued resize, crop, fit and text jobs for raster images

A recipe lists output images. Each one starts from a source file or a blank
canvas and applies its steps in order:

  [[image]]
  source = \"photos/dawn.jpg\"
  output = \"out/dawn-thumb.jpg\"
  quality = 85

  [[image.step]]
  resize = { width = 300, height = 300, method = \"crop\" }

  [[image.step]]
  text = { content = \"Dawn\", font = \"arial.ttf\", font_size = 14, position_y = 270 }

Resize methods:
  fit    whole source visible, letterboxed with the background
  crop   canvas fully covered, overflow clipped
  scale  stretched to the canvas

Relative paths in a recipe resolve against the recipe's directory.
Run 'canvasjob gen-config' to generate a documented canvasjob.toml.")]
#[command(version)]
struct Cli {
    /// Config file with defaults for every recipe
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every image in a recipe
    Run {
        recipe: PathBuf,
        /// Also write a JSON report of what was written
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a recipe and print its plan without touching images
    Check { recipe: PathBuf },
    /// Show the canvas and content geometry of a resize
    Layout {
        /// Source size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        source: (u32, u32),
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long, default_value = "fit")]
        method: ResizeMethod,
        #[arg(long, default_value = "center")]
        align: Align,
        #[arg(long, default_value = "middle")]
        vertical_align: VerticalAlign,
    },
    /// Print a stock canvasjob.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run {
            recipe: recipe_path,
            report,
        } => {
            let config = config::load_config(&cli.config)?;
            let recipe = recipe::load_recipe(&recipe_path, &config)?;
            warn_duplicate_outputs(&recipe);
            init_thread_pool(&config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::process(&recipe, Some(tx));
            printer.join().map_err(|_| "progress printer panicked")?;

            if let Some(report_path) = report {
                std::fs::write(&report_path, result.to_json()?)?;
            }
            output::print_summary(&result);
            result.ensure_success()?;
        }
        Command::Check {
            recipe: recipe_path,
        } => {
            let config = config::load_config(&cli.config)?;
            println!("==> Checking {}", recipe_path.display());
            let recipe = recipe::load_recipe(&recipe_path, &config)?;
            output::print_plan(&recipe);
            let duplicates = process::duplicate_outputs(&recipe);
            if !duplicates.is_empty() {
                for path in &duplicates {
                    println!("Duplicate output: {}", path.display());
                }
                return Err(format!("{} outputs written more than once", duplicates.len()).into());
            }
            println!("==> Recipe is valid");
        }
        Command::Layout {
            source,
            width,
            height,
            method,
            align,
            vertical_align,
        } => {
            let spec = ResizeSpec::new(width, height)
                .with_method(method)
                .with_align(align, vertical_align);
            let layout = compute_layout(source, &spec).ok_or("set --width, --height or both")?;
            output::print_layout(&layout);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "canvasjob=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn warn_duplicate_outputs(recipe: &recipe::Recipe) {
    for path in process::duplicate_outputs(recipe) {
        tracing::warn!(path = %path.display(), "output written by more than one entry");
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("invalid size '{value}'"))
    };
    Ok((parse(w)?, parse(h)?))
}
