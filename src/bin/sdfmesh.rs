//! CLI binary for sdf-mesh-converter.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConverterConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sdf_mesh_converter::{
    convert_directory, convert_document, BatchReport, ConversionProgressCallback, ConverterConfig,
    DocumentReport, OutputFormat, ProgressCallback, RewriteMode,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten long messages to keep one line per event.
fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback.
///
/// In batch mode the bar counts documents; for a single document it counts
/// mesh references. Documents complete out of order when run concurrently,
/// so every line names its document.
struct CliProgressCallback {
    bar: ProgressBar,
    batch: AtomicBool,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            batch: AtomicBool::new(false),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn short(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.batch.store(true, Ordering::SeqCst);
        self.activate_bar(total_documents, "documents");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting meshes of {total_documents} SDF file(s)…"))
        ));
    }

    fn on_document_start(&self, document: &Path, references: usize) {
        if !self.batch.load(Ordering::SeqCst) {
            self.activate_bar(references, "meshes");
        }
        self.bar.set_message(Self::short(document));
    }

    fn on_mesh_converted(&self, _document: &Path, uri: &str, output: &Path) {
        if !self.batch.load(Ordering::SeqCst) {
            self.bar.println(format!(
                "  {} {}  {}",
                green("✓"),
                uri,
                dim(&format!("→ {}", output.display())),
            ));
            self.bar.inc(1);
        }
    }

    fn on_mesh_skipped(&self, document: &Path, uri: &str, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            yellow("⚠"),
            dim(&Self::short(document)),
            uri,
            dim(&truncate(reason, 80)),
        ));
        if !self.batch.load(Ordering::SeqCst) {
            self.bar.inc(1);
        }
    }

    fn on_document_complete(
        &self,
        document: &Path,
        converted: usize,
        total: usize,
        output: Option<&Path>,
    ) {
        if !self.batch.load(Ordering::SeqCst) {
            self.bar.finish_and_clear();
            return;
        }
        let mark = if converted > 0 || total == 0 {
            green("✓")
        } else {
            red("✗")
        };
        let target = output
            .map(|p| format!("→ {}", p.display()))
            .unwrap_or_else(|| "no output".to_string());
        self.bar.println(format!(
            "  {} {:<32} {:>3}/{:<3} meshes  {}",
            mark,
            Self::short(document),
            converted,
            total,
            dim(&target),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, document: &Path, error: &str) {
        if !self.batch.load(Ordering::SeqCst) {
            self.bar.finish_and_clear();
            return;
        }
        self.bar.println(format!(
            "  {} {:<32} {}",
            red("✗"),
            Self::short(document),
            red(&truncate(error, 80)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total_documents: usize, _succeeded: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert the meshes of one world; writes robot_converted.sdf next to it
  sdfmesh worlds/robot.sdf

  # glTF output into a custom directory
  sdfmesh worlds/robot.sdf -o assets/meshes -f gltf

  # Explicit output document
  sdfmesh worlds/robot.sdf --output build/robot.sdf

  # Every SDF file under a tree, 8 at a time
  sdfmesh -r worlds/ -c 8

  # Extra model:// search roots, checked before the defaults
  sdfmesh --model-path ~/my_models --model-path ./vendor/models world.sdf

  # Only rewrite the nodes that were actually converted
  sdfmesh --rewrite-mode structural world.sdf

  # Machine-readable report
  sdfmesh --json -r worlds/ > report.json

URI SCHEMES:
  file:///abs/path.stl        absolute path
  model://<model>/<path>      first model root containing <model>/<path>,
                              else relative to the document directory
  package://<package>/<path>  relative to the document directory
  <path>                      relative to the document directory

SUPPORTED INPUTS:
  .dae  .obj  .stl  .ply  .off

ENVIRONMENT VARIABLES:
  GAZEBO_MODEL_PATH       Extra model:// roots (path-list syntax)
  GZ_SIM_RESOURCE_PATH    Extra model:// roots (path-list syntax)
  IGN_GAZEBO_RESOURCE_PATH
                          Extra model:// roots (path-list syntax)
  RUST_LOG                Overrides -v / -q log filtering
"#;

/// Convert the meshes referenced by SDF files to glTF.
#[derive(Parser, Debug)]
#[command(
    name = "sdfmesh",
    version,
    about = "Convert the meshes referenced by SDF files to glTF",
    long_about = "Find every <mesh> reference in SDF scene documents, convert each distinct \
mesh (COLLADA, OBJ, STL, PLY, OFF) to GLB or glTF exactly once, and write a copy of each \
document whose references point at the converted files.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// SDF file, or a directory with --recursive.
    input: PathBuf,

    /// Directory receiving converted meshes.
    #[arg(short, long, env = "SDFMESH_OUTPUT_DIR", default_value = "assets/converted")]
    output_dir: PathBuf,

    /// Output mesh format.
    #[arg(short, long, env = "SDFMESH_FORMAT", value_enum, default_value = "glb")]
    format: FormatArg,

    /// Treat INPUT as a directory and convert every *.sdf below it.
    #[arg(short, long)]
    recursive: bool,

    /// Suffix for rewritten documents (robot.sdf → robot<SUFFIX>.sdf).
    #[arg(long, env = "SDFMESH_SUFFIX", default_value = "_converted")]
    suffix: String,

    /// Write the rewritten document here (single document only).
    #[arg(long, conflicts_with = "recursive")]
    output: Option<PathBuf>,

    /// Extra model:// search root, checked before the defaults. Repeatable.
    #[arg(long = "model-path", value_name = "DIR")]
    model_paths: Vec<PathBuf>,

    /// How references are substituted.
    #[arg(
        long,
        env = "SDFMESH_REWRITE_MODE",
        value_enum,
        default_value = "textual",
        long_help = "textual: replace every <uri>RAW</uri> of a converted URI in the whole \
          document.\nstructural: replace only the <uri> nodes that were converted."
    )]
    rewrite_mode: RewriteModeArg,

    /// Number of documents converted concurrently.
    #[arg(short, long, env = "SDFMESH_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Print the report as JSON on stdout.
    #[arg(long, env = "SDFMESH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SDFMESH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SDFMESH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SDFMESH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Glb,
    Gltf,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Glb => OutputFormat::Glb,
            FormatArg::Gltf => OutputFormat::Gltf,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RewriteModeArg {
    Textual,
    Structural,
}

impl From<RewriteModeArg> for RewriteMode {
    fn from(v: RewriteModeArg) -> Self {
        match v {
            RewriteModeArg::Textual => RewriteMode::Textual,
            RewriteModeArg::Structural => RewriteMode::Structural,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar shows every converted and skipped mesh.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Validate input ───────────────────────────────────────────────────
    if cli.recursive && !cli.input.is_dir() {
        bail!("{} is not a directory", cli.input.display());
    }
    if !cli.recursive && cli.input.is_dir() {
        bail!(
            "{} is a directory; pass --recursive to convert every SDF file in it",
            cli.input.display()
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);

    let result = match build_config(&cli, progress_cb) {
        Ok(config) => run(&cli, &config).await,
        Err(e) => Err(e),
    };

    // Error paths return before any finishing callback fires.
    if let Some(cb) = cli_progress {
        cb.bar.finish_and_clear();
    }
    result
}

/// Run the conversion the flags ask for and map the report to an exit code.
async fn run(cli: &Cli, config: &ConverterConfig) -> Result<ExitCode> {
    if cli.recursive {
        let report = convert_directory(&cli.input, config)
            .await
            .context("Failed to enumerate SDF files")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
            println!("{json}");
        }
        if !cli.quiet {
            print_batch_summary(&report);
        }
        // Per-document failures are reported, not fatal.
        return Ok(ExitCode::SUCCESS);
    }

    let report = convert_document(&cli.input, config)
        .await
        .with_context(|| format!("Failed to convert {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }
    if !cli.quiet {
        print_document_summary(&report);
    }

    Ok(if report.error.is_none() && report.converted() > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .output_dir(&cli.output_dir)
        .format(cli.format.into())
        .suffix(&cli.suffix)
        .rewrite_mode(cli.rewrite_mode.into())
        .concurrency(cli.concurrency as usize);

    if let Some(ref output) = cli.output {
        builder = builder.output_path(output);
    }
    for root in &cli.model_paths {
        builder = builder.extra_model_root(root);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_document_summary(report: &DocumentReport) {
    let converted = report.converted();
    let total = report.total();
    let mark = if converted > 0 && report.error.is_none() {
        green("✔")
    } else {
        red("✘")
    };
    let target = report
        .output_document
        .as_ref()
        .map(|p| bold(&p.display().to_string()))
        .unwrap_or_else(|| dim("no output written"));
    eprintln!(
        "{}  {}/{} meshes  {}ms  →  {}",
        mark, converted, total, report.duration_ms, target
    );
    if report.unresolved() + report.failed() > 0 {
        eprintln!(
            "   {} unresolved  /  {} failed",
            dim(&report.unresolved().to_string()),
            dim(&report.failed().to_string()),
        );
    }
    if let Some(ref error) = report.error {
        eprintln!("   {}", red(error));
    }
}

fn print_batch_summary(report: &BatchReport) {
    let total = report.documents.len();
    let succeeded = report.succeeded();
    let mark = if succeeded == total {
        green("✔")
    } else if succeeded == 0 && total > 0 {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {}/{} documents  {} meshes  {}ms",
        mark,
        bold(&succeeded.to_string()),
        total,
        report.meshes_converted(),
        report.total_duration_ms,
    );
    eprintln!(
        "   {} transcodes  /  {} cache hits  /  {} errored documents",
        dim(&report.cache.transcodes.to_string()),
        dim(&report.cache.hits.to_string()),
        dim(&report.errored().to_string()),
    );
}
