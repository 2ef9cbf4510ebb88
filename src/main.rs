//! goalign - Build Go binaries with realigned struct fields.
//!
//! Usage:
//!   goalign                        Build the package in the current directory
//!   goalign --goflags=-trimpath    Pass extra flags to `go build`
//!   goalign --run-tests            Run `go test ./...` before building
//!   goalign --dry-run              List the packages that would be rewritten
//!   goalign --help                 Show help

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use goalign_build::{BuildReport, DryRunReport, Pipeline, Reconciliation};
use goalign_core::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PASSES, PipelineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "goalign",
    version,
    about = "Build Go binaries with struct fields realigned by betteralign",
    long_about = "goalign copies the Go module containing the current directory into a \
                  temporary staging tree, vendors its dependencies, realigns struct fields \
                  with betteralign in every package that does not import reflect, builds it \
                  and copies the resulting executable into the current directory.\n\n\
                  Your own source tree is never modified."
)]
struct Cli {
    /// Field align generated files
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    generated: bool,

    /// Field align test files
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    test_files: bool,

    /// Run `go test ./...` in the staging tree before building
    #[arg(long)]
    run_tests: bool,

    /// Extra flag for `go build`; repeat for more (e.g. --goflags="-ldflags=-s -w")
    #[arg(long = "goflags", value_name = "FLAG", allow_hyphen_values = true)]
    goflags: Vec<String>,

    /// Packages rewritten at the same time
    #[arg(short, long, env = "GOALIGN_JOBS", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    jobs: usize,

    /// Rewriter passes per package
    #[arg(long, default_value_t = DEFAULT_PASSES)]
    passes: usize,

    /// Keep rewriting other packages after one fails
    #[arg(long)]
    keep_going: bool,

    /// Path to the go executable
    #[arg(long, env = "GOALIGN_GO", value_name = "PATH")]
    go: Option<PathBuf>,

    /// Path to the betteralign executable
    #[arg(long, env = "GOALIGN_REWRITER", value_name = "PATH")]
    rewriter: Option<PathBuf>,

    /// Directory under which the staging tree is created (defaults to the temp dir)
    #[arg(long, env = "GOALIGN_STAGING_DIR", value_name = "DIR")]
    staging_dir: Option<PathBuf>,

    /// Leave the staging tree in place and print its path
    #[arg(long)]
    keep_staging: bool,

    /// Stage the module and list the packages that would be rewritten
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut builder = PipelineConfig::builder();
        builder
            .generated_files(self.generated)
            .test_files(self.test_files)
            .run_tests(self.run_tests)
            .build_flags(self.goflags.clone())
            .max_concurrency(self.jobs)
            .passes(self.passes)
            .cancel_on_failure(!self.keep_going)
            .go_binary(self.go.clone())
            .rewriter_binary(self.rewriter.clone())
            .staging_base(self.staging_dir.clone())
            .keep_staging(self.keep_staging);
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.pipeline_config()?;
    tracing::debug!(?config, "configuration");
    let invocation_dir =
        std::env::current_dir().context("Could not determine the current directory")?;
    let pipeline = Pipeline::new(config)?;

    if cli.dry_run {
        let report = pipeline
            .dry_run(&invocation_dir)
            .await
            .context("Dry run failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_dry_run(&report);
        }
        return Ok(());
    }

    let report = pipeline
        .run(&invocation_dir)
        .await
        .context("Optimized build failed")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_build(&report);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn print_build(report: &BuildReport) {
    let rewrite = &report.rewrite;
    println!();
    println!("{}", "─".repeat(60));
    println!(" Module {}", report.module_root.display());
    println!(
        " {} packages realigned, {} skipped (reflect), in {:.2}s",
        rewrite.succeeded(),
        report.scan.reflect_skipped,
        rewrite.elapsed.as_secs_f64()
    );
    match &report.artifact {
        Reconciliation::Copied {
            destination, size, ..
        } => println!(" Built {} ({})", destination.display(), format_size(*size)),
        Reconciliation::NoExecutable => println!(" go build produced no executable"),
    }
    print_staging(
        &report.staging_dir,
        report.staging_kept,
        report.staging_cleanup_error.as_deref(),
    );
    println!(" Finished in {:.2}s", report.elapsed.as_secs_f64());
    println!("{}", "─".repeat(60));
    for dir in rewrite.optimized_dirs() {
        let package = dir.strip_prefix(&report.staging_dir).unwrap_or(dir.as_path());
        println!("   {}", display_package(package));
    }
}

fn print_dry_run(report: &DryRunReport) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" Module {}", report.module_root.display());
    println!(
        " {} files staged ({})",
        report.copy.files,
        format_size(report.copy.bytes)
    );
    println!(
        " {} packages would be realigned, {} skipped (reflect)",
        report.packages.len(),
        report.scan.reflect_skipped
    );
    println!("{}", "─".repeat(60));
    for package in &report.packages {
        println!("   {}", display_package(package));
    }
    print_staging(
        &report.staging_dir,
        report.staging_kept,
        report.staging_cleanup_error.as_deref(),
    );
}

fn print_staging(path: &Path, kept: bool, cleanup_error: Option<&str>) {
    if kept {
        println!(" Staging tree kept at {}", path.display());
    } else if let Some(err) = cleanup_error {
        println!(" Could not remove staging tree {}: {err}", path.display());
    }
}

/// Package path relative to the module root, `.` for the root itself.
fn display_package(package: &Path) -> String {
    if package.as_os_str().is_empty() {
        ".".to_string()
    } else {
        format!("./{}", package.display())
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
