use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use warm_pool_lifecycle_core::event_pattern::{
    complete_lifecycle_action_policy, warm_pool_configuration, warm_pool_rule_pattern,
    WarmPoolState,
};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "warm_pool_lifecycle_lambda";
const LAMBDA_BINARY: &str = "lifecycle_action_lambda";
const DIST_DIR: &str = "infra/warm_pool_lifecycle/dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the warm pool lifecycle workspace",
    long_about = "Runs CI checks, packages the lifecycle Lambda for deployment,\n\
                  and renders the EventBridge rule, IAM policy, and warm pool settings it needs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the lifecycle Lambda and zip it as a `bootstrap` artifact
    LambdaPackage {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Print the EventBridge rule pattern (and IAM policy for a group ARN)
    RulePattern {
        /// Auto Scaling group ARN the handler is allowed to complete actions on
        #[arg(long, env = "WARM_POOL_ASG_ARN")]
        asg_arn: Option<String>,
    },
    /// Print the PutWarmPool configuration for the group
    WarmPool {
        /// Pool state: RUNNING, STOPPED, or HIBERNATED (default RUNNING)
        #[arg(long, env = "WARM_POOL_STATE")]
        state: Option<String>,
        /// Minimum number of instances kept in the warm pool
        #[arg(long)]
        min_size: Option<u32>,
        /// Maximum instances allowed across the pool and the group
        #[arg(long)]
        max_prepared_capacity: Option<u32>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Package the Lambda artifact with the default target
    Package,
    /// Run check + package
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .unwrap_or_else(|error| fail(&format!("failed to execute cargo: {error}")))
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    exit(1);
}

fn package_lifecycle_lambda(target: &str, profile: BuildProfile) {
    require_rust_target(target);

    step("Build lifecycle lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--bin",
        LAMBDA_BINARY,
        "--target",
        target,
    ];
    if let BuildProfile::Release = profile {
        cargo_args.push("--release");
    }
    run_cargo(&cargo_args);

    step("Package lambda zip artifact");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(LAMBDA_BINARY);
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).unwrap_or_else(|error| {
        fail(&format!(
            "failed to create '{}': {error}",
            dist_dir.display()
        ))
    });

    let zip_path = dist_dir.join("lifecycle.zip");
    write_bootstrap_zip(&binary_path, &zip_path);
    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn require_rust_target(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) if value.status.success() => value,
        Ok(_) | Err(_) => {
            eprintln!("warning: could not list installed rust targets; skipping target preflight");
            return;
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        fail(&format!(
            "rust target `{target}` is not installed; run `rustup target add {target}` and re-run `cargo run -p xtask -- lambda-package`"
        ));
    }
}

fn write_bootstrap_zip(binary_path: &Path, zip_path: &Path) {
    let binary = fs::read(binary_path).unwrap_or_else(|error| {
        fail(&format!(
            "expected lambda binary at '{}': {error}",
            binary_path.display()
        ))
    });

    let file = fs::File::create(zip_path)
        .unwrap_or_else(|error| fail(&format!("failed to create lambda zip: {error}")));
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);

    if let Err(error) = write_bootstrap_entry(&mut zip, &binary, options) {
        fail(&format!("failed to write bootstrap entry: {error}"));
    }
}

fn write_bootstrap_entry(
    zip: &mut ZipWriter<fs::File>,
    binary: &[u8],
    options: FileOptions,
) -> Result<(), String> {
    zip.start_file("bootstrap", options)
        .map_err(|error| error.to_string())?;
    zip.write_all(binary).map_err(|error| error.to_string())?;
    zip.finish().map_err(|error| error.to_string())?;
    Ok(())
}

fn print_rule_pattern(asg_arn: Option<&str>) {
    let render = |value: &serde_json::Value| {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|error| fail(&format!("failed to render json: {error}")))
    };

    println!("# EventBridge rule pattern");
    println!("{}", render(&warm_pool_rule_pattern()));

    if let Some(arn) = asg_arn {
        println!("\n# Lambda execution role inline policy");
        println!("{}", render(&complete_lifecycle_action_policy(arn)));
    }
}

fn print_warm_pool(state: Option<&str>, min_size: Option<u32>, max_prepared_capacity: Option<u32>) {
    let state = WarmPoolState::resolve(state).unwrap_or_else(|error| fail(error.message()));
    let document = warm_pool_configuration(state, min_size, max_prepared_capacity);
    let rendered = serde_json::to_string_pretty(&document)
        .unwrap_or_else(|error| fail(&format!("failed to render json: {error}")));

    println!("# PutWarmPool configuration");
    println!("{rendered}");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test warm_pool_lifecycle_core");
    run_cargo(&["test", "-p", "warm_pool_lifecycle_core"]);

    step("Test warm_pool_lifecycle_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_package() {
    package_lifecycle_lambda("x86_64-unknown-linux-gnu", BuildProfile::Release);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Package => ci_package(),
                CiJob::All => {
                    ci_check();
                    ci_package();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LambdaPackage { target, profile } => {
            package_lifecycle_lambda(&target, profile);
        }
        Commands::RulePattern { asg_arn } => {
            print_rule_pattern(asg_arn.as_deref());
        }
        Commands::WarmPool {
            state,
            min_size,
            max_prepared_capacity,
        } => {
            print_warm_pool(state.as_deref(), min_size, max_prepared_capacity);
        }
    }
}
