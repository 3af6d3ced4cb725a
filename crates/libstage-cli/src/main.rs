mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_STAGING_ERROR};
use libstage_schema::PlatformFamily;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "libstage",
    version,
    about = "Stage bundled native libraries and load them in dependency order"
)]
struct Cli {
    /// Path to a libstage.toml loader configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the resource listing and which file each library would load from.
    Plan {
        /// Bundle directory or tar archive.
        #[arg(long)]
        bundle: PathBuf,
        /// Derive filenames for another platform (windows, macos, unix).
        #[arg(long)]
        platform: Option<PlatformFamily>,
    },
    /// Stage a bundle into a temporary directory and list the staged files.
    Stage {
        /// Bundle directory or tar archive.
        #[arg(long)]
        bundle: PathBuf,
        /// Create the staging directory here instead of the system temp dir.
        #[arg(long)]
        staging_dir: Option<PathBuf>,
    },
    /// Initialize native libraries from a bundle and print the load report.
    ///
    /// Exits 2 when the resource listing is missing or invalid and 3 when
    /// staging fails, as `stage` does.
    Load {
        /// Bundle directory or tar archive.
        #[arg(long)]
        bundle: PathBuf,
        /// Loader backend: native or mock.
        #[arg(long, default_value = "native")]
        backend: String,
        /// Create the staging directory here instead of the system temp dir.
        #[arg(long)]
        staging_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LIBSTAGE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let result = commands::load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Plan { bundle, platform } => {
            commands::plan::run(&config, &bundle, platform, json_output)
        }
        Commands::Stage {
            bundle,
            staging_dir,
        } => commands::stage::run(&config, &bundle, staging_dir, json_output),
        Commands::Load {
            bundle,
            backend,
            staging_dir,
        } => commands::load::run(&config, &bundle, &backend, staging_dir, json_output),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:") || msg.starts_with("config error:") {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("staging error:") {
                EXIT_STAGING_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
