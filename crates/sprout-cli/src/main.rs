mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{
    EXIT_FAILURE, EXIT_HOOK_FAILURE, EXIT_MANIFEST_ERROR, EXIT_RESOLUTION_ERROR, EXIT_STORE_ERROR,
};
use sprout_core::{install_signal_handler, Engine, ProvisionOptions};
use sprout_schema::MANIFEST_FILE;
use std::path::PathBuf;
use std::process::ExitCode;

const STORE_ENV: &str = "SPROUT_STORE";
const DEFAULT_STORE: &str = "~/.local/share/sprout";

#[derive(Debug, Parser)]
#[command(
    name = "sprout",
    version,
    about = "Declarative development environments with lifecycle hooks"
)]
struct Cli {
    /// Path to the sprout store directory [default: $SPROUT_STORE or ~/.local/share/sprout].
    #[arg(long, global = true)]
    store: Option<String>,

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
    /// Write a starter sprout.toml in the current directory.
    New {
        /// Built-in template: minimal, python, or node.
        #[arg(long)]
        template: Option<String>,
        /// Overwrite an existing sprout.toml without asking.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Parse and normalize a manifest without touching the store.
    Validate {
        /// Path to manifest TOML file.
        #[arg(default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },
    /// Resolve and install packages, then run onCreate hooks.
    Provision {
        /// Path to manifest TOML file.
        #[arg(default_value = MANIFEST_FILE)]
        manifest: PathBuf,
        /// Human-readable name for the environment.
        #[arg(long)]
        name: Option<String>,
        /// Require an existing lock file and fail if resolved state would drift.
        #[arg(long, default_value_t = false)]
        locked: bool,
    },
    /// Run onStart hooks of a provisioned environment.
    Start {
        /// Environment ID, short ID, or name.
        env_id: String,
    },
    /// Provision the project's environment if needed, then start it.
    Up {
        /// Path to manifest TOML file.
        #[arg(default_value = MANIFEST_FILE)]
        manifest: PathBuf,
        /// Human-readable name for the environment.
        #[arg(long)]
        name: Option<String>,
        /// Require an existing lock file and fail if resolved state would drift.
        #[arg(long, default_value_t = false)]
        locked: bool,
    },
    /// Destroy an environment and its installed packages.
    Destroy {
        /// Environment ID, short ID, or name.
        env_id: String,
    },
    /// List all known environments.
    List,
    /// Inspect environment metadata and the last hook reports.
    Inspect {
        /// Environment ID, short ID, or name.
        env_id: String,
    },
    /// List the previews an environment declares.
    Previews {
        /// Environment ID, short ID, or name.
        env_id: String,
    },
    /// Launch a preview in the foreground.
    Preview {
        /// Environment ID, short ID, or name.
        env_id: String,
        /// Preview id from the manifest.
        preview: String,
    },
    /// Rename an environment.
    Rename {
        /// Environment ID or current name.
        env_id: String,
        /// New name for the environment.
        new_name: String,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
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
            tracing_subscriber::EnvFilter::try_from_env("SPROUT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let store_path = expand_tilde(&store_location(cli.store));
    let engine = Engine::new(&store_path);
    let json_output = cli.json;

    let result = match cli.command {
        Commands::New { template, force } => {
            commands::new::run(template.as_deref(), force, json_output)
        }
        Commands::Validate { manifest } => commands::validate::run(&engine, &manifest, json_output),
        Commands::Provision {
            manifest,
            name,
            locked,
        } => commands::provision::run(
            &engine,
            &store_path,
            &manifest,
            &ProvisionOptions { locked, name },
            json_output,
        ),
        Commands::Start { env_id } => {
            commands::start::run(&engine, &store_path, &env_id, json_output)
        }
        Commands::Up {
            manifest,
            name,
            locked,
        } => commands::up::run(
            &engine,
            &store_path,
            &manifest,
            &ProvisionOptions { locked, name },
            json_output,
        ),
        Commands::Destroy { env_id } => commands::destroy::run(&engine, &store_path, &env_id),
        Commands::List => commands::list::run(&engine, json_output),
        Commands::Inspect { env_id } => commands::inspect::run(&engine, &env_id, json_output),
        Commands::Previews { env_id } => commands::previews::run(&engine, &env_id, json_output),
        Commands::Preview { env_id, preview } => {
            commands::preview::run(&engine, &env_id, &preview)
        }
        Commands::Rename { env_id, new_name } => {
            commands::rename::run(&engine, &store_path, &env_id, &new_name)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("manifest error:") {
        EXIT_MANIFEST_ERROR
    } else if msg.starts_with("store error:") || msg.starts_with("store lock:") {
        EXIT_STORE_ERROR
    } else if msg.starts_with("resolution error:") || msg.starts_with("lock error:") {
        EXIT_RESOLUTION_ERROR
    } else if msg.starts_with("hook failed:") || msg.starts_with("interrupted:") {
        EXIT_HOOK_FAILURE
    } else {
        EXIT_FAILURE
    }
}

fn store_location(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var(STORE_ENV).ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_STORE.to_owned())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
