mod commands;

use clap::{Parser, Subcommand};
use coherent_core::install_signal_handler;
use commands::{EXIT_FAILURE, EXIT_PLAN_ERROR, EXIT_PRECONDITION, EXIT_STORE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "coherent",
    version,
    about = "All-or-nothing configuration changes across modules and settings stores"
)]
struct Cli {
    /// Path to the Coherent root directory.
    #[arg(long, default_value = "~/.local/share/coherent", global = true)]
    root: String,

    /// Module registry backend: "file" (modules.json under the root) or "mock".
    #[arg(long, default_value = "file", global = true)]
    registry: String,

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
    /// Apply a change plan as one transaction, rolling back on failure.
    Apply {
        /// Path to the plan TOML file.
        #[arg(default_value = "coherent.toml")]
        plan: PathBuf,
        /// Skip the confirmation prompt.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Validate a plan and check every change's preconditions without applying.
    Check {
        /// Path to the plan TOML file.
        #[arg(default_value = "coherent.toml")]
        plan: PathBuf,
    },
    /// List modules and settings stores.
    Status,
    /// Print the content of a settings store.
    Show {
        /// Settings store id.
        store: String,
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
            tracing_subscriber::EnvFilter::try_from_env("COHERENT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let root = expand_tilde(&cli.root);
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Apply { plan, yes } => {
            commands::apply::run(&root, &cli.registry, &plan, yes, json_output)
        }
        Commands::Check { plan } => commands::check::run(&root, &cli.registry, &plan, json_output),
        Commands::Status => commands::status::run(&root, &cli.registry, json_output),
        Commands::Show { store } => commands::show::run(&root, &store, json_output),
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
    if msg.starts_with("plan error:") {
        EXIT_PLAN_ERROR
    } else if msg.starts_with("store error:") || msg.starts_with("store lock:") {
        EXIT_STORE_ERROR
    } else if msg.starts_with("precondition failed:") {
        EXIT_PRECONDITION
    } else {
        EXIT_FAILURE
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn error_prefixes_map_to_exit_codes() {
        assert_eq!(exit_code_for("plan error: plan contains no changes"), EXIT_PLAN_ERROR);
        assert_eq!(exit_code_for("store lock: busy"), EXIT_STORE_ERROR);
        assert_eq!(
            exit_code_for("precondition failed: module not found: m"),
            EXIT_PRECONDITION
        );
        assert_eq!(exit_code_for("prompt failed: eof"), EXIT_FAILURE);
    }

    #[test]
    fn tilde_expansion() {
        let expanded = expand_tilde("/abs/path");
        assert_eq!(expanded, PathBuf::from("/abs/path"));
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(
                expand_tilde("~/.local/share/coherent"),
                PathBuf::from(home).join(".local/share/coherent")
            );
        }
    }
}
