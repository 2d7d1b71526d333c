//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers configuration, sets up tracing and
//! the runtime, dispatches the command and owns all error output.

use clap::Parser;
use tracing::warn;

use callbrief_config::{CliArgs, Config};
use callbrief_engine::CancellationToken;
use callbrief_utils::logging::{LogFormat, init_tracing};
use callbrief_utils::{CallbriefError, ExitCode};

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Prints everything, including errors, and returns the exit code to use on
/// failure. `main` only maps the code to the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let cli_args = cli_args_for(&cli);

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report_error(CallbriefError::Config(err), "config")),
    };

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(config.verbose(), format) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.name();
    let result = rt.block_on(async {
        match cli.command {
            Commands::Run { account, json, .. } => {
                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Interrupt received, cancelling run");
                        on_signal.cancel();
                    }
                });
                commands::execute_run_command(&config, &account, json, cancel).await
            }
            Commands::Config { json } => commands::execute_config_command(&config, json),
        }
    });

    result.map_err(|err| report_error(err, operation))
}

/// Map parsed flags onto configuration overrides.
fn cli_args_for(cli: &Cli) -> CliArgs {
    let (max_items, concurrency) = match &cli.command {
        Commands::Run {
            max_items,
            concurrency,
            ..
        } => (*max_items, *concurrency),
        Commands::Config { .. } => (None, None),
    };
    CliArgs {
        config_path: cli.config.clone(),
        verbose: cli.verbose.then_some(true),
        call_timeout: cli.call_timeout,
        store_root: cli.store_root.clone(),
        llm_provider: cli.llm_provider.clone(),
        max_items,
        concurrency,
    }
}

fn report_error(err: CallbriefError, operation: &str) -> ExitCode {
    eprintln!("{}", err.display_for_user());
    tracing::debug!(operation, error = %err, "Command failed");
    err.to_exit_code()
}
