use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use pump_config::Config;

mod cli;
mod error_fmt;
mod logging;
mod run;

use cli::{Cli, Commands, JSON_MODE};
use run::{Outcome, SimulateArgs};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let code = run_cli(cli);
    std::process::exit(code);
}

/// Everything that needs the log writer alive; the guard drops before exit.
fn run_cli(cli: Cli) -> i32 {
    let cfg = run::load_config(cli.config.as_deref());
    let log_cfg = cfg
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let _guard = logging::init_logging(cli.json, &cli.log_level, &log_cfg);
    if !cli.json {
        let _ = color_eyre::install();
    }

    match cfg.and_then(|cfg| execute(cli, &cfg)) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            error_fmt::exit_code_for_error(&err)
        }
    }
}

fn print(outcome: &Outcome, json: bool) {
    if json {
        if !outcome.json.is_null() {
            println!("{}", outcome.json);
        }
    } else if !outcome.text.is_empty() {
        println!("{}", outcome.text);
    }
}

fn execute(cli: Cli, cfg: &Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let outcome = match cli.cmd {
        Commands::Simulate {
            motor,
            flow,
            dose,
            reverse,
            seconds,
            peer_motors,
            pace,
        } => {
            let args = SimulateArgs {
                motor,
                flow,
                dose,
                reverse,
                seconds,
                peer_motors,
                pace,
            };
            run::simulate(cfg, &args, &shutdown)?
        }
        Commands::Discover => run::discover(cfg)?,
        Commands::Serve => run::serve(cfg, &shutdown)?,
        Commands::SelfCheck => run::self_check(cfg)?,
    };
    print(&outcome, cli.json);
    Ok(())
}
