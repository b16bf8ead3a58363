use std::process;

use clap::Parser;
use log::{error, info, LevelFilter};

use daybook::{App, Cli, Config, FileDayStore, Result, Store};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!(
        "Logger initialized at {}",
        if verbose { LevelFilter::Debug } else { LevelFilter::Info }
    );
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.apply_overrides(Config::load(cli.config.as_deref())?);

    let store = Store::open(&config)?;
    let days = FileDayStore::open(&config.journal_dir())?;
    let app = App::new(store, days, config);

    let outcome = app.run(cli.command);
    // release the backend even when the command failed
    let closed = app.close();
    outcome.and(closed)
}

fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");
    if let Err(e) = run(cli) {
        error!("{} error: {}", e.kind(), e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    info!("Application shutting down");
}
