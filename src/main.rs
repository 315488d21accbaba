use clap::Parser;

use scribe::app;
use scribe::cli::CliArgs;

fn main() {
    let args = CliArgs::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .format_target(false)
    .target(env_logger::Target::Stderr)
    .init();

    let result = if args.worker {
        log::info!("Worker process starting...");
        app::run_worker(&args)
    } else {
        app::run(&args)
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}
