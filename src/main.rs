use clap::Parser;
use std::process::ExitCode;

use taxi_replay::cli::Cli;
use taxi_replay::progress::{Progress, spawn_console_writer};
use taxi_replay::{Session, cancel_on_interrupt, logging, replay};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            println!("Data generation failed");
            return ExitCode::from(e.exit_code());
        }
    };
    let session = Session::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(session.clone()));

    let (progress, events) = Progress::channel();
    let writer = spawn_console_writer(events);

    let result = replay::run(&config, &session, progress).await;
    interrupt.abort();
    // All progress handles are gone once the run returns
    writer.await.ok();

    match result {
        Ok(report) => {
            if report.outcome.is_success() {
                println!("Data generation complete");
            } else {
                println!("Data generation failed");
            }
            ExitCode::from(report.outcome.exit_code())
        }
        Err(e) => {
            eprintln!("Error: {e}");
            println!("Data generation failed");
            ExitCode::from(e.exit_code())
        }
    }
}
