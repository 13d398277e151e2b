pub mod cli;

use std::process::ExitCode;

use colored::Colorize;

/// Logs go to stderr so stdout stays clean for generated source.
fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "deepcopy_gen=debug,deep_copy=debug",
            _ => "trace",
        }),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let command_line_interface = cli::CommandLineInterface::load();
    init_tracing(command_line_interface.verbosity());
    match command_line_interface.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {}", "error:".red().bold(), format!("{error:#}").red());
            ExitCode::FAILURE
        }
    }
}
