//! Entry point for the `dispatch` command.
#![forbid(unsafe_code)]

use dispatch_cli::CliError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

fn main() {
    install_logging();
    match dispatch_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            report(&err);
            std::process::exit(1);
        }
    }
}

/// Route `log` records through a `tracing` fmt subscriber on stderr.
/// `RUST_LOG` overrides the default `info` level.
fn install_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(err) = installed {
        report(err.as_ref());
    }
}

#[expect(
    clippy::print_stderr,
    reason = "the binary reports fatal errors on stderr"
)]
fn report(err: &dyn std::error::Error) {
    eprintln!("dispatch: {err}");
}
