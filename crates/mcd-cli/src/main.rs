//! `mcd`: install, control and tune Memcached on a local or remote host

mod app;
mod cli;
mod logging;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::command().get_matches();

    if let Err(e) = logging::init_logging(matches.get_flag("verbose")) {
        eprintln!("warning: {e:#}");
    }

    match app::run(&matches).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
