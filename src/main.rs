use std::process;

use voxscribe::error::Interrupted;
use voxscribe::{app, logging};

#[tokio::main]
async fn main() {
    let result = app::run().await;
    let code = app::exit_code(&result);

    if let Err(e) = &result {
        if e.is::<Interrupted>() {
            tracing::info!("Interrupted");
        } else {
            tracing::error!("Fatal error: {e:#}");
            eprintln!("Error: {e:#}");
        }
    }

    logging::flush_logging();
    process::exit(code);
}
