//! yatube server binary.
//!
//! ```sh
//! RUST_LOG=info YATUBE_CONFIG=yatube.toml cargo run
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use yatube::{App, Config, Error, Server, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::load()?;
    info!(
        database = %config.database,
        page_size = config.page_size,
        index_cache_secs = config.index_cache_secs,
        "configuration loaded"
    );

    let server = Server::bind(&config.bind)?;
    let app = Arc::new(App::open(config)?);
    server.serve(router(app)).await
}
