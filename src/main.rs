use std::process::exit;

use clap::Parser;
use tracing::error;

use resolverinfo::config::Config;
use resolverinfo::logging::init_logging;
use resolverinfo::server;

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_logging();

    if let Err(err) = server::run(config).await {
        error!("{}", err);
        exit(1);
    }
}
