use clap::Parser;
use fundlift::cli::{
    Args, build_config, init_logging, load_signing_secrets, open_database,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_format);

    let Some(secrets) = load_signing_secrets(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(&args, db, secrets);

    fundlift::init_cleanup(&config.db).await;

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    info!(address = %addr, "Server listening");

    if let Err(e) = fundlift::run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
