use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = couchdb_auth_proxy::cli::Cli::parse();
    if let Err(e) = couchdb_auth_proxy::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
