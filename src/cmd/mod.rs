//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`sign`], or [`validate`]. Each handler
//! lives in its own submodule.

pub mod run;
pub mod sign;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::ProxyError;

pub async fn dispatch(cli: Cli) -> Result<(), ProxyError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Sign(ref args)) => {
            sign::execute(args);
            Ok(())
        }
        Some(Commands::Validate(ref args)) => validate::execute(args),
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  couchdb-auth-proxy v{version} \u{2014} authenticating reverse proxy for CouchDB\n\n  \
         No command provided. To get started:\n\n    \
         couchdb-auth-proxy run                      Start the proxy (auto-detects ./couchdb-auth-proxy.yaml)\n    \
         couchdb-auth-proxy run -c proxy.yaml        Start with a specific config file\n    \
         couchdb-auth-proxy sign <user> --secret S   Print a proxy-auth token\n    \
         couchdb-auth-proxy --help                   See all commands and options\n"
    );
}
