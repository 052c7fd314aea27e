//! `couchdb-auth-proxy sign`: print the proxy-auth token for a user.
//!
//! Lets operators and downstream services check a token out-of-band,
//! using the same signing routine the proxy applies per request.

use crate::cli::SignArgs;
use crate::proxy::sign::sign;

pub fn execute(args: &SignArgs) {
    println!("{}", sign(&args.user, &args.secret));
}
