//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, currently only the
//! HTTP server with its auth configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::Result;
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from);

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_ttl_seconds: auth_opts.session.ttl_seconds,
        session_cookie_secure: auth_opts.session.cookie_secure,
        session_secret: auth_opts.session.secret,
        argon2_memory_kib: auth_opts.password.memory_kib,
        argon2_iterations: auth_opts.password.iterations,
        argon2_parallelism: auth_opts.password.parallelism,
        rate_limit_max: auth_opts.rate_limit.max,
        rate_limit_window_seconds: auth_opts.rate_limit.window_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_is_optional() {
        temp_env::with_vars([("PASSGATE_DSN", None::<&str>)], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["passgate"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.port, 8080);
                assert!(args.dsn.is_none());
                assert_eq!(args.session_ttl_seconds, 60);
                assert!(args.session_cookie_secure);
            }
        });
    }

    #[test]
    fn blank_dsn_env_means_in_memory() {
        temp_env::with_vars([("PASSGATE_DSN", Some("  "))], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["passgate"]);
            if let Ok(Action::Server(args)) = handler(&matches) {
                assert!(args.dsn.is_none());
            } else {
                panic!("expected server action");
            }
        });
    }
}
