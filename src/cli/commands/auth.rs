use clap::{Arg, ArgAction, ArgMatches, Command, builder::BoolishValueParser};
use secrecy::SecretString;

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_INSECURE: &str = "session-cookie-insecure";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_ARGON2_MEMORY_KIB: &str = "argon2-memory-kib";
pub const ARG_ARGON2_ITERATIONS: &str = "argon2-iterations";
pub const ARG_ARGON2_PARALLELISM: &str = "argon2-parallelism";
pub const ARG_RATE_LIMIT_MAX: &str = "rate-limit-max";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";

#[derive(Debug)]
pub struct Options {
    pub session: SessionOptions,
    pub password: PasswordOptions,
    pub rate_limit: RateLimitOptions,
}

#[derive(Debug)]
pub struct SessionOptions {
    pub ttl_seconds: u64,
    pub cookie_secure: bool,
    pub secret: Option<SecretString>,
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordOptions {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitOptions {
    pub max: u32,
    pub window_seconds: u64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_u32 = |id: &str| -> anyhow::Result<u32> {
            matches
                .get_one::<u32>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_u64 = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        // Empty env values count as unset.
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()));

        Ok(Self {
            session: SessionOptions {
                ttl_seconds: read_u64(ARG_SESSION_TTL_SECONDS)?,
                cookie_secure: !matches.get_flag(ARG_SESSION_COOKIE_INSECURE),
                secret,
            },
            password: PasswordOptions {
                memory_kib: read_u32(ARG_ARGON2_MEMORY_KIB)?,
                iterations: read_u32(ARG_ARGON2_ITERATIONS)?,
                parallelism: read_u32(ARG_ARGON2_PARALLELISM)?,
            },
            rate_limit: RateLimitOptions {
                max: read_u32(ARG_RATE_LIMIT_MAX)?,
                window_seconds: read_u64(ARG_RATE_LIMIT_WINDOW_SECONDS)?,
            },
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_password_args(command);
    with_rate_limit_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("PASSGATE_SESSION_TTL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_INSECURE)
                .long(ARG_SESSION_COOKIE_INSECURE)
                .help("Omit the Secure attribute on the session cookie (plain HTTP development)")
                .env("PASSGATE_SESSION_COOKIE_INSECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret mixed into stored session digests")
                .long_help(
                    "Secret mixed into stored session digests. When unset a random secret is generated and sessions do not survive a restart.",
                )
                .env("PASSGATE_SESSION_SECRET")
                .hide_env_values(true),
        )
}

fn with_password_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ARGON2_MEMORY_KIB)
                .long(ARG_ARGON2_MEMORY_KIB)
                .help("Argon2id memory cost in KiB")
                .env("PASSGATE_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_ITERATIONS)
                .long(ARG_ARGON2_ITERATIONS)
                .help("Argon2id iteration count")
                .env("PASSGATE_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_ARGON2_PARALLELISM)
                .long(ARG_ARGON2_PARALLELISM)
                .help("Argon2id lanes")
                .env("PASSGATE_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn with_rate_limit_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX)
                .long(ARG_RATE_LIMIT_MAX)
                .help("Login and registration attempts allowed per client IP and window (0 disables)")
                .env("PASSGATE_RATE_LIMIT_MAX")
                .default_value("100")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .help("Rate limit window in seconds")
                .env("PASSGATE_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
