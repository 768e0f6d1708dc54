use crate::api::{
    self,
    handlers::auth::{AuthConfig, PasswordConfig},
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<SecretString>,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
    pub session_secret: Option<SecretString>,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub rate_limit_max: u32,
    pub rate_limit_window_seconds: u64,
}

impl Args {
    fn auth_config(self) -> AuthConfig {
        AuthConfig::new()
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_session_cookie_secure(self.session_cookie_secure)
            .with_session_secret(self.session_secret)
            .with_password_config(PasswordConfig::new(
                self.argon2_memory_kib,
                self.argon2_iterations,
                self.argon2_parallelism,
            ))
            .with_rate_limit(self.rate_limit_max, self.rate_limit_window_seconds)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be reached or the server fails to start.
pub async fn execute(mut args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let port = args.port;
    let dsn = args.dsn.take();
    let auth_config = args.auth_config();

    api::new(port, dsn, auth_config).await
}
