pub mod dump;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use dumph::config::{Arcrc, CREDENTIAL_HINT, Config, resolve_credentials};
use dumph::{ConduitClient, TaskRepository};

/// Load the config file (the default location unless `path` is given)
/// and `~/.arcrc`.
pub fn load_settings(path: Option<&Path>) -> Result<(Config, Arcrc)> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path).context("Failed to load config")?;
    let arcrc = Arcrc::load(&Arcrc::path()?).context("Failed to load ~/.arcrc")?;
    Ok((config, arcrc))
}

/// Build a client for the configured host and make sure its token works.
pub fn connect(host: Option<&str>, config: &Config, arcrc: &Arcrc) -> Result<ConduitClient> {
    let credentials = resolve_credentials(host, &config.conduit, arcrc)
        .with_context(|| format!("No usable Conduit credentials; {}", CREDENTIAL_HINT))?;
    let client = ConduitClient::new(
        &credentials,
        Duration::from_secs(config.conduit.timeout_secs),
    )?;

    let me = client.whoami().with_context(|| {
        format!(
            "Could not authenticate against {}; {}",
            credentials.api_base, CREDENTIAL_HINT
        )
    })?;
    tracing::info!(user = %me.user_name, host = %credentials.api_base, "connected");
    Ok(client)
}
