use crate::datamodel::duration::parse_duration;
use crate::store::{AuthScheme, StoreSettings};
use anyhow::{Context, Error, bail};
use confique::Config;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use url::Url;

// Development placeholders, override them in production.
// The config attributes below need literals, keep them in sync.
pub const DEFAULT_PROJECT_ID: &str = "3d22f640-84db-40ce-af49-44468443234f";
pub const DEFAULT_USER_ID: &str = "3d22f640-84db-40ce-af49-44468443234f";

#[derive(Debug, Config)]
pub struct HostmetricsConfig {
    #[config(env = "HOSTMETRICS_STORE_URL", default = "http://127.0.0.1:8041/")]
    pub store_url: String,

    #[config(env = "HOSTMETRICS_TOKEN")]
    pub token: Option<String>,

    #[config(env = "HOSTMETRICS_AUTH_SCHEME", default = "keystone")]
    pub auth_scheme: String,

    #[config(env = "HOSTMETRICS_INTERVAL", default = "60s")]
    pub interval: String,

    #[config(env = "HOSTMETRICS_PROJECT_ID", default = "3d22f640-84db-40ce-af49-44468443234f")]
    pub project_id: String,

    #[config(env = "HOSTMETRICS_USER_ID", default = "3d22f640-84db-40ce-af49-44468443234f")]
    pub user_id: String,

    #[config(env = "HOSTMETRICS_IDENTITY_FILE", default = "uuid")]
    pub identity_file: PathBuf,

    #[config(env = "HOSTMETRICS_WINDOW", default = 60)]
    pub window: usize,

    #[config(env = "HOSTMETRICS_REQUEST_TIMEOUT_SECONDS", default = 30)]
    pub request_timeout_seconds: u64,
}

impl HostmetricsConfig {
    pub fn load() -> Result<HostmetricsConfig, Error> {
        let c = HostmetricsConfig::builder()
            .env()
            .file("settings.toml")
            .load()?;

        Ok(c)
    }

    pub fn parse_interval(&self) -> Result<Duration, Error> {
        parse_duration(&self.interval).context("Invalid interval")
    }

    pub fn parse_store_url(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.store_url)
            .with_context(|| format!("Invalid store URL: {}", self.store_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("The store URL must be http or https: {}", self.store_url);
        }
        Ok(url)
    }

    pub fn store_settings(&self) -> Result<StoreSettings, Error> {
        let token = match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => bail!("An authentication token is required (--token or HOSTMETRICS_TOKEN)"),
        };
        let auth_scheme: AuthScheme = self.auth_scheme.parse()?;
        if self.request_timeout_seconds == 0 {
            bail!("The request timeout cannot be zero");
        }

        Ok(StoreSettings {
            url: self.parse_store_url()?,
            token,
            auth_scheme,
            project_id: self.project_id.clone(),
            user_id: self.user_id.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        })
    }
}

static HOSTMETRICS_CONFIG: OnceLock<Arc<HostmetricsConfig>> = OnceLock::new();

pub fn get() -> Result<Arc<HostmetricsConfig>, Error> {
    HOSTMETRICS_CONFIG.get().cloned().ok_or_else(|| {
        Error::msg(
            "Configuration not loaded. Please call load_configuration() before using the configuration",
        )
    })
}

/// Loads the configuration once, letting the caller override loaded values
/// (command line flags) before it is frozen.
pub fn load_configuration<F>(overrides: F) -> Result<(), Error>
where
    F: FnOnce(&mut HostmetricsConfig),
{
    // Check if the configuration has already been loaded
    if HOSTMETRICS_CONFIG.get().is_some() {
        return Ok(());
    }

    let mut config = HostmetricsConfig::load()?;
    overrides(&mut config);
    HOSTMETRICS_CONFIG.get_or_init(|| Arc::new(config));

    Ok(())
}
