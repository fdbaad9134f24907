pub mod toml_config;

pub use toml_config::{CacheBackend, ServiceConfig};

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "patent-scurve")]
#[command(about = "Patent search, CPC aggregation and S-curve forecasting service")]
pub struct CliConfig {
    /// Path to the TOML configuration file; environment variables are used when absent
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the listen address from the configuration
    #[arg(long)]
    pub bind: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the service configuration and applies command-line overrides.
    pub fn load(&self) -> crate::utils::error::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::from_env()?,
        };
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        Ok(config)
    }
}
