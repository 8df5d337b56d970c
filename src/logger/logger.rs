use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const BOOTSTRAP_FILTER: &str = "info";

pub struct LogConfig {
    pub filter: String,
}

pub struct Logger {
    reload_handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl Logger {
    /// Installs the global subscriber at `RUST_LOG`, or `info` when unset.
    /// A second call leaves the first subscriber in place.
    pub fn new_bootstrap() -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(BOOTSTRAP_FILTER));
        let (filter, reload_handle) = reload::Layer::new(filter);

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .is_ok();

        Self {
            reload_handle: installed.then_some(reload_handle),
        }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        let Some(handle) = &self.reload_handle else {
            return Ok(());
        };
        let filter = EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))?;
        handle.reload(filter).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
