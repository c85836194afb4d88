use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax, e.g.
/// `"revive_core=debug,wgpu_core=warn"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Level for everything not matched by a filter.
    pub default_level: log::LevelFilter,
    /// wgpu is chatty at info level; these targets are capped at `warn`
    /// unless a filter names them.
    pub quiet_wgpu: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            default_level: log::LevelFilter::Info,
            quiet_wgpu: true,
        }
    }
}

const WGPU_TARGETS: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

static INIT: Once = Once::new();

/// Initializes the global logger once. Later calls are ignored.
///
/// Precedence: `config.env_filter`, then `RUST_LOG`, then `default_level`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(config.default_level);

        if config.quiet_wgpu {
            for target in WGPU_TARGETS {
                builder.filter_module(target, log::LevelFilter::Warn);
            }
        }

        let filter = config
            .env_filter
            .or_else(|| std::env::var("RUST_LOG").ok());
        if let Some(filter) = filter {
            builder.parse_filters(&filter);
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_err() {
            log::warn!("a global logger was already installed");
            return;
        }
        log::debug!("logging initialized");
    });
}
