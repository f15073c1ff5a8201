pub mod loader;
pub mod settings;

pub use loader::{ConfigError, ConfigLoader, ENV_PREFIX};
pub use settings::{AlertsConfig, HostwatchConfig, NotifyConfig, ScheduleConfig, ThresholdsConfig};
