pub mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{
    parse_target_url, read_target_url, write_example_config, BrowserConfig, Config,
    EXAMPLE_CONFIG, LOCAL_CONFIG_FILE,
};
