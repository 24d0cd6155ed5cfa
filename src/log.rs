/*!

Logging for the simulation engine.

The crate logs through the `log` facade. This module owns the `log4rs` backend and lets a
caller change the global level or per-module levels while the program runs:

```rust
use ixa_herd::log::{enable_logging, set_log_level, set_module_filter, LevelFilter};

enable_logging();
set_log_level(LevelFilter::Info);
// Watch fragment bookkeeping in detail without drowning in event traces.
set_module_filter("ixa_herd::zone", LevelFilter::Trace);
```

Logging is off until `enable_logging()` or `set_log_level()` is called.

*/

pub use log::{debug, error, info, trace, warn, LevelFilter};

use crate::HashMap;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;
use std::sync::{LazyLock, Mutex, MutexGuard};

const DEFAULT_LOG_PATTERN: &str = "{h({l})} {M} - {m}{n}";
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
const APPENDER_NAME: &str = "stdout";

struct LogConfiguration {
    global_log_level: LevelFilter,
    module_filters: HashMap<String, LevelFilter>,
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        LogConfiguration {
            global_log_level: LevelFilter::Off,
            module_filters: HashMap::default(),
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    fn build_config(&self) -> Option<Config> {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
            .build();
        let mut builder =
            Config::builder().appender(Appender::builder().build(APPENDER_NAME, Box::new(stdout)));
        for (module, level) in &self.module_filters {
            builder = builder.logger(Logger::builder().build(module.as_str(), *level));
        }
        let root = Root::builder()
            .appender(APPENDER_NAME)
            .build(self.global_log_level);

        match builder.build(root) {
            Ok(config) => Some(config),
            Err(errors) => {
                eprintln!("invalid logging configuration: {errors}");
                None
            }
        }
    }

    /// Pushes the current settings into `log4rs`, installing the logger on first use.
    fn apply(&mut self) {
        let Some(config) = self.build_config() else {
            return;
        };
        match &self.root_handle {
            Some(handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.root_handle = Some(handle),
                // Another logger owns the facade; leave it in place.
                Err(_) => {}
            },
        }
    }
}

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> =
    LazyLock::new(|| Mutex::new(LogConfiguration::default()));

fn log_configuration() -> MutexGuard<'static, LogConfiguration> {
    // A poisoned lock only means another thread panicked while logging; the data is intact.
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Turns logging on at the default level (`Info`).
pub fn enable_logging() {
    set_log_level(DEFAULT_LOG_LEVEL);
}

/// Turns logging off. Module filters are kept for the next time logging is enabled.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level for every module without its own filter.
pub fn set_log_level(level: LevelFilter) {
    let mut configuration = log_configuration();
    configuration.global_log_level = level;
    configuration.apply();
}

/// Sets the level for one module path, e.g. `"ixa_herd::zone"`.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    let mut configuration = log_configuration();
    configuration
        .module_filters
        .insert(module_path.to_string(), level);
    configuration.apply();
}

/// Sets the levels for several module paths at once.
pub fn set_module_filters(filters: &[(&str, LevelFilter)]) {
    let mut configuration = log_configuration();
    for (module_path, level) in filters {
        configuration
            .module_filters
            .insert((*module_path).to_string(), *level);
    }
    configuration.apply();
}

/// Removes a per-module filter so the module follows the global level again.
pub fn remove_module_filter(module_path: &str) {
    let mut configuration = log_configuration();
    configuration.module_filters.remove(module_path);
    configuration.apply();
}
