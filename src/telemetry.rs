//! Process-wide logging setup.

use std::sync::Once;

use env_logger::Env;

static INSTALL: Once = Once::new();

const DEFAULT_FILTER: &str = "info,rocket::server=warn,rocket::request=warn";

/// Initialize `env_logger` and route panics through `log::error!`.
/// Repeat calls are no-ops.
pub fn install() {
    INSTALL.call_once(|| {
        // Another logger may already be set by an embedding binary or test harness.
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
            .try_init();

        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            log::error!("panic: {}", info);
            default_hook(info);
        }));
    });
}
