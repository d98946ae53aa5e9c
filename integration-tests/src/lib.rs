#![allow(dead_code)]

#[cfg(test)]
mod address_lookup_test;
#[cfg(test)]
mod test_helpers;

use ctor::ctor;
use tracing_subscriber::EnvFilter;

#[ctor]
fn init_test_tracing() {
    let has_nocapture = std::env::args().any(|arg| arg == "--nocapture" || arg == "--show-output");
    if has_nocapture {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .try_init()
            .ok();
    }
}
