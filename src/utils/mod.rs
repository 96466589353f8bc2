pub mod build_info;

use std::sync::Once;

use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

const DEFAULT_DIRECTIVE: &str = "rentroll_core=info";

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = match DEFAULT_DIRECTIVE.parse::<Directive>() {
            Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
            Err(_) => EnvFilter::from_default_env(),
        };
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
