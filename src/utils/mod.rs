pub mod build_info;

use std::sync::Once;

use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    fmt, EnvFilter,
};

static TRACING_INIT: Once = Once::new();

const DEFAULT_DIRECTIVE: &str = "plan_core=info";

/// Initializes the global tracing subscriber and logs the build metadata once.
///
/// `RUST_LOG` is honoured first; `directive` is layered on top. An unparsable directive
/// falls back to `plan_core=info`.
pub fn init_tracing(directive: &str) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive(parse_directive(directive));
        // Another subscriber may already be installed by the embedding application.
        let _ = fmt().with_env_filter(filter).try_init();

        let build = build_info::current();
        tracing::info!(
            build = %build.describe(),
            target = build.target,
            profile = build.profile,
            "Plan Core tracing initialized."
        );
    });
}

fn parse_directive(directive: &str) -> Directive {
    directive
        .parse()
        .or_else(|_| DEFAULT_DIRECTIVE.parse())
        .unwrap_or_else(|_| LevelFilter::INFO.into())
}
