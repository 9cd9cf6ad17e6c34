use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

pub fn setup_tracing(debug: bool) -> Result<(), ParseError> {
    // Layer to output to stdout
    let stdout_layer = tracing_subscriber::fmt::layer();

    let filter_level = if debug { "metanet_core=debug" } else { "metanet_core=info" };

    let filter = EnvFilter::from_default_env().add_directive(filter_level.parse()?);

    let subscriber = Registry::default().with(stdout_layer).with(filter);

    ::tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    Ok(())
}
