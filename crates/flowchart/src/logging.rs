//! Log output setup for hosts embedding flowcharts

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::manifest::LoggingConfig;

/// Filter used when neither `RUST_LOG` nor the manifest sets one
pub const DEFAULT_FILTER: &str = "flowchart=info,flowchart_runtime=info";

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the manifest filter. Fails if a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    });

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        // Another test may have installed a subscriber first
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
