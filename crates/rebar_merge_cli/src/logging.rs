use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Map `-v` repetitions to a level; `RUST_LOG` still wins when set.
pub fn derive_level_filter(n_verbose: u8) -> LevelFilter {
    match n_verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global fmt subscriber, writing to stderr.
pub fn init(n_verbose: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(derive_level_filter(n_verbose).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to initialize logging: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(derive_level_filter(0), LevelFilter::WARN);
        assert_eq!(derive_level_filter(1), LevelFilter::INFO);
        assert_eq!(derive_level_filter(2), LevelFilter::DEBUG);
        assert_eq!(derive_level_filter(7), LevelFilter::TRACE);
    }
}
