use tracing_subscriber::EnvFilter;

/// Install a formatted `tracing` subscriber for transport adapters.
///
/// Honours `RUST_LOG` and defaults to `info`. Safe to call more than once;
/// only the first call installs anything. Returns whether this call did.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_tracing();
        assert!(!init_tracing());
    }
}
