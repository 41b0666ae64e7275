mod codec;
mod flaky;
mod modem;

pub use codec::FakeCodec;
pub use flaky::FlakyTransport;
pub use modem::TestModem;

use tracing_subscriber::EnvFilter;

/// Install a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
