//! stderr diagnostics for `provision`.
//!
//! Operator notices ("Customizing hardware parameters...", step failures) go
//! through [`crate::io::reporter`]; this subscriber only carries the spans and
//! events below, which are useful when a reconfigure hangs or fails.
//!
//! | target | what it emits |
//! |---|---|
//! | `provision::pipeline` | one span per step, halt and cancellation events |
//! | `provision::step` | skipped/submitted/completed hardware changes |
//! | `provision::io::govc` | the `govc vm.change` command line, task id, govc stderr |
//! | `provision::io::process` | child pid, kill on cancel or deadline, truncated output |
//!
//! ```bash
//! RUST_LOG=provision::io::govc=debug provision apply --vm build-01
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,provision=debug"
    } else {
        "warn"
    }
}

/// Install the stderr subscriber. `RUST_LOG` overrides `verbose`; targets are
/// printed only in verbose mode.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .init();
}
