// Tempo - cron-style job scheduling for Rust
//
// This library bundles the Tempo crates: five-field cron expressions, jobs
// with lifecycle callbacks, and a registry that runs whatever is due.

// Re-export logging
pub use tempo_log;

// Re-export optional crates
#[cfg(feature = "cron")]
pub use tempo_cron;

// Prelude for common imports
pub mod prelude {
    pub use tempo_log::{Level, LogSink, MemorySink};

    #[cfg(feature = "cron")]
    pub use tempo_cron::prelude::*;
}
