//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build registry, bulkhead, monitor → Spawn monitor
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → monitor loop exits → final status report
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
