//! qemu-tracker: discover running QEMU virtual machines from the process
//! table, serve them over a small HTTP API and dashboard, and start or stop
//! VMs declared in a static configuration file.

pub mod cache;
pub mod error;
pub mod logging;
pub mod process;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod vm;

pub use cache::SnapshotCache;
pub use error::{ConfigError, TrackerError};
pub use process::{Instance, Snapshot};
pub use server::{AppState, router};
