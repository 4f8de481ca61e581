// LogKV Kernel
//
// Key-value access over an append-only, position-addressed log.

pub mod adapter;
pub mod binding;
pub mod config;
pub mod handle;
pub mod index;
pub mod log;
pub mod record;

pub use adapter::{AdapterOptions, KvAdapter, KvError, SharedKvAdapter};
pub use binding::{KvBinding, Status};
pub use config::{KvConfig, LogConfig};
pub use record::Record;
