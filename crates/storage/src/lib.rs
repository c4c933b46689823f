#![forbid(unsafe_code)]

pub mod aof;
mod entry;
mod expiry;
mod store;

pub use aof::{Aof, AofWriter, FsyncPolicy, open_aof, replay_aof};
pub use entry::{Entry, unix_now};
pub use expiry::{run_sweeper, spawn_sweeper};
pub use store::{Stats, Store};
