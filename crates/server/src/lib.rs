#![forbid(unsafe_code)]

mod connection;
pub mod handler;
pub mod replication;
mod server;

pub use connection::Connection;
pub use handler::{handle_connection, handle_replica_connection};
pub use replication::{replica_task, sync_once};
pub use server::{run_primary, run_replica};
