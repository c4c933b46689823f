#![forbid(unsafe_code)]

mod error;

pub use error::*;

use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6380;
pub const DEFAULT_REPLICA_PORT: u16 = 6381;
pub const DEFAULT_PRIMARY_ADDR: &str = "localhost:6380";
pub const DEFAULT_AOF_PATH: &str = "./driftkv.aof";
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
pub const SYNC_INTERVAL: Duration = Duration::from_secs(5);
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);
pub const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024; // 4 KB
pub const MAX_LINE_SIZE: usize = 64 * 1024 * 1024; // 64 MB
