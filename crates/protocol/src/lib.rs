#![forbid(unsafe_code)]

pub mod banner;
mod command;
mod parse;
mod record;
mod reply;

pub use banner::{GREETING, READONLY_REPLY, REPLICA_GREETING, SNAPSHOT_SENTINEL};
pub use command::{Command, HELP_TEXT};
pub use parse::Parse;
pub use record::Record;
pub use reply::Reply;
