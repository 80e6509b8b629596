pub mod add;
pub mod code;
pub mod common;
pub mod completions;
pub mod config;
pub mod countdown;
pub mod list;
pub mod open;
pub mod status;
pub mod switch;
pub mod watch;
