// Library exports for the bomb arena server
// The binary only adds the HTTP transport on top of these modules

pub mod board;
pub mod bot;
pub mod config;
pub mod danger;
pub mod debug_logger;
pub mod effects;
pub mod map;
pub mod protocol;
pub mod room;
pub mod server;
pub mod timers;
pub mod types;

mod bombs;
mod movement;
