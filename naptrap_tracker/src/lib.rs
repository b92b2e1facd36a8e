pub mod alerting;
pub mod config;
pub mod console;
pub mod gpx_replay;
pub mod location;
pub mod session;
