pub mod caption;
pub mod config;
pub mod location;
pub mod server;
pub mod text;
