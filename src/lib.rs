pub mod alert;
pub mod config;
pub mod feeding;
pub mod herd;
pub mod output;
pub mod server;
pub mod store;
