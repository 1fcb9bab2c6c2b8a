pub mod api;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod media;
pub mod models;
pub mod server;
pub mod state;
pub mod store;
pub mod utils;
pub mod websocket;

pub use error::{ChatError, Result};
pub use server::Server;
