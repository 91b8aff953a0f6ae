//! HTTP front end: a static chat page plus a JSON chat API with per-client sessions.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::GatewayServer;
