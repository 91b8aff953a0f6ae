//! Configuration, the retrieval-augmented conversation chain, and chat
//! session bookkeeping shared by the CLI and HTTP front ends.

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod error;
pub mod prompt;
pub mod session;
pub mod vault;

pub use chain::{ChainAnswer, ConversationChain, Turn};
pub use config::Config;
pub use error::CoreError;
