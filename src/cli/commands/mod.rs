//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod index;
mod info;
mod serve;

pub use ask::{run_ask, AskRequest};
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use index::run_index;
pub use info::run_info;
pub use serve::run_serve;
