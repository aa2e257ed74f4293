//! Interactive terminal voice chat: typed input goes to a streaming LLM chat
//! session or straight into the text-to-speech pipeline, while audio plays on
//! a worker thread and progress renders in a full-screen terminal UI.

pub mod app;
pub mod audio;
pub mod cancel;
pub mod chat;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod input;
mod logging;
pub mod messages;
pub mod orchestrator;
pub mod session;
mod telemetry;
pub mod text;
pub mod ui;
pub mod util;

pub use logging::{init_logging, log_debug, log_debug_content, log_panic};
pub use telemetry::init_tracing;
