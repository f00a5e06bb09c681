//! HTTP API for the voice service
//!
//! REST control endpoints over the playback scheduler plus two SSE streams:
//! scheduler events and the enabled flag.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
