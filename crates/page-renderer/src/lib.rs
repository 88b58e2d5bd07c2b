//! Render request loop for a single-page render worker.
//!
//! A worker process serves one pre-loaded page. For every request received
//! from the host it:
//! - builds the engine's `RenderOptions` (`synthesize`)
//! - invokes the external `RenderEngine`
//! - maps the `RenderOutcome` to one wire response (`classify`)
//!
//! `PageWorker` drives this loop over an `IpcChannel` and stops on the first
//! failure; restarting is the host's job.

mod classify;
mod engine;
mod error;
mod manifest;
mod options;
mod worker;

pub use classify::*;
pub use engine::*;
pub use error::*;
pub use manifest::*;
pub use options::*;
pub use worker::*;
