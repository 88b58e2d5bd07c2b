//! Core data model for the page render worker.
//!
//! This crate provides the fundamental types shared by the worker crates:
//! - `RenderRequest` - One decoded render request from the host
//! - `PageBundle` - The fixed page a worker process serves
//! - `PageComponent` / `DataHook` - Opaque page code handles
//! - `WorkerPhase` / `TimingContext` - Request lifecycle tracking

mod context;
mod lifecycle;
mod page;

pub use context::*;
pub use lifecycle::*;
pub use page::*;
