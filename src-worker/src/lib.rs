pub mod asr;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod streaming;
pub mod worker;

pub use engine::ModelCache;
pub use error::WorkerError;
pub use worker::{serve_stdio, spawn_thread_worker, Worker, WorkerChannel};
