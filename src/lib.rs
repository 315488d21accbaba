pub mod app;
pub mod cli;
pub mod error;
pub mod render;
pub mod settings;
pub mod state;

pub use error::HostError;
pub use state::{Change, HostState, Phase};
