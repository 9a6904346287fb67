// Adapters layer: concrete implementations of domain ports.

pub mod process;

pub use process::ProcessRunner;
