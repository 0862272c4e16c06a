pub mod output;

pub use output::{AudioError, AudioOutput};
