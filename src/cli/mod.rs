mod args;
mod options;

pub use args::Args;
pub use options::{Scope, WatchOptions};
