//! CLI command handlers, one per file.

mod compress;
mod status;

pub use compress::{run_compress, CompressOptions};
pub use status::run_status;
