//! CLI command handlers, one per file.

mod extract;
mod rename;
mod upload;

pub use extract::run_extract;
pub use rename::run_rename;
pub use upload::run_upload;

#[cfg(test)]
pub(crate) use rename::default_output_dir;
