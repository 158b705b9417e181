pub mod config;
pub mod logging;

pub mod auth;
pub mod http;
pub mod matcher;
pub mod normalize;
pub mod rename;
pub mod session_store;
pub mod tag_export;
pub mod tag_index;
pub mod upload;
