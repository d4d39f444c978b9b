pub mod config;
pub mod docx;
pub mod error;
pub mod extract;
pub mod model;
pub mod progress;
pub mod render;
pub mod select;
pub mod store;
