pub mod allowlist;
pub mod config;
pub mod highlight;
pub mod sanitize;

pub use config::RenderConfig;
pub use highlight::{highlight, Highlighter};
pub use sanitize::{sanitize_html, HtmlSanitizer};
