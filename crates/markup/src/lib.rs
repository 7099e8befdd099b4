//! Size clamping for model-generated HTML.
//!
//! The sanitizer rewrites only the attribute and inline-style values that
//! exceed the configured limits. Every other byte of the document is copied
//! through unchanged, and documents that cannot be tokenized are returned
//! as-is.

mod sanitize;

pub use sanitize::{MarkupError, MarkupSanitizer, SizeLimits, sanitize_chart_html};
