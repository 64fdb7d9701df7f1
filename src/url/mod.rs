//! URL handling module for Novel-Ripple
//!
//! This module validates source URLs, resolves chapter links against the
//! catalog page, and derives the stable identifiers used as storage keys.

mod identity;
mod resolve;

pub use identity::{chapter_id_from_url, qualified_chapter_id, slug_from_url};
pub use resolve::{parse_source_url, resolve_href};
