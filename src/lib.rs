//! Build-time TOC enrichment for Markdown documentation sites.
//!
//! Pages carrying a `{{ BEGIN_TOC }}` … `{{ END_TOC }}` YAML outline get the
//! block expanded into an HTML fragment with per-document word counts, code
//! line counts, estimated reading times and git-derived "last updated"
//! dates. A directory-listing macro renders plain Markdown TOCs for whole
//! folders.

pub mod config;
pub mod dir_toc;
pub mod git_utils;
pub mod hook;
pub mod outline;
pub mod stats;
pub mod template;
