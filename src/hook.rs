use std::path::Path;

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use thiserror::Error;

use crate::git_utils::HistoryResolver;
use crate::outline::{self, OutlineError};
use crate::template::TocTemplate;

pub const BEGIN_MARKER: &str = "{{ BEGIN_TOC }}";
pub const END_MARKER: &str = "{{ END_TOC }}";

#[derive(Debug, Error)]
pub enum HookError {
    #[error("outline: {0}")]
    Outline(#[from] OutlineError),
    #[error("template: {0}")]
    Template(#[from] tera::Error),
}

/// Expands `{{ BEGIN_TOC }}` … `{{ END_TOC }}` blocks in page Markdown.
pub struct TocHook {
    enabled: bool,
    template: TocTemplate,
    resolver: HistoryResolver,
}

impl TocHook {
    pub fn new(enabled: bool, template: TocTemplate, resolver: HistoryResolver) -> Self {
        Self {
            enabled,
            template,
            resolver,
        }
    }

    /// Run one page through the hook. The input comes back unchanged when
    /// the hook is disabled, either marker is absent, or expansion fails
    /// (the failure is logged, never raised — a broken TOC block must not
    /// fail the page build).
    pub fn on_page_markdown(&mut self, markdown: &str, base_dir: &Path) -> String {
        if !self.enabled {
            return markdown.to_string();
        }
        if !markdown.contains(BEGIN_MARKER) || !markdown.contains(END_MARKER) {
            return markdown.to_string();
        }

        match self.expand(markdown, base_dir) {
            Ok(expanded) => expanded,
            Err(err) => {
                eprintln!("Warning: failed to render TOC block: {err}");
                markdown.to_string()
            }
        }
    }

    fn expand(&mut self, markdown: &str, base_dir: &Path) -> Result<String, HookError> {
        lazy_static! {
            static ref TOC_SPAN: Regex =
                Regex::new(r"(?is)\{\{ BEGIN_TOC \}\}.*\{\{ END_TOC \}\}").unwrap();
        }

        let Some((_, after_begin)) = markdown.split_once(BEGIN_MARKER) else {
            return Ok(markdown.to_string());
        };
        let Some((block, _)) = after_begin.split_once(END_MARKER) else {
            return Ok(markdown.to_string());
        };

        let sections = outline::parse_outline(block)?;
        let rendered = outline::flatten(&sections, base_dir, &mut self.resolver);
        let html = self.template.render(&rendered)?;

        Ok(TOC_SPAN.replace(markdown, NoExpand(&html)).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git_utils::RepoCache;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_docs(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mdtoc-hook-{tag}-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock should be after epoch")
                .as_millis()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp docs dir");
        dir
    }

    fn hook(enabled: bool) -> TocHook {
        TocHook::new(
            enabled,
            TocTemplate::embedded(),
            HistoryResolver::new(RepoCache::new(), HashSet::new()),
        )
    }

    #[test]
    fn page_without_markers_is_untouched() {
        let dir = temp_docs("identity");
        let page = "# Title\n\nNothing to expand here.\n";
        assert_eq!(hook(true).on_page_markdown(page, &dir), page);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn page_with_only_one_marker_is_untouched() {
        let dir = temp_docs("half");
        let page = "{{ BEGIN_TOC }}\n- S:\n    - A: a.md\n";
        assert_eq!(hook(true).on_page_markdown(page, &dir), page);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn disabled_hook_is_a_no_op() {
        let dir = temp_docs("disabled");
        let page = "{{ BEGIN_TOC }}\n- S:\n    - A: a.md\n{{ END_TOC }}\n";
        assert_eq!(hook(false).on_page_markdown(page, &dir), page);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_outline_returns_input_unchanged() {
        let dir = temp_docs("malformed");
        let page = "before\n{{ BEGIN_TOC }}\n- [unclosed: {\n{{ END_TOC }}\nafter\n";
        assert_eq!(hook(true).on_page_markdown(page, &dir), page);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn block_is_replaced_with_rendered_html() {
        let dir = temp_docs("replace");
        fs::write(dir.join("intro.md"), "# Intro\n\none two three\n").expect("write intro");

        let page = "# Course\n\n{{ BEGIN_TOC }}\n- Guide:\n    - index: index.md\n    - Intro: intro.md\n{{ END_TOC }}\n\ntail\n";
        let output = hook(true).on_page_markdown(page, &dir);

        assert!(output.starts_with("# Course\n\n"));
        assert!(output.ends_with("\ntail\n"));
        assert!(!output.contains(BEGIN_MARKER));
        assert!(!output.contains(END_MARKER));
        assert!(output.contains("<a href=\"intro.md\">Intro</a>"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dollar_signs_in_rendered_output_survive_substitution() {
        let dir = temp_docs("dollar");
        fs::write(dir.join("price $1.md"), "body").expect("write page");

        let page = "{{ BEGIN_TOC }}\n- S:\n    - \"Cost $0\": \"price $1.md\"\n{{ END_TOC }}\n";
        let output = hook(true).on_page_markdown(page, &dir);

        assert!(output.contains("Cost $0"));

        let _ = fs::remove_dir_all(&dir);
    }
}
