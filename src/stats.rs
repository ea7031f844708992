use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use walkdir::WalkDir;

/// Reading statistics for one document (or an aggregate over a directory).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStats {
    pub words: u64,
    pub code_lines: u64,
    pub read_time: u64,
}

/// Prose words read per minute.
const WORDS_PER_MINUTE: f64 = 300.0;
/// Code lines read per minute.
const CODE_LINES_PER_MINUTE: f64 = 80.0;

/// Estimate statistics for raw Markdown text.
///
/// Words are CJK ideographs counted individually plus runs of ASCII
/// letters/digits. Code lines are the interior lines of fenced blocks.
/// Read time is `round(words / 300 + code_lines / 80)` in minutes.
pub fn estimate(text: &str) -> TextStats {
    let (cleaned, code_blocks) = scrub(text);

    let words = count_words(&cleaned);
    let code_lines: u64 = code_blocks
        .iter()
        .map(|block| interior_line_count(block))
        .sum();
    let read_time =
        (words as f64 / WORDS_PER_MINUTE + code_lines as f64 / CODE_LINES_PER_MINUTE).round()
            as u64;

    TextStats {
        words,
        code_lines,
        read_time,
    }
}

/// Resolve `link` against `base_dir` and estimate statistics for it.
///
/// A directory aggregates every `.md` file beneath it. A missing path is
/// retried with a `.md` suffix (after stripping one trailing slash). Anything
/// unresolvable yields zeros.
pub fn collect(link: &str, base_dir: &Path) -> TextStats {
    let full = base_dir.join(link);

    if full.is_dir() {
        return aggregate_directory(&full);
    }
    if full.is_file() {
        if full.extension().map(|ext| ext == "md").unwrap_or(false) {
            return estimate_file(&full);
        }
        return TextStats::default();
    }

    let candidate = markdown_candidate(link, base_dir);
    if candidate.is_file() {
        return estimate_file(&candidate);
    }

    TextStats::default()
}

/// `foo/bar` -> `<base>/foo/bar.md`, `foo/bar/` -> `<base>/foo/bar.md`.
pub fn markdown_candidate(link: &str, base_dir: &Path) -> PathBuf {
    let trimmed = link.strip_suffix('/').unwrap_or(link);
    base_dir.join(format!("{trimmed}.md"))
}

fn estimate_file(path: &Path) -> TextStats {
    match fs::read_to_string(path) {
        Ok(text) => estimate(&text),
        Err(_) => TextStats::default(),
    }
}

fn aggregate_directory(dir: &Path) -> TextStats {
    let mut total = TextStats::default();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && path.extension().map(|ext| ext == "md").unwrap_or(false) {
            let stats = estimate_file(path);
            total.words += stats.words;
            total.code_lines += stats.code_lines;
            total.read_time += stats.read_time;
        }
    }
    total
}

/// Strip everything that is not prose, returning the cleaned text and the
/// extracted fenced code blocks (fences included).
fn scrub(text: &str) -> (String, Vec<String>) {
    lazy_static! {
        static ref CODE_FENCE: Regex = Regex::new(r"(?s)```[^\n].*?```").unwrap();
        static ref HTML_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
        static ref SPACE_RUN: Regex = Regex::new(r"[ ]{2,}").unwrap();
        static ref LINK_DEFINITION: Regex = Regex::new(r"(?m)^\[[^\]]*\][^(].*").unwrap();
        static ref HEADING_ANCHOR: Regex = Regex::new(r"\{#.*\}").unwrap();
        static ref IMAGE: Regex = Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap();
        static ref LINK: Regex = Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap();
        static ref HTML_TAG: Regex = Regex::new(r"</?[^>]*>").unwrap();
        static ref MARKUP_PUNCT: Regex = Regex::new(r"[#*`~\-–^=<>+|/:]").unwrap();
        static ref FOOTNOTE_MARKER: Regex = Regex::new(r"\[[0-9]*\]").unwrap();
        static ref NUMERIC_PREFIX: Regex = Regex::new(r"[0-9#]*\.").unwrap();
    }

    let code_blocks: Vec<String> = CODE_FENCE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    let text = CODE_FENCE.replace_all(text, "");
    let text = HTML_COMMENT.replace_all(&text, "");
    let text = text.replace('\t', "    ");
    let text = SPACE_RUN.replace_all(&text, "    ");
    let text = LINK_DEFINITION.replace_all(&text, "");
    let text = HEADING_ANCHOR.replace_all(&text, "");
    let text = text.replace('\n', " ");
    let text = IMAGE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "${1}");
    let text = HTML_TAG.replace_all(&text, "");
    let text = MARKUP_PUNCT.replace_all(&text, "");
    let text = FOOTNOTE_MARKER.replace_all(&text, "");
    let text = NUMERIC_PREFIX.replace_all(&text, "");

    (text.into_owned(), code_blocks)
}

fn count_words(cleaned: &str) -> u64 {
    lazy_static! {
        static ref CJK_IDEOGRAPH: Regex = Regex::new(r"[\u{4e00}-\u{9fa5}]").unwrap();
        static ref ASCII_WORD: Regex = Regex::new(r"[A-Za-z0-9]+").unwrap();
    }

    let cjk = CJK_IDEOGRAPH.find_iter(cleaned).count() as u64;
    let ascii = ASCII_WORD.find_iter(cleaned).count() as u64;
    cjk + ascii
}

/// Lines strictly between the two fence delimiters, floored at zero.
fn interior_line_count(block: &str) -> u64 {
    block.lines().count().saturating_sub(2) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mdtoc-stats-{tag}-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock should be after epoch")
                .as_millis()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn empty_text_yields_zeros() {
        assert_eq!(estimate(""), TextStats::default());
    }

    #[test]
    fn counts_latin_words_by_runs() {
        let stats = estimate("hello world");
        assert_eq!(stats.words, 2);
        assert_eq!(stats.code_lines, 0);
    }

    #[test]
    fn counts_cjk_ideographs_individually() {
        let stats = estimate("这是一段中文");
        assert_eq!(stats.words, 6);
    }

    #[test]
    fn counts_interior_code_lines() {
        let text = "```rust\nlet a = 1;\nlet b = 2;\nlet c = 3;\n```";
        let stats = estimate(text);
        assert_eq!(stats.code_lines, 3);
    }

    #[test]
    fn empty_code_block_counts_zero_lines() {
        let stats = estimate("```c\n```");
        assert_eq!(stats.code_lines, 0);
    }

    #[test]
    fn code_block_text_does_not_count_as_words() {
        let stats = estimate("intro\n\n```python\nprint('hello')\n```\n");
        assert_eq!(stats.words, 1);
        assert_eq!(stats.code_lines, 1);
    }

    #[test]
    fn link_labels_count_but_targets_do_not() {
        let stats = estimate("see [the guide](https://example.com/guide) here");
        assert_eq!(stats.words, 4);
    }

    #[test]
    fn images_are_dropped_entirely() {
        let stats = estimate("before ![alt text](img.png) after");
        assert_eq!(stats.words, 2);
    }

    #[test]
    fn read_time_rounds_combined_estimate() {
        let prose = "word ".repeat(300);
        assert_eq!(estimate(&prose).read_time, 1);

        let code = format!("```c\n{}```", "line\n".repeat(80));
        let stats = estimate(&code);
        assert_eq!(stats.code_lines, 80);
        assert_eq!(stats.read_time, 1);

        let mixed = format!("{}\n```c\n{}```", "word ".repeat(150), "line\n".repeat(40));
        let stats = estimate(&mixed);
        assert_eq!(stats.words, 150);
        assert_eq!(stats.code_lines, 40);
        assert_eq!(stats.read_time, 1);
    }

    #[test]
    fn collect_retries_with_md_suffix() {
        let dir = temp_dir("suffix");
        fs::write(dir.join("page.md"), "one two three").expect("write page");

        assert_eq!(collect("page", &dir).words, 3);
        assert_eq!(collect("page/", &dir).words, 3);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn collect_aggregates_directories() {
        let dir = temp_dir("aggregate");
        let sub = dir.join("guide");
        fs::create_dir_all(sub.join("nested")).expect("create nested dir");
        fs::write(sub.join("a.md"), "one two").expect("write a");
        fs::write(sub.join("nested/b.md"), "three four five").expect("write b");
        fs::write(sub.join("notes.txt"), "ignored entirely").expect("write txt");

        let stats = collect("guide", &dir);
        assert_eq!(stats.words, 5);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn collect_missing_path_yields_zeros() {
        let dir = temp_dir("missing");
        assert_eq!(collect("nope", &dir), TextStats::default());
        let _ = fs::remove_dir_all(&dir);
    }
}
