use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use lazy_static::lazy_static;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;
use serde::Deserialize;

/// Options for the directory-listing TOC macro.
#[derive(Debug, Clone)]
pub struct DirTocOptions {
    /// Directory to list, relative to the docs dir.
    pub path: String,
    /// 1 lists the directory itself, 2 adds immediate subdirectories.
    pub depth: u8,
    /// Numbered list instead of bullets.
    pub numbered: bool,
    /// Emit a `###` heading per directory group.
    pub group_by_dir: bool,
}

impl Default for DirTocOptions {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
            depth: 1,
            numbered: false,
            group_by_dir: true,
        }
    }
}

/// Glob patterns from `.tocignore`, matched fnmatch-style against paths
/// relative to the docs dir.
#[derive(Debug, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read `<docs_dir>/.tocignore`; a missing file means no patterns.
    pub fn load(docs_dir: &Path) -> Self {
        let path = docs_dir.join(".tocignore");
        let Ok(raw) = fs::read_to_string(&path) else {
            return Self::empty();
        };

        let patterns = raw
            .lines()
            .filter_map(|line| {
                let pat = line.trim();
                if pat.is_empty() || pat.starts_with('#') {
                    return None;
                }
                match Pattern::new(pat) {
                    Ok(pattern) => Some(pattern),
                    Err(err) => {
                        eprintln!(
                            "Warning: invalid ignore pattern '{pat}' in {}: {err}",
                            path.display()
                        );
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn is_ignored(&self, relative: &Path) -> bool {
        let text = relative.to_string_lossy();
        self.patterns.iter().any(|pattern| pattern.matches(&text))
    }
}

/// Render a Markdown list of the Markdown files under a directory.
///
/// Output is Markdown, not HTML, for the surrounding generator's own
/// Markdown pass. A missing base path yields a single HTML comment.
pub fn dir_toc(docs_dir: &Path, options: &DirTocOptions, ignore: &IgnorePatterns) -> String {
    let docs_root = docs_dir
        .canonicalize()
        .unwrap_or_else(|_| docs_dir.to_path_buf());
    let base = docs_root.join(&options.path);
    let base = base.canonicalize().unwrap_or(base);
    if !base.exists() {
        return format!("<!-- dir_toc: path '{}' not found -->", options.path);
    }

    let mut groups = collect_groups(&base, &docs_root, options.depth, ignore);

    groups.retain(|(group, _)| !ignore.is_ignored(Path::new(group)));
    for (_, items) in &mut groups {
        items.retain(|(_, link)| !ignore.is_ignored(Path::new(link)));
    }

    render_markdown(&groups, options.numbered, options.group_by_dir)
}

type TocGroup = (String, Vec<(String, String)>);

fn collect_groups(
    base: &Path,
    docs_root: &Path,
    depth: u8,
    ignore: &IgnorePatterns,
) -> Vec<TocGroup> {
    let base_rel = base
        .strip_prefix(docs_root)
        .unwrap_or_else(|_| Path::new(""))
        .to_path_buf();

    let mut groups = vec![(
        base_rel.to_string_lossy().into_owned(),
        list_markdown_files(base)
            .into_iter()
            .map(|file| entry_for(&file, &base_rel))
            .collect(),
    )];

    if depth >= 2 {
        let mut subdirs: Vec<PathBuf> = fs::read_dir(base)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_dir())
                    .collect()
            })
            .unwrap_or_default();
        subdirs.sort_by_key(|dir| {
            dir.file_name()
                .map(|name| name.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });

        for sub in subdirs {
            let sub_rel = sub
                .strip_prefix(docs_root)
                .unwrap_or(&sub)
                .to_path_buf();
            if ignore.is_ignored(&sub_rel) {
                continue;
            }
            groups.push((
                sub_rel.to_string_lossy().into_owned(),
                list_markdown_files(&sub)
                    .into_iter()
                    .map(|file| entry_for(&file, &sub_rel))
                    .collect(),
            ));
        }
    }

    groups
}

fn entry_for(file: &Path, group_rel: &Path) -> (String, String) {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let link = group_rel.join(&name).to_string_lossy().into_owned();
    (read_title(file), link)
}

/// Markdown files directly under `dir`, `index.md` excluded, sorted with
/// numeric prefixes first.
fn list_markdown_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_file() && p.extension().map(|ext| ext == "md").unwrap_or(false)
                })
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().to_lowercase() != "index.md")
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();

    files.sort_by_key(|path| {
        numeric_key(
            &path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    });
    files
}

/// `1.intro.md` sorts as (1, …); names without a numeric prefix sort after
/// all numeric ones, alphabetically.
fn numeric_key(name: &str) -> (u64, String) {
    lazy_static! {
        static ref NUMERIC_PREFIX: Regex = Regex::new(r"^(\d+)[._\-\s]").unwrap();
    }

    if let Some(caps) = NUMERIC_PREFIX.captures(name) {
        if let Ok(value) = caps[1].parse::<u64>() {
            return (value, name.to_lowercase());
        }
    }
    (u64::MAX, name.to_lowercase())
}

/// Title preference: front-matter `title:`, else first `#` heading, else the
/// file name without extension.
fn read_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Ok(text) = fs::read_to_string(path) else {
        return stem;
    };

    front_matter_title(&text)
        .or_else(|| first_heading_title(&text))
        .unwrap_or(stem)
}

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    title: Option<String>,
}

fn front_matter_title(source: &str) -> Option<String> {
    let mut lines = source.split_inclusive('\n');
    let first_line = lines.next()?;
    if first_line.trim() != "---" {
        return None;
    }

    let mut block = String::new();
    for line in lines {
        if line.trim() == "---" {
            let frontmatter: Frontmatter = serde_yaml::from_str(&block).unwrap_or_default();
            return frontmatter
                .title
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty());
        }
        block.push_str(line);
    }

    None
}

fn first_heading_title(source: &str) -> Option<String> {
    let mut in_h1 = false;
    let mut title = String::new();

    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_h1 = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                let trimmed = title.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                in_h1 = false;
                title.clear();
            }
            Event::Text(text) | Event::Code(text) if in_h1 => title.push_str(&text),
            _ => {}
        }
    }

    None
}

fn render_markdown(groups: &[TocGroup], numbered: bool, group_by_dir: bool) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (group, items) in groups {
        if group_by_dir && !items.is_empty() {
            let display = Path::new(group)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| group.clone());
            lines.push(format!("### {display}"));
            lines.push(String::new());
        }
        if numbered {
            for (i, (title, link)) in items.iter().enumerate() {
                lines.push(format!("{}. [{title}]({link})", i + 1));
            }
        } else {
            for (title, link) in items {
                lines.push(format!("- [{title}]({link})"));
            }
        }
        if !items.is_empty() {
            lines.push(String::new());
        }
    }

    lines.join("\n").trim().to_string()
}
