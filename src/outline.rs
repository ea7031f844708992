use std::path::Path;

use serde::Serialize;
use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::git_utils::HistoryResolver;
use crate::stats;

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("outline must be a list of sections")]
    NotASequence,
    #[error("section must be a single-key mapping of title to entry list")]
    MalformedSection,
    #[error("entry must be a link, a single-key mapping, or a nested list")]
    MalformedEntry,
}

/// One section of the outline as written between the TOC markers.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub note: bool,
    pub entries: Vec<Entry>,
}

/// Outline entries, decided once at parse time.
#[derive(Debug, Clone)]
pub enum Entry {
    /// Bare link string; the display title comes from the file stem.
    Link(String),
    /// `Title: target` mapping.
    Titled { title: String, target: Target },
    /// Anonymous nested list used for grouping.
    Group(Vec<Entry>),
}

#[derive(Debug, Clone)]
pub enum Target {
    Link(String),
    Nested(Vec<Entry>),
}

/// Inline markers carried in entry titles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMarkers {
    pub note: bool,
    pub lab: bool,
    pub lock: bool,
}

/// A fully resolved entry, ready for the template.
#[derive(Debug, Clone, Serialize)]
pub struct Detail {
    pub title: String,
    pub link: String,
    pub words: u64,
    pub codes: u64,
    pub read_time: u64,
    pub update_time: i64,
    pub note: bool,
    pub lab: bool,
    pub lock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedSection {
    #[serde(rename = "n")]
    pub ordinal: usize,
    pub title: String,
    pub note: bool,
    pub link: Option<String>,
    pub contents: Vec<Detail>,
}

/// Parse the YAML outline block into sections.
pub fn parse_outline(text: &str) -> Result<Vec<Section>, OutlineError> {
    let value: YamlValue = serde_yaml::from_str(text)?;
    let parts = match value {
        YamlValue::Null => return Ok(Vec::new()),
        YamlValue::Sequence(parts) => parts,
        _ => return Err(OutlineError::NotASequence),
    };

    let mut sections = Vec::new();
    for part in &parts {
        let mapping = part.as_mapping().ok_or(OutlineError::MalformedSection)?;
        let (key, value) = mapping.iter().next().ok_or(OutlineError::MalformedSection)?;
        let raw_title = key.as_str().ok_or(OutlineError::MalformedSection)?;
        let (title, markers) = extract_markers(raw_title);

        sections.push(Section {
            title,
            note: markers.note,
            entries: parse_entries(value)?,
        });
    }

    Ok(sections)
}

fn parse_entries(value: &YamlValue) -> Result<Vec<Entry>, OutlineError> {
    match value {
        YamlValue::Null => Ok(Vec::new()),
        YamlValue::Sequence(items) => items.iter().map(parse_entry).collect(),
        _ => Err(OutlineError::MalformedSection),
    }
}

fn parse_entry(item: &YamlValue) -> Result<Entry, OutlineError> {
    match item {
        YamlValue::String(link) => Ok(Entry::Link(link.clone())),
        YamlValue::Sequence(items) => Ok(Entry::Group(
            items
                .iter()
                .map(parse_entry)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        YamlValue::Mapping(map) => {
            let (key, value) = map.iter().next().ok_or(OutlineError::MalformedEntry)?;
            let title = key
                .as_str()
                .ok_or(OutlineError::MalformedEntry)?
                .to_string();
            let target = match value {
                YamlValue::String(link) => Target::Link(link.clone()),
                YamlValue::Sequence(_) | YamlValue::Null => Target::Nested(parse_entries(value)?),
                _ => return Err(OutlineError::MalformedEntry),
            };
            Ok(Entry::Titled { title, target })
        }
        _ => Err(OutlineError::MalformedEntry),
    }
}

/// Pull `[note]`, `[lab]` and the lock glyph out of a raw title.
pub fn extract_markers(raw: &str) -> (String, EntryMarkers) {
    let mut markers = EntryMarkers::default();
    let mut title = raw.to_string();

    if title.contains("[note]") {
        markers.note = true;
        title = title.replace("[note]", "");
    }
    if title.contains("[lab]") {
        markers.lab = true;
        title = title.replace("[lab]", "");
    }
    if title.contains('\u{1f512}') {
        markers.lock = true;
        title = title.replace('\u{1f512}', "");
    }

    (title.trim().to_string(), markers)
}

/// Flatten parsed sections into rendered sections with statistics and update
/// times, each section's details sorted newest-first (stable on ties).
pub fn flatten(
    sections: &[Section],
    base_dir: &Path,
    resolver: &mut HistoryResolver,
) -> Vec<RenderedSection> {
    sections
        .iter()
        .enumerate()
        .map(|(ordinal, section)| {
            let mut link = None;
            let mut flat = Vec::new();
            collect_entries(&section.entries, "", &mut link, &mut flat);

            let mut contents: Vec<Detail> = flat
                .into_iter()
                .map(|entry| resolve_detail(entry, base_dir, resolver))
                .collect();
            contents.sort_by(|a, b| b.update_time.cmp(&a.update_time));

            RenderedSection {
                ordinal,
                title: section.title.clone(),
                note: section.note,
                link,
                contents,
            }
        })
        .collect()
}

struct FlatEntry {
    title: String,
    link: String,
    markers: EntryMarkers,
}

fn collect_entries(
    entries: &[Entry],
    prefix: &str,
    section_link: &mut Option<String>,
    out: &mut Vec<FlatEntry>,
) {
    for entry in entries {
        match entry {
            Entry::Link(link) => {
                let title = if prefix.is_empty() {
                    file_stem_title(link)
                } else {
                    prefix.to_string()
                };
                out.push(FlatEntry {
                    title,
                    link: link.clone(),
                    markers: EntryMarkers::default(),
                });
            }
            Entry::Titled { title, target } => {
                if prefix.is_empty() && title == "index" {
                    if let Target::Link(link) = target {
                        *section_link = Some(link.clone());
                        continue;
                    }
                }
                let (clean, markers) = extract_markers(title);
                let joined = join_title(prefix, &clean);
                match target {
                    Target::Link(link) => out.push(FlatEntry {
                        title: joined,
                        link: link.clone(),
                        markers,
                    }),
                    Target::Nested(children) => {
                        collect_entries(children, &joined, section_link, out);
                    }
                }
            }
            Entry::Group(children) => collect_entries(children, prefix, section_link, out),
        }
    }
}

fn join_title(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

fn file_stem_title(link: &str) -> String {
    Path::new(link.trim_end_matches('/'))
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| link.to_string())
}

fn resolve_detail(entry: FlatEntry, base_dir: &Path, resolver: &mut HistoryResolver) -> Detail {
    let stats = stats::collect(&entry.link, base_dir);
    let update_time = resolver.resolve_update_time(&entry.link, base_dir);

    Detail {
        title: entry.title,
        link: entry.link,
        words: stats.words,
        codes: stats.code_lines,
        read_time: stats.read_time,
        update_time,
        note: entry.markers.note,
        lab: entry.markers.lab,
        lock: entry.markers.lock,
    }
}
