use std::fs;
use std::path::PathBuf;

use chrono::{Local, TimeZone};
use serde::Serialize;
use tera::{Context, Tera};

use crate::outline::RenderedSection;

/// Built-in TOC template, used whenever no readable override is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/toc.html");

#[derive(Debug, Clone)]
enum TemplateSource {
    Embedded(&'static str),
    File(PathBuf),
}

/// The TOC fragment template: an embedded default with a file override.
#[derive(Debug, Clone)]
pub struct TocTemplate {
    source: TemplateSource,
}

impl TocTemplate {
    pub fn embedded() -> Self {
        Self {
            source: TemplateSource::Embedded(DEFAULT_TEMPLATE),
        }
    }

    /// Use the template at `path` when it exists, else the embedded default.
    pub fn from_path(path: PathBuf) -> Self {
        if path.exists() {
            Self {
                source: TemplateSource::File(path),
            }
        } else {
            Self::embedded()
        }
    }

    fn template_html(&self) -> String {
        match &self.source {
            TemplateSource::Embedded(html) => (*html).to_string(),
            TemplateSource::File(path) => match fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(err) => {
                    eprintln!(
                        "Warning: failed to read TOC template at {}: {err}. Falling back to built-in template.",
                        path.display()
                    );
                    DEFAULT_TEMPLATE.to_string()
                }
            },
        }
    }

    /// Render the flattened sections into an HTML fragment.
    pub fn render(&self, sections: &[RenderedSection]) -> Result<String, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template("toc", &self.template_html())?;

        let items: Vec<DisplaySection> = sections.iter().map(DisplaySection::from).collect();
        let mut context = Context::new();
        context.insert("items", &items);
        tera.render("toc", &context)
    }
}

#[derive(Debug, Serialize)]
struct DisplaySection {
    n: usize,
    title: String,
    note: bool,
    link: Option<String>,
    contents: Vec<DisplayDetail>,
}

#[derive(Debug, Serialize)]
struct DisplayDetail {
    title: String,
    link: String,
    words: u64,
    codes: u64,
    read_time: u64,
    update_time: String,
    note: bool,
    lab: bool,
    lock: bool,
}

impl From<&RenderedSection> for DisplaySection {
    fn from(section: &RenderedSection) -> Self {
        Self {
            n: section.ordinal,
            title: section.title.clone(),
            note: section.note,
            link: section.link.clone(),
            contents: section
                .contents
                .iter()
                .map(|detail| DisplayDetail {
                    title: detail.title.clone(),
                    link: detail.link.clone(),
                    words: detail.words,
                    codes: detail.codes,
                    read_time: detail.read_time,
                    update_time: format_update_time(detail.update_time),
                    note: detail.note,
                    lab: detail.lab,
                    lock: detail.lock,
                })
                .collect(),
        }
    }
}

/// 0 (unresolvable) renders as `N/A`; anything else as a local date.
fn format_update_time(timestamp: i64) -> String {
    if timestamp <= 0 {
        return "N/A".to_string();
    }
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|datetime| datetime.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::Detail;

    fn sample_section() -> RenderedSection {
        RenderedSection {
            ordinal: 0,
            title: "Guide".to_string(),
            note: false,
            link: Some("guide/index.md".to_string()),
            contents: vec![
                Detail {
                    title: "Intro".to_string(),
                    link: "guide/intro.md".to_string(),
                    words: 120,
                    codes: 8,
                    read_time: 1,
                    update_time: 1_700_000_000,
                    note: false,
                    lab: true,
                    lock: false,
                },
                Detail {
                    title: "Ghost".to_string(),
                    link: "guide/ghost.md".to_string(),
                    words: 0,
                    codes: 0,
                    read_time: 0,
                    update_time: 0,
                    note: false,
                    lab: false,
                    lock: false,
                },
            ],
        }
    }

    #[test]
    fn embedded_template_renders_sections() {
        let html = TocTemplate::embedded()
            .render(&[sample_section()])
            .expect("render succeeds");

        assert!(html.contains("<a href=\"guide/index.md\">Guide</a>"));
        assert!(html.contains("<a href=\"guide/intro.md\">Intro</a>"));
        assert!(html.contains("120 words"));
        assert!(html.contains("lab"));
    }

    #[test]
    fn zero_update_time_renders_as_not_available() {
        let html = TocTemplate::embedded()
            .render(&[sample_section()])
            .expect("render succeeds");

        assert!(html.contains("updated N/A"));
    }

    #[test]
    fn missing_template_path_falls_back_to_embedded() {
        let template = TocTemplate::from_path(PathBuf::from("/nonexistent/toc.html"));
        let html = template
            .render(&[sample_section()])
            .expect("render succeeds");
        assert!(html.contains("doc-toc"));
    }

    #[test]
    fn unreadable_template_file_falls_back_to_embedded() {
        // A directory exists but cannot be read as a template file.
        let template = TocTemplate::from_path(std::env::temp_dir());
        let html = template
            .render(&[sample_section()])
            .expect("render succeeds");
        assert!(html.contains("doc-toc"));
    }
}
