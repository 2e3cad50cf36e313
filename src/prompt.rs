//! Turn cached conference pages into model prompts.

use htmd::{HtmlToMarkdown, options::{HeadingStyle, Options}};
use serde_json::Value;
use std::{fs, path::{Path, PathBuf}};
use tracing::debug;
use walkdir::WalkDir;

use crate::{conference::Conference, config::Paths, error::PromptError};

/// The model's whole reply when the recorded dates are correct.
pub const OK_RESPONSE: &str = "OK";

/// Instructions placed ahead of the installment JSON and the page text.
pub fn instructions() -> String {
    format!(
        r#"
The following JSON contains important dates for a conference, plus some metadata. Verify that the dates in the JSON are correct according to the page content that comes after it.

If everything matches, output "{OK_RESPONSE}" and nothing else.

If some of the dates are incorrect, output the JSON with the corrected dates. Use exactly the same JSON structure as the input.

If a date matches but is named slightly differently on the page, keep the name used in the JSON and treat the date as correct and unchanged.

If the JSON is missing some dates, add them, but you MUST follow these rules:
- DO NOT add any date that comes after the Author Notification (or whatever the equivalent milestone is called).
    - For example, the camera-ready deadline must NOT be added.
- When adding dates, follow how dates are already listed in the JSON as closely as possible.
    - Name each date the way the equivalent date was named in prior years.
        - e.g. if it is called "Author Notification", use that rather than the wording on the page.
    - Format every date as YYYY-MM-DD.


"#
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptEvent {
    Generated { path: PathBuf },
    /// No installment for the page's year; not a failure.
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PromptSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PromptSummary {
    pub fn total(&self) -> usize { self.generated + self.skipped + self.failed }
}

/// One cached page: `<source>/<year>/<conference_id>.html`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedPage {
    pub path: PathBuf,
    pub year: i64,
    pub conference_id: String,
}

/// Pages directly inside all-digit year directories, sorted by path.
pub fn cached_pages(source_dir: &Path) -> Vec<CachedPage> {
    let mut pages: Vec<CachedPage> = WalkDir::new(source_dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.into_path();
            if path.extension().is_none_or(|x| x != "html") { return None; }
            let year_dir = path.parent()?.file_name()?.to_str()?;
            if year_dir.is_empty() || !year_dir.bytes().all(|b| b.is_ascii_digit()) { return None; }
            let year = year_dir.parse().ok()?;
            let conference_id = path.file_stem()?.to_str()?.to_string();
            Some(CachedPage { path, year, conference_id })
        })
        .collect();
    pages.sort_by(|a, b| a.path.cmp(&b.path));
    pages
}

pub fn html_to_markdown(html: &str) -> std::io::Result<String> {
    HtmlToMarkdown::builder()
        .options(Options { heading_style: HeadingStyle::Atx, ..Default::default() })
        .skip_tags(vec!["script", "style"])
        .build()
        .convert(html)
}

/// Instructions, then the installment JSON, then the page as Markdown.
pub fn render_prompt(installment: &Value, markdown: &str) -> Result<String, serde_json::Error> {
    let fragment = serde_json::to_string_pretty(installment)?;
    Ok(format!("{}\n\n<json>\n{fragment}\n</json>\n\n<input>\n{markdown}\n</input>", instructions()))
}

/// Where the prompt for `page` goes: the page's path relative to the source
/// directory, re-rooted under the prompts directory, with a `.txt` extension.
pub fn prompt_path(paths: &Paths, page: &CachedPage) -> PathBuf {
    let relative = page.path.strip_prefix(&paths.source_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(page.year.to_string()).join(format!("{}.html", page.conference_id)));
    paths.prompts_dir.join(relative).with_extension("txt")
}

pub fn build_one(paths: &Paths, page: &CachedPage) -> PromptEvent {
    let conf = match Conference::load(paths, &page.conference_id) {
        Ok(c) => c,
        Err(e) => return PromptEvent::Failed { reason: e.to_string() },
    };
    let Some(installment) = conf.installment(page.year) else {
        return PromptEvent::Skipped {
            reason: format!(
                "no installment data for year {} in '{}'; skipping {}",
                page.year, page.conference_id, page.path.display()
            ),
        };
    };
    match write_prompt(paths, page, installment) {
        Ok(path) => PromptEvent::Generated { path },
        Err(reason) => PromptEvent::Failed { reason: format!("error processing {}: {reason}", page.path.display()) },
    }
}

fn write_prompt(paths: &Paths, page: &CachedPage, installment: &Value) -> Result<PathBuf, String> {
    let html = fs::read_to_string(&page.path).map_err(|e| e.to_string())?;
    let markdown = html_to_markdown(&html).map_err(|e| format!("markdown conversion: {e}"))?;
    let content = render_prompt(installment, &markdown).map_err(|e| e.to_string())?;
    let out = prompt_path(paths, page);
    if let Some(dir) = out.parent() { fs::create_dir_all(dir).map_err(|e| e.to_string())?; }
    fs::write(&out, content).map_err(|e| e.to_string())?;
    debug!(prompt = %out.display(), "prompt written");
    Ok(out)
}

/// Cached pages under an existing source directory.
pub fn source_pages(paths: &Paths) -> Result<Vec<CachedPage>, PromptError> {
    if !paths.source_dir.is_dir() {
        return Err(PromptError::MissingSourceDir(paths.source_dir.clone()));
    }
    Ok(cached_pages(&paths.source_dir))
}

/// Build a prompt for each page; `on_event` sees each result.
pub fn build_all(paths: &Paths, pages: &[CachedPage], mut on_event: impl FnMut(&CachedPage, &PromptEvent)) -> PromptSummary {
    let mut summary = PromptSummary::default();
    for page in pages {
        let event = build_one(paths, page);
        match &event {
            PromptEvent::Generated { .. } => summary.generated += 1,
            PromptEvent::Skipped { .. } => summary.skipped += 1,
            PromptEvent::Failed { .. } => summary.failed += 1,
        }
        on_event(page, &event);
    }
    summary
}
