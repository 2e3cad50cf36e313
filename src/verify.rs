//! Model-assisted verification of one year's installments.
//!
//! Each prompt file goes: confirm run -> ask model -> interpret reply ->
//! (verified | proposal -> diff -> confirm apply -> write back). An abort
//! answer at either confirmation ends the whole batch.

use serde_json::Value;
use std::{fs, io::Write, path::{Path, PathBuf}};
use tracing::{debug, info};

use crate::{
    approval::{Approval, ApprovalProvider},
    conference::{installment_year, Conference},
    config::Paths,
    diff::{paint, unified_diff},
    error::VerifyError,
    model::LanguageModel,
    prompt::OK_RESPONSE,
};

/// How a model reply reads.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// The sentinel: nothing to change.
    Ok,
    Proposal(Value),
    /// Neither the sentinel nor JSON; carries the cleaned text.
    Unparseable(String),
}

/// Drop a leading ```` ```json ```` (or bare ```` ``` ````) and a trailing ```` ``` ````.
pub fn strip_code_fence(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json").or_else(|| t.strip_prefix("```")) {
        t = rest.trim();
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest.trim();
    }
    t
}

pub fn interpret_reply(raw: &str) -> Reply {
    let text = raw.trim();
    if text == OK_RESPONSE {
        return Reply::Ok;
    }
    let body = strip_code_fence(text);
    match serde_json::from_str(body) {
        Ok(v) => Reply::Proposal(v),
        Err(_) => Reply::Unparseable(body.to_string()),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    Verified,
    Updated,
    /// Operator declined the proposed change.
    Discarded,
    /// Operator declined to run the model.
    Skipped,
    Error(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifySummary {
    /// Items the model was run for.
    pub processed: usize,
    pub verified: usize,
    pub updated: usize,
    /// Declined runs plus discarded proposals.
    pub skipped: usize,
    pub errors: usize,
}

impl VerifySummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Verified => self.verified += 1,
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Discarded | ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Error(_) => self.errors += 1,
        }
    }
}

/// `<prompts>/<year>/*.txt`, sorted by name.
pub fn prompt_files(paths: &Paths, year: i64) -> Result<Vec<PathBuf>, VerifyError> {
    let dir = paths.prompts_year_dir(year);
    if !dir.is_dir() {
        return Err(VerifyError::MissingPromptsDir(dir));
    }
    let mut files = vec![];
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "txt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub struct Verifier<'a, W: Write> {
    paths: &'a Paths,
    model: &'a dyn LanguageModel,
    approval: &'a mut dyn ApprovalProvider,
    out: W,
    color: bool,
}

impl<'a, W: Write> Verifier<'a, W> {
    pub fn new(paths: &'a Paths, model: &'a dyn LanguageModel, approval: &'a mut dyn ApprovalProvider, out: W) -> Self {
        Self { paths, model, approval, out, color: false }
    }

    /// Colour diffs (for terminals).
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Walk `files` in order. `Err(Aborted)` means the operator stopped the
    /// batch; anything already written stays written.
    pub async fn run(&mut self, year: i64, files: &[PathBuf]) -> Result<VerifySummary, VerifyError> {
        let mut summary = VerifySummary::default();
        for path in files {
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            let conference_id = &*stem;
            writeln!(self.out, "\n--- Processing: {conference_id} ({year}) ---")?;

            if !self.confirm(&format!("Run LLM for {conference_id} {year}?"))? {
                writeln!(self.out, "Skipping.")?;
                summary.record(&ItemOutcome::Skipped);
                continue;
            }

            summary.processed += 1;
            let outcome = self.process(conference_id, year, path).await?;
            if let ItemOutcome::Error(message) = &outcome {
                writeln!(self.out, "Error: {message}")?;
            }
            debug!(conference_id, year, ?outcome, "item finished");
            summary.record(&outcome);
        }
        info!(?summary, "verification finished");
        Ok(summary)
    }

    /// `Ok(true)` on yes; abort becomes `Err(Aborted)`.
    fn confirm(&mut self, prompt: &str) -> Result<bool, VerifyError> {
        match self.approval.ask(prompt)? {
            Approval::Yes => Ok(true),
            Approval::No => Ok(false),
            Approval::Abort => {
                writeln!(self.out, "Aborting.")?;
                Err(VerifyError::Aborted)
            }
        }
    }

    async fn process(&mut self, conference_id: &str, year: i64, prompt_path: &Path) -> Result<ItemOutcome, VerifyError> {
        let prompt = match fs::read_to_string(prompt_path) {
            Ok(p) => p,
            Err(e) => return Ok(ItemOutcome::Error(format!("reading {}: {e}", prompt_path.display()))),
        };

        writeln!(self.out, "Sending prompt to LLM...")?;
        let reply = match self.model.complete(&prompt).await {
            Ok(r) => r,
            Err(e) => return Ok(ItemOutcome::Error(format!("LLM call failed for {conference_id} {year}: {e}"))),
        };
        writeln!(self.out, "LLM response received.")?;

        match interpret_reply(&reply) {
            Reply::Ok => {
                writeln!(self.out, "Verification OK for {conference_id} {year}.")?;
                Ok(ItemOutcome::Verified)
            }
            Reply::Unparseable(raw) => {
                self.echo_raw(&raw)?;
                Ok(ItemOutcome::Error(format!(
                    "LLM response for {conference_id} {year} was not '{OK_RESPONSE}' and could not be parsed as JSON"
                )))
            }
            Reply::Proposal(proposal) if !proposal.is_object() || installment_year(&proposal) != Some(year) => {
                self.echo_raw(strip_code_fence(&reply))?;
                Ok(ItemOutcome::Error(format!(
                    "LLM response for {conference_id} {year} is not an installment object for year {year}"
                )))
            }
            Reply::Proposal(proposal) => self.review(conference_id, year, proposal),
        }
    }

    fn echo_raw(&mut self, raw: &str) -> Result<(), VerifyError> {
        writeln!(self.out, "LLM Raw Output:")?;
        writeln!(self.out, "{}", "-".repeat(20))?;
        writeln!(self.out, "{raw}")?;
        writeln!(self.out, "{}", "-".repeat(20))?;
        Ok(())
    }

    fn review(&mut self, conference_id: &str, year: i64, proposal: Value) -> Result<ItemOutcome, VerifyError> {
        let mut conf = match Conference::load(self.paths, conference_id) {
            Ok(c) => c,
            Err(e) => return Ok(ItemOutcome::Error(format!("cannot load original data to apply changes: {e}"))),
        };
        let Some(index) = conf.installment_index(year) else {
            return Ok(ItemOutcome::Error(format!(
                "cannot find original installment for year {year} in {}", conf.path.display()
            )));
        };
        let original = &conf.installments()[index];

        if *original == proposal {
            writeln!(self.out, "Verification OK (LLM JSON matches existing data) for {conference_id} {year}.")?;
            return Ok(ItemOutcome::Verified);
        }

        writeln!(self.out, "LLM proposed changes (JSON differs from original):")?;
        let diff = unified_diff(
            original,
            &proposal,
            &format!("Original {conference_id} {year}"),
            &format!("LLM Proposed {conference_id} {year}"),
        );
        if diff.is_empty() {
            writeln!(self.out, "(Objects differ but no textual difference found - check data types or ordering?)")?;
        } else if self.color {
            write!(self.out, "{}", paint(&diff))?;
        } else {
            write!(self.out, "{diff}")?;
        }
        writeln!(self.out)?;

        let file_name = conf.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if !self.confirm(&format!("Apply proposed changes for {conference_id} {year} to '{file_name}'?"))? {
            writeln!(self.out, "Changes discarded.")?;
            return Ok(ItemOutcome::Discarded);
        }

        if let Err(e) = conf.replace_installment(index, proposal).and_then(|()| conf.save()) {
            return Ok(ItemOutcome::Error(format!("writing updated file: {e}")));
        }
        writeln!(self.out, "Successfully updated '{}'.", conf.path.display())?;
        Ok(ItemOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinel_is_ok_only_when_exact() {
        assert_eq!(interpret_reply("  OK\n"), Reply::Ok);
        assert!(matches!(interpret_reply("OK, looks fine"), Reply::Unparseable(_)));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let reply = "```json\n{\"year\": 2025}\n```";
        assert_eq!(interpret_reply(reply), Reply::Proposal(json!({"year": 2025})));
        assert_eq!(interpret_reply("```\n{\"year\": 2025}\n```"), Reply::Proposal(json!({"year": 2025})));
        assert_eq!(interpret_reply("{\"year\": 2025}"), Reply::Proposal(json!({"year": 2025})));
    }

    #[test]
    fn prose_is_unparseable_and_echoed_back() {
        assert_eq!(
            interpret_reply("I could not find the dates."),
            Reply::Unparseable("I could not find the dates.".into())
        );
    }

    #[test]
    fn prompt_files_are_sorted_txt_only() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::rooted_at(tmp.path());
        let dir = paths.prompts_year_dir(2025);
        fs::create_dir_all(&dir).unwrap();
        for name in ["uist.txt", "chi.txt", "notes.md"] {
            fs::write(dir.join(name), "").unwrap();
        }
        let files = prompt_files(&paths, 2025).unwrap();
        assert_eq!(files, vec![dir.join("chi.txt"), dir.join("uist.txt")]);
        assert!(matches!(prompt_files(&paths, 2024), Err(VerifyError::MissingPromptsDir(_))));
    }
}
