//! Validate every conference file in the data directory against `schema.json`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::{fs, path::{Path, PathBuf}};
use tracing::debug;

use crate::{conference::{duplicate_years, load_json}, config::Paths, error::SchemaError};

/// Outcome for one data file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileVerdict {
    Valid,
    /// Unreadable or not JSON.
    LoadError(String),
    /// One message per violated constraint.
    Invalid(Vec<String>),
}

impl FileVerdict {
    pub fn is_valid(&self) -> bool { matches!(self, Self::Valid) }
}

pub struct SchemaChecker {
    validator: jsonschema::Validator,
}

impl SchemaChecker {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let schema = load_json(path)?;
        Self::from_value(&schema).map_err(|message| SchemaError::Compile { path: path.to_path_buf(), message })
    }

    pub fn from_value(schema: &Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
        Ok(Self { validator })
    }

    /// Schema violations plus the one-installment-per-year rule the schema cannot express.
    pub fn check_value(&self, instance: &Value) -> Vec<String> {
        let mut problems: Vec<String> = self.validator.iter_errors(instance).map(|e| {
            let at = e.instance_path().to_string();
            if at.is_empty() { e.to_string() } else { format!("{at}: {e}") }
        }).collect();
        if let Some(Value::Array(items)) = instance.get("installments") {
            for year in duplicate_years(items) {
                problems.push(format!("more than one installment for year {year}"));
            }
        }
        problems
    }

    pub fn check_file(&self, path: &Path) -> FileVerdict {
        let instance = match load_json(path) {
            Ok(v) => v,
            Err(e) => return FileVerdict::LoadError(e.to_string()),
        };
        let problems = self.check_value(&instance);
        if problems.is_empty() { FileVerdict::Valid } else { FileVerdict::Invalid(problems) }
    }
}

/// Globs for files that are not conference records. Empty `patterns` means
/// the schema and index file names.
pub fn exclusion_set(patterns: &[String], paths: &Paths) -> Result<GlobSet, SchemaError> {
    let mut builder = GlobSetBuilder::new();
    if patterns.is_empty() {
        for p in [&paths.schema_file, &paths.index_file] {
            if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                builder.add(Glob::new(&globset::escape(name))?);
            }
        }
    } else {
        for p in patterns { builder.add(Glob::new(p)?); }
    }
    Ok(builder.build()?)
}

/// `*.json` regular files directly under `dir`, minus exclusions, sorted by name.
pub fn collect_candidates(dir: &Path, exclude: &GlobSet) -> Result<Vec<PathBuf>, SchemaError> {
    let scan_err = |source| SchemaError::Scan { path: dir.to_path_buf(), source };
    let mut files = vec![];
    for entry in fs::read_dir(dir).map_err(scan_err)? {
        let path = entry.map_err(scan_err)?.path();
        if !path.is_file() || path.extension().is_none_or(|e| e != "json") { continue; }
        let Some(name) = path.file_name() else { continue };
        if exclude.is_match(name) {
            debug!(file = %path.display(), "excluded from validation");
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["id", "installments"],
            "properties": {
                "id": { "type": "string" },
                "installments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["year"],
                        "properties": {
                            "year": { "type": "integer" },
                            "website": { "type": "string" }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn valid_instance_passes_silently() {
        let checker = SchemaChecker::from_value(&schema()).unwrap();
        let ok = json!({"id": "chi", "installments": [{"year": 2024, "website": "https://x"}]});
        assert!(checker.check_value(&ok).is_empty());
    }

    #[test]
    fn missing_required_field_is_named() {
        let checker = SchemaChecker::from_value(&schema()).unwrap();
        let problems = checker.check_value(&json!({"installments": []}));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("id"), "{problems:?}");
        assert!(!problems[0].starts_with(':'), "root errors carry no path prefix: {problems:?}");
    }

    #[test]
    fn duplicate_year_fails_even_when_schema_passes() {
        let checker = SchemaChecker::from_value(&schema()).unwrap();
        let dup = json!({"id": "chi", "installments": [{"year": 2024}, {"year": 2024}]});
        assert_eq!(checker.check_value(&dup), vec!["more than one installment for year 2024".to_string()]);
    }

    #[test]
    fn uncompilable_schema_is_rejected() {
        assert!(SchemaChecker::from_value(&json!({"type": 12})).is_err());
    }

    #[test]
    fn scans_directory_with_default_exclusions() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("schema.json"), schema().to_string()).unwrap();
        fs::write(dir.join("index.json"), r#"["chi","uist"]"#).unwrap();
        fs::write(dir.join("uist.json"), r#"{"id":"uist","installments":[{"year":"2024"}]}"#).unwrap();
        fs::write(dir.join("chi.json"), r#"{"id":"chi","installments":[]}"#).unwrap();
        fs::write(dir.join("broken.json"), "{").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let paths = Paths::rooted_at(dir);
        let exclude = exclusion_set(&[], &paths).unwrap();
        let files = collect_candidates(dir, &exclude).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["broken.json", "chi.json", "uist.json"]);

        let checker = SchemaChecker::load(&paths.schema_file).unwrap();
        let verdicts: Vec<_> = files.iter().map(|f| checker.check_file(f)).collect();
        assert!(matches!(verdicts[0], FileVerdict::LoadError(_)));
        assert!(verdicts[1].is_valid());
        match &verdicts[2] {
            FileVerdict::Invalid(p) => {
                assert_eq!(p.len(), 1);
                assert!(p[0].starts_with("/installments/0/year: "), "{p:?}");
            }
            other => panic!("expected schema failure, got {other:?}"),
        }
    }

    #[test]
    fn custom_exclusions_replace_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("draft-chi.json"), "{}").unwrap();
        fs::write(tmp.path().join("index.json"), "[]").unwrap();
        let exclude = exclusion_set(&["draft-*.json".into()], &Paths::rooted_at(tmp.path())).unwrap();
        let files = collect_candidates(tmp.path(), &exclude).unwrap();
        assert_eq!(files, vec![tmp.path().join("index.json")]);
    }

    #[test]
    fn unreadable_schema_is_a_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SchemaChecker::load(&tmp.path().join("schema.json")).err().unwrap();
        assert!(matches!(err, SchemaError::Load(LoadError::NotFound { .. })));
    }
}
