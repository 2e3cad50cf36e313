//! On-disk conference records and the id index.
//!
//! Records are kept as raw JSON objects so keys this crate never looks at
//! survive a rewrite in their original order.

use serde_json::{Map, Value};
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use crate::{config::Paths, error::LoadError};

/// Read and parse any JSON file.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json { path: path.to_path_buf(), source })
}

/// `index.json`: every known conference id, in order.
pub fn load_index(path: &Path) -> Result<Vec<String>, LoadError> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json { path: path.to_path_buf(), source })
}

/// `year` of an installment object, if it carries an integer one.
pub fn installment_year(installment: &Value) -> Option<i64> {
    installment.get("year").and_then(Value::as_i64)
}

#[derive(Clone, Debug)]
pub struct Conference {
    pub id: String,
    pub path: PathBuf,
    doc: Map<String, Value>,
}

impl Conference {
    pub fn load(paths: &Paths, id: &str) -> Result<Self, LoadError> {
        Self::from_file(id, paths.conference_file(id))
    }

    pub fn from_file(id: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let doc = match load_json(&path)? {
            Value::Object(map) => map,
            other => {
                return Err(LoadError::Shape { path, message: format!("expected an object, found {}", kind(&other)) });
            }
        };
        match doc.get("installments") {
            None | Some(Value::Array(_)) => {}
            Some(other) => {
                return Err(LoadError::Shape { path, message: format!("`installments` is {}, not an array", kind(other)) });
            }
        }
        Ok(Self { id: id.into(), path, doc })
    }

    pub fn installments(&self) -> &[Value] {
        match self.doc.get("installments") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Position of the first installment for `year`.
    pub fn installment_index(&self, year: i64) -> Option<usize> {
        self.installments().iter().position(|i| installment_year(i) == Some(year))
    }

    pub fn installment(&self, year: i64) -> Option<&Value> {
        self.installment_index(year).map(|ix| &self.installments()[ix])
    }

    /// Non-empty `website` of the installment for `year`.
    pub fn website_for(&self, year: i64) -> Option<&str> {
        self.installment(year)?
            .get("website")
            .and_then(Value::as_str)
            .filter(|w| !w.trim().is_empty())
    }

    /// Swap the installment at `index` in place; every other entry is untouched.
    pub fn replace_installment(&mut self, index: usize, installment: Value) -> Result<(), LoadError> {
        match self.doc.get_mut("installments") {
            Some(Value::Array(items)) if index < items.len() => {
                items[index] = installment;
                Ok(())
            }
            _ => Err(LoadError::Shape {
                path: self.path.clone(),
                message: format!("no installment at position {index}"),
            }),
        }
    }

    /// Years that appear on more than one installment.
    pub fn duplicate_years(&self) -> Vec<i64> {
        duplicate_years(self.installments())
    }

    /// Two-space pretty JSON with a trailing newline.
    pub fn to_pretty_string(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(&self.doc)?;
        text.push('\n');
        Ok(text)
    }

    pub fn save(&self) -> Result<(), LoadError> {
        let text = self.to_pretty_string()
            .map_err(|source| LoadError::Json { path: self.path.clone(), source })?;
        fs::write(&self.path, text).map_err(|e| LoadError::io(&self.path, e))
    }
}

pub(crate) fn duplicate_years(installments: &[Value]) -> Vec<i64> {
    let mut seen = BTreeMap::<i64, usize>::new();
    for year in installments.iter().filter_map(installment_year) {
        *seen.entry(year).or_default() += 1;
    }
    seen.into_iter().filter(|(_, n)| *n > 1).map(|(y, _)| y).collect()
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
  "id": "chi",
  "name": "Conférence CHI",
  "installments": [
    {
      "year": 2023,
      "website": "https://chi2023.acm.org",
      "dates": {
        "Paper Deadline": "2022-09-15"
      }
    },
    {
      "year": 2024,
      "website": "https://chi2024.acm.org",
      "dates": {
        "Paper Deadline": "2023-09-14"
      }
    }
  ]
}
"#;

    fn write_sample(dir: &Path) -> Conference {
        let path = dir.join("chi.json");
        fs::write(&path, SAMPLE).unwrap();
        Conference::from_file("chi", path).unwrap()
    }

    #[test]
    fn finds_installment_and_website_by_year() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = write_sample(tmp.path());
        assert_eq!(conf.installment_index(2024), Some(1));
        assert_eq!(conf.website_for(2023), Some("https://chi2023.acm.org"));
        assert!(conf.installment(2025).is_none());
        assert!(conf.website_for(2025).is_none());
    }

    #[test]
    fn blank_website_counts_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.json");
        fs::write(&path, r#"{"installments":[{"year":2025,"website":""}]}"#).unwrap();
        let conf = Conference::from_file("x", path).unwrap();
        assert!(conf.installment(2025).is_some());
        assert!(conf.website_for(2025).is_none());
    }

    #[test]
    fn unchanged_record_round_trips_byte_for_byte() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = write_sample(tmp.path());
        conf.save().unwrap();
        assert_eq!(fs::read_to_string(&conf.path).unwrap(), SAMPLE);
    }

    #[test]
    fn replacing_one_installment_keeps_order_and_neighbours() {
        let tmp = tempfile::tempdir().unwrap();
        let mut conf = write_sample(tmp.path());
        let before_2023 = conf.installments()[0].clone();
        let proposal = json!({
            "year": 2024,
            "website": "https://chi2024.acm.org",
            "dates": { "Paper Deadline": "2023-09-15", "Author Notification": "2023-12-08" }
        });
        conf.replace_installment(1, proposal.clone()).unwrap();
        conf.save().unwrap();

        let reread = Conference::from_file("chi", &conf.path).unwrap();
        assert_eq!(reread.installments().len(), 2);
        assert_eq!(reread.installments()[0], before_2023);
        assert_eq!(reread.installments()[1], proposal);
        let text = fs::read_to_string(&conf.path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("Conférence"));
    }

    #[test]
    fn replace_out_of_range_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut conf = write_sample(tmp.path());
        assert!(matches!(conf.replace_installment(9, json!({})), Err(LoadError::Shape { .. })));
    }

    #[test]
    fn load_errors_are_distinguished() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = Conference::from_file("nope", tmp.path().join("nope.json"));
        assert!(matches!(missing, Err(LoadError::NotFound { .. })));

        let bad = tmp.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(Conference::from_file("bad", &bad), Err(LoadError::Json { .. })));

        let arr = tmp.path().join("arr.json");
        fs::write(&arr, "[]").unwrap();
        assert!(matches!(Conference::from_file("arr", &arr), Err(LoadError::Shape { .. })));
    }

    #[test]
    fn reports_duplicate_years() {
        let items = vec![json!({"year": 2023}), json!({"year": 2024}), json!({"year": 2023})];
        assert_eq!(duplicate_years(&items), vec![2023]);
        assert!(duplicate_years(&items[..2]).is_empty());
    }

    #[test]
    fn index_is_a_list_of_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.json");
        fs::write(&path, r#"["chi", "uist"]"#).unwrap();
        assert_eq!(load_index(&path).unwrap(), vec!["chi".to_string(), "uist".to_string()]);
    }
}
