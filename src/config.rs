use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}, time::Duration};
use tracing::{debug, warn};

/// Config is merged: system -> user -> workspace -> explicit file -> runtime (CLI flags)
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub validate: ValidateConfig,
    pub fetch: FetchConfig,
    pub model: ModelTarget,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,   // defaults to <data_dir>/source
    pub prompts_dir: Option<PathBuf>,  // defaults to <data_dir>/prompts
    pub schema: Option<PathBuf>,       // defaults to <data_dir>/schema.json
    pub index: Option<PathBuf>,        // defaults to <data_dir>/index.json
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ValidateConfig {
    /// File-name globs skipped when scanning the data directory.
    /// Empty means the schema and index file names.
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl FetchConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS))
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone()
            .unwrap_or_else(|| concat!("confdata/", env!("CARGO_PKG_VERSION")).to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ModelTarget {
    pub name: Option<String>,                    // e.g. "gpt-4o-mini"
    pub base_url: Option<String>,                // e.g. "https://api.openai.com/v1"
    pub api_key_env: Option<String>,             // e.g. "OPENAI_API_KEY" (looked up at call time)
    pub extra_headers: BTreeMap<String, String>, // per-provider headers if needed
    pub timeout_secs: Option<u64>,               // unset: wait for the model indefinitely
}

impl ModelTarget {
    pub const DEFAULT_NAME: &'static str = "gpt-4o-mini";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    pub fn name(&self) -> &str { self.name.as_deref().unwrap_or(Self::DEFAULT_NAME) }
    pub fn base_url(&self) -> &str { self.base_url.as_deref().unwrap_or(Self::DEFAULT_BASE_URL) }
    pub fn api_key_env(&self) -> &str { self.api_key_env.as_deref().unwrap_or(Self::DEFAULT_API_KEY_ENV) }
}

/// Concrete locations for one run, resolved from [`PathsConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub source_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub schema_file: PathBuf,
    pub index_file: PathBuf,
}

impl Paths {
    /// Default layout rooted at `data_dir`.
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            source_dir: data_dir.join("source"),
            prompts_dir: data_dir.join("prompts"),
            schema_file: data_dir.join("schema.json"),
            index_file: data_dir.join("index.json"),
            data_dir,
        }
    }

    pub fn conference_file(&self, conference_id: &str) -> PathBuf {
        self.data_dir.join(format!("{conference_id}.json"))
    }

    pub fn source_file(&self, year: i64, conference_id: &str) -> PathBuf {
        self.source_dir.join(year.to_string()).join(format!("{conference_id}.html"))
    }

    pub fn prompts_year_dir(&self, year: i64) -> PathBuf {
        self.prompts_dir.join(year.to_string())
    }
}

impl Config {
    pub fn paths(&self) -> Paths {
        let p = &self.paths;
        let data_dir = p.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut paths = Paths::rooted_at(data_dir);
        if let Some(d) = &p.source_dir { paths.source_dir = d.clone(); }
        if let Some(d) = &p.prompts_dir { paths.prompts_dir = d.clone(); }
        if let Some(f) = &p.schema { paths.schema_file = f.clone(); }
        if let Some(f) = &p.index { paths.index_file = f.clone(); }
        paths
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope { System, User, Workspace, Explicit }

fn merge(a: &mut Config, b: &Config) {
    macro_rules! ov { ($dst:expr, $src:expr) => { if $src.is_some() { $dst = $src.clone(); } } }

    // paths
    ov!(a.paths.data_dir, b.paths.data_dir);
    ov!(a.paths.source_dir, b.paths.source_dir);
    ov!(a.paths.prompts_dir, b.paths.prompts_dir);
    ov!(a.paths.schema, b.paths.schema);
    ov!(a.paths.index, b.paths.index);

    // validate
    if !b.validate.exclude.is_empty() { a.validate.exclude = b.validate.exclude.clone(); }

    // fetch
    ov!(a.fetch.timeout_secs, b.fetch.timeout_secs);
    ov!(a.fetch.user_agent, b.fetch.user_agent);

    // model
    ov!(a.model.name, b.model.name);
    ov!(a.model.base_url, b.model.base_url);
    ov!(a.model.api_key_env, b.model.api_key_env);
    ov!(a.model.timeout_secs, b.model.timeout_secs);
    for (k, v) in &b.model.extra_headers { a.model.extra_headers.insert(k.clone(), v.clone()); }
}

/// Loads and layers the config files for one run.
#[derive(Clone, Debug)]
pub struct ConfigManager {
    layers: Vec<(Scope, PathBuf)>,
    runtime_overlay: Config,
    merged: Config,
}

impl ConfigManager {
    /// `workspace_root` is the data directory; `explicit` is a `--config` file.
    pub fn load(workspace_root: impl AsRef<Path>, explicit: Option<&Path>, runtime: Config) -> Result<Self> {
        let mut layers = Vec::new();
        let system = if cfg!(target_os = "windows") {
            PathBuf::from(r"C:\ProgramData\confdata\config.toml")
        } else {
            PathBuf::from("/etc/confdata/config.toml")
        };
        layers.push((Scope::System, system));
        if let Some(proj) = ProjectDirs::from("org", "confdata", "confdata") {
            layers.push((Scope::User, proj.config_dir().join("config.toml")));
        }
        layers.push((Scope::Workspace, workspace_root.as_ref().join(".confdata").join("config.toml")));
        if let Some(path) = explicit {
            if !path.is_file() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            layers.push((Scope::Explicit, path.to_path_buf()));
        }
        let mut me = Self { layers, runtime_overlay: runtime, merged: Config::default() };
        me.reload_all()?;
        Ok(me)
    }

    fn read_file(scope: Scope, path: &Path) -> Result<Option<Config>> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let cfg: Config = toml::from_str(&text).with_context(|| format!("parse {:?} config {}", scope, path.display()))?;
        Ok(Some(cfg))
    }

    pub fn reload_all(&mut self) -> Result<()> {
        let mut merged = Config::default();
        for (scope, path) in &self.layers {
            match Self::read_file(*scope, path) {
                Ok(Some(cfg)) => {
                    debug!(?scope, path = %path.display(), "config layer loaded");
                    merge(&mut merged, &cfg);
                }
                Ok(None) => {}
                // --config must parse; ambient layers may be skipped.
                Err(e) if *scope == Scope::Explicit => return Err(e),
                Err(e) => warn!("skipping config layer: {e:#}"),
            }
        }
        merge(&mut merged, &self.runtime_overlay);
        self.merged = merged;
        Ok(())
    }

    pub fn get(&self) -> &Config { &self.merged }

    pub fn apply_runtime_overlay(&mut self, patch: Config) -> Result<()> {
        merge(&mut self.runtime_overlay, &patch);
        self.reload_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_with_data_dir(dir: &Path) -> Config {
        let mut rt = Config::default();
        rt.paths.data_dir = Some(dir.to_path_buf());
        rt
    }

    #[test]
    fn default_layout_hangs_off_data_dir() {
        let paths = Paths::rooted_at("/data");
        assert_eq!(paths.source_dir, PathBuf::from("/data/source"));
        assert_eq!(paths.prompts_dir, PathBuf::from("/data/prompts"));
        assert_eq!(paths.schema_file, PathBuf::from("/data/schema.json"));
        assert_eq!(paths.index_file, PathBuf::from("/data/index.json"));
        assert_eq!(paths.source_file(2025, "chi"), PathBuf::from("/data/source/2025/chi.html"));
        assert_eq!(paths.conference_file("chi"), PathBuf::from("/data/chi.json"));
    }

    #[test]
    fn later_layers_override_only_set_fields() {
        let mut base = Config::default();
        base.fetch.timeout_secs = Some(10);
        base.model.name = Some("a".into());
        let mut patch = Config::default();
        patch.model.name = Some("b".into());
        merge(&mut base, &patch);
        assert_eq!(base.fetch.timeout_secs, Some(10));
        assert_eq!(base.model.name(), "b");
    }

    #[test]
    fn workspace_file_is_layered_under_runtime_overlay() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join(".confdata");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("config.toml"), "[fetch]\ntimeout_secs = 5\n[model]\nname = \"from-file\"\n").unwrap();

        let mut rt = runtime_with_data_dir(tmp.path());
        rt.model.name = Some("from-cli".into());
        let cm = ConfigManager::load(tmp.path(), None, rt).unwrap();
        let cfg = cm.get();
        assert_eq!(cfg.fetch.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.model.name(), "from-cli");
        assert_eq!(cfg.paths().data_dir, tmp.path());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(ConfigManager::load(tmp.path(), Some(&missing), Config::default()).is_err());
    }
}
