use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

use crate::execution::Mode;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    /// Defaults, then `~/.config/mathpad/.mathpadrc`, then environment.
    pub fn load() -> Self {
        let mut cfg = Self::from_path(&default_config_path());
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                cfg.inner.insert(k, v);
            }
        }
        cfg
    }

    /// Defaults overlaid with the rc file at `path`, without reading the
    /// environment.
    pub fn from_path(path: &Path) -> Self {
        let mut map = default_map();
        if let Ok(file) = fs::File::open(path) {
            let reader = BufReader::new(file);
            for line in reader.lines().map_while(Result::ok) {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((k, v)) = line.split_once('=') {
                    map.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
        }
        Self { inner: map, config_path: path.to_path_buf() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.parse::<u32>().ok())
    }

    /// Mode used when the command line does not name one.
    pub fn default_mode(&self) -> Mode {
        self.get("DEFAULT_MODE")
            .and_then(|m| m.parse().ok())
            .unwrap_or(Mode::Numerical)
    }
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or MATHPAD_*/OPENAI_* for forward-compat
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "DEFAULT_MODE",
        "MAX_TOKENS",
        "PRETTIFY_MARKDOWN",
        "SHOW_CODE",
    ];

    KEYS.contains(&k) || k.starts_with("MATHPAD_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("mathpad").join(".mathpadrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Numbers
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("MAX_TOKENS".into(), "2048".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("DEFAULT_MODE".into(), "numerical".into());
    m.insert("API_BASE_URL".into(), "default".into());

    // Bools as strings
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());
    m.insert("SHOW_CODE".into(), "true".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rc_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "DEFAULT_MODE = symbolic").unwrap();
        writeln!(file, "MAX_TOKENS=512").unwrap();
        writeln!(file, "not a pair").unwrap();

        let cfg = Config::from_path(file.path());
        assert_eq!(cfg.default_mode(), Mode::Symbolic);
        assert_eq!(cfg.get_u32("MAX_TOKENS"), Some(512));
        assert!(cfg.get_bool("SHOW_CODE"));
        assert_eq!(cfg.get("DEFAULT_MODEL").as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::from_path(&dir.path().join("absent"));
        assert_eq!(cfg.default_mode(), Mode::Numerical);
        assert_eq!(cfg.get_u32("REQUEST_TIMEOUT"), Some(60));
    }

    #[test]
    fn bad_mode_falls_back() {
        let mut cfg = Config::from_path(Path::new("/nonexistent/.mathpadrc"));
        cfg.set("DEFAULT_MODE", "quantum");
        assert_eq!(cfg.default_mode(), Mode::Numerical);
    }

    #[test]
    fn key_filter() {
        assert!(is_config_key("SHOW_CODE"));
        assert!(is_config_key("MATHPAD_THEME"));
        assert!(!is_config_key("HOME"));
    }
}
