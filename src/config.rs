use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default store file: one shared `marginalia.org` in the working
/// directory, overridable via config or `--store`.
pub fn default_store_path() -> PathBuf {
    PathBuf::from("marginalia.org")
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub store: Option<PathBuf>,
    pub watch: bool,
    pub verbose: bool,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            store: other.store.clone().or_else(|| self.store.clone()),
            watch: self.watch || other.watch,
            verbose: self.verbose || other.verbose,
        }
    }

    /// The store path after applying defaults.
    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(default_store_path)
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("marginalia").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("marginalia")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("marginalia").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("marginalia")
                .join("config");
        }
    }

    PathBuf::from(".marginaliarc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".marginaliarc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# marginalia defaults (saved with --save)".to_string());
    if let Some(store) = &flags.store {
        lines.push(format!("--store {}", store.display()));
    }
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.verbose {
        lines.push("--verbose".to_string());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token == "--watch" {
            flags.watch = true;
        } else if token == "--verbose" {
            flags.verbose = true;
        } else if token == "--store" {
            if let Some(next) = tokens.get(i + 1) {
                flags.store = Some(PathBuf::from(next));
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--store=") {
            flags.store = Some(PathBuf::from(value));
        }
        i += 1;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = vec![
            "marginalia".to_string(),
            "--watch".to_string(),
            "--store".to_string(),
            "notes.org".to_string(),
            "--verbose".to_string(),
            "README.md".to_string(),
        ];
        let flags = parse_flag_tokens(&args);
        assert!(flags.watch);
        assert!(flags.verbose);
        assert_eq!(flags.store, Some(PathBuf::from("notes.org")));
    }

    #[test]
    fn test_parse_store_equals_form() {
        let args = vec!["--store=shared/notes.org".to_string()];
        let flags = parse_flag_tokens(&args);
        assert_eq!(flags.store, Some(PathBuf::from("shared/notes.org")));
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            watch: true,
            store: Some(PathBuf::from("old.org")),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            verbose: true,
            store: Some(PathBuf::from("new.org")),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.verbose);
        assert_eq!(merged.store, Some(PathBuf::from("new.org")));
    }

    #[test]
    fn test_store_path_falls_back_to_default() {
        assert_eq!(ConfigFlags::default().store_path(), default_store_path());
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".marginaliarc");
        let flags = ConfigFlags {
            store: Some(PathBuf::from("notes.org")),
            watch: true,
            verbose: true,
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }
}
