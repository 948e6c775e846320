//! Config file location.

use std::path::PathBuf;

use anyhow::{Result, bail};

/// Config file name inside the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Application directory under the XDG config root.
const APP_DIR: &str = "cinegate";

/// Resolves the config file path.
///
/// Checked in order:
/// 1. `{dir}/config.toml` when `--dir` is given.
/// 2. `$XDG_CONFIG_HOME/cinegate/config.toml`.
/// 3. `$HOME/.config/cinegate/config.toml`.
///
/// # Errors
///
/// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set
/// (when `dir` is `None`).
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_with(dir, |name| std::env::var(name).ok())
}

fn resolve_with<F>(dir: Option<&PathBuf>, lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(d) = dir {
        return Ok(d.join(CONFIG_FILE));
    }

    let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
    }
    if let Some(home) = non_empty("HOME") {
        return Ok(PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE));
    }
    bail!("neither XDG_CONFIG_HOME nor HOME is set; pass --dir")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_dir_wins() {
        // Arrange
        let dir = PathBuf::from("/srv/cinegate");

        // Act
        let path = resolve_with(Some(&dir), |_| Some(String::from("/ignored"))).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/srv/cinegate/config.toml"));
    }

    #[test]
    fn test_xdg_before_home() {
        // Arrange
        let lookup = |name: &str| match name {
            "XDG_CONFIG_HOME" => Some(String::from("/xdg")),
            "HOME" => Some(String::from("/home/u")),
            _ => None,
        };

        // Act
        let path = resolve_with(None, lookup).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/xdg/cinegate/config.toml"));
    }

    #[test]
    fn test_home_fallback_skips_empty_xdg() {
        // Arrange
        let lookup = |name: &str| match name {
            "XDG_CONFIG_HOME" => Some(String::new()),
            "HOME" => Some(String::from("/home/u")),
            _ => None,
        };

        // Act
        let path = resolve_with(None, lookup).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/home/u/.config/cinegate/config.toml"));
    }

    #[test]
    fn test_no_home_is_an_error() {
        // Arrange & Act
        let result = resolve_with(None, |_| None);

        // Assert
        assert!(result.unwrap_err().to_string().contains("--dir"));
    }
}
