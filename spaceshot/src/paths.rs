//! XDG Pictures directory lookup and output-filename templating (spec.md §6
//! "Output-filename template"). Grounded on
//! `examples/original_source/src/paths.c`'s `xdg_user_dir_lookup_with_fallback`,
//! which is itself a copy of `xdg-user-dirs`' reference lookup.

use std::path::{Path, PathBuf};

use crate::error::FatalError;

/// `$HOME` if set, else the passwd entry's home directory (mirrors
/// `get_home_directory()` in the original).
fn home_directory() -> Option<String> {
    std::env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| dirs::home_dir().map(|p| p.to_string_lossy().into_owned()))
}

/// Finds the user's Pictures directory by reading `user-dirs.dirs`'
/// `XDG_PICTURES_DIR` entry. Fatal if it can't be found (spec.md §6 "fallback
/// absent = error").
pub fn pictures_directory() -> Result<PathBuf, FatalError> {
    xdg_user_dir_lookup("PICTURES").ok_or(FatalError::NoPicturesDirectory)
}

/// Mirrors `xdg_user_dir_lookup_with_fallback(type, NULL)`: reads
/// `$XDG_CONFIG_HOME/user-dirs.dirs` (or `$HOME/.config/user-dirs.dirs`),
/// scanning for a line of the form `XDG_<TYPE>_DIR="$HOME/foo"` or
/// `XDG_<TYPE>_DIR="/abs/path"`.
fn xdg_user_dir_lookup(kind: &str) -> Option<PathBuf> {
    // `$HOME` overrides the passwd entry, exactly as
    // `get_home_directory()` does in the original.
    let home = home_directory()?;
    let config_file = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => Path::new(&dir).join("user-dirs.dirs"),
        _ => Path::new(&home).join(".config/user-dirs.dirs"),
    };

    let contents = std::fs::read_to_string(&config_file).ok()?;
    let needle = format!("XDG_{kind}_DIR");
    let mut found = None;

    for line in contents.lines() {
        let p = line.trim_start_matches([' ', '\t']);
        let Some(p) = p.strip_prefix(&needle) else {
            continue;
        };
        let p = p.trim_start_matches([' ', '\t']);
        let Some(p) = p.strip_prefix('=') else {
            continue;
        };
        let p = p.trim_start_matches([' ', '\t']);
        let Some(mut p) = p.strip_prefix('"') else {
            continue;
        };

        let mut dir = if let Some(rest) = p.strip_prefix("$HOME/") {
            p = rest;
            format!("{home}/")
        } else if p.starts_with('/') {
            String::new()
        } else {
            continue;
        };

        // Copy until the closing quote, honoring backslash escapes, exactly
        // as the C scanner does.
        let mut chars = p.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                break;
            }
            if c == '\\' {
                if let Some(&next) = chars.peek() {
                    dir.push(next);
                    chars.next();
                    continue;
                }
            }
            dir.push(c);
        }
        found = Some(PathBuf::from(dir));
    }

    found
}

/// Default output filename when none was given on the command line:
/// `<Pictures>/%Y-%m-%d-%H%M%S-spaceshot.png`.
pub fn default_output_filename() -> Result<String, FatalError> {
    let pictures = pictures_directory()?;
    let now = chrono::Local::now();
    Ok(format!("{}/{}", pictures.display(), now.format("%Y-%m-%d-%H%M%S-spaceshot.png")))
}

/// What an output-file template resolves to.
pub enum ResolvedOutput {
    Stdout,
    Path(PathBuf),
}

/// Expands a `strftime`-style template with the `~/`/`~~/` prefix
/// substitutions (spec.md §6 "Output-filename template"). `-` as the entire
/// template means stdout.
pub fn resolve_output_template(template: &str) -> Result<ResolvedOutput, FatalError> {
    if template == "-" {
        return Ok(ResolvedOutput::Stdout);
    }

    let expanded = if let Some(rest) = template.strip_prefix("~~/") {
        let pictures = pictures_directory()?;
        format!("{}/{rest}", pictures.display())
    } else if let Some(rest) = template.strip_prefix("~/") {
        let home = home_directory().ok_or(FatalError::NoPicturesDirectory)?;
        format!("{home}/{rest}")
    } else {
        template.to_string()
    };

    let formatted = chrono::Local::now().format(&expanded).to_string();
    Ok(ResolvedOutput::Path(PathBuf::from(formatted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_template_is_dash() {
        assert!(matches!(resolve_output_template("-").unwrap(), ResolvedOutput::Stdout));
    }

    #[test]
    fn home_prefix_expands() {
        // SAFETY: test runs single-threaded within this process; no other
        // thread reads HOME concurrently.
        unsafe { std::env::set_var("HOME", "/home/tester") };
        match resolve_output_template("~/pics/shot.png").unwrap() {
            ResolvedOutput::Path(p) => assert_eq!(p, PathBuf::from("/home/tester/pics/shot.png")),
            ResolvedOutput::Stdout => panic!("expected a path"),
        }
    }

    #[test]
    fn plain_template_has_no_prefix_substitution() {
        match resolve_output_template("/tmp/shot.png").unwrap() {
            ResolvedOutput::Path(p) => assert_eq!(p, PathBuf::from("/tmp/shot.png")),
            ResolvedOutput::Stdout => panic!("expected a path"),
        }
    }
}
