//! Configuration file loading (spec.md §6 "Config directories" / "Config
//! file format"). The INI parser is grounded on
//! `examples/original_source/config/parse.c`'s `config_parse_string`/
//! `parse_line`; the search-path construction is grounded on
//! `examples/original_source/config/config.c`'s `config_get_locations`.

use libspaceshot::capture::{CaptureBackendKind, DEFAULT_BACKEND_PREFERENCE};
use libspaceshot::draw::Rgba;

const DEFAULTS_INI: &str = include_str!("defaults.ini");
const CONFIG_SUBPATH: &str = "spaceshot/config.ini";

/// Settings a config file (or the command line) can influence. Built by
/// parsing `defaults.ini` first, then every discovered config file in
/// priority order, then letting `cli::Args` override whatever was actually
/// passed on the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub output_file: String,
    pub copy_to_clipboard: bool,
    pub notify: bool,
    pub verbose: bool,
    pub background: bool,
    pub smart_border: bool,
    pub border_color: Rgba,
    pub dim_color: Rgba,
    pub backend_preference: Vec<CaptureBackendKind>,
}

impl Default for Config {
    fn default() -> Self {
        // Parsed from `defaults.ini` at `load()` time; this is only a
        // fallback for the (unreachable in practice) case where even the
        // compiled-in defaults fail to parse.
        Self {
            output_file: "~~/%Y-%m-%d-%H%M%S-spaceshot.png".to_string(),
            copy_to_clipboard: false,
            notify: true,
            verbose: false,
            background: false,
            smart_border: false,
            border_color: Rgba::new(255, 255, 255, 255),
            dim_color: Rgba::new(0, 0, 0, 110),
            backend_preference: DEFAULT_BACKEND_PREFERENCE.to_vec(),
        }
    }
}

impl Config {
    /// Loads the compiled-in defaults, then every config file in
    /// `search_locations()`, in order. A missing file is silent; a present
    /// but malformed file emits warnings but never aborts (spec.md §7
    /// "Configuration errors ... warn to stderr, retain prior value").
    pub fn load(extra_file: Option<&str>) -> Self {
        let mut config = Config::default();
        parse_into(&mut config, DEFAULTS_INI);

        for path in search_locations() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                parse_into(&mut config, &contents);
            }
        }

        if let Some(path) = extra_file {
            match std::fs::read_to_string(path) {
                Ok(contents) => parse_into(&mut config, &contents),
                Err(err) => tracing::warn!(path, %err, "couldn't read config file"),
            }
        }

        config
    }
}

/// Config directories from least to most important (spec.md §6 "Config
/// directories"): `$XDG_CONFIG_DIRS` (default `/etc/xdg`, colon-split, read
/// back-to-front so the first-listed directory wins), then
/// `$XDG_CONFIG_HOME` or `$HOME/.config`.
fn search_locations() -> Vec<std::path::PathBuf> {
    let mut dirs: Vec<std::path::PathBuf> = Vec::new();

    let xdg_dirs = std::env::var("XDG_CONFIG_DIRS").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "/etc/xdg".to_string());
    for dir in xdg_dirs.rsplit(':') {
        if !dir.is_empty() {
            dirs.push(std::path::PathBuf::from(dir));
        }
    }

    match std::env::var("XDG_CONFIG_HOME").ok().filter(|s| !s.is_empty()) {
        Some(dir) => dirs.push(std::path::PathBuf::from(dir)),
        None => {
            let home = std::env::var("HOME").ok().filter(|h| !h.is_empty()).map(std::path::PathBuf::from).or_else(dirs::home_dir);
            if let Some(home) = home {
                dirs.push(home.join(".config"));
            }
        }
    }

    dirs.into_iter().map(|dir| dir.join(CONFIG_SUBPATH)).collect()
}

fn parse_into(config: &mut Config, ini: &str) {
    let mut section = String::new();
    for (lineno, raw_line) in ini.lines().enumerate() {
        match parse_line(raw_line) {
            LineResult::Section(name) => section = name,
            LineResult::Entry { key, value } => apply_entry(config, &section, &key, &value),
            LineResult::Blank => {}
            LineResult::Warning(msg) => tracing::warn!(line = lineno + 1, "{msg}"),
            LineResult::Error(msg) => tracing::warn!(line = lineno + 1, "config parse error: {msg}"),
        }
    }
}

enum LineResult {
    Blank,
    Section(String),
    Entry { key: String, value: String },
    Warning(String),
    Error(String),
}

/// Mirrors `parse_line`: trims leading whitespace, recognizes `;`/`#`
/// comments, `[section]` headers, and `key = value` pairs with optional
/// quoting.
fn parse_line(line: &str) -> LineResult {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
        return LineResult::Blank;
    }

    if let Some(rest) = line.strip_prefix('[') {
        let Some(end) = rest.find(']') else {
            return LineResult::Error("unterminated section header".to_string());
        };
        let name = rest[..end].to_string();
        let trailer = rest[end + 1..].trim_start();
        if !trailer.is_empty() && !trailer.starts_with(';') && !trailer.starts_with('#') {
            return LineResult::Warning(format!("trailing text after section header: {trailer:?}"));
        }
        return LineResult::Section(name);
    }

    let Some(eq) = line.find('=') else {
        return LineResult::Error(format!("missing '=' in {line:?}"));
    };
    let key = line[..eq].trim_end().to_string();
    let raw_value = line[eq + 1..].trim_start();

    let (value, warn_trailer) = match raw_value.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let body = &raw_value[1..];
            let Some(close) = body.find(q) else {
                return LineResult::Error("unterminated quoted value".to_string());
            };
            let value = body[..close].to_string();
            let trailer = body[close + 1..].trim_start();
            // Warn only if non-empty, non-comment text follows the
            // terminating quote (the C original's equivalent check is
            // tautologically false due to a logic bug; this is the intended
            // behavior).
            let warn = !trailer.is_empty() && !trailer.starts_with(';') && !trailer.starts_with('#');
            (value, warn)
        }
        _ => {
            let end = raw_value.find([';', '#']).unwrap_or(raw_value.len());
            (raw_value[..end].trim_end().to_string(), false)
        }
    };

    if warn_trailer {
        return LineResult::Warning(format!("trailing text after quoted value for key {key:?}"));
    }

    LineResult::Entry { key, value }
}

fn apply_entry(config: &mut Config, section: &str, key: &str, value: &str) {
    match (section, key) {
        ("general", "output-file") => config.output_file = value.to_string(),
        ("general", "copy") => apply_bool(&mut config.copy_to_clipboard, key, value),
        ("general", "notify") => apply_bool(&mut config.notify, key, value),
        ("general", "verbose") => apply_bool(&mut config.verbose, key, value),
        ("general", "background") => apply_bool(&mut config.background, key, value),
        ("render", "smart-border") => apply_bool(&mut config.smart_border, key, value),
        ("render", "border-color") => apply_color(&mut config.border_color, key, value),
        ("render", "dim-color") => apply_color(&mut config.dim_color, key, value),
        ("general", "backend-preference") => apply_backend_preference(&mut config.backend_preference, value),
        _ => tracing::warn!(section, key, "unknown config key"),
    }
}

fn apply_bool(slot: &mut bool, key: &str, value: &str) {
    match value {
        "true" | "yes" | "1" | "on" => *slot = true,
        "false" | "no" | "0" | "off" => *slot = false,
        other => tracing::warn!(key, other, "invalid boolean value"),
    }
}

/// Parses a comma-separated backend list such as `ext,wlr` (spec.md §4.3's
/// "configured preference list"). An unrecognized entry is warned about and
/// skipped rather than rejecting the whole list; an all-invalid or empty
/// list leaves the previous preference in place.
fn apply_backend_preference(slot: &mut Vec<CaptureBackendKind>, value: &str) {
    let mut parsed = Vec::new();
    for name in value.split(',') {
        match name.trim() {
            "ext" => parsed.push(CaptureBackendKind::Ext),
            "wlr" => parsed.push(CaptureBackendKind::Wlr),
            "" => {}
            other => tracing::warn!(other, "unknown capture backend in backend-preference"),
        }
    }
    if !parsed.is_empty() {
        *slot = parsed;
    }
}

/// Parses `#rrggbbaa` or `#rrggbb` (alpha defaults to opaque).
fn apply_color(slot: &mut Rgba, key: &str, value: &str) {
    let hex = value.trim_start_matches('#');
    let bytes = match hex.len() {
        6 => u32::from_str_radix(hex, 16).ok().map(|v| [(v >> 16) as u8, (v >> 8) as u8, v as u8, 255]),
        8 => u32::from_str_radix(hex, 16).ok().map(|v| [(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]),
        _ => None,
    };
    match bytes {
        Some([r, g, b, a]) => *slot = Rgba::new(r, g, b, a),
        None => tracing::warn!(key, value, "invalid color value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_section_and_entry() {
        let mut config = Config::default();
        parse_into(&mut config, "[general]\noutput-file = \"/tmp/x.png\"\nverbose = true\n");
        assert_eq!(config.output_file, "/tmp/x.png");
        assert!(config.verbose);
    }

    #[test]
    fn comment_leaders_are_ignored() {
        let mut config = Config::default();
        parse_into(&mut config, "; a comment\n# also a comment\n[general]\nverbose = true ; trailing\n");
        assert!(config.verbose);
    }

    #[test]
    fn unquoted_value_strips_trailing_comment() {
        let mut config = Config::default();
        parse_into(&mut config, "[general]\noutput-file = /tmp/y.png # comment\n");
        assert_eq!(config.output_file, "/tmp/y.png");
    }

    #[test]
    fn single_quotes_are_accepted() {
        let mut config = Config::default();
        parse_into(&mut config, "[general]\noutput-file = '/tmp/z.png'\n");
        assert_eq!(config.output_file, "/tmp/z.png");
    }

    #[test]
    fn color_parses_hex() {
        let mut config = Config::default();
        parse_into(&mut config, "[render]\nborder-color = #ff0000ff\n");
        assert_eq!(config.border_color, Rgba::new(255, 0, 0, 255));
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let mut config = Config::default();
        parse_into(&mut config, "[general]\nverbose = true\n");
        parse_into(&mut config, "[general]\nverbose = false\n");
        assert!(!config.verbose);
    }

    #[test]
    fn backend_preference_parses_reversed_order() {
        let mut config = Config::default();
        parse_into(&mut config, "[general]\nbackend-preference = wlr,ext\n");
        assert_eq!(config.backend_preference, vec![CaptureBackendKind::Wlr, CaptureBackendKind::Ext]);
    }

    #[test]
    fn backend_preference_ignores_unknown_entries() {
        let mut config = Config::default();
        parse_into(&mut config, "[general]\nbackend-preference = bogus,ext\n");
        assert_eq!(config.backend_preference, vec![CaptureBackendKind::Ext]);
    }
}
