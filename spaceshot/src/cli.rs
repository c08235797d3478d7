//! Command-line argument parsing (spec.md §6 "CLI surface").
//!
//! Hand-rolled rather than built on `clap`, the way
//! `examples/original_source/src/args.c` hand-rolls `parse_argv`: the mode
//! comes first and determines how many positional parameters follow it,
//! which doesn't map cleanly onto a declarative arg-parser's flat option
//! list.

use crate::error::CliError;

/// The action requested on the command line, before it's turned into a
/// `libspaceshot::coordinator::CaptureMode` (which also needs the config's
/// smart-border/copy defaults merged in).
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Output { name: Option<String> },
    Region { region: Option<String> },
    Defer,
    Help,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    Unset,
    Set(bool),
}

impl Tristate {
    pub fn or(self, default: bool) -> bool {
        match self {
            Tristate::Unset => default,
            Tristate::Set(v) => v,
        }
    }
}

/// Parsed argv, mode plus every option flag (spec.md §6). Option fields are
/// tri-state so the config file's defaults can fill in whatever the command
/// line left unset.
#[derive(Debug, Clone)]
pub struct Args {
    pub mode: Mode,
    pub background: bool,
    pub copy: Tristate,
    pub config_file: Option<String>,
    pub notify: Tristate,
    pub output_file: Option<String>,
    pub verbose: bool,
}

impl Args {
    /// Parses a full argv (program name excluded, i.e. `&args[1..]`).
    pub fn parse<I, S>(argv: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let mut it = argv.into_iter().peekable();

        let mode_word = it.next().ok_or(CliError::MissingMode)?;

        // help/version are legal both as the mode word and as long options;
        // short -h/-v are only recognized among the options that follow a
        // real mode, per spec.md's documented option list.
        let mut mode = match mode_word.as_str() {
            "help" | "--help" => Mode::Help,
            "version" | "--version" => Mode::Version,
            "output" => {
                let name = take_mode_param(&mut it);
                Mode::Output { name }
            }
            "region" => {
                // `region` takes either zero params (interactive) or the
                // two-token `X,Y WxH` pair as one combined string, since the
                // caller may have already NUL-split them on a shell boundary
                // (`region 100,200 300x400`).
                let region = match take_mode_param(&mut it) {
                    None => None,
                    Some(x) => match take_mode_param(&mut it) {
                        Some(y) => Some(format!("{x} {y}")),
                        None => Some(x),
                    },
                };
                Mode::Region { region }
            }
            "defer" => Mode::Defer,
            other => return Err(CliError::InvalidMode(other.to_string())),
        };

        let mut background = false;
        let mut copy = Tristate::Unset;
        let mut config_file = None;
        let mut notify = Tristate::Unset;
        let mut output_file = None;
        let mut verbose = false;

        while let Some(token) = it.next() {
            if !is_option(&token) {
                return Err(CliError::TooManyParams {
                    mode: mode_name(&mode),
                    max: 0,
                });
            }

            if let Some(rest) = token.strip_prefix("--") {
                let (name, inline_value) = match rest.split_once('=') {
                    Some((n, v)) => (n, Some(v.to_string())),
                    None => (rest, None),
                };
                match name {
                    "background" => background = true,
                    "copy" => copy = Tristate::Set(true),
                    "no-copy" => copy = Tristate::Set(false),
                    "config-file" => config_file = Some(require_value(name, inline_value, &mut it)?),
                    "notify" => notify = Tristate::Set(true),
                    "no-notify" => notify = Tristate::Set(false),
                    "output-file" => output_file = Some(require_value(name, inline_value, &mut it)?),
                    "verbose" => verbose = true,
                    "help" => mode = Mode::Help,
                    "version" => mode = Mode::Version,
                    _ => return Err(CliError::UnknownOption(format!("--{name}"))),
                }
                continue;
            }

            // Short-option cluster: `-bc`, `-o foo.png`, `-ofoo.png`. Any
            // option with a value must be the last letter in the cluster.
            let letters = &token[1..];
            let mut chars = letters.chars().peekable();
            while let Some(c) = chars.next() {
                match c {
                    'b' => background = true,
                    'c' => copy = Tristate::Set(true),
                    'n' => notify = Tristate::Set(true),
                    'h' => mode = Mode::Help,
                    'v' => mode = Mode::Version,
                    'C' | 'o' => {
                        let remainder: String = chars.clone().collect();
                        let inline = if remainder.is_empty() { None } else { Some(remainder) };
                        let value = require_value(if c == 'C' { "config-file" } else { "output-file" }, inline, &mut it)?;
                        if c == 'C' {
                            config_file = Some(value);
                        } else {
                            output_file = Some(value);
                        }
                        break;
                    }
                    other => return Err(CliError::UnknownOption(format!("-{other}"))),
                }
            }
        }

        Ok(Args {
            mode,
            background,
            copy,
            config_file,
            notify,
            output_file,
            verbose,
        })
    }
}

fn mode_name(mode: &Mode) -> &'static str {
    match mode {
        Mode::Output { .. } => "output",
        Mode::Region { .. } => "region",
        Mode::Defer => "defer",
        Mode::Help => "help",
        Mode::Version => "version",
    }
}

/// Consumes one positional parameter for the current mode if the next token
/// isn't an option. A leading `-` followed by a digit is a negative region
/// coordinate, not a flag (spec.md §6).
fn take_mode_param(it: &mut std::iter::Peekable<std::vec::IntoIter<String>>) -> Option<String> {
    match it.peek() {
        Some(tok) if !is_option(tok) => it.next(),
        _ => None,
    }
}

fn is_option(token: &str) -> bool {
    token.starts_with('-') && !starts_with_flag_like_negative(token)
}

/// `-5,10` (a negative region coordinate) is not an option: a `-` followed
/// immediately by a digit never starts a flag.
fn starts_with_flag_like_negative(token: &str) -> bool {
    token
        .strip_prefix('-')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

fn require_value(
    name: &str,
    inline: Option<String>,
    it: &mut std::iter::Peekable<std::vec::IntoIter<String>>,
) -> Result<String, CliError> {
    if let Some(v) = inline {
        return Ok(v);
    }
    it.next().ok_or_else(|| CliError::MissingValue(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse(args.iter().map(|s| s.to_string())).unwrap()
    }

    #[test]
    fn output_with_name() {
        let a = parse(&["output", "eDP-1"]);
        assert_eq!(a.mode, Mode::Output { name: Some("eDP-1".to_string()) });
    }

    #[test]
    fn output_without_name() {
        let a = parse(&["output"]);
        assert_eq!(a.mode, Mode::Output { name: None });
    }

    #[test]
    fn region_interactive() {
        let a = parse(&["region"]);
        assert_eq!(a.mode, Mode::Region { region: None });
    }

    #[test]
    fn region_predefined() {
        let a = parse(&["region", "100,200", "300x400"]);
        assert_eq!(a.mode, Mode::Region { region: Some("100,200 300x400".to_string()) });
    }

    #[test]
    fn negative_region_coordinate_is_not_a_flag() {
        let a = parse(&["region", "-5,-10", "300x400"]);
        assert_eq!(a.mode, Mode::Region { region: Some("-5,-10 300x400".to_string()) });
    }

    #[test]
    fn long_option_with_equals() {
        let a = parse(&["output", "--output-file=~/shot.png"]);
        assert_eq!(a.output_file.as_deref(), Some("~/shot.png"));
    }

    #[test]
    fn short_option_cluster_with_trailing_value() {
        let a = parse(&["output", "-bco", "/tmp/out.png"]);
        assert!(a.background);
        assert_eq!(a.copy, Tristate::Set(true));
        assert_eq!(a.output_file.as_deref(), Some("/tmp/out.png"));
    }

    #[test]
    fn short_option_cluster_with_glued_value() {
        let a = parse(&["output", "-o/tmp/out.png"]);
        assert_eq!(a.output_file.as_deref(), Some("/tmp/out.png"));
    }

    #[test]
    fn no_copy_overrides() {
        let a = parse(&["region", "--no-copy"]);
        assert_eq!(a.copy, Tristate::Set(false));
    }

    #[test]
    fn unknown_long_option_is_an_error() {
        let err = Args::parse(["output", "--bogus"].iter().map(|s| s.to_string())).unwrap_err();
        assert!(matches!(err, CliError::UnknownOption(_)));
    }

    #[test]
    fn missing_mode_is_an_error() {
        let err = Args::parse(std::iter::empty::<String>()).unwrap_err();
        assert!(matches!(err, CliError::MissingMode));
    }

    #[test]
    fn help_and_version_modes() {
        assert_eq!(parse(&["help"]).mode, Mode::Help);
        assert_eq!(parse(&["version"]).mode, Mode::Version);
        assert_eq!(parse(&["--help"]).mode, Mode::Help);
    }
}
