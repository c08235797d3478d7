//! The `spaceshot` binary: argument parsing, config loading, path
//! templating and notification dispatch around `libspaceshot`'s capture
//! engine (spec.md §1 "Out of scope (external collaborators)").

mod cli;
mod config;
mod error;
mod notify;
mod paths;

use std::io::Write;

use libspaceshot::bbox::BBox;
use libspaceshot::coordinator::{CaptureMode, Coordinator, OutputSink, RenderConfig};

use cli::{Args, Mode};
use error::{CliError, FatalError};

const USAGE: &str = "\
usage: spaceshot <mode> [mode-args] [options]

modes:
  output [name]              capture a whole output, or every output if name is omitted
  region [X,Y WxH]           capture a predefined region, or pick one interactively
  defer                      capture now, apply a mode read from stdin later
  help                       print this message
  version                    print the version

options:
  -b, --background           detach from the terminal once capture begins
  -c, --copy                 offer the result on the clipboard
      --no-copy              don't offer the result on the clipboard
  -C, --config-file <path>   load an additional config file
  -n, --notify               send a desktop notification
      --no-notify            don't send a desktop notification
  -o, --output-file <path>   output filename template (strftime pattern)
      --verbose              enable verbose logging
  -h, --help                 print this message
  -v, --version              print the version
";

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    match run(argv) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let program = std::env::args().next().unwrap_or_else(|| "spaceshot".to_string());
            if let FatalError::Cli(_) = &err {
                eprint!("{USAGE}");
            }
            eprintln!("{program}: {err}");
            std::process::exit(1);
        }
    }
}

fn run(argv: Vec<String>) -> Result<i32, FatalError> {
    let args = Args::parse(argv)?;

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match args.mode {
        Mode::Help => {
            print!("{USAGE}");
            return Ok(0);
        }
        Mode::Version => {
            println!("spaceshot {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        _ => {}
    }

    let config = config::Config::load(args.config_file.as_deref());

    let copy_to_clipboard = args.copy.or(config.copy_to_clipboard);
    let notify_enabled = args.notify.or(config.notify);
    let background = args.background || config.background;
    let output_template = args.output_file.clone().unwrap_or_else(|| config.output_file.clone());

    let render_config = RenderConfig {
        border_color: config.border_color,
        dim_color: config.dim_color,
        smart_border: config.smart_border,
    };

    let mode = mode_from_args(&args)?;
    let is_defer = matches!(mode, CaptureMode::Defer);

    let sink = Box::new(FileSink {
        output_template,
        notify_enabled,
    });

    let (mut coordinator, event_queue) =
        Coordinator::connect(mode, render_config, copy_to_clipboard, background, &config.backend_preference, sink)?;
    let qh = event_queue.handle();

    let picker_only = std::env::var("SPACESHOT_PICKER_ONLY").ok();
    coordinator.capture_all(picker_only.as_deref());
    coordinator.dispatch_captures(&qh)?;

    if is_defer {
        run_defer_handshake(&mut coordinator, &qh)?;
    }

    Ok(coordinator.run(event_queue)?)
}

/// Turns parsed CLI arguments into the capture mode the coordinator expects
/// (spec.md §4.9 "Mode-specific action per matching output").
fn mode_from_args(args: &Args) -> Result<CaptureMode, CliError> {
    match &args.mode {
        Mode::Output { name } => Ok(CaptureMode::WholeOutput { name: name.clone() }),
        Mode::Region { region: None } => Ok(CaptureMode::InteractiveRegion),
        Mode::Region { region: Some(s) } => {
            let bbox = BBox::parse(s).ok_or(CliError::InvalidRegion)?;
            Ok(CaptureMode::PredefinedRegion { bbox: Some(bbox) })
        }
        Mode::Defer => Ok(CaptureMode::Defer),
        Mode::Help | Mode::Version => unreachable!("handled before mode_from_args is called"),
    }
}

/// Implements the defer handshake (spec.md §4.9 "Defer protocol"): print
/// `ready\n`, read a NUL-separated argv from stdin to EOF, parse it as a new
/// (non-defer) mode, and re-dispatch every already-captured image against
/// it.
fn run_defer_handshake(coordinator: &mut Coordinator, qh: &wayland_client::QueueHandle<Coordinator>) -> Result<(), FatalError> {
    println!("ready");
    std::io::stdout().flush().map_err(FatalError::Io)?;

    let mut raw = Vec::new();
    std::io::Read::read_to_end(&mut std::io::stdin(), &mut raw).map_err(FatalError::Io)?;

    let mut parts: Vec<String> = raw
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    if let Some(last) = parts.last_mut() {
        if last.ends_with('\n') {
            last.pop();
        }
    }

    let deferred = Args::parse(parts)?;
    let mode = mode_from_args(&deferred)?;
    coordinator.redispatch_deferred(mode, qh)?;
    Ok(())
}

/// Wires captured images to disk (or stdout) and to the notification
/// helper; the only `OutputSink` the binary ships (spec.md §1 "external
/// collaborators").
struct FileSink {
    output_template: String,
    notify_enabled: bool,
}

impl OutputSink for FileSink {
    fn save(&mut self, _output_name: &str, png: &[u8]) -> std::io::Result<()> {
        match paths::resolve_output_template(&self.output_template) {
            Ok(paths::ResolvedOutput::Stdout) => {
                std::io::stdout().write_all(png)?;
            }
            Ok(paths::ResolvedOutput::Path(path)) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, png)?;
            }
            Err(err) => {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()));
            }
        }
        Ok(())
    }

    fn notify(&mut self, output_name: &str) {
        if self.notify_enabled {
            notify::notify_saved(output_name);
        }
    }
}
