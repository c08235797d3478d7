//! Desktop notification dispatch (spec.md §6 "Environment" /
//! `SPACESHOT_NOTIFY_PATH`; §7 "Exit codes").
//!
//! `examples/original_source/src/notifications.c` sends notifications
//! in-process via libnotify/glib, only forking to exec `xdg-open` for the
//! notification's "Open" action. This crate instead forks+execs a small
//! external helper binary for the notification itself, the way
//! `examples/original_source/src/notifications.c` already forks+execs for
//! `xdg-open`, so this crate carries no glib/libnotify FFI dependency.

const DEFAULT_HELPER: &str = "spaceshot-notify";
const EXEC_FAILED: i32 = 104;

/// Forks and execs the notification helper, passing the captured output's
/// name as its sole argument. Never fails the caller: all outcomes are
/// logged as warnings (spec.md §7 "Notification helper child's exit code is
/// logged as a warning").
pub fn notify_saved(output_name: &str) {
    let helper = std::env::var("SPACESHOT_NOTIFY_PATH").unwrap_or_else(|_| DEFAULT_HELPER.to_string());

    let child = std::process::Command::new(&helper)
        .arg("Spaceshot")
        .arg(format!("Saved screenshot of {output_name}"))
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(helper, %err, "failed to spawn notification helper");
            return;
        }
    };

    match child.wait() {
        Ok(status) => match status.code() {
            Some(EXEC_FAILED) => tracing::warn!(helper, "notification helper failed to exec"),
            Some(0) => {}
            Some(code) => tracing::warn!(helper, code, "notification helper exited non-zero"),
            None => tracing::warn!(helper, "notification helper terminated by signal"),
        },
        Err(err) => tracing::warn!(helper, %err, "failed to wait for notification helper"),
    }
}
