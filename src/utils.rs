//! Utility functions shared across the daemon.

/// Check if the current process is running as root (UID 0)
///
/// Uses the effective user ID from the OS instead of spawning an external command.
/// This avoids silent failures if `id` is unavailable or fails.
#[must_use]
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn is_root() -> bool {
    // SAFETY: geteuid() is a simple syscall that returns the effective user ID.
    // It has no side effects and always succeeds.
    unsafe { libc::geteuid() == 0 }
}

/// Check if the current process is running as root (UID 0)
///
/// On non-Unix platforms, this always returns `false` because there is no
/// portable concept of a root user.
#[must_use]
#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Converts any `SystemTime` into a local `HH:MM:SS` string.
///
/// Used for log entry timestamps.
#[must_use]
pub fn format_system_time_local(time: std::time::SystemTime) -> String {
    format_system_time_inner(time).unwrap_or_else(|| "00:00:00".to_string())
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn format_system_time_inner(time: std::time::SystemTime) -> Option<String> {
    let secs = time
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .ok()?
        .as_secs();

    // SAFETY: localtime_r writes into our stack-allocated `tm` and is
    // thread-safe (unlike localtime). We pass a valid pointer to both args.
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    // time_t is i64 on most platforms; u64→i64 is safe until year 2262
    #[allow(clippy::cast_possible_wrap)]
    let time_t = secs as libc::time_t;
    let result = unsafe { libc::localtime_r(&time_t, &mut tm) };
    if result.is_null() {
        return None;
    }

    Some(format!(
        "{:02}:{:02}:{:02}",
        tm.tm_hour, tm.tm_min, tm.tm_sec
    ))
}

#[cfg(not(unix))]
fn format_system_time_inner(time: std::time::SystemTime) -> Option<String> {
    // Non-Unix fallback: use current time via shell (ignoring the `time` param)
    let _ = time;
    std::process::Command::new("date")
        .arg("+%H:%M:%S")
        .output()
        .ok()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

/// Sleep for `total`, waking every `slice` to re-check `stop`.
///
/// Returns early (without finishing the full duration) as soon as the
/// stop flag is raised, so timed waits never delay a cancellation by
/// more than one slice.
pub fn sleep_cancellable(
    total: std::time::Duration,
    slice: std::time::Duration,
    stop: &std::sync::atomic::AtomicBool,
) {
    let deadline = std::time::Instant::now() + total;
    while std::time::Instant::now() < deadline {
        if stop.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        std::thread::sleep(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};

    #[test]
    fn test_format_system_time_is_hms() {
        let formatted = format_system_time_local(std::time::SystemTime::now());
        assert_eq!(formatted.len(), 8);
        assert_eq!(formatted.as_bytes()[2], b':');
        assert_eq!(formatted.as_bytes()[5], b':');
    }

    #[test]
    fn test_sleep_cancellable_runs_to_completion() {
        let stop = AtomicBool::new(false);
        let start = Instant::now();
        sleep_cancellable(
            Duration::from_millis(60),
            Duration::from_millis(10),
            &stop,
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_cancellable_returns_early_on_stop() {
        let stop = AtomicBool::new(true);
        let start = Instant::now();
        sleep_cancellable(Duration::from_secs(5), Duration::from_millis(10), &stop);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
