use std::any::Any;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::logging::LOG_FILE_PREFIX;

/// Route panics through `tracing` before the default hook runs.
///
/// With `panic = "abort"` the non-blocking file writer may never flush, so
/// the panic line is also appended to today's log file when `log_dir` is set.
pub fn install(log_dir: Option<PathBuf>) {
    let previous_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let message = panic_message(info.payload());
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_default();
        let thread = std::thread::current().name().unwrap_or("<unnamed>").to_string();

        tracing::error!(target: "live_notifier::panic", %thread, %location, "{message}");

        if cfg!(panic = "abort")
            && let Some(dir) = log_dir.as_deref()
        {
            let line = format!(
                "{} PANIC thread={thread} location={location} {message}",
                Local::now().to_rfc3339()
            );
            let _ = append_line(dir, &line);
        }

        previous_hook(info);
    }));
}

fn append_line(log_dir: &Path, line: &str) -> std::io::Result<()> {
    let path = log_dir.join(format!("{LOG_FILE_PREFIX}.{}", Local::now().format("%Y-%m-%d")));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
