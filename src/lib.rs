pub mod agent_core;
pub mod cli;
pub mod commands;
pub mod config;
pub mod inference;
pub mod server;
pub mod telemetry;
pub mod tools;

use config::LoggingConfig;

/// Return the platform-standard data directory for the housing agent.
///
/// - macOS: `~/Library/Application Support/housing-agent/`
/// - Windows: `{FOLDERID_RoamingAppData}\housing-agent\`
/// - Linux: `$XDG_DATA_HOME/housing-agent/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.housing-agent/` only if none of the above can be resolved.
pub fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("housing-agent");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".housing-agent")
}

/// Initialize the tracing subscriber.
///
/// Logs always go to stderr. With `logging.file`, existing logs are rotated
/// (agent.log → agent.log.1 → .2 → .3) and a fresh agent.log in the data
/// directory receives a copy through a line-flushing writer.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("housing_agent=info,warn"));

    let log_path = logging.file.then(|| {
        let log_dir = data_dir();
        let _ = std::fs::create_dir_all(&log_dir);
        log_dir.join("agent.log")
    });

    let file_writer = log_path.as_ref().and_then(|path| {
        rotate_log_file(path, 3);
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(FlushingWriter::new(file)),
            Err(e) => {
                eprintln!("warning: cannot open {}: {e}", path.display());
                None
            }
        }
    });

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    // `try_init` so tests and repeated calls don't panic.
    let result = match (file_writer, logging.json) {
        (Some(file), true) => builder
            .json()
            .with_writer(std::io::stderr.and(file))
            .try_init(),
        (Some(file), false) => builder.with_writer(std::io::stderr.and(file)).try_init(),
        (None, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, false) => builder.with_writer(std::io::stderr).try_init(),
    };
    if result.is_err() {
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %data_dir().display(),
        log_file = log_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        pid = std::process::id(),
        "=== housing-agent starting ==="
    );
}

/// Rotate log files: `agent.log` → `agent.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &std::path::Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so a
/// crash never loses the last log lines.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_log_file_shifts_generations() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("agent.log");
        std::fs::write(&base, "current").unwrap();
        std::fs::write(dir.path().join("agent.log.1"), "one").unwrap();
        std::fs::write(dir.path().join("agent.log.3"), "oldest").unwrap();

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("agent.log.1"), "current");
        assert_eq!(read("agent.log.2"), "one");
        assert!(!dir.path().join("agent.log.3").exists());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"line\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }
}
