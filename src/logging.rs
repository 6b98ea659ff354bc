use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Where log records go
pub enum LogTarget {
    Stderr,
    /// Keeps the alternate screen clean in interactive mode
    File(PathBuf),
}

pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("netglobe")
        .join("netglobe.log")
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global logger. `RUST_LOG` overrides the default level.
pub fn init(verbose: bool, target: LogTarget) -> io::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let LogTarget::File(path) = &target {
        let file = open_log_file(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        builder.write_style(env_logger::WriteStyle::Never);
    }

    // A logger may already be installed by a test harness
    let _ = builder.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_path_is_namespaced() {
        let path = default_log_path();
        assert!(path.ends_with("netglobe/netglobe.log"));
    }

    #[test]
    fn log_file_and_parents_are_created() {
        let dir = std::env::temp_dir().join(format!("netglobe-log-{}", std::process::id()));
        let path = dir.join("nested").join("test.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
