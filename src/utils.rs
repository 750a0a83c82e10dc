use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};

const ARTIFACT_DIR_NAME: &str = "smhi_forecast";

/// `<data dir>/smhi_forecast`, or `./smhi_forecast` when the platform has no data dir.
pub fn default_artifact_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join(ARTIFACT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(ARTIFACT_DIR_NAME))
}

pub fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Artifact path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("Creating artifact directory: {}", path.display());
            std::fs::create_dir_all(path)
        }
        Err(e) => Err(e),
    }
}

/// Creates a directory below `parent` that no other run uses.
///
/// `create_dir` fails on an existing path, so two runs started in the same second
/// end up in `run-<timestamp>` and `run-<timestamp>-1`.
pub fn create_run_dir(parent: &Path) -> io::Result<PathBuf> {
    ensure_dir_exists(parent)?;
    let stem = format!("run-{}", Local::now().format("%Y%m%d-%H%M%S"));
    for n in 0..1000 {
        let candidate = if n == 0 {
            parent.join(&stem)
        } else {
            parent.join(format!("{stem}-{n}"))
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("No free run directory below {}", parent.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_dirs_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let first = create_run_dir(dir.path()).unwrap();
        let second = create_run_dir(dir.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }

    #[test]
    fn ensure_dir_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_dir_exists(&file).is_err());
        let nested = dir.path().join("a/b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
