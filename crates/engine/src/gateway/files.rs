use std::io::ErrorKind;
use std::path::Path;

use skitz_types::ActionResult;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Write `contents` to `path`, creating parent directories. Returns the path as output.
pub(super) async fn write(path: &Path, contents: &str, create_new: bool) -> ActionResult {
    if let Some(parent) = path.parent()
        && let Err(error) = fs::create_dir_all(parent).await
    {
        return ActionResult::failure(format!("Failed to create {}: {error}", parent.display()));
    }

    let mut options = fs::OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }

    let mut file = match options.open(path).await {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            return ActionResult::failure(format!("{} already exists", path.display()));
        }
        Err(error) => return ActionResult::failure(format!("Failed to open {}: {error}", path.display())),
    };
    if let Err(error) = file.write_all(contents.as_bytes()).await {
        return ActionResult::failure(format!("Failed to write {}: {error}", path.display()));
    }
    if let Err(error) = file.flush().await {
        return ActionResult::failure(format!("Failed to write {}: {error}", path.display()));
    }

    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    ActionResult::ok(path.display().to_string())
}

pub(super) async fn remove(path: &Path) -> ActionResult {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed file");
            ActionResult::ok(path.display().to_string())
        }
        Err(error) if error.kind() == ErrorKind::NotFound => ActionResult::failure(format!("{} does not exist", path.display())),
        Err(error) => ActionResult::failure(format!("Failed to remove {}: {error}", path.display())),
    }
}

/// Read a regular text file, refusing anything larger than `max_bytes`.
pub(super) async fn read(path: &Path, max_bytes: u64) -> ActionResult {
    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return ActionResult::failure(format!("{} does not exist", path.display()));
        }
        Err(error) => return ActionResult::failure(format!("{}: {error}", path.display())),
    };
    if !metadata.is_file() {
        return ActionResult::failure(format!("{} is not a regular file", path.display()));
    }
    if metadata.len() > max_bytes {
        return ActionResult::failure(format!("{} is larger than {max_bytes} bytes", path.display()));
    }

    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(error) => return ActionResult::failure(format!("{}: {error}", path.display())),
    };
    // The file may have grown since the metadata call.
    let mut bytes = Vec::new();
    if let Err(error) = file.take(max_bytes + 1).read_to_end(&mut bytes).await {
        return ActionResult::failure(format!("{}: {error}", path.display()));
    }
    if bytes.len() as u64 > max_bytes {
        return ActionResult::failure(format!("{} is larger than {max_bytes} bytes", path.display()));
    }

    match String::from_utf8(bytes) {
        Ok(text) => {
            debug!(path = %path.display(), bytes = text.len(), "read file");
            ActionResult::ok(text)
        }
        Err(_) => ActionResult::failure(format!("{} is not a text file", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn create_new_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.md");

        let first = write(&path, "# notes\n", true).await;
        assert!(first.success, "{first:?}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# notes\n");

        let second = write(&path, "# other\n", true).await;
        assert!(!second.success);
        assert!(second.message().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# notes\n");
    }

    #[tokio::test]
    async fn remove_reports_missing_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.md");
        std::fs::write(&path, "x").unwrap();

        assert!(remove(&path).await.success);
        assert!(!path.exists());
        assert!(!remove(&path).await.success);
    }

    #[tokio::test]
    async fn read_returns_text_within_the_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("review.py");
        std::fs::write(&path, "print('hi')\n").unwrap();

        let result = read(&path, 1024).await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.output, "print('hi')\n");
    }

    #[tokio::test]
    async fn read_refuses_large_files_and_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(64)).unwrap();

        let too_big = read(&path, 16).await;
        assert!(!too_big.success);
        assert!(too_big.message().contains("larger than 16 bytes"));

        let directory = read(dir.path(), 1024).await;
        assert!(directory.message().contains("not a regular file"));

        let missing = read(&dir.path().join("nope.py"), 1024).await;
        assert!(missing.message().contains("does not exist"));
    }
}
