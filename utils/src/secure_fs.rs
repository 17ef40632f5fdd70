//! Owner-only directories and files for credential material.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// Create `path` (and parents) and tighten it to 0o700 if it is ours and
/// group/world accessible.
pub fn ensure_secure_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let metadata = std::fs::metadata(path)?;

        // SAFETY: getuid has no preconditions and cannot fail.
        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() != our_uid {
            tracing::debug!(path = %path.display(), "Directory owned by another user; leaving mode as-is");
            return Ok(());
        }

        let current_mode = metadata.permissions().mode() & 0o777;
        if current_mode & 0o077 != 0 {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
        }
    }
    Ok(())
}

/// Create `path` if missing and force 0o600 on Unix. Never truncates.
pub fn ensure_owner_only_file(path: &Path) -> io::Result<()> {
    if !path.exists() {
        let mut opts = OpenOptions::new();
        opts.create(true).truncate(false).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let _file = opts.open(path)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Secure the parent directory of `path` without creating the file itself.
pub fn prepare_secure_path(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_secure_dir(parent),
        _ => Ok(()),
    }
}
