//! Shared filesystem utilities for covergate.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`secure_fs`**: Owner-only directories and files for credential material

pub mod atomic_write;
pub mod secure_fs;

pub use atomic_write::{atomic_write, recover_bak_file};
pub use secure_fs::{ensure_owner_only_file, ensure_secure_dir, prepare_secure_path};
