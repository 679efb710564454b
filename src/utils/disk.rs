use std::path::Path;

use crate::utils::{UpdateError, UpdateResult};

/// Query available disk space at `path`.
///
/// On Unix this uses `statvfs` and reports the blocks available to
/// unprivileged users. On other platforms the check is skipped by
/// reporting `u64::MAX`.
#[cfg(unix)]
pub fn available_disk_space(path: &Path) -> UpdateResult<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        UpdateError::InstallFailure(format!("invalid path for statvfs: {}", path.display()))
    })?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };

    if ret != 0 {
        return Err(UpdateError::Io(std::io::Error::last_os_error()));
    }

    // f_bavail = blocks available to unprivileged users.
    // f_frsize = fundamental file system block size.
    // Explicit bindings: these fields are i32/i64 on macOS, u64 on Linux.
    let bavail: u64 = stat.f_bavail as _;
    let frsize: u64 = stat.f_frsize as _;

    Ok(bavail.saturating_mul(frsize))
}

#[cfg(not(unix))]
pub fn available_disk_space(_path: &Path) -> UpdateResult<u64> {
    Ok(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_space_for_temp_dir() {
        let dir = std::env::temp_dir();
        let space = available_disk_space(&dir).unwrap();
        assert!(space > 0);
    }
}
