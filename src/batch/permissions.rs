//! Normalizing the permissions of a finished song folder.

use std::io;
use std::path::Path;

/// Mode given to every file of a song folder: owner read-write, group read.
pub const SONG_FILE_MODE: u32 = 0o640;

/// Set every regular file directly inside `folder` to `SONG_FILE_MODE`.
///
/// Returns the number of files changed. A no-op on platforms without Unix modes.
#[cfg(unix)]
pub fn fix_permissions(folder: &Path) -> io::Result<usize> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut changed = 0;
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let mut permissions = entry.metadata()?.permissions();
        if permissions.mode() & 0o777 == SONG_FILE_MODE {
            continue;
        }
        permissions.set_mode(SONG_FILE_MODE);
        fs::set_permissions(entry.path(), permissions)?;
        changed += 1;
    }
    Ok(changed)
}

#[cfg(not(unix))]
pub fn fix_permissions(_folder: &Path) -> io::Result<usize> {
    Ok(0)
}
