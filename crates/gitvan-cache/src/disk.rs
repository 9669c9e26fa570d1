//! On-disk storage layout: `<root>/<namespace>/<shard>/<key>.bin`.

use crate::error::CacheResult;
use crate::key::CacheKey;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn entry_path(root: &Path, namespace: &str, key: &CacheKey) -> PathBuf {
    root.join(namespace).join(key.shard_prefix()).join(format!("{}.bin", key.as_hex()))
}

pub fn read(path: &Path) -> CacheResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a temp file in the same directory followed by a rename, so
/// a reader never observes a partially-written entry.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let dir = path.parent().expect("entry path always has a parent");
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(".tmp-{}", uuid_like()));
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn remove(path: &Path) -> CacheResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// All `.bin` file paths under `root/namespace`, used by revalidation.
pub fn list_namespace(root: &Path, namespace: &str) -> CacheResult<Vec<PathBuf>> {
    let ns_dir = root.join(namespace);
    let mut out = Vec::new();
    if !ns_dir.exists() {
        return Ok(out);
    }
    for shard in std::fs::read_dir(&ns_dir)? {
        let shard = shard?;
        if !shard.file_type()?.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(shard.path())? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("bin") {
                out.push(path);
            }
        }
    }
    Ok(out)
}

/// No external uuid dependency needed for a temp file suffix; a
/// monotonic counter plus the process id is unique enough within one
/// cache directory's lifetime.
fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{n}", std::process::id())
}
