// imgcrunch/src/utils/mod.rs
use crate::core::types::SUPPORTED_EXTENSIONS;
use crate::core::{CrunchError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TEMP_PREFIX: &str = ".imgcrunch-";
pub const TEMP_SUFFIX: &str = ".tmp";

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}

pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

/// Spaces become underscores; anything but alphanumerics, `-` and `_` is dropped.
pub fn sanitize_rename_base(name: &str) -> String {
    name.trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// `{base}_{index}` padded to at least three digits, wider when the run needs it.
pub fn numbered_name(base: &str, index: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("{}_{:0width$}", base, index, width = width)
}

pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(TEMP_PREFIX))
        .unwrap_or(false)
}

/// Appends `-2`, `-3`, ... to the stem until `taken` rejects nothing.
pub fn unique_path<F>(candidate: PathBuf, mut taken: F) -> PathBuf
where
    F: FnMut(&Path) -> bool,
{
    if !taken(&candidate) {
        return candidate;
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let extension = candidate
        .extension()
        .map(|e| e.to_string_lossy().into_owned());

    let mut counter = 2;
    loop {
        let file_name = match &extension {
            Some(ext) => format!("{}-{}.{}", stem, counter, ext),
            None => format!("{}-{}", stem, counter),
        };
        let next = candidate.with_file_name(file_name);
        if !taken(&next) {
            return next;
        }
        counter += 1;
    }
}

/// Writes `data` to a uniquely named temp file beside `target`, syncs it, then
/// renames it over `target`. Readers only ever see the old or the new file.
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<u64> {
    let dir = target
        .parent()
        .ok_or_else(|| CrunchError::write(target, "destination has no parent directory"))?;

    let mut temp_file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| CrunchError::write(dir, e))?;

    temp_file
        .write_all(data)
        .map_err(|e| CrunchError::write(temp_file.path(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| CrunchError::write(temp_file.path(), e))?;

    temp_file
        .persist(target)
        .map_err(|e| CrunchError::write(target, e.error))?;

    Ok(data.len() as u64)
}
