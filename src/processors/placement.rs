// imgcrunch/src/processors/placement.rs
use crate::core::processor::Transformed;
use crate::core::types::{OriginalDisposition, Placement, WorkItem};
use crate::core::{CrunchError, OutputMode, Result};
use crate::processors::planner::Plan;
use crate::utils::{atomic_write, unique_path};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Puts converted bytes where the output mode says they belong.
pub struct OutputManager {
    mode: OutputMode,
    originals_dir: Option<PathBuf>,
}

impl OutputManager {
    pub fn new(mode: OutputMode, originals_dir: Option<PathBuf>) -> Self {
        Self {
            mode,
            originals_dir,
        }
    }

    pub fn for_plan(mode: OutputMode, plan: &Plan) -> Self {
        Self::new(mode, plan.originals_dir.clone())
    }

    pub fn place(&self, item: &WorkItem, transformed: Transformed) -> Result<Placement> {
        let (bytes_written, original) = match self.mode {
            OutputMode::Keep => self.place_keep(item, &transformed.bytes)?,
            OutputMode::Replace => self.place_replace(item, &transformed.bytes)?,
        };

        log::info!(
            "{} -> {} ({}x{} -> {}x{})",
            item.source.path.display(),
            item.destination.display(),
            transformed.original_dimensions.0,
            transformed.original_dimensions.1,
            transformed.dimensions.0,
            transformed.dimensions.1
        );

        Ok(Placement {
            final_path: item.destination.clone(),
            bytes_written,
            input_bytes: transformed.input_bytes,
            original_dimensions: transformed.original_dimensions,
            dimensions: transformed.dimensions,
            original,
        })
    }

    fn place_keep(&self, item: &WorkItem, bytes: &[u8]) -> Result<(u64, OriginalDisposition)> {
        if let Some(parent) = item.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| CrunchError::write(parent, e))?;
        }

        // The original is only touched once the converted file is durable.
        let written = atomic_write(&item.destination, bytes)?;

        let disposition = match &self.originals_dir {
            Some(originals_dir) => {
                match move_original(&item.source.path, &originals_dir.join(&item.source.relative)) {
                    Ok(moved_to) => OriginalDisposition::Moved(moved_to),
                    Err(e) => {
                        log::warn!(
                            "Could not move {} to originals: {}",
                            item.source.path.display(),
                            e
                        );
                        OriginalDisposition::Kept
                    }
                }
            }
            None => OriginalDisposition::Kept,
        };

        Ok((written, disposition))
    }

    fn place_replace(&self, item: &WorkItem, bytes: &[u8]) -> Result<(u64, OriginalDisposition)> {
        let written = atomic_write(&item.destination, bytes)?;

        if item.destination != item.source.path {
            if let Err(e) = fs::remove_file(&item.source.path) {
                log::warn!(
                    "Converted {} but could not remove the original: {}",
                    item.destination.display(),
                    e
                );
                return Ok((written, OriginalDisposition::Kept));
            }
        }

        Ok((written, OriginalDisposition::Replaced))
    }
}

/// Claims a free slot with `create_new` before renaming into it, so two
/// workers can never pick the same name and clobber each other.
fn move_original(source: &Path, target: &Path) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| CrunchError::write(parent, e))?;
    }

    let mut reserve_error = None;
    let slot = unique_path(target.to_path_buf(), |candidate| {
        match OpenOptions::new().write(true).create_new(true).open(candidate) {
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => true,
            Err(e) => {
                reserve_error = Some(e);
                false
            }
        }
    });
    if let Some(e) = reserve_error {
        return Err(CrunchError::write(&slot, e));
    }

    // Renaming over our own empty reservation.
    if let Err(e) = fs::rename(source, &slot) {
        let _ = fs::remove_file(&slot);
        return Err(CrunchError::write(source, e));
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SourceFile, SourceFormat};
    use crate::core::ErrorKind;

    fn transformed(bytes: &[u8]) -> Transformed {
        Transformed {
            bytes: bytes.to_vec(),
            input_bytes: 8,
            original_dimensions: (10, 10),
            dimensions: (5, 5),
            exif_embedded: false,
        }
    }

    fn item(root: &Path, relative: &str, destination: PathBuf) -> WorkItem {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"original").unwrap();
        WorkItem {
            source: SourceFile {
                path,
                relative: PathBuf::from(relative),
                format: SourceFormat::Png,
                ordinal: 1,
            },
            destination,
        }
    }

    #[test]
    fn keep_mode_writes_then_moves_original() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let work = item(root, "sub/a.png", root.join("converted/sub/a.jpg"));
        let manager = OutputManager::new(OutputMode::Keep, Some(root.join("originals")));

        let placement = manager.place(&work, transformed(b"jpeg")).unwrap();

        assert_eq!(fs::read(root.join("converted/sub/a.jpg")).unwrap(), b"jpeg");
        assert_eq!(
            placement.original,
            OriginalDisposition::Moved(root.join("originals/sub/a.png"))
        );
        assert_eq!(fs::read(root.join("originals/sub/a.png")).unwrap(), b"original");
        assert!(!work.source.path.exists());
        assert!(placement.resized());
        assert_eq!(placement.bytes_written, 4);
    }

    #[test]
    fn keep_mode_without_move_leaves_original() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let work = item(root, "a.png", root.join("converted/a.jpg"));
        let manager = OutputManager::new(OutputMode::Keep, None);

        let placement = manager.place(&work, transformed(b"jpeg")).unwrap();

        assert_eq!(placement.original, OriginalDisposition::Kept);
        assert_eq!(fs::read(&work.source.path).unwrap(), b"original");
    }

    #[test]
    fn failed_destination_write_keeps_original_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("converted"), b"a file where a folder should be").unwrap();
        let work = item(root, "a.png", root.join("converted/a.jpg"));
        let manager = OutputManager::new(OutputMode::Keep, Some(root.join("originals")));

        let err = manager.place(&work, transformed(b"jpeg")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(fs::read(&work.source.path).unwrap(), b"original");
        assert!(!root.join("originals").exists());
    }

    #[test]
    fn occupied_originals_slot_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("originals")).unwrap();
        fs::write(root.join("originals/a.png"), b"older run").unwrap();
        let work = item(root, "a.png", root.join("converted/a.jpg"));
        let manager = OutputManager::new(OutputMode::Keep, Some(root.join("originals")));

        let placement = manager.place(&work, transformed(b"jpeg")).unwrap();

        assert_eq!(
            placement.original,
            OriginalDisposition::Moved(root.join("originals/a-2.png"))
        );
        assert_eq!(fs::read(root.join("originals/a.png")).unwrap(), b"older run");
    }

    #[test]
    fn replace_mode_swaps_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let path = root.join("a.jpg");
        let work = item(root, "a.jpg", path.clone());
        let manager = OutputManager::new(OutputMode::Replace, None);

        let placement = manager.place(&work, transformed(b"converted")).unwrap();

        assert_eq!(placement.original, OriginalDisposition::Replaced);
        assert_eq!(fs::read(&path).unwrap(), b"converted");
        assert_eq!(fs::read_dir(root).unwrap().count(), 1);
    }

    #[test]
    fn concurrent_moves_never_share_an_originals_slot() {
        for round in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            fs::create_dir_all(root.join("originals")).unwrap();
            fs::write(root.join("originals/a.png"), b"older run").unwrap();

            let work: Vec<WorkItem> = (0..6)
                .map(|idx| {
                    let path = root.join(format!("src{idx}/a.png"));
                    fs::create_dir_all(path.parent().unwrap()).unwrap();
                    fs::write(&path, format!("original {idx}")).unwrap();
                    WorkItem {
                        source: SourceFile {
                            path,
                            relative: PathBuf::from("a.png"),
                            format: SourceFormat::Png,
                            ordinal: idx + 1,
                        },
                        destination: root.join(format!("converted/a{idx}.jpg")),
                    }
                })
                .collect();
            let manager = OutputManager::new(OutputMode::Keep, Some(root.join("originals")));

            std::thread::scope(|scope| {
                for item in &work {
                    let manager = &manager;
                    scope.spawn(move || manager.place(item, transformed(b"jpeg")).unwrap());
                }
            });

            let mut contents: Vec<Vec<u8>> = fs::read_dir(root.join("originals"))
                .unwrap()
                .map(|entry| fs::read(entry.unwrap().path()).unwrap())
                .collect();
            contents.sort();
            assert_eq!(contents.len(), 7, "round {round}");
            let mut expected: Vec<Vec<u8>> = (0..6)
                .map(|idx| format!("original {idx}").into_bytes())
                .collect();
            expected.push(b"older run".to_vec());
            expected.sort();
            assert_eq!(contents, expected, "round {round}");
        }
    }

    #[test]
    fn replace_mode_write_failure_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // A folder squatting on the destination makes the final rename fail.
        fs::create_dir_all(root.join("a.jpg")).unwrap();
        let work = item(root, "a.png", root.join("a.jpg"));
        let manager = OutputManager::new(OutputMode::Replace, None);

        let err = manager.place(&work, transformed(b"converted")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(fs::read(&work.source.path).unwrap(), b"original");
        assert!(root.join("a.jpg").is_dir());
        let leftovers = fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| crate::utils::is_temp_file(&e.path()))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn replace_mode_with_new_extension_removes_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let work = item(root, "a.png", root.join("a.avif"));
        let manager = OutputManager::new(OutputMode::Replace, None);

        manager.place(&work, transformed(b"avif")).unwrap();

        assert!(!root.join("a.png").exists());
        assert_eq!(fs::read(root.join("a.avif")).unwrap(), b"avif");
    }
}
