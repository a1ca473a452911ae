// imgcrunch/src/processors/planner.rs
use crate::core::types::{SourceFile, SourceFormat, WorkItem};
use crate::core::{CrunchError, JobConfig, OutputMode, Result};
use crate::utils::{is_supported_format, is_temp_file, numbered_name, unique_path};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Everything the later stages need to know about where files go.
#[derive(Debug, Clone)]
pub struct Plan {
    pub input_dir: PathBuf,
    /// Present in KEEP mode only.
    pub output_dir: Option<PathBuf>,
    /// Present when originals are moved aside after conversion.
    pub originals_dir: Option<PathBuf>,
    pub items: Vec<WorkItem>,
}

pub struct FilePlanner<'a> {
    config: &'a JobConfig,
}

impl<'a> FilePlanner<'a> {
    pub fn new(config: &'a JobConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, input_dir: &Path) -> Result<Plan> {
        let input_dir = self.validate_input(input_dir)?;

        let output_dir = match self.config.mode {
            OutputMode::Keep => Some(absolutize(&self.config.output_dir_for(&input_dir))?),
            OutputMode::Replace => None,
        };
        if output_dir.as_deref() == Some(input_dir.as_path()) {
            return Err(CrunchError::Config(
                "Input and output directories cannot be the same".to_string(),
            ));
        }
        let originals_dir = self.config.originals_dir_for(&input_dir);

        let mut excluded = vec![originals_dir.clone()];
        excluded.extend(output_dir.clone());

        let sources = self.collect_sources(&input_dir, &excluded)?;
        if sources.is_empty() {
            return Err(CrunchError::EmptyInput(input_dir));
        }

        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                CrunchError::Config(format!(
                    "Cannot create output folder {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let items = self.assign_destinations(sources, output_dir.as_deref());

        log::info!(
            "Planned {} images from {}",
            items.len(),
            input_dir.display()
        );

        Ok(Plan {
            input_dir,
            output_dir,
            originals_dir: self.config.moves_originals().then_some(originals_dir),
            items,
        })
    }

    /// Image files under `input_dir` in path order, numbered from 1.
    pub fn collect_sources(&self, input_dir: &Path, excluded: &[PathBuf]) -> Result<Vec<SourceFile>> {
        let is_excluded = |entry: &DirEntry| {
            entry.depth() > 0 && excluded.iter().any(|dir| entry.path() == dir)
        };

        let mut found: Vec<(PathBuf, PathBuf, SourceFormat)> = WalkDir::new(input_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_format(entry.path()) && !is_temp_file(entry.path()))
            .filter_map(|entry| {
                let path = entry.into_path();
                let format = SourceFormat::from_path(&path)?;
                if !format.is_decodable() {
                    log::warn!(
                        "Skipping {}: no decoder for this format in this build (enable the 'heic' feature)",
                        path.display()
                    );
                    return None;
                }
                let relative = path.strip_prefix(input_dir).ok()?.to_path_buf();
                Some((path, relative, format))
            })
            .collect();

        found.sort_by(|a, b| a.1.cmp(&b.1));

        Ok(found
            .into_iter()
            .enumerate()
            .map(|(idx, (path, relative, format))| SourceFile {
                path,
                relative,
                format,
                ordinal: idx + 1,
            })
            .collect())
    }

    fn assign_destinations(&self, sources: Vec<SourceFile>, output_dir: Option<&Path>) -> Vec<WorkItem> {
        let total = sources.len();
        let extension = self.config.format.extension();
        let mut claimed: HashSet<PathBuf> = HashSet::with_capacity(total);

        sources
            .into_iter()
            .map(|source| {
                let candidate = self.candidate_path(&source, output_dir, total, extension);
                let destination = match self.config.mode {
                    OutputMode::Keep => unique_path(candidate, |p| claimed.contains(p)),
                    OutputMode::Replace => unique_path(candidate, |p| {
                        claimed.contains(p) || (p != source.path && p.exists())
                    }),
                };

                if destination != source.path && destination.exists() {
                    log::warn!(
                        "{} already exists and will be overwritten",
                        destination.display()
                    );
                }

                claimed.insert(destination.clone());
                WorkItem {
                    source,
                    destination,
                }
            })
            .collect()
    }

    fn candidate_path(
        &self,
        source: &SourceFile,
        output_dir: Option<&Path>,
        total: usize,
        extension: &str,
    ) -> PathBuf {
        let renamed = self
            .config
            .rename
            .as_deref()
            .map(|base| format!("{}.{}", numbered_name(base, source.ordinal, total), extension));

        match (output_dir, renamed) {
            // Renamed output is flattened into the output folder.
            (Some(dir), Some(name)) => dir.join(name),
            (Some(dir), None) => dir.join(&source.relative).with_extension(extension),
            (None, Some(name)) => source.path.with_file_name(name),
            (None, None) => source.path.with_extension(extension),
        }
    }

    fn validate_input(&self, input_dir: &Path) -> Result<PathBuf> {
        if !input_dir.is_dir() {
            return Err(CrunchError::Config(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        input_dir.canonicalize().map_err(|e| {
            CrunchError::Config(format!("Cannot resolve {}: {}", input_dir.display(), e))
        })
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Ok(resolved);
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        CrunchError::Config(format!("Cannot resolve {}: {}", path.display(), e))
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, OutputFormat};
    use std::fs;

    fn touch_image(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"pixels").unwrap();
    }

    fn names(plan: &Plan) -> Vec<String> {
        plan.items
            .iter()
            .map(|item| item.destination.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn rename_numbers_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "B.JPEG"] {
            touch_image(&dir.path().join(name));
        }
        let config = JobConfig {
            rename: Some("vacation".to_string()),
            ..Default::default()
        };

        let plan = FilePlanner::new(&config).plan(dir.path()).unwrap();

        assert_eq!(names(&plan), ["vacation_001.jpg", "vacation_002.jpg", "vacation_003.jpg"]);
        let sources: Vec<_> = plan
            .items
            .iter()
            .map(|i| i.source.relative.to_string_lossy().into_owned())
            .collect();
        assert_eq!(sources, ["B.JPEG", "a.jpg", "c.png"]);
        assert!(plan.output_dir.unwrap().ends_with("converted"));
    }

    #[test]
    fn keeps_names_and_subfolders_without_rename() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("trip/day1/beach.PNG"));
        touch_image(&dir.path().join("notes.txt"));
        let config = JobConfig {
            format: OutputFormat::Avif,
            ..Default::default()
        };

        let plan = FilePlanner::new(&config).plan(dir.path()).unwrap();

        assert_eq!(plan.items.len(), 1);
        let output_dir = plan.output_dir.unwrap();
        assert_eq!(
            plan.items[0].destination,
            output_dir.join("trip/day1/beach.avif")
        );
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("a.jpg"));
        touch_image(&dir.path().join("a.png"));
        touch_image(&dir.path().join("a.webp"));

        let config = JobConfig::default();
        let plan = FilePlanner::new(&config).plan(dir.path()).unwrap();

        assert_eq!(names(&plan), ["a.jpg", "a-2.jpg", "a-3.jpg"]);
    }

    #[test]
    fn replace_mode_never_claims_another_original() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("a.jpg"));
        touch_image(&dir.path().join("a.png"));
        touch_image(&dir.path().join("b.png"));
        let config = JobConfig {
            mode: OutputMode::Replace,
            ..Default::default()
        };

        let plan = FilePlanner::new(&config).plan(dir.path()).unwrap();

        assert_eq!(names(&plan), ["a.jpg", "a-2.jpg", "b.jpg"]);
        assert_eq!(plan.items[0].destination, plan.items[0].source.path);
        assert!(plan.output_dir.is_none());
        assert!(plan.originals_dir.is_none());
        assert!(!dir.path().join("converted").exists());
    }

    #[test]
    fn previous_output_and_originals_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("new.jpg"));
        touch_image(&dir.path().join("converted/old.jpg"));
        touch_image(&dir.path().join("originals/old.jpg"));
        touch_image(&dir.path().join(".imgcrunch-abc.jpg"));

        let config = JobConfig::default();
        let plan = FilePlanner::new(&config).plan(dir.path()).unwrap();

        assert_eq!(names(&plan), ["new.jpg"]);
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn undecodable_heif_family_inputs_are_not_planned() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("a.png"));
        touch_image(&dir.path().join("shot.avif"));
        touch_image(&dir.path().join("phone.heic"));

        let config = JobConfig::default();
        let plan = FilePlanner::new(&config).plan(dir.path()).unwrap();
        assert_eq!(names(&plan), ["a.jpg"]);

        fs::remove_file(dir.path().join("a.png")).unwrap();
        let err = FilePlanner::new(&config).plan(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn empty_folder_reports_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("readme.md"));

        let config = JobConfig::default();
        let err = FilePlanner::new(&config).plan(dir.path()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyInput);
        assert!(!err.is_fatal());
        assert!(!dir.path().join("converted").exists());
    }

    #[test]
    fn output_equal_to_input_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("a.jpg"));
        let config = JobConfig {
            output_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let err = FilePlanner::new(&config).plan(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn missing_input_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = JobConfig::default();
        let err = FilePlanner::new(&config)
            .plan(&dir.path().join("nope"))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn uncreatable_output_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        touch_image(&dir.path().join("a.jpg"));
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not folder").unwrap();
        let config = JobConfig {
            output_dir: Some(blocker.join("out")),
            ..Default::default()
        };

        let err = FilePlanner::new(&config).plan(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
