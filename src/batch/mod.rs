//! Batch import, export and image metadata loading.
//!
//! A batch enumerates the files of one directory (non-recursively, in
//! lexicographic order), hands each to its format codec and aggregates the
//! outcome into an [`IoResult`]. Pascal VOC and YOLO files are processed in
//! parallel; a JSON source is a single file and is read sequentially.
//!
//! Per-file problems never stop a batch. Only a source directory that cannot
//! be read, or a destination that cannot be created, is returned as an
//! `Err`.

pub mod progress;
pub mod report;

pub use progress::Progress;
pub use report::{FileLoad, IoErrorEntry, IoResult, OperationKind};

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{AnnotationError, LabelportError};
use crate::ir::{
    file_name_of, io_json, io_voc_xml, io_yolo, CategoryReconciler, CategoryRegistry,
    ImageAnnotation, ImageAnnotationData, ImageMetaData,
};
use progress::ProgressTracker;

/// Environment variable read by [`BatchOptions::from_env`].
pub const WORKERS_ENV_VAR: &str = "LABELPORT_WORKERS";

/// Supported on-disk annotation formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationFormat {
    PascalVoc,
    Yolo,
    Json,
}

impl AnnotationFormat {
    /// Human-readable name for the format.
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationFormat::PascalVoc => "pascal-voc",
            AnnotationFormat::Yolo => "yolo",
            AnnotationFormat::Json => "json",
        }
    }

    /// Extension of the annotation files, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AnnotationFormat::PascalVoc => io_voc_xml::VOC_XML_EXTENSION,
            AnnotationFormat::Yolo => io_yolo::YOLO_LABEL_EXTENSION,
            AnnotationFormat::Json => io_json::JSON_EXTENSION,
        }
    }
}

impl fmt::Display for AnnotationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnnotationFormat {
    type Err = LabelportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pascal-voc" | "pascal_voc" | "voc" => Ok(AnnotationFormat::PascalVoc),
            "yolo" => Ok(AnnotationFormat::Yolo),
            "json" => Ok(AnnotationFormat::Json),
            _ => Err(LabelportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Options for a [`BatchRunner`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads for parallel batches. `None` uses rayon's global pool.
    pub worker_threads: Option<usize>,
}

impl BatchOptions {
    /// Reads `LABELPORT_WORKERS`. Unset, empty or invalid values fall back to
    /// the default.
    pub fn from_env() -> Self {
        Self::from_worker_setting(std::env::var(WORKERS_ENV_VAR).ok().as_deref())
    }

    fn from_worker_setting(raw: Option<&str>) -> Self {
        let worker_threads = raw.map(str::trim).filter(|raw| !raw.is_empty()).and_then(|raw| {
            match raw.parse::<usize>() {
                Ok(count) if count > 0 => Some(count),
                _ => {
                    log::warn!("ignoring {WORKERS_ENV_VAR}='{raw}'; expected a positive integer");
                    None
                }
            }
        });
        Self { worker_threads }
    }
}

/// The annotations produced by an import, and its report.
#[derive(Debug)]
pub struct LoadOutcome {
    pub annotations: Vec<ImageAnnotation>,
    pub result: IoResult,
}

/// Image headers read by a metadata load, and its report.
#[derive(Debug)]
pub struct MetadataOutcome {
    pub images: Vec<ImageMetaData>,
    pub result: IoResult,
}

/// Runs import, save and metadata batches.
#[derive(Debug)]
pub struct BatchRunner {
    pool: Option<rayon::ThreadPool>,
}

impl BatchRunner {
    pub fn new(options: BatchOptions) -> Result<Self, LabelportError> {
        let pool = options
            .worker_threads
            .map(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|idx| format!("labelport-worker-{idx}"))
                    .build()
            })
            .transpose()?;
        Ok(Self { pool })
    }

    /// Imports every annotation file of `format` found in `source`.
    ///
    /// For JSON, `source` may also be a single file. Only annotations for
    /// images in `files_to_load` are produced, at most one per image; a
    /// later annotation for an image already seen is reported as an error.
    /// Categories are resolved against `registry`, which is updated once at
    /// the end, and only if at least one annotation was produced. New
    /// categories are published only if a kept shape uses them, so YOLO
    /// classes listed in `object.data` but never labelled are not added.
    pub fn load(
        &self,
        format: AnnotationFormat,
        source: &Path,
        files_to_load: &HashSet<String>,
        registry: &mut CategoryRegistry,
        progress: &Progress,
    ) -> Result<LoadOutcome, LabelportError> {
        let started = Instant::now();
        log::info!("importing {format} annotations from {}", source.display());

        let files = if format == AnnotationFormat::Json && source.is_file() {
            vec![source.to_path_buf()]
        } else {
            collect_files(source, format.extension())?
        };

        let tracker = ProgressTracker::start(progress, files.len());
        let reconciler = CategoryReconciler::from_registry(registry);

        let loads: Vec<FileLoad> = match format {
            AnnotationFormat::PascalVoc => self.install(|| {
                files
                    .par_iter()
                    .map(|path| {
                        let load = io_voc_xml::read_voc_file(path, files_to_load, &reconciler);
                        tracker.tick();
                        load
                    })
                    .collect()
            }),
            AnnotationFormat::Yolo => {
                let names = match io_yolo::read_category_file(source) {
                    Ok(names) => names,
                    Err(err) => {
                        log::warn!("{err}");
                        tracker.finish();
                        let result = IoResult::new(
                            OperationKind::Import,
                            0,
                            vec![IoErrorEntry::from_error(io_yolo::CATEGORY_FILE_NAME, &err)],
                        )
                        .with_elapsed(elapsed_ms(started));
                        return Ok(LoadOutcome {
                            annotations: Vec::new(),
                            result,
                        });
                    }
                };
                for name in &names {
                    reconciler.register(name, None);
                }

                self.install(|| {
                    files
                        .par_iter()
                        .map(|path| {
                            let load =
                                io_yolo::read_yolo_file(path, &names, files_to_load, &reconciler);
                            tracker.tick();
                            load
                        })
                        .collect()
                })
            }
            AnnotationFormat::Json => files
                .iter()
                .map(|path| {
                    let load = io_json::read_json_file(path, files_to_load, &reconciler);
                    tracker.tick();
                    load
                })
                .collect(),
        };
        tracker.finish();

        // One annotation per image: the first file (in name order) wins and
        // later ones are reported against their own file.
        let mut seen_images = HashSet::new();
        let mut annotations = Vec::new();
        let mut errors = Vec::new();
        for (path, load) in files.iter().zip(loads) {
            errors.extend(load.errors);
            for annotation in load.annotations {
                if seen_images.insert(annotation.file_name().to_string()) {
                    annotations.push(annotation);
                    continue;
                }
                let err = AnnotationError::DuplicateImage(annotation.file_name().to_string());
                let label = file_name_of(path);
                log::warn!("{label}: {err}");
                for shape in &annotation.shapes {
                    reconciler.release(shape);
                }
                errors.push(IoErrorEntry::from_error(label, &err));
            }
        }

        if annotations.is_empty() {
            log::info!("no annotations produced; category registry left unchanged");
        } else {
            registry.publish(reconciler.finish());
        }

        let result = IoResult::new(OperationKind::Import, annotations.len(), errors)
            .with_elapsed(elapsed_ms(started));
        log::info!(
            "imported {} annotation(s) from {} file(s) in {} ms, {} error(s)",
            result.success_count(),
            files.len(),
            result.elapsed_ms(),
            result.error_count()
        );

        Ok(LoadOutcome {
            annotations,
            result,
        })
    }

    /// Saves `data` in `format` under `destination`.
    ///
    /// Pascal VOC and YOLO write one file per annotation into the
    /// `destination` directory (YOLO also writes `object.data`). JSON writes
    /// a single file: `destination` itself if it has a `.json` extension,
    /// otherwise `annotations.json` inside it.
    pub fn save(
        &self,
        format: AnnotationFormat,
        data: &ImageAnnotationData,
        destination: &Path,
        progress: &Progress,
    ) -> Result<IoResult, LabelportError> {
        let started = Instant::now();
        log::info!(
            "saving {} annotation(s) as {format} to {}",
            data.annotations.len(),
            destination.display()
        );

        let (written, errors) = match format {
            AnnotationFormat::Json => self.save_json(data, destination, progress)?,
            AnnotationFormat::PascalVoc | AnnotationFormat::Yolo => {
                self.save_per_image(format, data, destination, progress)?
            }
        };

        let result =
            IoResult::new(OperationKind::Save, written, errors).with_elapsed(elapsed_ms(started));
        log::info!(
            "saved {} annotation(s) in {} ms, {} error(s)",
            result.success_count(),
            result.elapsed_ms(),
            result.error_count()
        );
        Ok(result)
    }

    /// Reads the header of every image in `file_names` from `dir`.
    ///
    /// Image headers are read in parallel; unreadable ones are reported per file.
    pub fn load_image_metadata(
        &self,
        dir: &Path,
        file_names: &HashSet<String>,
        progress: &Progress,
    ) -> Result<MetadataOutcome, LabelportError> {
        let started = Instant::now();
        ensure_directory(dir)?;

        let mut names: Vec<&String> = file_names.iter().collect();
        names.sort();
        log::info!(
            "reading metadata of {} image(s) in {}",
            names.len(),
            dir.display()
        );

        let tracker = ProgressTracker::start(progress, names.len());
        let headers: Vec<Result<ImageMetaData, IoErrorEntry>> = self.install(|| {
            names
                .par_iter()
                .map(|name| {
                    let meta = ImageMetaData::from_image_file(&dir.join(name.as_str()))
                        .map_err(|err| {
                            log::warn!("{name}: {err}");
                            IoErrorEntry::from_error(name.as_str(), &err)
                        });
                    tracker.tick();
                    meta
                })
                .collect()
        });
        tracker.finish();

        let mut images = Vec::new();
        let mut errors = Vec::new();
        for outcome in headers {
            match outcome {
                Ok(meta) => images.push(meta),
                Err(entry) => errors.push(entry),
            }
        }

        let result = IoResult::new(OperationKind::MetadataLoad, images.len(), errors)
            .with_elapsed(elapsed_ms(started));
        log::info!(
            "read {} image header(s) in {} ms, {} error(s)",
            result.success_count(),
            result.elapsed_ms(),
            result.error_count()
        );
        Ok(MetadataOutcome { images, result })
    }

    fn save_json(
        &self,
        data: &ImageAnnotationData,
        destination: &Path,
        progress: &Progress,
    ) -> Result<(usize, Vec<IoErrorEntry>), LabelportError> {
        let names_file = destination
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(io_json::JSON_EXTENSION));
        let dir = if names_file {
            destination.parent().unwrap_or_else(|| Path::new("."))
        } else {
            destination
        };
        if !dir.as_os_str().is_empty() {
            create_destination(dir)?;
        }

        let tracker = ProgressTracker::start(progress, 1);
        let outcome = match io_json::write_json_file(data, destination) {
            Ok(path) => {
                log::debug!("wrote {}", path.display());
                (data.annotations.len(), Vec::new())
            }
            Err(err) => {
                log::warn!("{}: {err}", destination.display());
                (0, vec![IoErrorEntry::from_error(file_name_of(destination), &err)])
            }
        };
        tracker.finish();
        Ok(outcome)
    }

    fn save_per_image(
        &self,
        format: AnnotationFormat,
        data: &ImageAnnotationData,
        destination: &Path,
        progress: &Progress,
    ) -> Result<(usize, Vec<IoErrorEntry>), LabelportError> {
        create_destination(destination)?;

        let mut errors = Vec::new();
        if format == AnnotationFormat::Yolo {
            if let Err(err) = io_yolo::write_category_file(destination, &data.categories) {
                log::warn!("{}: {err}", io_yolo::CATEGORY_FILE_NAME);
                errors.push(IoErrorEntry::from_error(io_yolo::CATEGORY_FILE_NAME, &err));
            }
        }

        let tracker = ProgressTracker::start(progress, data.annotations.len());
        let results: Vec<Result<PathBuf, IoErrorEntry>> = self.install(|| {
            data.annotations
                .par_iter()
                .map(|annotation| {
                    let written: Result<PathBuf, AnnotationError> = match format {
                        AnnotationFormat::Yolo => {
                            io_yolo::write_yolo_file(annotation, data, destination)
                        }
                        _ => io_voc_xml::write_voc_file(annotation, destination),
                    };
                    tracker.tick();
                    written.map_err(|err| {
                        log::warn!("{}: {err}", annotation.file_name());
                        IoErrorEntry::from_error(annotation.file_name(), &err)
                    })
                })
                .collect()
        });
        tracker.finish();

        let mut written = 0;
        for result in results {
            match result {
                Ok(path) => {
                    log::debug!("wrote {}", path.display());
                    written += 1;
                }
                Err(entry) => errors.push(entry),
            }
        }
        Ok((written, errors))
    }

    fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Regular files directly inside `dir` with the given extension, sorted by
/// file name.
fn collect_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, LabelportError> {
    ensure_directory(dir)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| LabelportError::DirectoryRead {
            path: dir.to_path_buf(),
            source: source.into(),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }

    log::debug!(
        "found {} .{extension} file(s) in {}",
        files.len(),
        dir.display()
    );
    Ok(files)
}

fn ensure_directory(dir: &Path) -> Result<(), LabelportError> {
    let metadata = fs::metadata(dir).map_err(|source| LabelportError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(LabelportError::DirectoryRead {
            path: dir.to_path_buf(),
            source: io::Error::other("not a directory"),
        });
    }
    Ok(())
}

fn create_destination(dir: &Path) -> Result<(), LabelportError> {
    fs::create_dir_all(dir).map_err(|source| LabelportError::DestinationCreate {
        path: dir.to_path_buf(),
        source,
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
