//! Command entry points: batch processing of globbed files and stdin piping.

use crate::args::{PipeArgs, ProcessArgs};
use crate::config::{CompilerConfig, CompilerConfigSource, PreprocessOptions};
use crate::errors::{PreprocessError, Result};
use crate::manifest::ManifestBuilder;
use crate::output::write_atomic;
use crate::preprocessor::Preprocessor;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Components larger than this are skipped
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Performance statistics
#[derive(Debug, Clone, Default)]
pub struct PerformanceStats {
    pub total_duration: Duration,
    pub file_read_duration: Duration,
    pub processing_duration: Duration,
    pub files_per_second: f64,
    pub bytes_processed: u64,
}

/// One transformed component
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub code: String,
}

/// Result of a batch run
#[derive(Debug)]
pub struct ProcessResult {
    pub files: Vec<ProcessedFile>,
    /// Final bundle contents, in bundle mode
    pub bundle_css: Option<String>,
    pub manifest: serde_json::Value,
    pub total_files_processed: usize,
    pub total_ignored: usize,
    pub performance_stats: Option<PerformanceStats>,
}

/// Build preprocessor options from CLI arguments and an optional options file
pub fn options_from_args(args: &ProcessArgs) -> Result<PreprocessOptions> {
    let mut options = match &args.config {
        Some(path) => PreprocessOptions::from_file(path)?,
        None => PreprocessOptions::default(),
    };
    if args.no_compile {
        options.compile = false;
    }
    if let Some(prefix) = &args.prefix {
        options.prefix = prefix.clone();
    }
    if args.bundle.is_some() {
        options.bundle = args.bundle.clone();
    }
    options.dev |= args.dev;
    options.minify |= args.minify;
    options.debug |= args.verbose;
    if args.no_preflight {
        override_config(&mut options, without_preflight())?;
    }
    Ok(options)
}

fn without_preflight() -> CompilerConfig {
    CompilerConfig {
        preflight: false,
        ..CompilerConfig::default()
    }
}

/// Layer command-line compiler settings over the configured ones
fn override_config(options: &mut PreprocessOptions, overrides: CompilerConfig) -> Result<()> {
    let config = options.compiler_config()?.merge(overrides);
    options.config = Some(CompilerConfigSource::Inline(config));
    Ok(())
}

/// Batch entry point
pub fn process_files(args: &ProcessArgs) -> Result<ProcessResult> {
    let start_time = Instant::now();
    let mut stats = PerformanceStats::default();

    args.validate().map_err(PreprocessError::InvalidInput)?;
    let mut options = options_from_args(args)?;

    // a dry run still exercises bundling, against a throwaway file
    let scratch = if args.dry_run && options.bundle.is_some() {
        let dir = tempfile::TempDir::new()?;
        options.bundle = Some(dir.path().join("bundle.css"));
        Some(dir)
    } else {
        None
    };

    let files = collect_files(&args.input, &args.exclude)?;
    if files.is_empty() {
        return Err(PreprocessError::NoFilesFound);
    }
    info!(files = files.len(), "found components");

    let progress_bar = if args.verbose {
        None
    } else {
        let pb = ProgressBar::with_draw_target(Some(files.len() as u64), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
        {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        pb.set_message("Reading components...");
        Some(pb)
    };

    let read_start = Instant::now();
    let sources = read_files(&files, progress_bar.as_ref())?;
    stats.file_read_duration = read_start.elapsed();
    stats.bytes_processed = sources.iter().map(|(_, content)| content.len() as u64).sum();

    let mut preprocessor = Preprocessor::from_options(options.clone())?;
    let process_start = Instant::now();
    if let Some(pb) = &progress_bar {
        pb.set_position(0);
        pb.set_message("Processing...");
    }

    let mut processed_files = Vec::with_capacity(sources.len());
    let mut css_size = 0;
    for (path, content) in &sources {
        let filename = path.display().to_string();
        let processed = preprocessor.process(content, &filename)?;
        css_size += processed.css.len();
        debug!(file = filename.as_str(), ignored = processed.ignored.len(), "transformed");
        processed_files.push(ProcessedFile {
            source: path.clone(),
            destination: destination_for(&args.output_dir, path),
            code: processed.code,
        });
        if let Some(pb) = &progress_bar {
            pb.inc(1);
        }
    }
    stats.processing_duration = process_start.elapsed();

    let bundle_css = match &options.bundle {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    drop(scratch);

    let manifest = ManifestBuilder::from_session(preprocessor.session())
        .started_at(start_time)
        .with_build_mode(options.dev)
        .with_compilation(options.compile)
        .with_bundle(args.bundle.as_ref().map(|p| p.display().to_string()))
        .build(bundle_css.as_ref().map_or(css_size, String::len));

    if !args.dry_run {
        for file in &processed_files {
            write_output(&file.destination, &file.code)?;
        }
        if let Some(path) = &args.manifest {
            write_output(path, &manifest.to_pretty_json()?)?;
        }
    }

    stats.total_duration = start_time.elapsed();
    stats.files_per_second = files.len() as f64 / stats.total_duration.as_secs_f64().max(f64::EPSILON);

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("✓ Complete ({:.1} files/sec)", stats.files_per_second));
    }
    info!(
        files = processed_files.len(),
        ignored = preprocessor.session().ignored().len(),
        seconds = stats.total_duration.as_secs_f64(),
        "preprocessing complete"
    );

    Ok(ProcessResult {
        total_files_processed: processed_files.len(),
        total_ignored: preprocessor.session().ignored().len(),
        files: processed_files,
        bundle_css,
        manifest: manifest.to_json(),
        performance_stats: Some(stats),
    })
}

/// Where a component is written: relative inputs keep their relative path
pub fn destination_for(output_dir: &Path, source: &Path) -> PathBuf {
    let relative: PathBuf = source
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect();
    if source.is_relative() && !relative.as_os_str().is_empty() {
        output_dir.join(relative)
    } else {
        output_dir.join(source.file_name().unwrap_or_default())
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content).map_err(|e| PreprocessError::OutputError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Collect files matching the given patterns, sorted for a stable processing order
fn collect_files(patterns: &[String], exclude_patterns: &[String]) -> Result<Vec<PathBuf>> {
    let excludes = exclude_patterns
        .iter()
        .map(|p| glob::Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut files = Vec::new();
    for pattern in patterns {
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if path.is_dir() || excludes.iter().any(|p| p.matches_path(&path)) {
                continue;
            }
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if size > MAX_FILE_SIZE {
                warn!(path = %path.display(), size, "skipping oversized file");
                continue;
            }
            files.push(path);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Read all files in parallel, keeping input order
fn read_files(files: &[PathBuf], progress_bar: Option<&ProgressBar>) -> Result<Vec<(PathBuf, String)>> {
    let read = AtomicUsize::new(0);
    files
        .par_iter()
        .map(|path| -> Result<(PathBuf, String)> {
            let content = fs::read_to_string(path).map_err(|e| {
                PreprocessError::InputError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if let Some(pb) = progress_bar {
                pb.set_position(read.fetch_add(1, Ordering::Relaxed) as u64 + 1);
            }
            Ok((path.clone(), content))
        })
        .collect()
}

/// Pipe entry point: component on stdin, transformed component on stdout
pub async fn handle_pipe_command(args: PipeArgs) -> Result<()> {
    use tokio::io::{self, AsyncReadExt, AsyncWriteExt};

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|e| PreprocessError::InputError(format!("Failed to read from stdin: {}", e)))?;

    let output = transform_source(&input, &args)?;

    let mut stdout = io::stdout();
    stdout
        .write_all(output.as_bytes())
        .await
        .map_err(|e| PreprocessError::OutputError {
            path: "stdout".to_string(),
            message: e.to_string(),
        })?;
    stdout.flush().await.map_err(|e| PreprocessError::OutputError {
        path: "stdout".to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Transform one component with the pipe settings
pub fn transform_source(input: &str, args: &PipeArgs) -> Result<String> {
    if input.trim().is_empty() {
        return Ok(String::new());
    }
    let mut options = PreprocessOptions {
        compile: !args.no_compile,
        minify: args.minify,
        ..PreprocessOptions::default()
    };
    if args.no_preflight {
        override_config(&mut options, without_preflight())?;
    }
    let mut preprocessor = Preprocessor::from_options(options)?;
    Ok(preprocessor.process(input, &args.filename)?.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_keeps_relative_layout() {
        let out = Path::new("out");
        assert_eq!(
            destination_for(out, Path::new("src/lib/Button.svelte")),
            PathBuf::from("out/src/lib/Button.svelte")
        );
        assert_eq!(
            destination_for(out, Path::new("./App.svelte")),
            PathBuf::from("out/App.svelte")
        );
        assert_eq!(
            destination_for(out, Path::new("/abs/App.svelte")),
            PathBuf::from("out/App.svelte")
        );
    }

    #[test]
    fn test_options_from_args() {
        let args = ProcessArgs {
            input: vec!["*.svelte".into()],
            output_dir: "out".into(),
            bundle: Some("b.css".into()),
            manifest: None,
            config: None,
            no_compile: true,
            prefix: Some("x-".into()),
            dev: true,
            minify: false,
            verbose: true,
            exclude: Vec::new(),
            dry_run: false,
            no_preflight: true,
        };
        let options = options_from_args(&args).unwrap();
        assert!(!options.compile);
        assert_eq!(options.prefix, "x-");
        assert!(options.dev);
        assert!(options.is_bundle());
        assert!(options.debug);
        assert!(!options.compiler_config().unwrap().preflight);
    }

    #[test]
    fn test_no_preflight_keeps_configured_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("windi.yaml");
        fs::write(&path, "attributify: false\nvariants: [print]\n").unwrap();
        let mut options = PreprocessOptions {
            config: Some(CompilerConfigSource::Path(path)),
            ..PreprocessOptions::default()
        };
        override_config(&mut options, without_preflight()).unwrap();
        let config = options.compiler_config().unwrap();
        assert!(!config.preflight);
        assert!(!config.attributify);
        assert_eq!(config.variants, vec!["print".to_string()]);
    }

    #[test]
    fn test_empty_pipe_input() {
        let args = PipeArgs {
            filename: "App.svelte".into(),
            no_compile: false,
            minify: false,
            no_preflight: false,
        };
        assert_eq!(transform_source("  \n", &args).unwrap(), "");
    }
}
