//! Component markup preprocessor.
//!
//! Extracts utility class tokens from component markup, compiles them through a
//! utility compiler and either injects the resulting stylesheet into the
//! component or collects it into a shared bundle file.

pub mod args;
pub mod compiler;
pub mod composer;
pub mod config;
pub mod css_parser;
pub mod errors;
pub mod expression;
pub mod extractor;
pub mod manifest;
pub mod markup;
pub mod normalizer;
pub mod output;
pub mod preprocessor;
pub mod registry;
pub mod selector;
pub mod splice;
pub mod stylesheet;
pub mod variant;

#[cfg(feature = "cli")]
pub mod runner;

pub use args::{Cli, Commands, PipeArgs, ProcessArgs};
pub use compiler::{Compiled, Interpreted, PreflightRequest, TailwindCompiler, UtilityCompiler};
pub use config::{CompilerConfig, CompilerConfigSource, PreprocessOptions};
pub use errors::{PreprocessError, Result};
pub use extractor::{Extraction, ExtractionSite, TokenExtractor};
pub use manifest::{Manifest, ManifestBuilder};
pub use normalizer::{normalize, TokenSet};
pub use preprocessor::{Processed, Preprocessor};
pub use registry::Session;
pub use stylesheet::{Style, StyleSheet};

#[cfg(feature = "cli")]
pub use runner::{handle_pipe_command, process_files, ProcessResult};
