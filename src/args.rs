use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Component preprocessor - extracts utility classes from component markup and
/// injects or bundles the generated stylesheet
#[derive(Parser, Debug)]
#[command(name = "windi-preprocess")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Preprocess component files matched by glob patterns
    Process(ProcessArgs),
    /// Preprocess one component read from stdin and write it to stdout
    Pipe(PipeArgs),
}

/// Arguments for the process command
#[derive(Parser, Debug, Clone)]
pub struct ProcessArgs {
    /// Input file patterns (glob patterns supported)
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATTERN",
        required = true,
        num_args = 1..,
        help = "Input file patterns of components to preprocess"
    )]
    pub input: Vec<String>,

    /// Output directory for transformed components
    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "DIR",
        required = true,
        help = "Directory where transformed components are written"
    )]
    pub output_dir: PathBuf,

    /// Bundle file path
    #[arg(
        short = 'b',
        long = "bundle",
        value_name = "PATH",
        help = "Collect all styles into this CSS file instead of injecting them"
    )]
    pub bundle: Option<PathBuf>,

    /// Diagnostics manifest path (JSON)
    #[arg(
        short = 'm',
        long = "manifest",
        value_name = "PATH",
        help = "Path where the JSON diagnostics manifest will be written"
    )]
    pub manifest: Option<PathBuf>,

    /// Options file path (YAML or JSON)
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Path to a preprocessor options file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    /// Keep class lists instead of compiling them
    #[arg(
        long = "no-compile",
        default_value_t = false,
        help = "Keep utility classes in markup instead of compiling them into one class name"
    )]
    pub no_compile: bool,

    /// Prefix for compiled class names
    #[arg(
        long = "prefix",
        value_name = "PREFIX",
        env = "WINDI_PREFIX",
        help = "Prefix for compiled class names (default: windi-)"
    )]
    pub prefix: Option<String>,

    /// Development mode
    #[arg(
        long = "dev",
        default_value_t = false,
        help = "Development mode: re-emit base rules on every pass"
    )]
    pub dev: bool,

    /// Enable CSS minification
    #[arg(
        long = "minify",
        default_value_t = false,
        help = "Minify injected stylesheets"
    )]
    pub minify: bool,

    /// Verbose output
    #[arg(
        short = 'v',
        long = "verbose",
        default_value_t = false,
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Exclude patterns (glob patterns to exclude)
    #[arg(
        short = 'e',
        long = "exclude",
        value_name = "PATTERN",
        num_args = 0..,
        help = "Patterns to exclude from processing"
    )]
    pub exclude: Vec<String>,

    /// Dry run (don't write output files)
    #[arg(
        long = "dry-run",
        default_value_t = false,
        help = "Process components but don't write output files"
    )]
    pub dry_run: bool,

    /// Disable base rule generation
    #[arg(
        long = "no-preflight",
        default_value_t = false,
        help = "Disable generation of base/reset rules"
    )]
    pub no_preflight: bool,
}

/// Arguments for the pipe command
#[derive(Parser, Debug, Clone)]
pub struct PipeArgs {
    /// File name the component is registered under
    #[arg(
        long = "filename",
        value_name = "NAME",
        default_value = "stdin.svelte",
        help = "Name under which the component is registered"
    )]
    pub filename: String,

    /// Keep class lists instead of compiling them
    #[arg(long = "no-compile", default_value_t = false)]
    pub no_compile: bool,

    /// Enable CSS minification
    #[arg(
        long = "minify",
        default_value_t = false,
        help = "Minify the injected stylesheet"
    )]
    pub minify: bool,

    /// Disable base rule generation
    #[arg(
        long = "no-preflight",
        default_value_t = false,
        help = "Disable generation of base/reset rules"
    )]
    pub no_preflight: bool,
}

impl ProcessArgs {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.input.is_empty() {
            return Err("At least one input pattern must be provided".to_string());
        }

        if let (Some(bundle), Some(manifest)) = (&self.bundle, &self.manifest) {
            if bundle == manifest {
                return Err("Bundle and manifest paths must be different".to_string());
            }
        }

        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() && !self.no_compile {
                return Err("Prefix must not be empty when compiling".to_string());
            }
        }

        Ok(())
    }
}
