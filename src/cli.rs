use anyhow::{Context, Result};
use clap::Parser;
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hpi::HpiFileEntry;
use crate::io::HttpOptions;

/// What to do with an entry whose output path may already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Extract,
    /// `-n`: the existing file is kept
    SkipExisting,
    /// Existing file and no `-o`
    NeedsOverwrite,
}

/// Include/exclude glob filter built from the positional `FILES` and `-x`.
///
/// A pattern selects an entry when it matches either the full archive path
/// or the bare file name.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Selection {
    /// Compile both pattern lists, failing on the first invalid glob
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    /// An empty include list selects everything; exclusions always win.
    pub fn selects(&self, entry: &HpiFileEntry) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| matches(p, entry));
        included && !self.exclude.iter().any(|p| matches(p, entry))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid pattern {p:?}")))
        .collect()
}

fn matches(pattern: &Pattern, entry: &HpiFileEntry) -> bool {
    pattern.matches(&entry.path) || pattern.matches(entry.file_name())
}

#[derive(Parser, Debug)]
#[command(name = "unhpi")]
#[command(version)]
#[command(about = "An HPI archive extractor with HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  unhpi totala1.hpi -d out        extract everything from totala1.hpi into out/\n  \
  unhpi ccdata.ccx 'units/*.fbi'  extract matching files only\n  \
  unhpi -p rev31.gp3 gamedata/sidedata.tdf | more\n  \
  unhpi -l https://example.com/totala2.hpi   list files from remote archive\n\n\
Set RUST_LOG=debug for decoder diagnostics.")]
pub struct Cli {
    /// HPI archive path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract, glob patterns allowed (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely with sizes and compression
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files matching the patterns that follow
    #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// HTTP attempts on timeouts and connection failures
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub retries: u32,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout),
            max_retry: self.retries.max(1),
        }
    }

    /// Entry filter for extraction
    pub fn selection(&self) -> Result<Selection> {
        Selection::new(&self.files, &self.exclude)
    }

    /// Where `entry` lands on disk: under `-d` (or the working directory),
    /// flattened to its file name with `-j`.
    pub fn output_path(&self, entry: &HpiFileEntry) -> PathBuf {
        let root = self.extract_dir.as_deref().map_or_else(PathBuf::new, PathBuf::from);
        if self.junk_paths {
            root.join(entry.file_name())
        } else {
            entry.output_path(&root)
        }
    }

    /// Overwrite policy: `-n` beats `-o`, and without either an existing
    /// file is left alone.
    pub fn output_action(&self, output_path: &Path) -> OutputAction {
        if !output_path.exists() {
            OutputAction::Extract
        } else if self.never_overwrite {
            OutputAction::SkipExisting
        } else if self.overwrite {
            OutputAction::Extract
        } else {
            OutputAction::NeedsOverwrite
        }
    }

    /// Default log filter when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "off"
        } else if self.quiet > 0 {
            "error"
        } else {
            "warn"
        }
    }
}
