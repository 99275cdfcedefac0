//! Writing per-comparison artifacts

use std::fs;
use std::path::{Path, PathBuf};

use super::plot::{write_volcano, PlotOptions};
use crate::error::Result;
use crate::io::{write_result_table, ContrastResult};

/// Files written for one comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub table: Option<PathBuf>,
    pub plot: Option<PathBuf>,
}

/// Destination for successful comparison results
pub trait ArtifactPersister: Send + Sync {
    fn persist(&self, result: &ContrastResult) -> Result<Artifacts>;
}

/// Discards results
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersister;

impl ArtifactPersister for NoopPersister {
    fn persist(&self, _result: &ContrastResult) -> Result<Artifacts> {
        Ok(Artifacts::default())
    }
}

/// Subdirectory of a batch output directory that holds per-comparison files,
/// keeping them apart from the batch-level reports
pub const COMPARISONS_DIR: &str = "comparisons";

/// Writes `<id>.tsv` and `<id>_volcano.html` into one directory
#[derive(Debug, Clone)]
pub struct DirectoryPersister {
    dir: PathBuf,
    plot: Option<PlotOptions>,
}

impl DirectoryPersister {
    /// Create the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            plot: Some(PlotOptions::default()),
        })
    }

    /// Persister for `<out>/comparisons`, next to the reports written into `out`
    pub fn for_batch<P: AsRef<Path>>(out: P) -> Result<Self> {
        Self::new(out.as_ref().join(COMPARISONS_DIR))
    }

    pub fn with_plot_options(mut self, options: PlotOptions) -> Self {
        self.plot = Some(options);
        self
    }

    pub fn without_plots(mut self) -> Self {
        self.plot = None;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactPersister for DirectoryPersister {
    fn persist(&self, result: &ContrastResult) -> Result<Artifacts> {
        let stem = file_stem(&result.comparison_id);
        let table = self.dir.join(format!("{}.tsv", stem));
        write_result_table(&table, result)?;

        let plot = match &self.plot {
            Some(options) => {
                let path = self.dir.join(format!("{}_volcano.html", stem));
                write_volcano(&path, result, options)?;
                Some(path)
            }
            None => None,
        };
        log::debug!("Wrote artifacts for {} to {}", result.comparison_id, self.dir.display());

        Ok(Artifacts {
            table: Some(table),
            plot,
        })
    }
}

/// FNV-1a, stable across runs and platforms
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |h, &b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// File-name-safe form of a comparison id.
///
/// Ids made only of ASCII letters, digits, '-', '_' and '.' are used as is.
/// Anything else is replaced by '_' and a hash of the original id is appended,
/// so distinct ids never share a file name.
pub fn file_stem(id: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if !id.is_empty() && id.chars().all(safe) && !id.starts_with('.') {
        return id.to_string();
    }
    let cleaned: String = id.chars().map(|c| if safe(c) { c } else { '_' }).collect();
    format!("{}-{:08x}", cleaned.trim_start_matches('.'), fnv1a(id.as_bytes()) as u32)
}
