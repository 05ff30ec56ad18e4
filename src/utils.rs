use crate::args::Args;
use crate::error::{Error, Result};
use indicatif::ProgressBar;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub fn create_progress_bar(args: &Args, len: usize) -> ProgressBar {
    // Per-message logging at -vvv would tear the bar apart.
    if args.quiet || args.verbose >= 3 {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(len as u64)
    }
}

/// Access and modification times of a file, to be put back later. Unless
/// `restore` was called, they are put back when this is dropped.
#[derive(Debug)]
pub struct Timestamps {
    path: PathBuf,
    accessed: SystemTime,
    modified: SystemTime,
    restored: bool,
}

impl Timestamps {
    pub fn capture(path: &Path) -> Result<Self> {
        let error = |source| Error::Timestamps {
            path: path.to_path_buf(),
            source,
        };
        let meta = fs::metadata(path).map_err(error)?;
        Ok(Timestamps {
            path: path.to_path_buf(),
            accessed: meta.accessed().map_err(error)?,
            modified: meta.modified().map_err(error)?,
            restored: false,
        })
    }

    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.apply()
    }

    // Setting times takes owning the file, not being able to write it.
    fn apply(&self) -> Result<()> {
        let times = FileTimes::new()
            .set_accessed(self.accessed)
            .set_modified(self.modified);
        File::open(&self.path)
            .and_then(|file| file.set_times(times))
            .map_err(|source| Error::Timestamps {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for Timestamps {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.apply() {
                warn!("{}", e);
            }
        }
    }
}
