//! Memory-mapped output files.
//!
//! Stores are applied to, and reverted from, writable maps of the files the
//! traced program registered. Only the pages a store touches are flushed.

use crate::checker::{CheckerPolarity, ConsistencyChecker};
use crate::error::{ReplayError, ReplayResult};
use memmap2::{MmapMut, MmapOptions};
use pmreorder_core::{contains, format_value, page_span, AddressRange, Rangeable};
use pmreorder_log::Store;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outcome of checking every registered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consistency {
    /// Every file was judged consistent
    Consistent,
    /// The first file judged inconsistent
    Inconsistent {
        /// File description
        file: String,
    },
}

impl Consistency {
    /// Whether all files passed
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

/// One registered file and its writable map
pub struct BinaryFile {
    path: PathBuf,
    window: AddressRange,
    file_offset: u64,
    map: MmapMut,
}

impl BinaryFile {
    /// Map `path` read-write. `window` is where the traced program mapped it
    /// and `file_offset` the file position the window starts at.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Io` if the file cannot be opened or mapped.
    pub fn open(path: &Path, window: AddressRange, file_offset: u64) -> ReplayResult<Self> {
        let io_err = |source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        // SAFETY: the handler is the only writer of this map for the whole
        // replay; the traced program is not running.
        let map = unsafe { MmapOptions::new().map_mut(&file) }.map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            window,
            file_offset,
            map,
        })
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of the map, for inspection
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    fn locate(&self, store: &Store) -> ReplayResult<std::ops::Range<usize>> {
        let offset = store
            .address
            .checked_sub(self.window.base)
            .and_then(|delta| self.file_offset.checked_add(delta));
        let offset = offset.unwrap_or(u64::MAX);
        let out_of_bounds = || ReplayError::OutOfBounds {
            file: self.path.display().to_string(),
            offset,
            size: store.size,
            len: self.map.len() as u64,
        };
        let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        let len = usize::try_from(store.size).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.map.len() {
            return Err(out_of_bounds());
        }
        Ok(start..end)
    }

    fn write(&mut self, range: std::ops::Range<usize>, bytes: &[u8]) -> ReplayResult<()> {
        self.map[range.clone()].copy_from_slice(bytes);
        let (start, len) = page_span(range.start, range.len(), self.map.len());
        self.map.flush_range(start, len).map_err(|source| ReplayError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Apply `store`, remembering the bytes it overwrote
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::OutOfBounds` or `ReplayError::Io`.
    pub fn do_store(&mut self, store: &mut Store) -> ReplayResult<()> {
        let range = self.locate(store)?;
        let old = self.map[range.clone()].to_vec();
        debug!(
            "do_store: old_value: {}, new_value: {}",
            format_value(&old),
            format_value(&store.new_value)
        );
        store.old_value = Some(old);
        self.write(range, &store.new_value)
    }

    /// Put back the bytes `store` overwrote
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::NotApplied` if the store was never applied, or
    /// `ReplayError::OutOfBounds` / `ReplayError::Io`.
    pub fn do_revert(&mut self, store: &Store) -> ReplayResult<()> {
        let old = store.old_value.as_deref().ok_or(ReplayError::NotApplied {
            address: store.address,
        })?;
        let range = self.locate(store)?;
        debug!("do_revert: old_value: {}", format_value(old));
        self.write(range, old)
    }
}

impl Rangeable for BinaryFile {
    fn base_address(&self) -> u64 {
        self.window.base
    }

    fn max_address(&self) -> u64 {
        self.window.max_address()
    }
}

impl fmt::Display for BinaryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (base: {:#x}, size: {:#x})",
            self.path.display(),
            self.window.base,
            self.window.size
        )
    }
}

impl fmt::Debug for BinaryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryFile")
            .field("path", &self.path)
            .field("window", &self.window)
            .field("file_offset", &self.file_offset)
            .field("len", &self.map.len())
            .finish()
    }
}

/// Owner of every mapped file for the run
pub struct BinaryOutputHandler {
    files: Vec<BinaryFile>,
    checker: Box<dyn ConsistencyChecker>,
    polarity: CheckerPolarity,
}

impl BinaryOutputHandler {
    /// Handler judging files with `checker` under `polarity`
    #[must_use]
    pub fn new(checker: Box<dyn ConsistencyChecker>, polarity: CheckerPolarity) -> Self {
        Self {
            files: Vec::new(),
            checker,
            polarity,
        }
    }

    /// Map a registered file.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Io` if the file cannot be mapped.
    pub fn add_file(&mut self, path: &Path, window: AddressRange, file_offset: u64) -> ReplayResult<()> {
        let file = BinaryFile::open(path, window, file_offset)?;
        debug!("registered {}", file);
        self.files.push(file);
        Ok(())
    }

    /// Registered files
    #[must_use]
    pub fn files(&self) -> &[BinaryFile] {
        &self.files
    }

    fn file_for(&mut self, store: &Store) -> ReplayResult<(usize, &mut BinaryFile)> {
        self.files
            .iter_mut()
            .enumerate()
            .find(|(_, file)| contains(&**file, store))
            .ok_or(ReplayError::NoSuitableFile {
                address: store.address,
                size: store.size,
            })
    }

    /// Apply a store to the file covering it.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::NoSuitableFile` when no registered file covers
    /// the whole store.
    pub fn do_store(&mut self, store: &mut Store) -> ReplayResult<()> {
        let (index, file) = self.file_for(store)?;
        debug!("Doing store in file no. {}: {}", index, file);
        file.do_store(store)
    }

    /// Revert a previously applied store.
    ///
    /// # Errors
    ///
    /// Same as [`BinaryOutputHandler::do_store`], plus
    /// `ReplayError::NotApplied`.
    pub fn do_revert(&mut self, store: &Store) -> ReplayResult<()> {
        let (_, file) = self.file_for(store)?;
        file.do_revert(store)
    }

    /// Ask the checker about every registered file.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Checker` if the checker could not run.
    pub fn check_consistency(&self, markers: &str) -> ReplayResult<Consistency> {
        for file in &self.files {
            let code = self.checker.check_consistency(file.path(), markers)?;
            if !self.polarity.is_consistent(code) {
                return Ok(Consistency::Inconsistent {
                    file: file.to_string(),
                });
            }
        }
        Ok(Consistency::Consistent)
    }
}

impl fmt::Debug for BinaryOutputHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryOutputHandler")
            .field("files", &self.files)
            .field("checker", &self.checker.describe())
            .field("polarity", &self.polarity)
            .finish()
    }
}
