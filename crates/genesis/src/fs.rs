//! Filesystem helpers shared by the file-backed target and the envelope writer.
//!
//! Files are written to a temporary file next to their destination and renamed into place once
//! the write and the close both succeeded, so a reader never observes a partial file.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use lattice_types::constants::{GENESIS_DIR_MODE, GENESIS_FILE_MODE};
use tempfile::TempPath;

use crate::error::GenesisError;

/// Creates `path` and its parents, new directories with mode 0o700.
pub(crate) fn create_private_dir(path: &Path) -> Result<(), GenesisError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(GENESIS_DIR_MODE);
    }
    builder.create(path).map_err(|e| GenesisError::io(path, e))
}

/// Creates a hidden temporary file with mode 0o600 in the directory of `path`.
///
/// The file is removed when the returned [`TempPath`] drops without being persisted.
pub(crate) fn create_staging_file(path: &Path) -> Result<(File, TempPath), GenesisError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(GENESIS_FILE_MODE));
    }

    let staged = builder.tempfile_in(dir).map_err(|e| GenesisError::io(path, e))?;
    Ok(staged.into_parts())
}

/// Moves a fully written staging file over `path`.
pub(crate) fn persist(staged: TempPath, path: &Path) -> Result<(), GenesisError> {
    staged.persist(path).map_err(|e| GenesisError::io(path, e.error))
}

/// Runs `write` against a staging file for `path`, closes it and moves it into place.
///
/// The file is always closed, also when `write` fails; if both fail the error carries both. On
/// any failure `path` keeps its previous content.
pub(crate) fn write_file_with<F>(path: &Path, write: F) -> Result<(), GenesisError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let (file, staged) = create_staging_file(path)?;
    let mut writer = BufWriter::new(file);
    let written = write(&mut writer);
    let closed = close(writer);
    combine(path, written, closed)?;
    persist(staged, path)
}

pub(crate) fn close(writer: BufWriter<File>) -> io::Result<()> {
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

pub(crate) fn combine(
    path: &Path,
    written: io::Result<()>,
    closed: io::Result<()>,
) -> Result<(), GenesisError> {
    match (written, closed) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(GenesisError::io(path, e)),
        (Err(write), Err(close)) => {
            Err(GenesisError::WriteAndClose { path: path.to_path_buf(), write, close })
        }
    }
}

/// A field stream staged beside its destination. Remembers the first write failure so that
/// `finish` can report it together with a close failure. Dropped without `finish`, the staged
/// bytes are discarded.
pub(crate) struct FileWriter {
    path: PathBuf,
    staged: TempPath,
    writer: BufWriter<File>,
    write_error: Option<io::Error>,
}

impl FileWriter {
    pub(crate) fn create(path: PathBuf) -> Result<Self, GenesisError> {
        let (file, staged) = create_staging_file(&path)?;
        Ok(Self { path, staged, writer: BufWriter::new(file), write_error: None })
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result &&
            self.write_error.is_none()
        {
            self.write_error = Some(io::Error::new(e.kind(), e.to_string()));
        }
        result
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.writer.write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.writer.flush();
        self.record(result)
    }
}

impl crate::target::GenesisWriter for FileWriter {
    fn finish(self: Box<Self>) -> Result<(), GenesisError> {
        let FileWriter { path, staged, writer, write_error } = *self;
        let written = write_error.map_or(Ok(()), Err);
        combine(&path, written, close(writer))?;
        persist(staged, &path)
    }
}
