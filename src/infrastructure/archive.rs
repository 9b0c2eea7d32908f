//! Package archives
//!
//! The install space is shipped as `ros2-package-<os>.tar.bz2` on Linux and
//! macOS and as `ros2-package-windows.zip` on Windows. Either way every entry
//! sits under a single `ros2-<os>` root directory.

use crate::pipeline::ArchiveError;
use crate::platform::TargetOs;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Container format of a package archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// tar compressed with bzip2
    TarBz2,
    /// zip with deflate
    Zip,
}

impl ArchiveFormat {
    /// Format used for packages targeting `os`
    #[must_use]
    pub const fn for_os(os: TargetOs) -> Self {
        match os {
            TargetOs::Linux | TargetOs::Osx => Self::TarBz2,
            TargetOs::Windows => Self::Zip,
        }
    }

    /// File extension, without the leading dot
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::TarBz2 => "tar.bz2",
            Self::Zip => "zip",
        }
    }
}

/// Where an archive goes and what it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// Archive file to write
    pub path: PathBuf,
    /// Container format
    pub format: ArchiveFormat,
    /// Directory whose contents are archived
    pub root: PathBuf,
    /// Name of the single top-level directory inside the archive
    pub archive_root: String,
}

impl ArchiveDescriptor {
    /// Package archive for `os`, written into `output_dir`
    #[must_use]
    pub fn for_os(os: TargetOs, root: impl Into<PathBuf>, output_dir: &Path) -> Self {
        let format = ArchiveFormat::for_os(os);
        Self {
            path: output_dir.join(format!("ros2-package-{os}.{}", format.extension())),
            format,
            root: root.into(),
            archive_root: format!("ros2-{os}"),
        }
    }

    /// Writes the archive and returns its path
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the root is missing or any file cannot
    /// be read or written.
    pub fn write(&self) -> Result<PathBuf, ArchiveError> {
        if !self.root.is_dir() {
            return Err(ArchiveError::MissingRoot(self.root.display().to_string()));
        }
        tracing::info!(
            archive = %self.path.display(),
            root = %self.root.display(),
            format = ?self.format,
            "Writing package archive"
        );
        match self.format {
            ArchiveFormat::TarBz2 => self.write_tar_bz2()?,
            ArchiveFormat::Zip => self.write_zip()?,
        }
        Ok(self.path.clone())
    }

    fn write_error(&self, err: impl std::fmt::Display) -> ArchiveError {
        ArchiveError::Write {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }

    fn write_tar_bz2(&self) -> Result<(), ArchiveError> {
        let file = File::create(&self.path).map_err(|e| self.write_error(e))?;
        let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        // Keep symlinks in the install space as links.
        builder.follow_symlinks(false);
        builder
            .append_dir_all(&self.archive_root, &self.root)
            .map_err(|e| self.write_error(e))?;
        builder
            .into_inner()
            .and_then(bzip2::write::BzEncoder::finish)
            .map_err(|e| self.write_error(e))?;
        Ok(())
    }

    fn write_zip(&self) -> Result<(), ArchiveError> {
        let file = File::create(&self.path).map_err(|e| self.write_error(e))?;
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| ArchiveError::Read {
                path: self.root.display().to_string(),
                message: e.to_string(),
            })?;
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let name = archive_name(&self.archive_root, relative);

            let read_error = |e: &dyn std::fmt::Display| ArchiveError::Read {
                path: entry.path().display().to_string(),
                message: e.to_string(),
            };

            if entry.path_is_symlink() {
                // Stored as a link, like the tar writer does.
                let target = fs::read_link(entry.path()).map_err(|e| read_error(&e))?;
                zip.add_symlink(name, target.to_string_lossy(), options)
                    .map_err(|e| self.write_error(e))?;
            } else if entry.file_type().is_dir() {
                zip.add_directory(name, options)
                    .map_err(|e| self.write_error(e))?;
            } else {
                let size = entry.metadata().map_err(|e| read_error(&e))?.len();
                zip.start_file(name, options.large_file(needs_zip64(size)))
                    .map_err(|e| self.write_error(e))?;
                let mut source = File::open(entry.path()).map_err(|e| read_error(&e))?;
                io::copy(&mut source, &mut zip).map_err(|e| self.write_error(e))?;
            }
        }
        zip.finish().map_err(|e| self.write_error(e))?;
        Ok(())
    }
}

/// Whether a file of `size` bytes needs zip64 extensions
fn needs_zip64(size: u64) -> bool {
    size >= u64::from(u32::MAX)
}

/// `root/relative` with forward slashes, as zip entry names require
fn archive_name(root: &str, relative: &Path) -> String {
    std::iter::once(root.to_string())
        .chain(relative.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        }))
        .collect::<Vec<_>>()
        .join("/")
}
