//! Resource extraction: to memory, to disk, and whole-archive.
//!
//! The read + decompress + checksum stage always runs on the caller; only
//! the disk write half is handed to a background task. The archive's
//! reader has a single seek cursor, so all reads stay serialized on the
//! caller as well.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crc::{Crc, CRC_32_ISO_HDLC};
use tracing::{debug, info, warn};

use crate::compression;
use crate::error::{Error, FormatError, Result, UsageError};
use crate::read::{TankArchive, TankEntry, PATH_SEPARATOR};
use crate::types::{FileEntry, INVALID_CHECKSUM};

/// CRC-32 variant used for Tank resource checksums (the plain zlib one).
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Handle to a background resource write.
///
/// The bytes were already read, decompressed and checksummed by the time
/// this exists; joining only observes the outcome of the disk write.
#[derive(Debug)]
pub struct WriteTask {
    dest: PathBuf,
    handle: JoinHandle<Result<()>>,
}

impl WriteTask {
    /// Destination path this task is writing.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Wait for the write to finish and return its outcome.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(Error::CustomError("resource write task panicked".into())))
    }
}

/// Tally returned by [`TankArchive::extract_all`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files successfully written to disk.
    pub written: usize,
    /// Files that failed to extract or write.
    pub failed: usize,
}

impl<R: Read + Seek> TankArchive<R> {
    /// Extract a single resource into memory.
    ///
    /// Fails with a [`UsageError`] if `resource_path` is not in the path
    /// table or names a directory. When `validate_crc` is set, the CRC-32
    /// of the extracted bytes is compared against the stored value and a
    /// mismatch fails the extraction. An empty result is never checked,
    /// nor is a stored checksum of zero, which means none was computed.
    pub fn extract_to_memory(&mut self, resource_path: &str, validate_crc: bool) -> Result<Vec<u8>> {
        let entry = *self
            .shared
            .paths
            .get(resource_path)
            .ok_or_else(|| UsageError::ResourceNotFound(resource_path.into()))?;

        let file = match entry {
            TankEntry::File(index) => &self.shared.files.entries[index],
            TankEntry::Dir(_) => {
                return Err(UsageError::NotAFile(resource_path.into()).into());
            }
        };

        if file.is_invalid() {
            warn!(resource = resource_path, "resource file entry is flagged as invalid");
        }

        let data_offset = u64::from(self.shared.header.data_offset);
        let contents = read_resource(&mut self.reader, data_offset, resource_path, file)?;

        if validate_crc && file.crc32 != INVALID_CHECKSUM && !contents.is_empty() {
            let actual = CRC32.checksum(&contents);
            if actual != file.crc32 {
                return Err(Error::ChecksumMismatch {
                    path: resource_path.into(),
                    expected: file.crc32,
                    actual,
                });
            }
        }

        debug!(resource = resource_path, size = contents.len(), "resource extracted");
        Ok(contents)
    }

    /// Extract a single resource and write it to `dest`, creating missing
    /// intermediate directories.
    pub fn extract_to_file(
        &mut self,
        resource_path: &str,
        dest: impl AsRef<Path>,
        validate_crc: bool,
    ) -> Result<()> {
        let contents = self.extract_to_memory(resource_path, validate_crc)?;
        write_resource_file(dest.as_ref(), &contents)
    }

    /// Same as [`Self::extract_to_file`], but the disk write runs as a
    /// background task. A bad path, codec failure or checksum mismatch
    /// still surfaces synchronously; only the write outcome is deferred
    /// to [`WriteTask::join`].
    pub fn extract_to_file_async(
        &mut self,
        resource_path: &str,
        dest: impl AsRef<Path>,
        validate_crc: bool,
    ) -> Result<WriteTask> {
        let contents = self.extract_to_memory(resource_path, validate_crc)?;
        let dest = dest.as_ref().to_path_buf();

        let handle = thread::spawn({
            let dest = dest.clone();
            move || write_resource_file(&dest, &contents)
        });

        Ok(WriteTask { dest, handle })
    }

    /// Extract every file in the archive under `dest_dir`, recreating the
    /// directory tree. Individual failures are logged and tallied; they
    /// never abort the remaining files.
    pub fn extract_all(
        &mut self,
        dest_dir: impl AsRef<Path>,
        validate_crc: bool,
    ) -> Result<ExtractSummary> {
        let dest_dir = dest_dir.as_ref();
        fs::create_dir_all(dest_dir).map_err(|source| Error::Write {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        for dir_path in self.directory_paths() {
            let dest = dest_dir.join(relative_path(dir_path));
            fs::create_dir_all(&dest).map_err(|source| Error::Write { path: dest, source })?;
        }

        let resource_paths: Vec<String> = self.file_paths().map(str::to_owned).collect();

        let mut summary = ExtractSummary::default();
        let mut tasks = Vec::with_capacity(resource_paths.len());
        for resource_path in &resource_paths {
            let dest = dest_dir.join(relative_path(resource_path));
            match self.extract_to_file_async(resource_path, &dest, validate_crc) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    warn!(resource = %resource_path, error = %err, "failed to extract resource");
                    summary.failed += 1;
                }
            }
        }

        // Once all writes are in flight, synchronize on every task.
        for task in tasks {
            let dest = task.dest().to_path_buf();
            match task.join() {
                Ok(()) => summary.written += 1,
                Err(err) => {
                    warn!(dest = %dest.display(), error = %err, "failed to write resource");
                    summary.failed += 1;
                }
            }
        }

        info!(
            written = summary.written,
            failed = summary.failed,
            dest = %dest_dir.display(),
            "whole-archive extraction finished"
        );
        Ok(summary)
    }
}

// Full archive paths are absolute-looking; strip the leading separator so
// they join cleanly under the destination directory.
fn relative_path(path: &str) -> &Path {
    Path::new(path.trim_start_matches(PATH_SEPARATOR))
}

fn write_resource_file(dest: &Path, contents: &[u8]) -> Result<()> {
    let io = |source| Error::Write {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(io)?;
    }

    if contents.is_empty() {
        warn!(dest = %dest.display(), "writing an empty resource file");
    }

    let mut out = File::create(dest).map_err(io)?;
    out.write_all(contents).map_err(io)?;
    Ok(())
}

/// Reconstruct a resource's uncompressed bytes.
///
/// Raw payloads are a single verbatim read. Compressed payloads are
/// reassembled chunk by chunk, in stored order: the decompressed prefix of
/// each chunk followed by its extra bytes, copied unchanged from the tail
/// of the compressed read.
fn read_resource<R: Read + Seek>(
    reader: &mut R,
    data_offset: u64,
    resource_path: &str,
    file: &FileEntry,
) -> Result<Vec<u8>> {
    let payload_base = data_offset + u64::from(file.offset);

    if !file.is_compressed() {
        // Some retail tanks contain legitimate zero-byte placeholder
        // entries; those produce empty contents without any read.
        if file.size == 0 {
            return Ok(Vec::new());
        }

        reader.seek(SeekFrom::Start(payload_base))?;
        let mut contents = vec![0u8; file.size as usize];
        reader.read_exact(&mut contents)?;
        return Ok(contents);
    }

    let Some(compressed) = &file.compressed else {
        // Compressed format with zero size carries no compression header.
        return Ok(Vec::new());
    };

    let mut contents = Vec::with_capacity(file.size as usize);
    for (index, chunk) in compressed.chunks.iter().enumerate() {
        let chunk_base = payload_base + u64::from(chunk.offset);
        reader.seek(SeekFrom::Start(chunk_base))?;

        if chunk.is_compressed() {
            let mut buf = vec![0u8; chunk.compressed_size as usize + chunk.extra_bytes as usize];
            reader.read_exact(&mut buf)?;

            let stream = &buf[..chunk.compressed_size as usize];
            let decompressed =
                compression::decompress(file.format, stream, chunk.uncompressed_size as usize)
                    .map_err(|source| Error::Codec {
                        path: resource_path.into(),
                        source,
                    })?;

            if decompressed.len() != chunk.uncompressed_size as usize {
                return Err(FormatError::ChunkSizeMismatch {
                    path: resource_path.into(),
                    index,
                    expected: chunk.uncompressed_size,
                    actual: decompressed.len(),
                }
                .into());
            }

            contents.extend_from_slice(&decompressed);
            // The extra bytes are not part of the compressed stream; they
            // are restored verbatim after the decompressed prefix.
            contents.extend_from_slice(&buf[chunk.compressed_size as usize..]);
        } else {
            let mut chunk_contents = vec![0u8; chunk.uncompressed_size as usize];
            reader.read_exact(&mut chunk_contents)?;
            contents.extend_from_slice(&chunk_contents);
        }
    }

    Ok(contents)
}
