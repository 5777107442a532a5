//! Types for opening and indexing Tank archives.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use tracing::warn;

use crate::compression::CHUNK_SIZE_ALIGNMENT;
use crate::error::{FormatError, Result};
use crate::types::{
    DirEntry, FileEntry, TankHeader, CREATOR_ID_GPG, CREATOR_ID_USER, EXPECTED_HEADER_VERSION,
    INVALID_OFFSET, PRODUCT_ID, TANK_ID,
};

/// Separator used when synthesizing full archive paths. The root directory
/// contributes the separator itself instead of a name segment.
pub const PATH_SEPARATOR: char = std::path::MAIN_SEPARATOR;

/// The decoded DirSet: entries in on-disk array order plus an
/// offset→index map replacing the on-disk offset table, so every
/// parent/child hop is a lookup instead of a linear scan.
#[derive(Debug)]
pub(crate) struct DirSet {
    pub(crate) entries: Vec<DirEntry>,
    by_offset: HashMap<u32, usize>,
}

impl DirSet {
    pub(crate) fn resolve(&self, offset: u32) -> Option<usize> {
        self.by_offset.get(&offset).copied()
    }
}

/// The decoded FileSet.
#[derive(Debug)]
pub(crate) struct FileSet {
    pub(crate) entries: Vec<FileEntry>,
}

/// Index into one of the two entry arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TankEntry {
    Dir(usize),
    File(usize),
}

/// A resolved path table entry: either a directory or a file.
#[derive(Debug, Clone, Copy)]
pub enum EntryRef<'a> {
    Dir(&'a DirEntry),
    File(&'a FileEntry),
}

impl<'a> EntryRef<'a> {
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryRef::Dir(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, EntryRef::File(_))
    }

    pub fn name(&self) -> &'a str {
        match self {
            EntryRef::Dir(dir) => &dir.name,
            EntryRef::File(file) => &file.name,
        }
    }
}

/// Immutable index of an archive: header, entry arrays, path table.
/// Built once at open, shared read-only by every extraction.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) header: TankHeader,
    pub(crate) dirs: DirSet,
    pub(crate) files: FileSet,
    pub(crate) paths: IndexMap<Box<str>, TankEntry>,
}

/// Tank archive reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_tank_contents(reader: impl Read + Seek) -> siege_tank::error::Result<()> {
///     let tank = siege_tank::TankArchive::new(reader)?;
///
///     for path in tank.file_paths() {
///         println!("Resource: {path}");
///     }
///
///     Ok(())
/// }
/// ```
pub struct TankArchive<R> {
    pub(crate) reader: R,
    pub(crate) file_size: u64,
    pub(crate) shared: Arc<Shared>,
}

impl<R> Debug for TankArchive<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TankArchive({:#?})", self.shared.header)
    }
}

impl TankArchive<File> {
    /// Open a Tank file from disk, validate its header and index it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> TankArchive<R> {
    /// Read a Tank archive, validating the header and building the full
    /// path table. The archive is ready for extraction when this returns.
    pub fn new(mut reader: R) -> Result<TankArchive<R>> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        if file_size == 0 {
            warn!("tank file appears to be empty");
        }
        reader.seek(SeekFrom::Start(0))?;

        let shared = Shared::index(&mut reader, file_size)?;
        Ok(TankArchive {
            reader,
            file_size,
            shared: shared.into(),
        })
    }

    /// Rebuild the index from scratch, discarding the previous tables.
    pub fn reindex(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.shared = Arc::new(Shared::index(&mut self.reader, self.file_size)?);
        Ok(())
    }

    /// The validated archive header.
    pub fn header(&self) -> &TankHeader {
        &self.shared.header
    }

    /// Number of file entries in this archive.
    pub fn file_count(&self) -> usize {
        self.shared.files.entries.len()
    }

    /// Number of directory entries in this archive, the root included.
    pub fn directory_count(&self) -> usize {
        self.shared.dirs.entries.len()
    }

    /// Whether this archive contains no files.
    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    /// Returns an iterator over the full paths of every file, in index order.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.shared
            .paths
            .iter()
            .filter(|(_, entry)| matches!(entry, TankEntry::File(_)))
            .map(|(path, _)| path.as_ref())
    }

    /// Returns an iterator over the full paths of every directory, with a
    /// trailing separator, in index order.
    pub fn directory_paths(&self) -> impl Iterator<Item = &str> {
        self.shared
            .paths
            .iter()
            .filter(|(_, entry)| matches!(entry, TankEntry::Dir(_)))
            .map(|(path, _)| path.as_ref())
    }

    /// Look up a full archive path in the path table.
    pub fn entry(&self, path: &str) -> Option<EntryRef<'_>> {
        self.shared.paths.get(path).map(|entry| match *entry {
            TankEntry::Dir(index) => EntryRef::Dir(&self.shared.dirs.entries[index]),
            TankEntry::File(index) => EntryRef::File(&self.shared.files.entries[index]),
        })
    }

    /// Total size of the files in the archive once extracted, if it can be
    /// known. Doesn't include directories or metadata.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in &self.shared.files.entries {
            total = total.checked_add(u128::from(file.size))?;
        }
        Some(total)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl Shared {
    fn index<R: Read + Seek>(reader: &mut R, file_size: u64) -> Result<Shared> {
        let header = read_and_validate_header(reader)?;
        let dirs = read_dir_set(reader, &header, file_size)?;
        let files = read_file_set(reader, &header, file_size)?;
        let paths = build_path_table(&dirs, &files)?;

        Ok(Shared {
            header,
            dirs,
            files,
            paths,
        })
    }
}

fn read_and_validate_header<R: Read + Seek>(reader: &mut R) -> Result<TankHeader> {
    let header = TankHeader::read(reader)?;

    if header.product_id != PRODUCT_ID {
        return Err(FormatError::ProductIdMismatch.into());
    }
    if header.tank_id != TANK_ID {
        return Err(FormatError::TankIdMismatch.into());
    }

    // Compatibility is best-effort beyond the two mandatory ids.
    if header.creator_id != CREATOR_ID_GPG && header.creator_id != CREATOR_ID_USER {
        warn!(creator_id = %header.creator_id, "tank creator id is unknown");
    }
    if header.header_version != EXPECTED_HEADER_VERSION {
        warn!(
            version = %crate::types::version_word_to_string(header.header_version),
            "unexpected tank header version"
        );
    }

    Ok(header)
}

// Every stored offset must land inside the archive and may never be the
// sentinel. Indexing fails outright on the first bad one; there is no
// partial tree.
fn validate_offset(base: u64, offset: u32, file_size: u64) -> bool {
    offset != INVALID_OFFSET && base + u64::from(offset) <= file_size
}

fn read_dir_set<R: Read + Seek>(
    reader: &mut R,
    header: &TankHeader,
    file_size: u64,
) -> Result<DirSet> {
    let base = u64::from(header.dirset_offset);
    reader.seek(SeekFrom::Start(base))?;

    let num_dirs = reader.read_u32::<LittleEndian>()?;
    let mut offsets = Vec::with_capacity(num_dirs as usize);
    for _ in 0..num_dirs {
        let offset = reader.read_u32::<LittleEndian>()?;
        if !validate_offset(base, offset, file_size) {
            return Err(FormatError::InvalidDirOffset(offset).into());
        }
        offsets.push(offset);
    }

    let mut entries = Vec::with_capacity(offsets.len());
    let mut by_offset = HashMap::with_capacity(offsets.len());
    for (index, &offset) in offsets.iter().enumerate() {
        reader.seek(SeekFrom::Start(base + u64::from(offset)))?;
        let mut entry = DirEntry::read(reader)?;

        if entry.parent_offset != 0 && !validate_offset(base, entry.parent_offset, file_size) {
            return Err(FormatError::InvalidDirParentOffset(entry.parent_offset).into());
        }
        for &child in &entry.child_offsets {
            if !validate_offset(base, child, file_size) {
                return Err(FormatError::InvalidChildOffset(child).into());
            }
        }

        // The root is a dummy entry with an empty stored name.
        if entry.is_root() && entry.name.is_empty() {
            entry.name = PATH_SEPARATOR.to_string();
        }

        by_offset.entry(offset).or_insert(index);
        entries.push(entry);
    }

    Ok(DirSet { entries, by_offset })
}

fn read_file_set<R: Read + Seek>(
    reader: &mut R,
    header: &TankHeader,
    file_size: u64,
) -> Result<FileSet> {
    let base = u64::from(header.fileset_offset);
    reader.seek(SeekFrom::Start(base))?;

    let num_files = reader.read_u32::<LittleEndian>()?;
    let mut offsets = Vec::with_capacity(num_files as usize);
    for _ in 0..num_files {
        let offset = reader.read_u32::<LittleEndian>()?;
        if !validate_offset(base, offset, file_size) {
            return Err(FormatError::InvalidFileOffset(offset).into());
        }
        offsets.push(offset);
    }

    let mut entries = Vec::with_capacity(offsets.len());
    for &offset in &offsets {
        reader.seek(SeekFrom::Start(base + u64::from(offset)))?;
        let entry = FileEntry::read(reader)?;

        // File parents live in the DirSet section.
        let dirset_base = u64::from(header.dirset_offset);
        if entry.parent_offset != 0
            && !validate_offset(dirset_base, entry.parent_offset, file_size)
        {
            return Err(FormatError::InvalidFileParentOffset(entry.parent_offset).into());
        }

        if let Some(compressed) = &entry.compressed {
            if compressed.chunk_size % CHUNK_SIZE_ALIGNMENT != 0 {
                warn!(
                    name = %entry.name,
                    chunk_size = compressed.chunk_size,
                    "chunk size is not rounded to the expected alignment"
                );
            }
        }

        entries.push(entry);
    }

    Ok(FileSet { entries })
}

// Walk the parent-offset chain up to the root, appending one separator
// and one name segment per ancestor on the way back down. The root
// terminates the recursion and contributes nothing here.
fn build_dir_path(dirs: &DirSet, index: usize, depth: usize, path: &mut String) -> Result<()> {
    let entry = &dirs.entries[index];
    if entry.parent_offset == 0 {
        return Ok(());
    }
    if depth > dirs.entries.len() {
        return Err(FormatError::ParentChainLoop(entry.name.clone()).into());
    }

    let parent = dirs
        .resolve(entry.parent_offset)
        .ok_or_else(|| FormatError::OrphanDirEntry(entry.name.clone()))?;

    build_dir_path(dirs, parent, depth + 1, path)?;
    path.push(PATH_SEPARATOR);
    path.push_str(&entry.name);
    Ok(())
}

fn build_path_table(dirs: &DirSet, files: &FileSet) -> Result<IndexMap<Box<str>, TankEntry>> {
    let mut paths = IndexMap::with_capacity(dirs.entries.len() + files.entries.len());

    // Directories are keyed with a trailing separator; the root is the
    // separator alone.
    let mut full_path = String::new();
    for index in 0..dirs.entries.len() {
        full_path.clear();
        build_dir_path(dirs, index, 0, &mut full_path)?;
        full_path.push(PATH_SEPARATOR);
        paths.insert(full_path.as_str().into(), TankEntry::Dir(index));
    }

    for (index, entry) in files.entries.iter().enumerate() {
        full_path.clear();
        if entry.parent_offset != 0 {
            let parent =
                dirs.resolve(entry.parent_offset)
                    .ok_or_else(|| FormatError::OrphanFileEntry {
                        name: entry.name.clone(),
                        parent_offset: entry.parent_offset,
                    })?;
            build_dir_path(dirs, parent, 0, &mut full_path)?;
        }
        full_path.push(PATH_SEPARATOR);
        full_path.push_str(&entry.name);
        paths.insert(full_path.as_str().into(), TankEntry::File(index));
    }

    Ok(paths)
}
