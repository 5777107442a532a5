//! In-memory Tank fixtures for the integration tests.
//!
//! The library deliberately has no write path, so the tests assemble
//! archives by hand: header, data section, DirSet, FileSet, in that order,
//! with all offsets computed up front.

#![allow(dead_code)]

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use crc::{Crc, CRC_32_ISO_HDLC};
use flate2::{write::ZlibEncoder, Compression};

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub fn checksum(contents: &[u8]) -> u32 {
    CRC32.checksum(contents)
}

pub fn deflate(input: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input).unwrap();
    encoder.finish().unwrap()
}

/// Overwrite a little-endian u32 in place, for corruption tests.
pub fn patch_u32(bytes: &mut [u8], pos: usize, value: u32) {
    bytes[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

/// One chunk of a zlib file. The chunk's logical contents are `plain`
/// followed by `extra` (the extra bytes are stored after the compressed
/// stream and restored verbatim). A chunk stored raw has no extra bytes.
pub struct ChunkSpec {
    pub plain: Vec<u8>,
    pub extra: Vec<u8>,
    pub store_raw: bool,
}

impl ChunkSpec {
    pub fn compressed(plain: &[u8], extra: &[u8]) -> Self {
        ChunkSpec {
            plain: plain.to_vec(),
            extra: extra.to_vec(),
            store_raw: false,
        }
    }

    pub fn raw(plain: &[u8]) -> Self {
        ChunkSpec {
            plain: plain.to_vec(),
            extra: Vec::new(),
            store_raw: true,
        }
    }

    fn logical_contents(&self) -> Vec<u8> {
        let mut contents = self.plain.clone();
        if !self.store_raw {
            contents.extend_from_slice(&self.extra);
        }
        contents
    }
}

pub enum FilePayload {
    Raw(Vec<u8>),
    Zlib { chunk_size: u32, chunks: Vec<ChunkSpec> },
}

pub struct FileSpec {
    pub parent: usize,
    pub name: String,
    pub payload: FilePayload,
    pub flags: u16,
    pub crc_override: Option<u32>,
}

impl FileSpec {
    pub fn logical_contents(&self) -> Vec<u8> {
        match &self.payload {
            FilePayload::Raw(bytes) => bytes.clone(),
            FilePayload::Zlib { chunks, .. } => chunks
                .iter()
                .flat_map(ChunkSpec::logical_contents)
                .collect(),
        }
    }
}

struct DirSpec {
    parent: Option<usize>,
    name: String,
}

/// Byte positions of everything the corruption tests want to reach.
pub struct Layout {
    pub data_offset: u32,
    pub dirset_offset: u32,
    pub fileset_offset: u32,
    /// Entry offsets relative to the DirSet base, in array order.
    pub dir_entry_offsets: Vec<u32>,
    /// Entry offsets relative to the FileSet base, in array order.
    pub file_entry_offsets: Vec<u32>,
    /// Payload offsets relative to the data section, in array order.
    pub file_payload_offsets: Vec<u32>,
}

pub struct TankBuilder {
    header_version: u32,
    creator_id: [u8; 4],
    title: String,
    dirs: Vec<DirSpec>,
    files: Vec<FileSpec>,
}

impl TankBuilder {
    /// A builder holding just the root directory.
    pub fn new() -> Self {
        TankBuilder {
            header_version: siege_tank::types::EXPECTED_HEADER_VERSION,
            creator_id: *b"!GPG",
            title: String::new(),
            dirs: vec![DirSpec {
                parent: None,
                name: String::new(),
            }],
            files: Vec::new(),
        }
    }

    pub fn header_version(&mut self, version: u32) -> &mut Self {
        self.header_version = version;
        self
    }

    pub fn creator_id(&mut self, creator_id: [u8; 4]) -> &mut Self {
        self.creator_id = creator_id;
        self
    }

    pub fn title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Add a directory under `parent` (0 is the root); returns its index.
    pub fn dir(&mut self, parent: usize, name: &str) -> usize {
        self.dirs.push(DirSpec {
            parent: Some(parent),
            name: name.to_string(),
        });
        self.dirs.len() - 1
    }

    pub fn raw_file(&mut self, parent: usize, name: &str, contents: &[u8]) -> usize {
        self.push_file(FileSpec {
            parent,
            name: name.to_string(),
            payload: FilePayload::Raw(contents.to_vec()),
            flags: 0,
            crc_override: None,
        })
    }

    pub fn zlib_file(
        &mut self,
        parent: usize,
        name: &str,
        chunk_size: u32,
        chunks: Vec<ChunkSpec>,
    ) -> usize {
        self.push_file(FileSpec {
            parent,
            name: name.to_string(),
            payload: FilePayload::Zlib { chunk_size, chunks },
            flags: 0,
            crc_override: None,
        })
    }

    pub fn push_file(&mut self, spec: FileSpec) -> usize {
        if let FilePayload::Zlib { chunk_size, chunks } = &spec.payload {
            let size = spec.logical_contents().len() as u32;
            if size != 0 {
                // The reader derives the chunk count from size and chunk
                // size; the fixture must agree with it.
                assert_eq!(chunks.len() as u32, size.div_ceil(*chunk_size));
            }
        }
        self.files.push(spec);
        self.files.len() - 1
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        // Per-file payload blobs and chunk tables.
        let mut data = Vec::new();
        let mut file_payload_offsets = Vec::new();
        let mut file_chunk_tables: Vec<Option<(u32, Vec<EncodedChunk>)>> = Vec::new();
        for spec in &self.files {
            file_payload_offsets.push(data.len() as u32);
            match &spec.payload {
                FilePayload::Raw(bytes) => {
                    data.extend_from_slice(bytes);
                    file_chunk_tables.push(None);
                }
                FilePayload::Zlib { chunk_size, chunks } => {
                    let mut encoded = Vec::new();
                    let mut running = 0u32;
                    for chunk in chunks {
                        let blob = if chunk.store_raw {
                            chunk.plain.clone()
                        } else {
                            let mut blob = deflate(&chunk.plain);
                            assert_ne!(blob.len(), chunk.plain.len());
                            blob.extend_from_slice(&chunk.extra);
                            blob
                        };
                        let compressed_size = if chunk.store_raw {
                            chunk.plain.len() as u32
                        } else {
                            (blob.len() - chunk.extra.len()) as u32
                        };
                        encoded.push(EncodedChunk {
                            uncompressed_size: chunk.plain.len() as u32,
                            compressed_size,
                            extra_bytes: if chunk.store_raw {
                                0
                            } else {
                                chunk.extra.len() as u32
                            },
                            offset: running,
                        });
                        running += blob.len() as u32;
                        data.extend_from_slice(&blob);
                    }
                    file_chunk_tables.push(Some((*chunk_size, encoded)));
                }
            }
        }

        // Entry offsets within each set, after the count + offset table.
        let file_entry_offsets = {
            let mut offsets = Vec::new();
            let mut next = 4 + 4 * self.files.len() as u32;
            for (spec, table) in self.files.iter().zip(&file_chunk_tables) {
                offsets.push(next);
                let mut len = 16 + 8 + 4 + nstring_len(&spec.name);
                if let Some((_, chunks)) = table {
                    len += 8 + 16 * chunks.len() as u32;
                }
                next += len;
            }
            offsets
        };

        let children: Vec<Vec<u32>> = {
            let mut dir_entry_offsets = Vec::new();
            let mut next = 4 + 4 * self.dirs.len() as u32;
            for (index, spec) in self.dirs.iter().enumerate() {
                dir_entry_offsets.push(next);
                let count = self.child_count(index);
                next += 8 + 8 + nstring_len(&spec.name) + 4 * count;
            }

            (0..self.dirs.len())
                .map(|index| {
                    let mut offsets: Vec<u32> = self
                        .dirs
                        .iter()
                        .enumerate()
                        .filter(|(_, d)| d.parent == Some(index))
                        .map(|(child, _)| dir_entry_offsets[child])
                        .collect();
                    offsets.extend(
                        self.files
                            .iter()
                            .enumerate()
                            .filter(|(_, f)| f.parent == index)
                            .map(|(child, _)| file_entry_offsets[child]),
                    );
                    offsets
                })
                .collect()
        };

        let mut dir_entry_offsets = Vec::new();
        let mut next = 4 + 4 * self.dirs.len() as u32;
        for (index, spec) in self.dirs.iter().enumerate() {
            dir_entry_offsets.push(next);
            next += 8 + 8 + nstring_len(&spec.name) + 4 * children[index].len() as u32;
        }

        // DirSet blob.
        let mut dirset = Vec::new();
        dirset
            .write_u32::<LittleEndian>(self.dirs.len() as u32)
            .unwrap();
        for &offset in &dir_entry_offsets {
            dirset.write_u32::<LittleEndian>(offset).unwrap();
        }
        for (index, spec) in self.dirs.iter().enumerate() {
            let parent_offset = match spec.parent {
                None => 0,
                Some(parent) => dir_entry_offsets[parent],
            };
            dirset.write_u32::<LittleEndian>(parent_offset).unwrap();
            dirset
                .write_u32::<LittleEndian>(children[index].len() as u32)
                .unwrap();
            dirset.write_u64::<LittleEndian>(0).unwrap(); // file time
            write_nstring(&mut dirset, &spec.name);
            for &child in &children[index] {
                dirset.write_u32::<LittleEndian>(child).unwrap();
            }
        }

        // FileSet blob.
        let mut fileset = Vec::new();
        fileset
            .write_u32::<LittleEndian>(self.files.len() as u32)
            .unwrap();
        for &offset in &file_entry_offsets {
            fileset.write_u32::<LittleEndian>(offset).unwrap();
        }
        for ((spec, table), &payload_offset) in self
            .files
            .iter()
            .zip(&file_chunk_tables)
            .zip(&file_payload_offsets)
        {
            let contents = spec.logical_contents();
            let parent_offset = if spec.parent == 0 {
                0
            } else {
                dir_entry_offsets[spec.parent]
            };
            let format: u16 = match &spec.payload {
                FilePayload::Raw(_) => 0,
                FilePayload::Zlib { .. } => 1,
            };

            fileset.write_u32::<LittleEndian>(parent_offset).unwrap();
            fileset
                .write_u32::<LittleEndian>(contents.len() as u32)
                .unwrap();
            fileset.write_u32::<LittleEndian>(payload_offset).unwrap();
            fileset
                .write_u32::<LittleEndian>(spec.crc_override.unwrap_or_else(|| checksum(&contents)))
                .unwrap();
            fileset.write_u64::<LittleEndian>(0).unwrap(); // file time
            fileset.write_u16::<LittleEndian>(format).unwrap();
            fileset.write_u16::<LittleEndian>(spec.flags).unwrap();
            write_nstring(&mut fileset, &spec.name);

            if let Some((chunk_size, chunks)) = table {
                let compressed_size: u32 = chunks.iter().map(|c| c.compressed_size).sum();
                fileset.write_u32::<LittleEndian>(compressed_size).unwrap();
                fileset.write_u32::<LittleEndian>(*chunk_size).unwrap();
                for chunk in chunks {
                    fileset
                        .write_u32::<LittleEndian>(chunk.uncompressed_size)
                        .unwrap();
                    fileset
                        .write_u32::<LittleEndian>(chunk.compressed_size)
                        .unwrap();
                    fileset.write_u32::<LittleEndian>(chunk.extra_bytes).unwrap();
                    fileset.write_u32::<LittleEndian>(chunk.offset).unwrap();
                }
            }
        }

        // Header last, once every section length is known.
        let header_len = self.encode_header(0, 0, 0, 0).len() as u32;
        let data_offset = header_len;
        let dirset_offset = data_offset + data.len() as u32;
        let fileset_offset = dirset_offset + dirset.len() as u32;
        let index_size = dirset.len() as u32 + fileset.len() as u32;

        let mut bytes = self.encode_header(dirset_offset, fileset_offset, index_size, data_offset);
        bytes.extend_from_slice(&data);
        bytes.extend_from_slice(&dirset);
        bytes.extend_from_slice(&fileset);

        (
            bytes,
            Layout {
                data_offset,
                dirset_offset,
                fileset_offset,
                dir_entry_offsets,
                file_entry_offsets,
                file_payload_offsets,
            },
        )
    }

    fn child_count(&self, index: usize) -> u32 {
        let dirs = self
            .dirs
            .iter()
            .filter(|d| d.parent == Some(index))
            .count();
        let files = self.files.iter().filter(|f| f.parent == index).count();
        (dirs + files) as u32
    }

    fn encode_header(
        &self,
        dirset_offset: u32,
        fileset_offset: u32,
        index_size: u32,
        data_offset: u32,
    ) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(b"DSig");
        header.extend_from_slice(b"Tank");
        header.write_u32::<LittleEndian>(self.header_version).unwrap();
        header.write_u32::<LittleEndian>(dirset_offset).unwrap();
        header.write_u32::<LittleEndian>(fileset_offset).unwrap();
        header.write_u32::<LittleEndian>(index_size).unwrap();
        header.write_u32::<LittleEndian>(data_offset).unwrap();
        for _ in 0..6 {
            header.write_u32::<LittleEndian>(0).unwrap(); // version triples
        }
        header.write_u32::<LittleEndian>(0x1000).unwrap(); // priority: Language
        header.write_u32::<LittleEndian>(0).unwrap(); // flags
        header.extend_from_slice(&self.creator_id);
        header.extend_from_slice(&[0u8; 16]); // guid
        header.write_u32::<LittleEndian>(0).unwrap(); // index crc32
        header.write_u32::<LittleEndian>(0).unwrap(); // data crc32
        header.extend_from_slice(&[0u8; 16]); // build time
        write_wide_fixed(&mut header, "", 100); // copyright
        write_wide_fixed(&mut header, "", 100); // build
        write_wide_fixed(&mut header, &self.title, 100);
        write_wide_fixed(&mut header, "", 40); // author
        header.write_u32::<LittleEndian>(0).unwrap(); // empty description
        header
    }
}

struct EncodedChunk {
    uncompressed_size: u32,
    compressed_size: u32,
    extra_bytes: u32,
    offset: u32,
}

fn nstring_len(s: &str) -> u32 {
    if s.is_empty() {
        return 4;
    }
    let unit = s.len() as u32 + 2;
    2 + (unit + (4 - unit % 4)) - 2
}

fn write_nstring(out: &mut Vec<u8>, s: &str) {
    out.write_u16::<LittleEndian>(s.len() as u16).unwrap();
    if s.is_empty() {
        out.write_u16::<LittleEndian>(0).unwrap();
        return;
    }
    let unit = s.len() as u32 + 2;
    let padded = (unit + (4 - unit % 4)) - 2;
    out.extend_from_slice(s.as_bytes());
    for _ in 0..(padded as usize - s.len()) {
        out.push(0);
    }
}

fn write_wide_fixed(out: &mut Vec<u8>, s: &str, capacity: usize) {
    let units: Vec<u16> = s.encode_utf16().collect();
    assert!(units.len() < capacity);
    for &unit in &units {
        out.write_u16::<LittleEndian>(unit).unwrap();
    }
    for _ in units.len()..capacity {
        out.write_u16::<LittleEndian>(0).unwrap();
    }
}
