//! This library handles indexing and extracting resources from **Tank** files used by *Dungeon Siege*.
//!
//! # Tank Archive Format Documentation
//!
//! This crate provides utilities to read and extract data from the **Tank** archive format used by
//! the game *Dungeon Siege*. A Tank packs a whole virtual directory tree plus per-file compressed
//! payloads into one seekable binary blob. Tank files typically carry the `.dsres`, `.dsmap` or
//! `.dsdlc` extensions.
//!
//! ## File Structure
//!
//! A Tank consists of a header, the data section holding the raw/compressed file payloads, and an
//! index made of two offset-addressed record arrays: the **DirSet** (directories) and the
//! **FileSet** (files).
//!
//! | Region                  | Contents                                                            |
//! |-------------------------|---------------------------------------------------------------------|
//! | Header                  | identifiers, layout offsets, versions, GUID, checksums, text fields |
//! | Data section            | file payloads, raw or chunked-compressed                            |
//! | DirSet                  | count + count×offset + count×DirEntry                               |
//! | FileSet                 | count + count×offset + count×FileEntry                              |
//!
//! ### Header
//!
//! All multi-byte integers are little-endian. The header starts with two mandatory 4-byte
//! identifiers, `DSig` then `Tank`; a file missing either is not a Tank. The layout is:
//!
//! | Field             | Size | Description                                                  |
//! |-------------------|------|--------------------------------------------------------------|
//! | Product id        | 4    | Always `DSig`                                                |
//! | Tank id           | 4    | Always `Tank`                                                |
//! | Header version    | 4    | Packed version word, 1.0.2 on the retail game                |
//! | DirSet offset     | 4    | Offset of the DirSet, from the start of the file             |
//! | FileSet offset    | 4    | Offset of the FileSet, from the start of the file            |
//! | Index size        | 4    | Total size of the index                                      |
//! | Data offset       | 4    | Offset of the data section, from the start of the file       |
//! | Product version   | 12   | Three version dwords                                         |
//! | Minimum version   | 12   | Minimum product version required to use this tank            |
//! | Priority          | 4    | Master-index priority class (`Factory`, `Language`, ...)     |
//! | Flags             | 4    | Tank-wide flag bits                                          |
//! | Creator id        | 4    | `!GPG` or `USER`                                             |
//! | GUID              | 16   | Assigned at creation time                                    |
//! | Index CRC-32      | 4    | Checksum of the index (not including the header)             |
//! | Data CRC-32       | 4    | Checksum of the data section                                 |
//! | Build time        | 16   | UTC build timestamp (eight u16 fields)                       |
//! | Copyright text    | 200  | Zero-terminated UTF-16, fixed capacity of 100 code units     |
//! | Build text        | 200  | Zero-terminated UTF-16, fixed capacity of 100 code units     |
//! | Title text        | 200  | Zero-terminated UTF-16, fixed capacity of 100 code units     |
//! | Author text       | 80   | Zero-terminated UTF-16, fixed capacity of 40 code units      |
//! | Description text  | var. | Length-prefixed wide string (see below)                      |
//!
//! ### Length-prefixed strings
//!
//! Entry names and the header description use a dword-aligned encoding: a u16 length, then that
//! many bytes (or u16 code units for the wide form), zero-padded so that the total unit, counting
//! the length field and a terminator, lands on a 4-byte boundary. A zero length still consumes a
//! full aligned unit of four bytes.
//!
//! ### DirSet and FileSet
//!
//! Each set starts with a u32 entry count, followed by `count` u32 offsets, followed by the entry
//! records themselves. Every offset is relative to the base of its own set, and **offsets are not
//! array indices**: parent and child references must be resolved by locating the matching value in
//! the offset table. The sentinel `0xFFFFFFFF` means "invalid" and must never be dereferenced.
//!
//! A **DirEntry** is: parent offset (u32, `0` for the root), child count (u32), modification time
//! (u64 as two u32 halves), name (length-prefixed string), then `child count` u32 child offsets
//! covering both subdirectories and files. The root directory has parent offset 0 and an empty
//! stored name.
//!
//! A **FileEntry** is: parent offset (u32), uncompressed size (u32), payload offset relative to
//! the data section (u32), CRC-32 of the uncompressed contents (u32), modification time, data
//! format (u16: 0 raw, 1 zlib, 2 lzo), flags (u16), name. Entries in a non-raw format whose size
//! is nonzero are followed by a compression header: total compressed size (u32), chunk size (u32,
//! 0 for unchunked), then `ceil(size / chunkSize)` chunk headers of four u32 each: uncompressed
//! size, compressed size, extra bytes, and chunk offset relative to the file's payload.
//!
//! ### Chunked compression
//!
//! Large payloads are split into independently compressed chunks so the game can random-access
//! them. A chunk is compressed iff its uncompressed and compressed sizes differ. The trailing
//! "extra bytes" of a chunk sit after the compressed stream and are **not** part of it: they are
//! decompressor-overrun bytes that must be copied back verbatim after the decompressed prefix to
//! reconstruct the chunk's logical contents.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.dsres`, `.dsmap`, `.dsdlc`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Data Formats**:
//!   - `0`: Raw (no compression)
//!   - `1`: Zlib
//!   - `2`: Lzo (recognized, extraction unsupported)
//!

pub mod compression;
pub mod error;
pub mod extract;
pub mod read;
pub mod types;

pub use compression::DataFormat;
pub use extract::{ExtractSummary, WriteTask};
pub use read::{EntryRef, TankArchive};
