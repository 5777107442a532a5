//! Base types for the on-disk structure of a Tank file.

use std::fmt;
use std::io::{Read, Seek};

use binrw::{BinRead, BinResult, Endian};
use widestring::U16String;

use crate::compression::DataFormat;

/// Sentinel offset meaning "invalid/absent". Must never be dereferenced.
pub const INVALID_OFFSET: u32 = 0xFFFF_FFFF;

/// A zero checksum means the value wasn't computed or isn't important.
pub const INVALID_CHECKSUM: u32 = 0x0000_0000;

/// This is a development-only tank (not for retail usage).
pub const TANK_FLAG_NON_RETAIL: u32 = 1 << 0;

/// Allow transfer of this tank during multiplayer.
pub const TANK_FLAG_ALLOW_MULTIPLAYER_XFER: u32 = 1 << 1;

/// This is protected content, for optional use by extractors.
pub const TANK_FLAG_PROTECTED_CONTENT: u32 = 1 << 2;

/// This resource had a problem during construction and is invalid.
pub const FILE_FLAG_INVALID: u16 = 1 << 15;

/// Pack three version bytes into a single 32-bit word. The first byte is unused.
pub const fn make_version_word(major: u32, minor: u32, build: u32) -> u32 {
    ((major & 0xFF) << 16) | ((minor & 0xFF) << 8) | (build & 0xFF)
}

/// Render a packed version word as `major.minor.build`.
pub fn version_word_to_string(word: u32) -> String {
    format!("{}.{}.{}", (word >> 16) & 0xFF, (word >> 8) & 0xFF, word & 0xFF)
}

/// Header version used by Dungeon Siege 1.
pub const EXPECTED_HEADER_VERSION: u32 = make_version_word(1, 0, 2);

/// Four character code, stored as raw bytes in file order.
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
pub struct FourCc(pub [u8; 4]);

/// Product id every Tank starts with.
pub const PRODUCT_ID: FourCc = FourCc(*b"DSig");

/// Container id following the product id.
pub const TANK_ID: FourCc = FourCc(*b"Tank");

/// Creator id of GPG-issued tanks.
pub const CREATOR_ID_GPG: FourCc = FourCc(*b"!GPG");

/// Creator id of user-constructed tanks.
pub const CREATOR_ID_USER: FourCc = FourCc(*b"USER");

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", char::from(b))?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// Product version triple.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct ProductVersion {
    pub version1: u32,
    pub version2: u32,
    pub version3: u32,
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            version_word_to_string(self.version1),
            version_word_to_string(self.version2),
            version_word_to_string(self.version3)
        )
    }
}

/// Build timestamp, laid out like a Windows SYSTEMTIME.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct SystemTime {
    pub year: u16,
    pub month: u16,
    pub day_of_week: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub milliseconds: u16,
}

impl fmt::Display for SystemTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Modification timestamp, a u64 stored as two u32 halves like a Windows FILETIME.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct FileTime {
    pub low_date_time: u32,
    pub high_date_time: u32,
}

impl FileTime {
    /// 100-nanosecond intervals since 1601-01-01 UTC.
    pub fn to_u64(self) -> u64 {
        (u64::from(self.high_date_time) << 32) | u64::from(self.low_date_time)
    }
}

impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:016X}", self.to_u64())
    }
}

/// 128-bit GUID with the usual Windows field split.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

/// Priority of one tank vs another when building the game's master index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Priority {
    /// GPG-issued "factory configured" tank (original CD release).
    Factory,
    /// GPG-issued language pack, filled with localized resource overrides.
    Language,
    /// GPG- or affiliate-issued expansion pack tank.
    Expansion,
    /// Some kind of patch tank.
    Patch,
    /// User-constructed tank.
    User,
}

impl Priority {
    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            0x0000 => Some(Priority::Factory),
            0x1000 => Some(Priority::Language),
            0x2000 => Some(Priority::Expansion),
            0x3000 => Some(Priority::Patch),
            0x4000 => Some(Priority::User),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Priority::Factory => "Factory",
            Priority::Language => "Language",
            Priority::Expansion => "Expansion",
            Priority::Patch => "Patch",
            Priority::User => "User",
        };
        f.write_str(name)
    }
}

// NSTRINGs are stored aligned at a dword boundary, counting the length
// word and a terminator. Always rounds up, never stays put.
fn align_to_dword(size: u32) -> u32 {
    size + (4 - size % 4)
}

/// Length-prefixed, dword-aligned narrow string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NString(pub String);

impl NString {
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl BinRead for NString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let len = u16::read_options(reader, endian, ())?;
        if len == 0 {
            // Waste another word to make this a dword.
            u16::read_options(reader, endian, ())?;
            return Ok(NString(String::new()));
        }

        let padded = align_to_dword(u32::from(len) + 2) - 2;
        let mut buf = vec![0u8; padded as usize];
        reader.read_exact(&mut buf)?;
        buf.truncate(usize::from(len));

        Ok(NString(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// Length-prefixed, dword-aligned wide string (2-byte code units).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WnString(pub U16String);

impl WnString {
    pub fn into_inner(self) -> U16String {
        self.0
    }
}

impl BinRead for WnString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let len = u16::read_options(reader, endian, ())?;
        if len == 0 {
            u16::read_options(reader, endian, ())?;
            return Ok(WnString(U16String::new()));
        }

        let padded = align_to_dword(u32::from(len) + 2) - 2;
        let mut units = Vec::with_capacity(padded as usize);
        for _ in 0..padded {
            units.push(u16::read_options(reader, endian, ())?);
        }
        units.truncate(usize::from(len));

        Ok(WnString(U16String::from_vec(units)))
    }
}

// Fixed-capacity header text: zero-terminated within the buffer.
fn wide_fixed(units: Vec<u16>) -> U16String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    U16String::from_vec(units[..end].to_vec())
}

/// Tank file header
///
/// All offsets are measured from the start of the file (the base of the header).
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(little)]
pub struct TankHeader {
    /// ID of product (human readable), always `DSig`
    pub product_id: FourCc,

    /// ID of tank (human readable), always `Tank`
    pub tank_id: FourCc,

    /// Version of this particular header
    pub header_version: u32,

    /// DirSet offset
    pub dirset_offset: u32,

    /// FileSet offset
    pub fileset_offset: u32,

    /// Total size of the index (header plus all dir data)
    pub index_size: u32,

    /// Offset to the start of the data section
    pub data_offset: u32,

    /// Product version this tank was built with
    pub product_version: ProductVersion,

    /// Minimum product version required to use this tank
    pub minimum_version: ProductVersion,

    /// Priority word this tank is entered into the master index with
    pub priority: u32,

    /// Tank-wide flag bits
    pub flags: u32,

    /// Who created this tank (the creation tool chooses, not the user)
    pub creator_id: FourCc,

    /// True GUID assigned at creation time
    pub guid: Guid,

    /// CRC-32 of just the index (not including the header)
    pub index_crc32: u32,

    /// CRC-32 of just the data
    pub data_crc32: u32,

    /// When this tank was constructed (stored in UTC)
    pub utc_build_time: SystemTime,

    /// Copyright text
    #[br(count = 100, map = wide_fixed)]
    pub copyright_text: U16String,

    /// Text about how this was built
    #[br(count = 100, map = wide_fixed)]
    pub build_text: U16String,

    /// Title of this tank
    #[br(count = 100, map = wide_fixed)]
    pub title_text: U16String,

    /// Who made this tank
    #[br(count = 40, map = wide_fixed)]
    pub author_text: U16String,

    /// Anything the user wants can go here
    #[br(map = WnString::into_inner)]
    pub description_text: U16String,
}

impl TankHeader {
    /// Decoded priority class, if the stored word is a known value.
    pub fn priority_class(&self) -> Option<Priority> {
        Priority::from_word(self.priority)
    }
}

/// One directory record of the DirSet.
///
/// Offsets are relative to the base of the DirSet and are not array
/// indices; resolving one requires locating it in the set's offset table.
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(little)]
pub struct DirEntry {
    /// Base of the parent DirEntry, zero for the root
    pub parent_offset: u32,

    /// How many children (subdirectories and files) this entry has
    pub child_count: u32,

    /// Last modified timestamp of the directory
    pub file_time: FileTime,

    /// Stored name; empty for the root, replaced with the path separator at indexing
    #[br(map = NString::into_inner)]
    pub name: String,

    /// Offsets to each child, sorted
    #[br(count = child_count)]
    pub child_offsets: Vec<u32>,
}

impl DirEntry {
    pub fn is_root(&self) -> bool {
        self.parent_offset == 0
    }
}

/// Header of one independently compressed chunk of a file's payload.
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq)]
#[br(little)]
pub struct ChunkHeader {
    /// Sizes are the same if this chunk is not compressed
    pub uncompressed_size: u32,

    /// Size in bytes while compressed
    pub compressed_size: u32,

    /// Extra bytes to read off the end to allow for decompression overhead
    pub extra_bytes: u32,

    /// Offset from the start of the file's payload to this chunk
    pub offset: u32,
}

impl ChunkHeader {
    pub fn is_compressed(&self) -> bool {
        self.uncompressed_size != self.compressed_size
    }
}

/// Compression header following a [`FileEntry`] stored in a non-raw format.
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(little, import(file_size: u32))]
pub struct CompressedHeader {
    /// Size of the compressed data in bytes
    pub compressed_size: u32,

    /// Size of chunks in bytes, zero for not chunked
    pub chunk_size: u32,

    /// `ceil(file size / chunk size)`
    #[br(calc = if chunk_size != 0 && file_size != 0 { file_size.div_ceil(chunk_size) } else { 0 })]
    pub num_chunks: u32,

    #[br(count = num_chunks)]
    pub chunks: Vec<ChunkHeader>,
}

/// One file record of the FileSet.
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(little)]
pub struct FileEntry {
    /// Base of the parent DirEntry, relative to the DirSet
    pub parent_offset: u32,

    /// Size of the resource when uncompressed
    pub size: u32,

    /// Offset to the payload from the top of the data section
    pub offset: u32,

    /// CRC-32 of just this resource (uncompressed bytes)
    pub crc32: u32,

    /// Last modified timestamp of the file when it was added
    pub file_time: FileTime,

    /// Storage format of the payload
    pub format: DataFormat,

    /// File flag bits (`FILE_FLAG_*`)
    pub flags: u16,

    /// Stored file name
    #[br(map = NString::into_inner)]
    pub name: String,

    /// Present only for non-raw entries with a nonzero size
    #[br(if(format.is_compressed() && size != 0), args(size))]
    pub compressed: Option<CompressedHeader>,
}

impl FileEntry {
    /// This resource had a problem during construction and is invalid.
    pub fn is_invalid(&self) -> bool {
        self.flags & FILE_FLAG_INVALID != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.format.is_compressed()
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.size
    }

    pub fn compressed_size(&self) -> u32 {
        match &self.compressed {
            Some(header) => header.compressed_size,
            None => self.size,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        match &self.compressed {
            Some(header) => header.chunk_size,
            None => 0,
        }
    }
}
