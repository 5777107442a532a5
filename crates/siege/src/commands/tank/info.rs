use std::path::PathBuf;

use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;
use siege_tank::types::{
    version_word_to_string, TANK_FLAG_ALLOW_MULTIPLAYER_XFER, TANK_FLAG_NON_RETAIL,
    TANK_FLAG_PROTECTED_CONTENT,
};
use siege_tank::TankArchive;

#[derive(Args)]
pub struct InfoArgs {
    /// An input Tank file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let tank = TankArchive::open(&self.file)?;
        let header = tank.header();

        let priority = match header.priority_class() {
            Some(class) => class.to_string(),
            None => format!("unknown (0x{:04X})", header.priority),
        };

        field("Product", &header.product_id);
        field("Tank", &header.tank_id);
        field("Header version", &version_word_to_string(header.header_version));
        field("Product version", &header.product_version);
        field("Minimum version", &header.minimum_version);
        field("Priority", &priority);
        field("Flags", &format_flags(header.flags));
        field("Creator", &header.creator_id);
        field("GUID", &header.guid);
        field("Index CRC-32", &format!("0x{:08X}", header.index_crc32));
        field("Data CRC-32", &format!("0x{:08X}", header.data_crc32));
        field("Build time", &header.utc_build_time);
        field("Title", &header.title_text.to_string_lossy());
        field("Author", &header.author_text.to_string_lossy());
        field("Copyright", &header.copyright_text.to_string_lossy());
        field("Build", &header.build_text.to_string_lossy());
        field("Description", &header.description_text.to_string_lossy());
        field("Directories", &tank.directory_count());
        field("Files", &tank.file_count());
        match tank.decompressed_size() {
            Some(size) => field("Decompressed size", &size),
            None => field("Decompressed size", &"unknown"),
        }

        Ok(())
    }
}

fn field(name: &str, value: &dyn std::fmt::Display) {
    println!("{:>18}: {}", name.bold(), value);
}

fn format_flags(flags: u32) -> String {
    let names = [
        (TANK_FLAG_NON_RETAIL, "non-retail"),
        (TANK_FLAG_ALLOW_MULTIPLAYER_XFER, "allow-multiplayer-xfer"),
        (TANK_FLAG_PROTECTED_CONTENT, "protected-content"),
    ];
    let set: Vec<&str> = names
        .into_iter()
        .filter(|&(bit, _)| flags & bit != 0)
        .map(|(_, name)| name)
        .collect();

    if set.is_empty() {
        format!("0x{flags:08X}")
    } else {
        format!("0x{:08X} ({})", flags, set.join(", "))
    }
}
