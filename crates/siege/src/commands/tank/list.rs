use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use miette::Result;
use siege_tank::TankArchive;

#[derive(Args)]
pub struct ListArgs {
    /// An input Tank file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// List directories instead of files
    #[arg(long, default_value_t = false)]
    directories: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let tank = TankArchive::open(&self.file)?;

        let paths: Vec<&str> = if self.directories {
            tank.directory_paths().sorted().collect()
        } else {
            tank.file_paths().sorted().collect()
        };

        for path in paths {
            println!("{path}");
        }
        Ok(())
    }
}
