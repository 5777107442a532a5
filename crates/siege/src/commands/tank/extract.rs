use std::path::PathBuf;

use clap::Args;
use miette::{miette, Result};
use siege_tank::read::PATH_SEPARATOR;
use siege_tank::TankArchive;
use tracing::info;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input Tank file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Extract a single resource by its full archive path
    #[arg(short, long, value_name = "PATH")]
    resource: Option<String>,

    /// Verify each resource checksum while extracting
    #[arg(long, default_value_t = false)]
    validate: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let mut tank = TankArchive::open(&self.file)?;

        match &self.resource {
            Some(resource) => {
                let dest = self
                    .directory
                    .join(resource.trim_start_matches(PATH_SEPARATOR));
                info!("writing {}", dest.display());
                tank.extract_to_file(resource, &dest, self.validate)?;
            }
            None => {
                let summary = tank.extract_all(&self.directory, self.validate)?;
                info!(
                    "extracted {} resources to {}",
                    summary.written,
                    self.directory.display()
                );
                if summary.failed > 0 {
                    return Err(miette!("{} resources failed to extract", summary.failed));
                }
            }
        }
        Ok(())
    }
}
