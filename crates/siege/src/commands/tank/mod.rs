pub mod extract;
pub mod info;
pub mod list;

#[derive(clap::Subcommand)]
pub enum TankCommands {
    /// Extract a Tank file into a directory
    Extract(extract::ExtractArgs),
    /// Print the header of a Tank file
    Info(info::InfoArgs),
    /// List the contents of a Tank file
    List(list::ListArgs),
}

impl TankCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            TankCommands::Extract(extract) => extract.handle(),
            TankCommands::Info(info) => info.handle(),
            TankCommands::List(list) => list.handle(),
        }
    }
}
