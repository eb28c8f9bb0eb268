use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use ferry_catalog::StaticCatalog;
use ferry_engine::{Engine, EngineConfig};
use ferry_fetch::ReqwestClient;

use super::{delete, fetch, list, status};

pub type FerryEngine = Engine<ReqwestClient, StaticCatalog>;

#[derive(Clone, Debug, Parser)]
#[command(name = "ferry", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Catalog manifest (TOML, one `[[entry]]` table per model).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub catalog: PathBuf,

    /// Engine configuration file (TOML).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Storage directory, overriding the configuration.
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "ls", name = "list", about = "List catalog entries and their state")]
    List(list::ListArg),
    #[command(alias = "get", name = "fetch", about = "Download, verify and install entries")]
    Fetch(fetch::FetchArg),
    #[command(alias = "rm", name = "delete", about = "Remove downloaded and partial files")]
    Delete(delete::DeleteArg),
    #[command(alias = "st", name = "status", about = "Show the state of every entry")]
    Status(status::StatusArg),
}

impl App {
    pub async fn run(self) -> Result<ExitCode> {
        let engine = self.open_engine()?;

        match self.cmd {
            Commands::List(arg) => arg.run(&engine),
            Commands::Fetch(arg) => arg.run(&engine).await,
            Commands::Delete(arg) => arg.run(&engine).await,
            Commands::Status(arg) => arg.run(&engine),
        }
    }

    fn open_engine(&self) -> Result<FerryEngine> {
        let catalog = StaticCatalog::load(&self.catalog)
            .with_context(|| format!("loading catalog '{}'", self.catalog.display()))?;

        if let Some(path) = &self.config
            && !path.is_file()
        {
            bail!("configuration file '{}' does not exist", path.display());
        }
        let mut config = EngineConfig::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(dir) = &self.dir {
            config = config.with_storage_dir(dir);
        }

        let client = ReqwestClient::new(&config.client_options()).context("building HTTP client")?;
        let dir = config.storage_dir.clone();
        Engine::new(client, catalog, config)
            .with_context(|| format!("opening storage directory '{}'", dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() { App::command().debug_assert(); }

    #[test]
    fn test_parse_fetch() {
        let app = App::try_parse_from(["ferry", "-c", "models.toml", "-vv", "fetch", "a", "b"]).unwrap();
        assert_eq!(app.verbose, 2);
        match app.cmd {
            Commands::Fetch(arg) => assert_eq!(arg.ids, ["a", "b"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_catalog_is_required() {
        assert!(App::try_parse_from(["ferry", "list"]).is_err());
    }

    #[test]
    fn test_aliases() {
        let app = App::try_parse_from(["ferry", "--catalog", "m.toml", "rm", "a"]).unwrap();
        assert!(matches!(app.cmd, Commands::Delete(_)));
        let app = App::try_parse_from(["ferry", "--catalog", "m.toml", "st", "--json"]).unwrap();
        assert!(matches!(app.cmd, Commands::Status(ref s) if s.json));
        let app = App::try_parse_from(["ferry", "--catalog", "m.toml", "ls", "-l"]).unwrap();
        assert!(matches!(app.cmd, Commands::List(ref l) if l.long && !l.no_header));
    }
}
