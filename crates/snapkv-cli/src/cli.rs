use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "snapkv",
    about = "snapkv: in-memory key-value store with snapshot files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with store settings (save mode, write mode, sync mode, size limit)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set two keys, save, reload, and read one back
    Demo(DemoArgs),
    /// Set a key in a snapshot file
    Set(SetArgs),
    /// Read a key from a snapshot file
    Get(GetArgs),
    /// Remove a key from a snapshot file
    Rm(RmArgs),
    /// List every entry in a snapshot file
    List(ListArgs),
    /// Summarize a snapshot file
    Stats(StatsArgs),
}

#[derive(Args)]
pub struct DemoArgs {
    #[arg(long, default_value = "database.snap")]
    pub path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
    Null,
}

#[derive(Args)]
pub struct SetArgs {
    pub snapshot: PathBuf,
    pub key: String,
    /// Ignored for `--type null`
    #[arg(default_value = "")]
    pub value: String,
    #[arg(long = "type", default_value = "str")]
    pub value_type: ValueType,
}

#[derive(Args)]
pub struct GetArgs {
    pub snapshot: PathBuf,
    pub key: String,
}

#[derive(Args)]
pub struct RmArgs {
    pub snapshot: PathBuf,
    pub key: String,
}

#[derive(Args)]
pub struct ListArgs {
    pub snapshot: PathBuf,
}

#[derive(Args)]
pub struct StatsArgs {
    pub snapshot: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_set_with_type() {
        let cli = Cli::parse_from(["snapkv", "set", "db.snap", "n", "42", "--type", "int"]);
        match cli.command {
            Command::Set(args) => {
                assert_eq!(args.key, "n");
                assert_eq!(args.value, "42");
                assert_eq!(args.value_type, ValueType::Int);
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["snapkv", "list", "db.snap", "--format", "json", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn demo_default_path() {
        let cli = Cli::parse_from(["snapkv", "demo"]);
        match cli.command {
            Command::Demo(args) => assert_eq!(args.path, PathBuf::from("database.snap")),
            _ => panic!("expected demo"),
        }
    }
}
