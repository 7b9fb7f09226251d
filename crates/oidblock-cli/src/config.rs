use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use clap::Parser;
use oidblock::{
    CategorySpec, DEFAULT_BLOCK_SIZE_COLUMN, DEFAULT_CATEGORY, DEFAULT_CATEGORY_COLUMN,
    DEFAULT_NEXT_ID_COLUMN, DEFAULT_PADDING_CHAR, DEFAULT_START_ID, DEFAULT_TABLE_NAME, IdFormat,
    RegistryConfig, TableSpec,
};

/// Command-line configuration for the `oidblock` binary.
///
/// Every flag can also be set through the environment (or a `.env` file).
/// Without `--config`, the sequence flags describe every `--category` given.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "oidblock",
    version,
    about = "Hand out block-allocated identifiers from a SQLite database"
)]
pub struct CliArgs {
    /// SQLite database file; created if missing.
    ///
    /// Environment variable: `OIDBLOCK_DATABASE`
    #[arg(long, env = "OIDBLOCK_DATABASE", default_value = "oidblock.db")]
    pub database: PathBuf,

    /// JSON file describing the table and categories. Overrides the table and
    /// sequence flags.
    ///
    /// Environment variable: `OIDBLOCK_CONFIG`
    #[arg(long, env = "OIDBLOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Category to generate identifiers for. Repeatable. Defaults to every
    /// category of `--config`, or `$DEFAULT`.
    ///
    /// Environment variable: `OIDBLOCK_CATEGORIES` (comma separated)
    #[arg(long = "category", env = "OIDBLOCK_CATEGORIES", value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Identifiers to generate per category.
    #[arg(short = 'n', long, env = "OIDBLOCK_COUNT", default_value_t = 1)]
    pub count: usize,

    /// Print raw numbers instead of formatted identifiers.
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// First value of a category whose row does not exist yet.
    #[arg(
        long,
        env = "OIDBLOCK_START_ID",
        default_value_t = DEFAULT_START_ID,
        allow_negative_numbers = true
    )]
    pub start_id: i64,

    /// Values reserved per database round trip. Unset means "use the block
    /// size stored in the category row".
    #[arg(long, env = "OIDBLOCK_BLOCK_SIZE")]
    pub block_size: Option<u32>,

    /// Minimum digit count of formatted identifiers; 0 disables padding.
    #[arg(long, env = "OIDBLOCK_LENGTH", default_value_t = 0)]
    pub length: i32,

    /// Character used to pad identifiers to `--length`.
    #[arg(long, env = "OIDBLOCK_PADDING_CHAR", default_value_t = DEFAULT_PADDING_CHAR)]
    pub padding_char: char,

    /// Text prepended to every formatted identifier.
    #[arg(long, env = "OIDBLOCK_PREFIX")]
    pub prefix: Option<String>,

    /// Schema (or database) the table lives in.
    #[arg(long, env = "OIDBLOCK_TABLE_QUALIFIER")]
    pub table_qualifier: Option<String>,

    #[arg(long, env = "OIDBLOCK_TABLE_NAME", default_value = DEFAULT_TABLE_NAME)]
    pub table_name: String,

    #[arg(long, env = "OIDBLOCK_CATEGORY_COLUMN", default_value = DEFAULT_CATEGORY_COLUMN)]
    pub category_column: String,

    #[arg(long, env = "OIDBLOCK_NEXT_ID_COLUMN", default_value = DEFAULT_NEXT_ID_COLUMN)]
    pub next_id_column: String,

    #[arg(long, env = "OIDBLOCK_BLOCK_SIZE_COLUMN", default_value = DEFAULT_BLOCK_SIZE_COLUMN)]
    pub block_size_column: String,

    /// Skip the table probe; the schema is provisioned out of band.
    #[arg(long, env = "OIDBLOCK_TABLE_ALREADY_CREATED", default_value_t = false)]
    pub table_already_created: bool,

    /// How long to wait on a locked database, in milliseconds.
    #[arg(long, env = "OIDBLOCK_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub database: PathBuf,
    pub busy_timeout: Duration,
    pub count: usize,
    pub raw: bool,
    /// Categories to print, in order.
    pub categories: Vec<String>,
    pub registry: RegistryConfig,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.count == 0 {
            bail!("--count must be greater than 0");
        }

        let requested: Vec<String> = args
            .categories
            .iter()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .collect();

        let registry = match &args.config {
            Some(path) => read_registry_config(path)?,
            None => registry_from_flags(&args, &requested),
        };

        registry.table.validate()?;
        for category in &registry.categories {
            category.validate()?;
        }

        let categories = if requested.is_empty() {
            registry
                .categories
                .iter()
                .map(|category| category.trimmed_name().to_owned())
                .collect()
        } else {
            requested
        };
        if categories.is_empty() {
            bail!("no categories to generate identifiers for");
        }

        Ok(Self {
            database: args.database,
            busy_timeout: Duration::from_millis(args.busy_timeout_ms),
            count: args.count,
            raw: args.raw,
            categories,
            registry,
        })
    }
}

fn read_registry_config(path: &Path) -> anyhow::Result<RegistryConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn registry_from_flags(args: &CliArgs, requested: &[String]) -> RegistryConfig {
    let mut table = TableSpec::new(args.table_name.as_str())
        .with_category_column(args.category_column.as_str())
        .with_next_id_column(args.next_id_column.as_str())
        .with_block_size_column(args.block_size_column.as_str());
    if let Some(qualifier) = &args.table_qualifier {
        table = table.with_qualifier(qualifier.as_str());
    }

    let mut format = IdFormat::new(args.length).with_padding_char(args.padding_char);
    if let Some(prefix) = &args.prefix {
        format = format.with_prefix(prefix.as_str());
    }

    let names = if requested.is_empty() {
        vec![DEFAULT_CATEGORY.to_owned()]
    } else {
        requested.to_vec()
    };
    let categories = names
        .into_iter()
        .map(|name| {
            let spec = CategorySpec::new(name)
                .with_start_id(args.start_id)
                .with_format(format.clone());
            match args.block_size {
                Some(block_size) => spec.with_block_size(block_size),
                None => spec,
            }
        })
        .collect();

    RegistryConfig {
        table,
        table_already_created: args.table_already_created,
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::{CommandFactory, FromArgMatches};

    /// Parses flags only; `OIDBLOCK_*` variables of the calling shell are
    /// ignored.
    fn parse(args: &[&str]) -> anyhow::Result<CliConfig> {
        let matches = CliArgs::command()
            .mut_args(|arg| arg.env(None::<&str>))
            .try_get_matches_from(std::iter::once("oidblock").chain(args.iter().copied()))?;
        let args = CliArgs::from_arg_matches(&matches)?;
        CliConfig::try_from(args)
    }

    #[test]
    fn defaults_to_the_default_category() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.categories, [DEFAULT_CATEGORY]);
        assert_eq!(config.count, 1);
        assert!(!config.raw);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert_eq!(config.registry.table, TableSpec::default());
        assert_eq!(config.registry.categories, [CategorySpec::default()]);
    }

    #[test]
    fn flags_describe_every_category() {
        let config = parse(&[
            "--category",
            "Invoice",
            "--category",
            " Order ",
            "--start-id",
            "1000",
            "--block-size",
            "50",
            "--length",
            "8",
            "--prefix",
            "ID-",
            "--table-name",
            "ID_SEQUENCER",
            "--table-qualifier",
            "main",
            "-n",
            "3",
        ])
        .unwrap();

        assert_eq!(config.categories, ["Invoice", "Order"]);
        assert_eq!(config.count, 3);
        assert_eq!(config.registry.table.qualified_name(), "main.ID_SEQUENCER");
        for category in &config.registry.categories {
            assert_eq!(category.start_id, 1000);
            assert_eq!(category.block_size, Some(50));
            assert_eq!(category.format.format(7), "ID-00000007");
        }
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["--count", "0"]).is_err());
        assert!(parse(&["--block-size", "0"]).is_err());
        for args in [["--start-id", "-1"], ["--start-id=-1", "-n1"]] {
            let err = parse(&args).unwrap_err().to_string();
            assert!(err.contains("must not be negative"), "unexpected error: {err}");
        }
        assert!(parse(&["--table-name", "bad name"]).is_err());
    }

    #[test]
    fn reads_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{
                "table": { "table_name": "ID_SEQUENCER" },
                "categories": [
                    { "category": "Alpha", "start_id": 1000, "block_size": 1 },
                    { "category": "Gamma", "start_id": 9998, "length": 6 }
                ]
            }"#,
        )
        .unwrap();

        let config = parse(&["--config", path.to_str().unwrap()]).unwrap();
        assert_eq!(config.categories, ["Alpha", "Gamma"]);
        assert_eq!(config.registry.table.table_name, "ID_SEQUENCER");
        assert_eq!(config.registry.categories[1].format.format(9998), "009998");

        let config = parse(&["--config", path.to_str().unwrap(), "--category", "Gamma"]).unwrap();
        assert_eq!(config.categories, ["Gamma"]);

        assert!(parse(&["--config", "/definitely/not/here.json"]).is_err());
    }
}
