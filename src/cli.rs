use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "orcfile")]
#[command(author, version, about = "Inspect and print the contents of Apache ORC files")]
pub struct Cli {
    /// Path to an ORC file
    #[arg(required = true)]
    pub path: PathBuf,

    /// Comma-separated list of columns to print (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Print at most this many rows
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format for rows
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Print the file metadata (schema, stripes, statistics) instead of rows
    #[arg(short, long)]
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns_and_limit() {
        let cli = Cli::parse_from(["orcfile", "data.orc", "-c", "a,b", "--limit", "5", "-f", "json"]);
        assert_eq!(cli.path, PathBuf::from("data.orc"));
        assert_eq!(cli.columns, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(cli.limit, Some(5));
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(!cli.meta);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["orcfile", "data.orc", "--meta"]);
        assert!(cli.columns.is_none());
        assert!(matches!(cli.format, OutputFormat::Table));
        assert!(cli.meta);
    }
}
