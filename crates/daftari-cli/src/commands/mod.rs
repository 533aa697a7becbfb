//! CLI command implementations for the Daftari SQL guard.

pub mod audit;
pub mod check;
pub mod explain;
pub mod secure;
pub mod tables;

use anyhow::{Context, Result};
use clap::Args;
use std::io::Read;
use std::path::PathBuf;

/// Where to read the statement from. Falls back to stdin.
#[derive(Args, Debug, Default)]
pub struct SqlInput {
    /// Statement text.
    #[arg(long, conflicts_with = "file")]
    pub sql: Option<String>,

    /// File holding the statement.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl SqlInput {
    pub fn read(self) -> Result<String> {
        if let Some(sql) = self.sql {
            return Ok(sql);
        }
        if let Some(path) = self.file {
            return std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()));
        }

        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .context("failed to read statement from stdin")?;
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_inline_sql() {
        let input = SqlInput {
            sql: Some("SELECT 1".to_string()),
            file: None,
        };
        assert_eq!(input.read().unwrap(), "SELECT 1");
    }

    #[test]
    fn test_read_sql_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.sql");
        std::fs::write(&path, "SELECT * FROM sales\n").unwrap();

        let input = SqlInput {
            sql: None,
            file: Some(path),
        };
        assert_eq!(input.read().unwrap(), "SELECT * FROM sales\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let input = SqlInput {
            sql: None,
            file: Some(PathBuf::from("/nonexistent/query.sql")),
        };
        assert!(input.read().is_err());
    }
}
