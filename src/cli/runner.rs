//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::client::CatalogClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result, ResultExt};
use crate::search::{SearchCriteria, SortItem};
use crate::types::JsonValue;
use std::fs;
use std::io::{self, Read, Write};
use std::time::Instant;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Search {
                query,
                sort,
                page_size,
                bulk,
                prefetch,
                limit,
            } => {
                let mut criteria = SearchCriteria::new(read_query(query)?);
                for spec in sort {
                    let item = SortItem::parse(spec)
                        .ok_or_else(|| Error::config(format!("Invalid sort key '{spec}'")))?;
                    criteria = criteria.sort(item);
                }
                if let Some(size) = page_size {
                    criteria = criteria.page_size(*size);
                }
                self.search(criteria, *bulk, *prefetch, *limit).await
            }
            Commands::Count { query } => self.count(read_query(query)?).await,
        }
    }

    /// Load configuration: the config file if given, otherwise the environment
    fn load_config(&self) -> Result<ClientConfig> {
        match &self.cli.config {
            Some(path) => {
                let config = ClientConfig::from_file(path)?.with_env_overrides();
                config.validate()?;
                Ok(config)
            }
            None => ClientConfig::from_env(),
        }
    }

    fn client(&self) -> Result<CatalogClient> {
        let config = self.load_config()?;
        if self.cli.verbose {
            eprintln!("Using {config:?}");
        }
        CatalogClient::new(config)
    }

    /// Print matching entities
    async fn search(
        &self,
        criteria: SearchCriteria,
        bulk: bool,
        prefetch: bool,
        limit: Option<usize>,
    ) -> Result<()> {
        let client = self.client()?;
        let started = Instant::now();
        let limit = limit.unwrap_or(usize::MAX);
        let mut printed = 0usize;
        let stdout = io::stdout();
        let mut out = stdout.lock();

        if prefetch {
            let mut results = client.search_prefetch(criteria, bulk);
            while printed < limit {
                let Some(entity) = results.next().await? else {
                    break;
                };
                self.output_entity(&mut out, &entity)?;
                printed += 1;
            }
            results.close().await;
        } else {
            let mut results = if bulk {
                client.bulk_search(criteria)
            } else {
                client.search(criteria)
            };
            while printed < limit {
                let Some(entity) = results.next().await? else {
                    break;
                };
                self.output_entity(&mut out, &entity)?;
                printed += 1;
            }
        }

        info!(
            "Printed {} entities in {:.1}s",
            printed,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Print the approximate count
    async fn count(&self, query: JsonValue) -> Result<()> {
        let client = self.client()?;
        let count = client.count(SearchCriteria::new(query)).await?;
        println!("{count}");
        Ok(())
    }

    /// Output an entity
    fn output_entity(&self, out: &mut impl Write, entity: &JsonValue) -> Result<()> {
        let line = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(entity)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(entity)?,
        };
        writeln!(out, "{line}")?;
        Ok(())
    }
}

/// Read a query tree from a file, or from stdin for `-`
fn read_query(source: &str) -> Result<JsonValue> {
    let content = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read query from stdin")?;
        buf
    } else {
        fs::read_to_string(source)
            .map_err(|e| Error::config(format!("Failed to read query file '{source}': {e}")))?
    };
    parse_query(&content)
}

/// Parse a query tree; a `{"dsl": {"query": ...}}` or `{"query": ...}`
/// document is unwrapped to its query
fn parse_query(content: &str) -> Result<JsonValue> {
    let value: JsonValue = serde_json::from_str(content)
        .map_err(|e| Error::config(format!("Invalid query JSON: {e}")))?;
    let value = match value {
        JsonValue::Object(mut map) if map.contains_key("dsl") => {
            map.remove("dsl").unwrap_or_default()
        }
        other => other,
    };
    match value {
        JsonValue::Object(mut map) if map.contains_key("query") => {
            Ok(map.remove("query").unwrap_or_default())
        }
        JsonValue::Object(map) => Ok(JsonValue::Object(map)),
        _ => Err(Error::config("Query must be a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;

    #[test]
    fn test_parse_query_forms() {
        let bare = json!({"term": {"typeName": "Table"}});
        assert_eq!(parse_query(&bare.to_string()).unwrap(), bare);
        assert_eq!(
            parse_query(&json!({"query": bare}).to_string()).unwrap(),
            bare
        );
        assert_eq!(
            parse_query(&json!({"dsl": {"query": bare, "size": 10}}).to_string()).unwrap(),
            bare
        );
    }

    #[test]
    fn test_parse_query_rejects_non_objects() {
        assert!(parse_query("[1, 2]").is_err());
        assert!(parse_query("nope").is_err());
    }

    #[test]
    fn test_read_query_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"match_all": {{}}}}"#).unwrap();

        let query = read_query(file.path().to_str().unwrap()).unwrap();
        assert_eq!(query, json!({"match_all": {}}));
    }

    #[test]
    fn test_read_query_missing_file() {
        let err = read_query("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("here.json"));
    }

    #[test]
    fn test_output_entity_formats() {
        let runner = Runner::new(Cli {
            config: None,
            format: OutputFormat::Json,
            verbose: false,
            command: Commands::Count {
                query: "-".to_string(),
            },
        });
        let mut out = Vec::new();
        runner
            .output_entity(&mut out, &json!({"guid": "a", "n": 1}))
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"guid\":\"a\",\"n\":1}\n");
    }
}
