//! Configuration for the instance store
//!
//! CLI arguments and environment variable handling using clap.
//! Pattern adapted from holo-host/rust/holo-gateway/src/lib.rs

use bson::DateTime;
use clap::{Parser, Subcommand, ValueEnum};

use crate::db::schemas::{WorkflowStatus, INSTANCE_COLLECTION};
use crate::store::{InstanceOrderBy, InstanceQuery, SortDirection, DEFAULT_OFFLOAD_THRESHOLD};

/// MongoDB's hard per-document size ceiling
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Library-level store settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Instance collection name; the GridFS bucket is named after it
    pub collection_name: String,

    /// Variables larger than this many bytes are offloaded to GridFS
    pub offload_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection_name: INSTANCE_COLLECTION.to_string(),
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Workflow instance store administration
#[derive(Parser, Debug, Clone)]
#[command(name = "instance-store")]
#[command(about = "Inspect and maintain workflow instances stored in MongoDB + GridFS")]
pub struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "workflows")]
    pub mongodb_db: String,

    /// Instance collection name
    #[arg(long, env = "INSTANCE_COLLECTION", default_value = INSTANCE_COLLECTION)]
    pub collection: String,

    /// Variables larger than this many bytes are stored in GridFS
    #[arg(long, env = "OFFLOAD_THRESHOLD_BYTES", default_value_t = DEFAULT_OFFLOAD_THRESHOLD)]
    pub offload_threshold: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Instance filter flags shared by query commands
#[derive(Parser, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Workflow definition id
    #[arg(long)]
    pub definition_id: Option<String>,

    /// Workflow status (repeat or comma-separate for several)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<WorkflowStatus>,

    /// Tenant id
    #[arg(long)]
    pub tenant_id: Option<String>,

    /// Correlation id
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Only instances created more than this many days ago
    #[arg(long)]
    pub older_than_days: Option<i64>,
}

impl FilterArgs {
    /// Build the query these flags describe
    pub fn to_query(&self) -> InstanceQuery {
        let mut query = InstanceQuery::new();

        query.filter.definition_id = self.definition_id.clone();
        query.filter.tenant_id = self.tenant_id.clone();
        query.filter.correlation_id = self.correlation_id.clone();

        if !self.status.is_empty() {
            query = query.with_statuses(self.status.clone());
        }

        if let Some(days) = self.older_than_days {
            let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
            query = query.created_before(DateTime::from_chrono(cutoff));
        }

        query
    }

    pub fn is_empty(&self) -> bool {
        self.definition_id.is_none()
            && self.status.is_empty()
            && self.tenant_id.is_none()
            && self.correlation_id.is_none()
            && self.older_than_days.is_none()
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print one instance as JSON
    Get {
        id: String,
    },

    /// List instances matching a filter
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Sort field (id, name, created-at, last-executed-at, finished-at)
        #[arg(long, default_value = "created-at")]
        order_by: InstanceOrderBy,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        #[arg(long, default_value = "0")]
        skip: u64,

        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Count instances matching a filter
    Count {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Delete one instance and its offloaded variables
    Delete {
        id: String,
    },

    /// Delete every instance matching a filter, with its offloaded variables
    Purge {
        #[command(flatten)]
        filter: FilterArgs,

        /// Report how many instances would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

impl Command {
    /// Query for the list command
    pub fn list_query(
        filter: &FilterArgs,
        order_by: InstanceOrderBy,
        desc: bool,
        skip: u64,
        limit: i64,
    ) -> InstanceQuery {
        let direction = if desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };

        filter
            .to_query()
            .order_by(order_by, direction)
            .with_skip(skip)
            .with_limit(limit)
    }
}

impl Args {
    /// Store settings derived from the arguments
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            collection_name: self.collection.clone(),
            offload_threshold: self.offload_threshold,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.collection.trim().is_empty() {
            return Err("INSTANCE_COLLECTION must not be empty".to_string());
        }

        if self.offload_threshold == 0 || self.offload_threshold >= MAX_DOCUMENT_SIZE {
            return Err(format!(
                "OFFLOAD_THRESHOLD_BYTES must be between 1 and {}",
                MAX_DOCUMENT_SIZE - 1
            ));
        }

        if let Command::Purge { filter, .. } = &self.command {
            if filter.is_empty() {
                return Err("purge needs at least one filter".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("instance-store").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["count"]);
        let config = args.store_config();

        assert_eq!(config.collection_name, "WorkflowInstances");
        assert_eq!(config.offload_threshold, 10_240);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_status_list_parsing() {
        let args = parse(&["count", "--status", "finished,cancelled"]);
        let Command::Count { filter } = args.command else {
            panic!("expected count command");
        };

        assert_eq!(filter.status, vec![WorkflowStatus::Finished, WorkflowStatus::Cancelled]);
        assert!(filter.to_query().filter.statuses.is_some());
    }

    #[test]
    fn test_unfiltered_purge_rejected() {
        assert!(parse(&["purge"]).validate().is_err());
        assert!(parse(&["purge", "--older-than-days", "30"]).validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(parse(&["--offload-threshold", "0", "count"]).validate().is_err());
        assert!(parse(&["--offload-threshold", "20000000", "count"]).validate().is_err());
    }

    #[test]
    fn test_list_query() {
        let args = parse(&["list", "--definition-id", "order-flow", "--desc", "--limit", "5"]);
        let Command::List { filter, order_by, desc, skip, limit } = args.command else {
            panic!("expected list command");
        };

        let query = Command::list_query(&filter, order_by, desc, skip, limit);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.filter.definition_id.as_deref(), Some("order-flow"));
        assert_eq!(
            query.order.map(|o| o.direction),
            Some(SortDirection::Descending)
        );
    }
}
