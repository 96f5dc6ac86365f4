pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod query;
pub mod schema;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, TableSeedInfo, VerificationResult};
pub use migrations::{run_pending, MIGRATOR};
pub use query::{fetch_sample, run_select, QueryOutput};
pub use schema::{describe_schema, schema_map, SchemaMap};
