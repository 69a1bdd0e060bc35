//! Initialise the SQLite principal store.
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context as AnyContext;
use anyhow::Result;
use serde_json::Value as Json;
use tokio_rusqlite::Connection;

use fleetcore_context::Context;
use fleetcore_store::Store;
use fleetcore_store::StoreFactory;
use fleetcore_store::StoreFactoryArgs;
use fleetcore_store::StoreFactorySyncArgs;

use crate::statements::SQLiteStore;
use crate::Conf;
use crate::ConfError;

/// Special path requesting the use of an in-memory store.
pub const MEMORY_PATH: &str = ":memory:";

/// Name of the table to store refinery migration metadata into.
pub const REFINERY_SCHEMA_TABLE_NAME: &str = "refinery_schema_history__store";

/// Initialise the SQLite principal store.
pub struct SQLiteFactory;

#[async_trait::async_trait]
impl StoreFactory for SQLiteFactory {
    fn conf_check(&self, _: &Context, conf: &Json) -> Result<()> {
        decode_conf(conf)?;
        Ok(())
    }

    fn register_metrics(&self, registry: &prometheus::Registry) -> Result<()> {
        crate::telemetry::register_metrics(registry)
    }

    async fn store<'a>(&self, args: StoreFactoryArgs<'a>) -> Result<Store> {
        let conf = decode_conf(args.conf)?;
        let client = create_client(args.context, &conf.path).await?;

        // In-memory databases are private to their connection so migrate them here.
        if conf.path == MEMORY_PATH {
            migrate(&client).await?;
        }
        Ok(Store::from(SQLiteStore::new(client)))
    }

    async fn sync<'a>(&self, args: StoreFactorySyncArgs<'a>) -> Result<()> {
        let conf = decode_conf(args.conf)?;
        let client = create_client(args.context, &conf.path).await?;
        migrate(&client).await
    }
}

/// Create a SQLite DB [`Connection`] to the principal store.
///
/// The special [`MEMORY_PATH`] constant can be specified to create an in-memory store.
///
/// NOTE:
///   The use of an in-memory store is only intended for tests and experimentation
///   as all data will be lost as soon as the process terminates.
pub(crate) async fn create_client(context: &Context, path: &str) -> Result<Connection> {
    let connection = if path == MEMORY_PATH {
        slog::warn!(
            context.logger,
            "Using in-memory principal store means data will be lost once the process terminates"
        );
        Connection::open_in_memory().await
    } else {
        slog::debug!(context.logger, "Opening SQLite principal store"; "path" => path);
        Connection::open(path).await
    };
    let connection = connection?;
    Ok(connection)
}

/// Run schema migrations to ensure the DB is ready for use.
pub(crate) async fn migrate(client: &Connection) -> Result<()> {
    let init_error: Arc<Mutex<Option<refinery::Error>>> = Default::default();
    let init_error_inner = Arc::clone(&init_error);
    client
        .call(move |connection| {
            let result = crate::schema::migrations::runner()
                .set_migration_table_name(REFINERY_SCHEMA_TABLE_NAME)
                .run(connection);
            if let Err(error) = result {
                init_error_inner
                    .lock()
                    .expect("SQLiteStore migration error lock poisoned")
                    .replace(error);
            }
            Ok(())
        })
        .await?;

    let error = init_error
        .lock()
        .expect("SQLiteStore migration error lock poisoned")
        .take();
    match error {
        None => Ok(()),
        Some(error) => Err(error.into()),
    }
}

fn decode_conf(conf: &Json) -> Result<Conf> {
    let conf = serde_json::from_value(conf.clone()).context(ConfError)?;
    Ok(conf)
}

#[cfg(test)]
mod tests {
    use fleetcore_context::Context;
    use fleetcore_store::query::CountGroups;
    use fleetcore_store::StoreFactory;
    use fleetcore_store::StoreFactoryArgs;

    use super::SQLiteFactory;
    use crate::ConfError;

    #[test]
    fn conf_check_rejects_missing_path() {
        let context = Context::fixture();
        let conf = serde_json::json!({"file": "store.db"});
        let error = SQLiteFactory.conf_check(&context, &conf).unwrap_err();
        assert!(error.is::<ConfError>());
    }

    #[tokio::test]
    async fn memory_store_is_migrated() {
        let context = Context::fixture();
        let conf = serde_json::json!({"path": super::MEMORY_PATH});
        let args = StoreFactoryArgs {
            conf: &conf,
            context: &context,
        };
        let store = SQLiteFactory.store(args).await.unwrap();
        let count = store.query(&context, CountGroups).await.unwrap();
        assert_eq!(count, 0);
    }
}
