use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgStatement;
use sqlx::{Executor, PgPool, Postgres, Row, Statement};
use tracing::debug;

use crate::error::Result;
use crate::reconcile::ColumnCheck;

const SELECT_NAMESPACE_TABLES: &str =
    "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1";

const SELECT_TABLE_COLUMNS: &str = r#"
    SELECT column_name::text,
           CASE WHEN data_type IN ('ARRAY', 'USER-DEFINED') THEN udt_name::text
                ELSE data_type::text END
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

/// Read access to the live schema catalog. An absent namespace or table is
/// reported as an empty list, never as an error.
#[async_trait]
pub trait SchemaIntrospector: Send {
    async fn list_tables(&mut self, namespace: &str) -> Result<Vec<String>>;

    async fn list_columns(&mut self, namespace: &str, table: &str) -> Result<Vec<ColumnCheck>>;
}

#[async_trait]
pub trait DdlExecutor: Send {
    async fn execute_ddl(&mut self, statement: &str) -> Result<()>;
}

/// Introspects and alters a Postgres database over a single pooled
/// connection. Both metadata queries are prepared once when the store is
/// acquired; the connection goes back to the pool when the store is dropped.
pub struct PgSchemaStore {
    conn: PoolConnection<Postgres>,
    select_tables: PgStatement<'static>,
    select_columns: PgStatement<'static>,
}

impl PgSchemaStore {
    pub async fn acquire(pool: &PgPool) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        let select_tables = (&mut *conn).prepare(SELECT_NAMESPACE_TABLES).await?;
        let select_columns = (&mut *conn).prepare(SELECT_TABLE_COLUMNS).await?;
        Ok(Self {
            conn,
            select_tables,
            select_columns,
        })
    }
}

#[async_trait]
impl SchemaIntrospector for PgSchemaStore {
    async fn list_tables(&mut self, namespace: &str) -> Result<Vec<String>> {
        let rows = self
            .select_tables
            .query()
            .bind(namespace)
            .fetch_all(&mut *self.conn)
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(row.try_get::<String, _>(0)?);
        }
        debug!(namespace, tables = tables.len(), "Listed namespace tables");
        Ok(tables)
    }

    async fn list_columns(&mut self, namespace: &str, table: &str) -> Result<Vec<ColumnCheck>> {
        let rows = self
            .select_columns
            .query()
            .bind(namespace)
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnCheck::new(
                row.try_get::<String, _>(0)?,
                row.try_get::<String, _>(1)?,
            ));
        }
        Ok(columns)
    }
}

#[async_trait]
impl DdlExecutor for PgSchemaStore {
    async fn execute_ddl(&mut self, statement: &str) -> Result<()> {
        (&mut *self.conn).execute(sqlx::raw_sql(statement)).await?;
        Ok(())
    }
}
