use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::{
    Condition, DocumentId, DocumentStoreError, Filter, Result, Update, UpdateOp,
    store::DocumentStore,
};

/// A positional parameter collected while building a statement.
#[derive(Debug, Clone)]
enum Bind {
    Text(String),
    TextArray(Vec<String>),
    Json(Value),
    Int(i64),
    Uuid(Uuid),
}

/// Accumulates SQL text and its parameters so placeholders stay in sync.
#[derive(Debug, Default)]
struct Statement {
    binds: Vec<Bind>,
}

impl Statement {
    fn param(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.binds.len())
    }

    /// Renders `filter` as a list of `AND`-joined predicates over `doc`.
    fn predicates(&mut self, filter: &Filter) -> String {
        let mut sql = String::new();
        for condition in filter.conditions() {
            match condition {
                Condition::Eq { path, value } => {
                    let path = self.param(Bind::TextArray(path.clone()));
                    let value = self.param(Bind::Json(value.clone()));
                    sql.push_str(&format!(" AND doc #> {path}::text[] = {value}::jsonb"));
                }
                Condition::Gte { path, value } => {
                    let path = self.param(Bind::TextArray(path.clone()));
                    let value = self.param(Bind::Int(*value));
                    sql.push_str(&format!(
                        " AND CASE WHEN jsonb_typeof(doc #> {path}::text[]) = 'number' \
                         THEN (doc #>> {path}::text[])::numeric >= {value} ELSE FALSE END"
                    ));
                }
            }
        }
        sql
    }

    /// Renders `update` as one JSONB expression derived from `doc`.
    fn update_expression(&mut self, update: &Update) -> String {
        let mut expr = String::from("doc");
        for op in update.ops() {
            expr = match op {
                UpdateOp::Set { field, value } => {
                    let field = self.param(Bind::Text(field.clone()));
                    let value = self.param(Bind::Json(value.clone()));
                    format!("jsonb_set({expr}, ARRAY[{field}]::text[], {value}::jsonb, true)")
                }
                UpdateOp::Inc { field, by } => {
                    let field = self.param(Bind::Text(field.clone()));
                    let by = self.param(Bind::Int(*by));
                    format!(
                        "jsonb_set({expr}, ARRAY[{field}]::text[], \
                         to_jsonb(COALESCE(({expr} ->> {field}::text)::bigint, 0) + {by}), true)"
                    )
                }
                UpdateOp::Push { field, value } => {
                    let field = self.param(Bind::Text(field.clone()));
                    let value = self.param(Bind::Json(value.clone()));
                    format!(
                        "jsonb_set({expr}, ARRAY[{field}]::text[], \
                         COALESCE(NULLIF({expr} -> {field}::text, 'null'::jsonb), '[]'::jsonb) \
                         || jsonb_build_array({value}::jsonb), true)"
                    )
                }
            };
        }
        expr
    }

    fn bind_all<'q>(&self, sql: &'q str) -> Query<'q, Postgres, PgArguments> {
        let mut query = sqlx::query(sql);
        for bind in &self.binds {
            query = match bind {
                Bind::Text(v) => query.bind(v.clone()),
                Bind::TextArray(v) => query.bind(v.clone()),
                Bind::Json(v) => query.bind(v.clone()),
                Bind::Int(v) => query.bind(*v),
                Bind::Uuid(v) => query.bind(*v),
            };
        }
        query
    }
}

/// PostgreSQL-backed document store.
///
/// Every collection shares one `documents` table keyed by
/// `(collection, id)`, with the document body in a JSONB column.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, collection: &str, id: DocumentId, doc: Value) -> Result<()> {
        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id.as_uuid())
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("documents_pkey")
                {
                    return DocumentStoreError::DuplicateKey {
                        collection: collection.to_string(),
                        id,
                    };
                }
                DocumentStoreError::Database(e)
            })?;
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Value>> {
        let doc: Option<Value> =
            sqlx::query_scalar("SELECT doc FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let mut stmt = Statement::default();
        let collection = stmt.param(Bind::Text(collection.to_string()));
        let predicates = stmt.predicates(filter);
        let sql = format!(
            "SELECT doc FROM documents WHERE collection = {collection}{predicates} ORDER BY seq ASC"
        );

        let rows = stmt.bind_all(&sql).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                use sqlx::Row;
                row.try_get::<Value, _>("doc").map_err(DocumentStoreError::from)
            })
            .collect()
    }

    async fn update_one(
        &self,
        collection: &str,
        id: DocumentId,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Value>> {
        let mut stmt = Statement::default();
        let collection = stmt.param(Bind::Text(collection.to_string()));
        let id = stmt.param(Bind::Uuid(id.as_uuid()));
        let predicates = stmt.predicates(filter);
        let expr = stmt.update_expression(update);
        let sql = format!(
            "UPDATE documents SET doc = {expr}, updated_at = NOW() \
             WHERE collection = {collection} AND id = {id}{predicates} RETURNING doc"
        );

        let row = stmt.bind_all(&sql).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                use sqlx::Row;
                Ok(Some(row.try_get::<Value, _>("doc")?))
            }
            None => {
                tracing::debug!(%sql, "conditional update did not match");
                Ok(None)
            }
        }
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut stmt = Statement::default();
        let collection = stmt.param(Bind::Text(collection.to_string()));
        let predicates = stmt.predicates(filter);
        let sql = format!("DELETE FROM documents WHERE collection = {collection}{predicates}");

        let result = stmt.bind_all(&sql).execute(&self.pool).await?;
        tracing::debug!(deleted = result.rows_affected(), "documents deleted");
        Ok(result.rows_affected())
    }
}
