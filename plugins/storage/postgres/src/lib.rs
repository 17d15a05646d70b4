//! PostgreSQL sink: пул соединений `deadpool-postgres`, по одному
//! соединению на writer, подготовленный `INSERT` на каждую запись.

mod config;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Statement};

use ferry_api::{FerryError, Product, RecordSink, RecordWriter};

pub use config::{PostgresConfig, validate_table_name};

const SQL_CREATE: &str = include_str!("../sql/create_products.sql");

fn create_sql(table: &str) -> String {
    SQL_CREATE.replace("{table}", table)
}

fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {table}")
}

/// Цена приходит в центах (`BIGINT`) и делится на 100 уже в БД,
/// чтобы в `NUMERIC(10,2)` не попадало двоичное округление.
fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (id, name, description, price, created_at) \
         VALUES ($1::BIGINT, $2, $3, ($4::BIGINT)::NUMERIC / 100, $5)"
    )
}

// ════════════════════════════════════════════════════════════════
//  PostgresSink
// ════════════════════════════════════════════════════════════════

pub struct PostgresSink {
    config: PostgresConfig,
    name: String,
    pool_size: usize,
    create_table: bool,
    pool: Option<Pool>,
}

impl PostgresSink {
    /// `pool_size` должен быть не меньше числа worker'ов: каждый writer
    /// держит своё соединение до конца запуска. Если соединений не
    /// хватит, открытие writer'а упадёт через `pool_wait_secs`.
    pub fn new(config: PostgresConfig, pool_size: usize) -> Self {
        let name = format!("postgres:{}.{}", config.database, config.table);
        Self {
            config,
            name,
            pool_size: pool_size.max(1),
            create_table: false,
            pool: None,
        }
    }

    /// Создавать таблицу при `connect()`, если её ещё нет.
    pub fn with_create_table(mut self, create: bool) -> Self {
        self.create_table = create;
        self
    }

    fn build_pool(&self) -> Result<Pool, FerryError> {
        let manager = Manager::from_config(
            self.config.driver_config()?,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );
        Pool::builder(manager)
            .max_size(self.pool_size)
            .wait_timeout(Some(Duration::from_secs(self.config.pool_wait_secs)))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| FerryError::config(format!("[{}] pool: {e}", self.name)))
    }

    fn pool(&self) -> Result<&Pool, FerryError> {
        self.pool
            .as_ref()
            .ok_or_else(|| FerryError::connection(format!("[{}] not connected", self.name)))
    }

    async fn conn(&self) -> Result<Object, FerryError> {
        self.pool()?
            .get()
            .await
            .map_err(|e| FerryError::connection(format!("[{}] pool: {e}", self.name)))
    }

    /// `CREATE TABLE IF NOT EXISTS` для целевой таблицы.
    pub async fn ensure_schema(&self) -> Result<(), FerryError> {
        let conn = self.conn().await?;
        conn.batch_execute(&create_sql(&self.config.table))
            .await
            .map_err(|e| FerryError::connection(format!("[{}] create table: {e}", self.name)))?;
        tracing::info!(sink = %self.name, table = %self.config.table, "table ensured");
        Ok(())
    }
}

impl RecordSink for PostgresSink {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            self.config.validate()?;

            self.pool = Some(self.build_pool()?);

            let probe = self.conn().await?;
            probe
                .query_one("SELECT 1", &[])
                .await
                .map_err(|e| FerryError::connection(format!("[{}] probe: {e}", self.name)))?;
            drop(probe);
            tracing::debug!(
                sink = %self.name,
                url = %self.config.redacted_url(),
                pool_size = self.pool_size,
                "probe ok"
            );

            if self.create_table {
                self.ensure_schema().await?;
            }
            Ok(())
        })
    }

    fn clear_target(&self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn().await?;
            conn.batch_execute(&truncate_sql(&self.config.table))
                .await
                .map_err(|e| FerryError::connection(format!("[{}] truncate: {e}", self.name)))?;
            Ok(())
        })
    }

    fn writer(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn RecordWriter>, FerryError>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn().await?;
            let statement = conn
                .prepare_cached(&insert_sql(&self.config.table))
                .await
                .map_err(|e| FerryError::connection(format!("[{}] prepare insert: {e}", self.name)))?;
            Ok(Box::new(PostgresWriter { conn, statement }) as Box<dyn RecordWriter>)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(pool) = self.pool.take() {
                pool.close();
            }
            Ok(())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ════════════════════════════════════════════════════════════════
//  PostgresWriter
// ════════════════════════════════════════════════════════════════

/// Соединение из пула и подготовленный `INSERT`. Возвращается в пул
/// при drop.
struct PostgresWriter {
    conn: Object,
    statement: Statement,
}

impl RecordWriter for PostgresWriter {
    fn insert<'a>(&'a mut self, product: &'a Product) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + 'a>> {
        Box::pin(async move {
            let cents = product.price.cents();
            self.conn
                .execute(
                    &self.statement,
                    &[&product.id, &product.name, &product.description, &cents, &product.created_at],
                )
                .await
                .map_err(|e| FerryError::write(format!("insert id {}: {e}", product.id)))?;
            Ok(())
        })
    }
}
