//! MongoDB source: одна коллекция, курсор `find({})` без фильтра.

mod config;
mod document;
mod seed;

use std::future::Future;
use std::pin::Pin;

use mongodb::bson::doc;
use mongodb::{Client, Collection, Cursor};

use ferry_api::{DocumentSource, FerryError, Product, RecordCursor};

pub use config::MongoConfig;
pub use document::ProductDoc;
pub use seed::{MongoSeeder, generate_product};

/// Подключиться и проверить соединение `ping`'ом.
async fn open_client(config: &MongoConfig) -> Result<Client, FerryError> {
    let client = Client::with_uri_str(config.uri())
        .await
        .map_err(|e| FerryError::connection(format!("mongo connect {}: {e}", config.redacted_uri())))?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| FerryError::connection(format!("mongo ping {}: {e}", config.redacted_uri())))?;
    Ok(client)
}

// ════════════════════════════════════════════════════════════════
//  MongoSource
// ════════════════════════════════════════════════════════════════

pub struct MongoSource {
    config: MongoConfig,
    name: String,
    client: Option<Client>,
}

impl MongoSource {
    pub fn new(config: MongoConfig) -> Self {
        let name = format!("mongo:{}.{}", config.database, config.collection);
        Self { config, name, client: None }
    }

    fn collection(&self) -> Result<Collection<ProductDoc>, FerryError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| FerryError::connection(format!("[{}] not connected", self.name)))?;
        Ok(client
            .database(&self.config.database)
            .collection::<ProductDoc>(&self.config.collection))
    }
}

impl DocumentSource for MongoSource {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            let client = open_client(&self.config).await?;
            tracing::debug!(source = %self.name, uri = %self.config.redacted_uri(), "ping ok");
            self.client = Some(client);
            Ok(())
        })
    }

    fn stream(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn RecordCursor>, FerryError>> + Send + '_>> {
        Box::pin(async move {
            let cursor = self
                .collection()?
                .find(doc! {})
                .await
                .map_err(|e| FerryError::connection(format!("[{}] find: {e}", self.name)))?;
            Ok(Box::new(MongoCursor { inner: cursor }) as Box<dyn RecordCursor>)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(client) = self.client.take() {
                client.shutdown().await;
            }
            Ok(())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ════════════════════════════════════════════════════════════════
//  MongoCursor
// ════════════════════════════════════════════════════════════════

/// Обёртка над серверным курсором.
///
/// `advance()` — сетевой шаг, его ошибка обрывает чтение (`Read`).
/// `deserialize_current()` — разбор одного документа, его ошибка
/// пропускает только этот документ (`Decode`).
struct MongoCursor {
    inner: Cursor<ProductDoc>,
}

impl RecordCursor for MongoCursor {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<Product, FerryError>>> + Send + '_>> {
        Box::pin(async move {
            match self.inner.advance().await {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(FerryError::read(format!("cursor: {e}")))),
            }
            let doc = match self.inner.deserialize_current() {
                Ok(doc) => doc,
                Err(e) => return Some(Err(FerryError::decode(format!("document: {e}")))),
            };
            Some(Product::try_from(doc))
        })
    }
}
