use std::time::Instant;

use chrono::{DateTime, Utc};
use mongodb::{Client, Collection};

use ferry_api::{FerryError, Price, Product};

use crate::{MongoConfig, ProductDoc, open_client};

/// Синтетический товар с номером `i` (начиная с 1): цена `i * 1.25`.
pub fn generate_product(i: i64, now: DateTime<Utc>) -> Result<Product, FerryError> {
    let price = i
        .checked_mul(125)
        .ok_or_else(|| FerryError::config(format!("product index too large: {i}")))
        .and_then(Price::from_cents)?;
    Ok(Product::new(
        i,
        format!("Produto Mongo {i}"),
        format!("Descrição do produto vindo do Mongo {i}."),
        price,
        now,
    ))
}

// ════════════════════════════════════════════════════════════════
//  MongoSeeder
// ════════════════════════════════════════════════════════════════

/// Наполняет коллекцию-источник синтетическими товарами для прогонов
/// миграции. Коллекция пересоздаётся с нуля.
pub struct MongoSeeder {
    config: MongoConfig,
    client: Option<Client>,
}

impl MongoSeeder {
    pub fn new(config: MongoConfig) -> Self {
        Self { config, client: None }
    }

    pub async fn connect(&mut self) -> Result<(), FerryError> {
        self.client = Some(open_client(&self.config).await?);
        Ok(())
    }

    fn collection(&self) -> Result<Collection<ProductDoc>, FerryError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| FerryError::connection("seeder not connected"))?;
        Ok(client
            .database(&self.config.database)
            .collection::<ProductDoc>(&self.config.collection))
    }

    /// Удалить коллекцию и вставить `total` документов пачками по
    /// `batch_size`. Возвращает число вставленных документов.
    pub async fn seed(&self, total: u64, batch_size: usize) -> Result<u64, FerryError> {
        if batch_size == 0 {
            return Err(FerryError::config("batch_size must be at least 1"));
        }
        let collection = self.collection()?;
        let ns = format!("{}.{}", self.config.database, self.config.collection);

        if let Err(e) = collection.drop().await {
            tracing::warn!(collection = %ns, error = %e, "drop failed, collection may not exist");
        }

        let start = Instant::now();
        let mut batch: Vec<ProductDoc> = Vec::with_capacity(batch_size);
        let mut inserted = 0u64;

        for i in 1..=total {
            let product = generate_product(i as i64, Utc::now())?;
            batch.push(ProductDoc::from(&product));

            if batch.len() == batch_size || i == total {
                collection
                    .insert_many(&batch)
                    .await
                    .map_err(|e| FerryError::write(format!("insert batch into {ns}: {e}")))?;
                inserted += batch.len() as u64;
                batch.clear();
                tracing::info!(collection = %ns, inserted, total, "seeding");
            }
        }

        tracing::info!(collection = %ns, inserted, elapsed = ?start.elapsed(), "seed complete");
        Ok(inserted)
    }

    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
    }
}
