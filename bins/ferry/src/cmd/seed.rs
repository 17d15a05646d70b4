use std::time::Instant;

use ferry_mongo::MongoSeeder;

use crate::config::{SeedArgs, SeedSettings, load_file};
use crate::error::CliError;

pub async fn run(args: SeedArgs) -> Result<(), CliError> {
    let file = load_file(&args.config)?;
    let settings = SeedSettings::merge(&args, file)?;

    tracing::info!(
        mongo = %settings.mongo.redacted_uri(),
        database = %settings.mongo.database,
        collection = %settings.mongo.collection,
        total = settings.seed.total,
        batch_size = settings.seed.batch_size,
        "ferry seed starting"
    );

    let mut seeder = MongoSeeder::new(settings.mongo);
    seeder.connect().await?;

    let start = Instant::now();
    let seeded = seeder.seed(settings.seed.total, settings.seed.batch_size).await;
    seeder.close().await;
    let inserted = seeded?;

    println!("inserted {inserted} documents in {:.2?}", start.elapsed());
    Ok(())
}
