use tokio_util::sync::CancellationToken;

use ferry_mongo::MongoSource;
use ferry_pipeline::Migration;
use ferry_postgres::PostgresSink;

use crate::config::{MigrateArgs, MigrateSettings, load_file};
use crate::error::CliError;

pub async fn run(args: MigrateArgs) -> Result<(), CliError> {
    let file = load_file(&args.config)?;
    let settings = MigrateSettings::merge(&args, file);
    settings.pipeline.validate()?;
    settings.postgres.validate()?;

    tracing::info!(
        config = %args.config,
        mongo = %settings.mongo.redacted_uri(),
        postgres = %settings.postgres.redacted_url(),
        workers = settings.pipeline.workers,
        queue_capacity = settings.pipeline.queue_capacity,
        "ferry migrate starting"
    );

    // --- CancellationToken: Ctrl+C → остановить чтение, дописать очередь ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl-c received, stopping reader");
                signal_token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    let source = MongoSource::new(settings.mongo);
    let sink = PostgresSink::new(settings.postgres, settings.pipeline.workers)
        .with_create_table(settings.create_table);

    let report = Migration::new(settings.pipeline, Box::new(source), Box::new(sink))
        .run(token)
        .await?;

    println!(
        "read {} | written {} | failed {} | dropped {} | {:.2?}{}",
        report.read,
        report.written,
        report.failed,
        report.dropped_decodes,
        report.elapsed,
        if report.cancelled { " | cancelled" } else { "" },
    );
    if let Some(e) = &report.read_error {
        tracing::warn!(error = %e, "source cursor failed, migration is partial");
    }
    Ok(())
}
