use std::path::Path;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use ferry_mongo::MongoConfig;
use ferry_pipeline::PipelineConfig;
use ferry_postgres::PostgresConfig;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "ferry", about = "Перенос products из MongoDB в PostgreSQL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Перенести коллекцию MongoDB в таблицу PostgreSQL
    Migrate(MigrateArgs),
    /// Пересоздать коллекцию MongoDB со сгенерированными документами
    Seed(SeedArgs),
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct MongoArgs {
    #[arg(id = "mongo_host", long = "mongo-host", env = "MONGO_HOST")]
    pub host: Option<String>,
    #[arg(id = "mongo_port", long = "mongo-port", env = "MONGO_PORT")]
    pub port: Option<u16>,
    #[arg(id = "mongo_user", long = "mongo-user", env = "MONGO_USER")]
    pub user: Option<String>,
    #[arg(id = "mongo_password", long = "mongo-password", env = "MONGO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(id = "mongo_database", long = "mongo-database", env = "MONGO_DATABASE")]
    pub database: Option<String>,
    #[arg(id = "mongo_collection", long = "mongo-collection", env = "MONGO_COLLECTION")]
    pub collection: Option<String>,
}

impl MongoArgs {
    fn apply(&self, mut cfg: MongoConfig) -> MongoConfig {
        override_with(&mut cfg.host, &self.host);
        override_with(&mut cfg.port, &self.port);
        override_with(&mut cfg.user, &self.user);
        override_with(&mut cfg.password, &self.password);
        override_with(&mut cfg.database, &self.database);
        override_with(&mut cfg.collection, &self.collection);
        cfg
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct PostgresArgs {
    #[arg(id = "postgres_host", long = "postgres-host", env = "POSTGRES_HOST")]
    pub host: Option<String>,
    #[arg(id = "postgres_port", long = "postgres-port", env = "POSTGRES_PORT")]
    pub port: Option<u16>,
    #[arg(id = "postgres_user", long = "postgres-user", env = "POSTGRES_USER")]
    pub user: Option<String>,
    #[arg(id = "postgres_password", long = "postgres-password", env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(id = "postgres_database", long = "postgres-database", env = "POSTGRES_DATABASE")]
    pub database: Option<String>,
    #[arg(id = "postgres_sslmode", long = "postgres-sslmode", env = "POSTGRES_SSLMODE")]
    pub sslmode: Option<String>,
    /// Целевая таблица (`table` или `schema.table`)
    #[arg(long)]
    pub table: Option<String>,
}

impl PostgresArgs {
    fn apply(&self, mut cfg: PostgresConfig) -> PostgresConfig {
        override_with(&mut cfg.host, &self.host);
        override_with(&mut cfg.port, &self.port);
        override_with(&mut cfg.user, &self.user);
        override_with(&mut cfg.password, &self.password);
        override_with(&mut cfg.database, &self.database);
        override_with(&mut cfg.sslmode, &self.sslmode);
        override_with(&mut cfg.table, &self.table);
        cfg
    }
}

#[derive(Args, Clone, Debug)]
pub struct MigrateArgs {
    /// Путь к TOML конфиг файлу (необязателен)
    #[arg(long, default_value = "ferry.toml", env = "FERRY_CONFIG")]
    pub config: String,

    #[command(flatten)]
    pub mongo: MongoArgs,

    #[command(flatten)]
    pub postgres: PostgresArgs,

    /// Число параллельных writer'ов
    #[arg(long, env = "NUM_WORKERS")]
    pub workers: Option<usize>,

    /// Ёмкость очереди между reader'ом и writer'ами
    #[arg(long, env = "QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Логировать прогресс каждые N записей (0 = выключено)
    #[arg(long)]
    pub progress_every: Option<u64>,

    /// Создать таблицу, если её нет
    #[arg(long)]
    pub create_table: bool,
}

#[derive(Args, Clone, Debug)]
pub struct SeedArgs {
    /// Путь к TOML конфиг файлу (необязателен)
    #[arg(long, default_value = "ferry.toml", env = "FERRY_CONFIG")]
    pub config: String,

    #[command(flatten)]
    pub mongo: MongoArgs,

    /// Сколько документов сгенерировать
    #[arg(long)]
    pub total: Option<u64>,

    /// Документов в одном insert_many
    #[arg(long, env = "BATCH_SIZE")]
    pub batch_size: Option<usize>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub mongo: MongoConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    /// Создавать таблицу перед миграцией.
    #[serde(default)]
    pub create_table: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_total")]
    pub total: u64,
    #[serde(default = "default_seed_batch_size")]
    pub batch_size: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            total: default_seed_total(),
            batch_size: default_seed_batch_size(),
        }
    }
}

fn default_seed_total() -> u64 {
    1_000_000
}
fn default_seed_batch_size() -> usize {
    1000
}

/// Подгрузить переменные окружения из `.env`-файла. Уже заданные
/// переменные не перезаписываются. `Ok(false)` — файла нет.
pub fn load_env_file(path: &Path) -> Result<bool, CliError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(CliError::Config { context: "env file", detail: format!("'{}': {e}", path.display()) }),
    }
}

/// Прочитать конфиг. Отсутствующий файл — не ошибка: берутся значения
/// по умолчанию.
pub fn load_file(path: &str) -> Result<FileConfig, CliError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(config = %path, "config file not found, using defaults");
            return Ok(FileConfig::default());
        }
        Err(e) => {
            return Err(CliError::Config { context: "read", detail: format!("'{path}': {e}") });
        }
    };
    toml::from_str(&content)
        .map_err(|e| CliError::Config { context: "parse", detail: format!("'{path}': {e}") })
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговые настройки `migrate`: defaults < файл < env/CLI.
#[derive(Debug)]
pub struct MigrateSettings {
    pub mongo: MongoConfig,
    pub postgres: PostgresConfig,
    pub pipeline: PipelineConfig,
    pub create_table: bool,
}

impl MigrateSettings {
    pub fn merge(args: &MigrateArgs, file: FileConfig) -> Self {
        let mut pipeline = file.pipeline;
        override_with(&mut pipeline.workers, &args.workers);
        override_with(&mut pipeline.queue_capacity, &args.queue_capacity);
        override_with(&mut pipeline.progress_every, &args.progress_every);

        Self {
            mongo: args.mongo.apply(file.mongo),
            postgres: args.postgres.apply(file.postgres),
            pipeline,
            create_table: args.create_table || file.create_table,
        }
    }
}

/// Итоговые настройки `seed`.
#[derive(Debug)]
pub struct SeedSettings {
    pub mongo: MongoConfig,
    pub seed: SeedConfig,
}

impl SeedSettings {
    pub fn merge(args: &SeedArgs, file: FileConfig) -> Result<Self, CliError> {
        let mut seed = file.seed;
        override_with(&mut seed.total, &args.total);
        override_with(&mut seed.batch_size, &args.batch_size);
        if seed.batch_size == 0 {
            return Err(CliError::Config { context: "seed", detail: "batch_size must be at least 1".into() });
        }
        Ok(Self { mongo: args.mongo.apply(file.mongo), seed })
    }
}

fn override_with<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, FromArgMatches};

    use super::*;

    /// Разбор argv без чтения переменных окружения.
    fn parse(argv: &[&str]) -> Commands {
        let cmd = Cli::command()
            .mut_subcommand("migrate", |sub| sub.mut_args(|a| a.env(None::<&'static str>)))
            .mut_subcommand("seed", |sub| sub.mut_args(|a| a.env(None::<&'static str>)));
        let matches = cmd.try_get_matches_from(argv).unwrap();
        Cli::from_arg_matches(&matches).unwrap().command
    }

    fn migrate_args(argv: &[&str]) -> MigrateArgs {
        let mut full = vec!["ferry", "migrate"];
        full.extend_from_slice(argv);
        match parse(&full) {
            Commands::Migrate(args) => args,
            Commands::Seed(_) => unreachable!(),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mongo_and_postgres_flags_stay_separate() {
        let args = migrate_args(&[
            "--mongo-host", "m.example",
            "--mongo-port", "27018",
            "--mongo-user", "reader",
            "--mongo-password", "mpw",
            "--mongo-database", "catalog",
            "--postgres-host", "p.example",
            "--postgres-port", "5432",
            "--postgres-user", "writer",
            "--postgres-password", "ppw",
            "--postgres-database", "warehouse",
        ]);

        let eff = MigrateSettings::merge(&args, FileConfig::default());

        assert_eq!(eff.mongo.host, "m.example");
        assert_eq!(eff.mongo.port, 27018);
        assert_eq!(eff.mongo.user, "reader");
        assert_eq!(eff.mongo.password, "mpw");
        assert_eq!(eff.mongo.database, "catalog");
        assert_eq!(eff.postgres.host, "p.example");
        assert_eq!(eff.postgres.port, 5432);
        assert_eq!(eff.postgres.user, "writer");
        assert_eq!(eff.postgres.password, "ppw");
        assert_eq!(eff.postgres.database, "warehouse");
    }

    #[test]
    fn file_sections_are_optional() {
        let file: FileConfig = toml::from_str("").unwrap();
        assert_eq!(file.postgres, PostgresConfig::default());
        assert_eq!(file.pipeline, PipelineConfig::default());
        assert_eq!(file.seed.total, 1_000_000);
        assert!(!file.create_table);
    }

    #[test]
    fn cli_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            create_table = true

            [postgres]
            host = "pg.internal"
            table = "staging.products"

            [mongo]
            collection = "catalog"

            [pipeline]
            workers = 4
            queue_capacity = 16
            "#,
        )
        .unwrap();
        let args = migrate_args(&["--workers", "2", "--postgres-host", "10.0.0.5", "--table", "products_copy"]);

        let eff = MigrateSettings::merge(&args, file);

        assert_eq!(eff.pipeline.workers, 2);
        assert_eq!(eff.pipeline.queue_capacity, 16);
        assert_eq!(eff.postgres.host, "10.0.0.5");
        assert_eq!(eff.postgres.table, "products_copy");
        assert_eq!(eff.postgres.port, 5440);
        assert_eq!(eff.mongo.collection, "catalog");
        assert_eq!(eff.mongo.host, "localhost");
        assert!(eff.create_table);
    }

    #[test]
    fn seed_rejects_zero_batch() {
        let args = match parse(&["ferry", "seed", "--batch-size", "0"]) {
            Commands::Seed(args) => args,
            Commands::Migrate(_) => unreachable!(),
        };
        assert!(SeedSettings::merge(&args, FileConfig::default()).is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let file = load_file("/nonexistent/ferry.toml").unwrap();
        assert_eq!(file.mongo, MongoConfig::default());
    }

    #[test]
    fn env_file_is_loaded_when_present() {
        let path = std::env::temp_dir().join(format!("ferry-{}.env", std::process::id()));
        std::fs::write(&path, "FERRY_TEST_ENV_FILE_MARKER=from-env-file\n").unwrap();

        assert!(load_env_file(&path).unwrap());
        assert_eq!(std::env::var("FERRY_TEST_ENV_FILE_MARKER").unwrap(), "from-env-file");

        std::fs::remove_file(&path).unwrap();
        assert!(!load_env_file(&path).unwrap());
    }
}
