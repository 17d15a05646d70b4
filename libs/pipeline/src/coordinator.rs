use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use ferry_api::{DocumentSource, RecordCursor, RecordSink, RecordWriter};

use crate::config::PipelineConfig;
use crate::queue;
use crate::reader::{ReadSummary, spawn_reader};
use crate::worker::WorkerPool;
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Run state
// ═══════════════════════════════════════════════════════════════

/// Фаза запуска. Переходы только вперёд:
/// Idle → Draining → Closing → Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    /// Соединения, очистка таблицы, открытие writer'ов и курсора.
    Idle,
    /// Reader и workers работают одновременно.
    Draining,
    /// Reader закончил и закрыл очередь; workers выбирают остаток.
    Closing,
    /// Все workers завершились.
    Done,
}

/// Итог запуска. Возвращается всегда, если старт прошёл успешно —
/// даже если ни одна запись не записалась.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub read: u64,
    pub dropped_decodes: u64,
    pub written: u64,
    pub failed: u64,
    pub elapsed: Duration,
    /// Фатальная ошибка курсора — запуск завершён частично.
    pub read_error: Option<String>,
    pub cancelled: bool,
}

impl RunReport {
    /// Записей, дошедших до sink'а (успешно или нет).
    pub fn processed(&self) -> u64 {
        self.written + self.failed
    }
}

// ═══════════════════════════════════════════════════════════════
//  Migration — coordinator
// ═══════════════════════════════════════════════════════════════

/// Один запуск миграции source → sink.
///
/// Владеет setup'ом и teardown'ом: соединяет обе стороны, очищает
/// целевую таблицу, запускает пул worker'ов и reader, ждёт всех и
/// закрывает соединения. Откатов нет: частично заполненный sink —
/// допустимый исход.
pub struct Migration {
    config: PipelineConfig,
    source: Box<dyn DocumentSource>,
    sink: Box<dyn RecordSink>,
    state: watch::Sender<RunState>,
}

impl Migration {
    pub fn new(config: PipelineConfig, source: Box<dyn DocumentSource>, sink: Box<dyn RecordSink>) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self { config, source, sink, state }
    }

    /// Подписка на смену фаз. Последнее значение остаётся доступным
    /// и после завершения `run`.
    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Выполнить запуск.
    ///
    /// `Err` — только если запуск не стартовал (конфиг, соединение,
    /// очистка таблицы, открытие writer'ов или курсора). Все поштучные
    /// ошибки поглощаются и отражаются в `RunReport`.
    pub async fn run(mut self, token: CancellationToken) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let source_name = self.source.name().to_string();
        let sink_name = self.sink.name().to_string();

        // --- Connect ---
        self.source.connect().await.map_err(|e| PipelineError::Connect {
            side: "source",
            name: source_name.clone(),
            source: e,
        })?;
        tracing::info!(source = %source_name, "connected");

        let connected = self.sink.connect().await;
        if let Err(e) = connected {
            self.close_source().await;
            return Err(PipelineError::Connect { side: "sink", name: sink_name, source: e });
        }
        tracing::info!(sink = %sink_name, "connected");

        // --- Prepare target, writers, cursor ---
        let prepared = self.prepare().await;
        let (writers, cursor) = match prepared {
            Ok(v) => v,
            Err(e) => {
                self.close_all().await;
                return Err(e);
            }
        };

        // --- Draining ---
        tracing::info!(
            source = %source_name,
            sink = %sink_name,
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "migration started"
        );
        let start = Instant::now();

        let (producer, consumer) = queue::bounded(self.config.queue_capacity);
        let pool = WorkerPool::spawn(&sink_name, writers, consumer, token.clone());
        self.state.send_replace(RunState::Draining);

        let reader = spawn_reader(
            source_name.clone(),
            cursor,
            producer,
            self.config.progress_every,
            token.clone(),
        );

        let read = match reader.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(source = %source_name, error = %e, "reader task failed");
                ReadSummary {
                    read_error: Some(format!("reader task failed: {e}")),
                    ..ReadSummary::default()
                }
            }
        };

        // --- Closing ---
        self.state.send_replace(RunState::Closing);
        tracing::info!(
            source = %source_name,
            read = read.read,
            workers = pool.len(),
            "all records read and handed to workers"
        );

        let written = pool.join().await;
        let elapsed = start.elapsed();

        // --- Done ---
        self.state.send_replace(RunState::Done);
        self.close_all().await;

        let report = RunReport {
            read: read.read,
            dropped_decodes: read.dropped_decodes,
            written: written.written,
            failed: written.failed,
            elapsed,
            read_error: read.read_error,
            cancelled: read.cancelled,
        };

        tracing::info!(
            read = report.read,
            written = report.written,
            failed = report.failed,
            dropped = report.dropped_decodes,
            cancelled = report.cancelled,
            elapsed = ?report.elapsed,
            "migration done"
        );
        Ok(report)
    }

    async fn prepare(&mut self) -> Result<(Vec<Box<dyn RecordWriter>>, Box<dyn RecordCursor>), PipelineError> {
        tracing::info!(sink = %self.sink.name(), "clearing target");
        self.sink
            .clear_target()
            .await
            .map_err(|e| PipelineError::Setup { stage: "clear target", source: e })?;

        let mut writers = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            let writer = self
                .sink
                .writer()
                .await
                .map_err(|e| PipelineError::Setup { stage: "open writer", source: e })?;
            writers.push(writer);
        }

        let cursor = self
            .source
            .stream()
            .await
            .map_err(|e| PipelineError::Setup { stage: "open cursor", source: e })?;

        Ok((writers, cursor))
    }

    async fn close_source(&mut self) {
        let closed = self.source.close().await;
        if let Err(e) = closed {
            tracing::warn!(source = %self.source.name(), error = %e, "close error");
        }
    }

    async fn close_all(&mut self) {
        let closed = self.sink.close().await;
        if let Err(e) = closed {
            tracing::warn!(sink = %self.sink.name(), error = %e, "close error");
        }
        self.close_source().await;
    }
}
