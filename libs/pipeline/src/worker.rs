use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ferry_api::{Product, RecordWriter};

use crate::queue::Consumer;

// ═══════════════════════════════════════════════════════════════
//  Worker pool — queue.take() → writer.insert()
// ═══════════════════════════════════════════════════════════════

/// Счётчики записи одного worker'а или всего пула.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: u64,
    pub failed: u64,
}

impl WriteSummary {
    fn merge(&mut self, other: WriteSummary) {
        self.written += other.written;
        self.failed += other.failed;
    }
}

/// Фиксированный набор worker'ов, разбирающих общую очередь.
///
/// Handle'ы явные: `join()` обязателен, фоновых задач без владельца нет.
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<WriteSummary>)>,
}

impl WorkerPool {
    /// Запустить по одному worker'у на каждый writer. Должно
    /// вызываться до старта reader'а.
    pub fn spawn(
        sink_name: &str,
        writers: Vec<Box<dyn RecordWriter>>,
        queue: Consumer<Product>,
        token: CancellationToken,
    ) -> Self {
        let handles = writers
            .into_iter()
            .enumerate()
            .map(|(id, writer)| {
                let handle = tokio::spawn(run_worker(
                    id,
                    sink_name.to_string(),
                    writer,
                    queue.clone(),
                    token.clone(),
                ));
                (id, handle)
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Дождаться всех worker'ов. Упавший worker логируется и не
    /// добавляет счётчиков.
    pub async fn join(self) -> WriteSummary {
        let mut total = WriteSummary::default();
        for (id, handle) in self.handles {
            match handle.await {
                Ok(summary) => total.merge(summary),
                Err(e) => tracing::error!(worker = id, error = %e, "worker task failed"),
            }
        }
        total
    }
}

/// Цикл worker'а: take до исчерпания очереди, каждая запись — одна
/// попытка вставки. Ошибка вставки не останавливает worker.
///
/// После отмены worker перестаёт ждать reader'а по токену и выбирает то,
/// что уже в очереди: reader при отмене закрывает её, так что остаток
/// ограничен ёмкостью.
async fn run_worker(
    id: usize,
    sink_name: String,
    mut writer: Box<dyn RecordWriter>,
    queue: Consumer<Product>,
    token: CancellationToken,
) -> WriteSummary {
    let mut summary = WriteSummary::default();
    let mut draining = false;

    loop {
        let next = if draining {
            queue.take().await
        } else {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!(sink = %sink_name, worker = id, "cancellation requested, draining queue");
                    draining = true;
                    continue;
                }
                next = queue.take() => next,
            }
        };

        let Some(product) = next else { break };

        match writer.insert(&product).await {
            Ok(()) => summary.written += 1,
            Err(e) => {
                tracing::error!(
                    sink = %sink_name,
                    worker = id,
                    product_id = product.id,
                    error = %e,
                    "insert failed, record dropped"
                );
                summary.failed += 1;
            }
        }
    }

    writer.close().await;
    tracing::debug!(
        sink = %sink_name,
        worker = id,
        written = summary.written,
        failed = summary.failed,
        "worker finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ferry_api::{Price, RecordSink};
    use ferry_memory::MemorySink;

    use super::*;
    use crate::queue;

    fn product(id: i64) -> Product {
        Product::new(id, format!("p{id}"), "", Price::ZERO, Utc::now())
    }

    async fn writers(sink: &MemorySink, n: usize) -> Vec<Box<dyn RecordWriter>> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(sink.writer().await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn failures_do_not_stop_worker() {
        let mut sink = MemorySink::new().rejecting([2]);
        let probe = sink.probe();
        sink.connect().await.unwrap();

        let (tx, rx) = queue::bounded(8);
        let pool = WorkerPool::spawn("mem", writers(&sink, 1).await, rx, CancellationToken::new());
        for id in [1, 2, 3, 3] {
            tx.put(product(id)).await.unwrap();
        }
        tx.close();

        let summary = pool.join().await;
        assert_eq!(summary, WriteSummary { written: 2, failed: 2 });
        assert_eq!(probe.attempts().await, vec![1, 2, 3, 3]);
        assert_eq!(probe.row_ids().await, vec![1, 3]);
        assert_eq!(probe.writers_closed().await, 1);
    }

    #[tokio::test]
    async fn every_item_taken_once_across_workers() {
        let mut sink = MemorySink::new();
        let probe = sink.probe();
        sink.connect().await.unwrap();

        let (tx, rx) = queue::bounded(4);
        let pool = WorkerPool::spawn("mem", writers(&sink, 4).await, rx, CancellationToken::new());
        assert_eq!(pool.len(), 4);
        for id in 0..100 {
            tx.put(product(id)).await.unwrap();
        }
        tx.close();

        let summary = pool.join().await;
        assert_eq!(summary.written, 100);
        let mut attempts = probe.attempts().await;
        attempts.sort_unstable();
        assert_eq!(attempts, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn cancelled_workers_drain_buffer() {
        let mut sink = MemorySink::new();
        let probe = sink.probe();
        sink.connect().await.unwrap();

        let (tx, rx) = queue::bounded(8);
        let token = CancellationToken::new();
        for id in 0..5 {
            tx.put(product(id)).await.unwrap();
        }
        token.cancel();
        let pool = WorkerPool::spawn("mem", writers(&sink, 2).await, rx, token);
        tx.close();

        assert_eq!(pool.join().await.written, 5);
        assert_eq!(probe.row_ids().await, vec![0, 1, 2, 3, 4]);
    }
}
