use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ferry_api::{ErrorKind, Product, RecordCursor};

use crate::queue::Producer;

// ═══════════════════════════════════════════════════════════════
//  Reader task — cursor → decode → queue.put()
// ═══════════════════════════════════════════════════════════════

/// Итог работы reader'а.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Записей успешно прочитано и поставлено в очередь.
    pub read: u64,
    /// Документов отброшено из-за ошибки декодирования.
    pub dropped_decodes: u64,
    /// Фатальная ошибка курсора, если чтение оборвалось.
    pub read_error: Option<String>,
    /// Чтение остановлено по CancellationToken.
    pub cancelled: bool,
}

/// Запустить reader: итерирует курсор и кладёт записи в очередь.
///
/// Reader единственный владелец `Producer` и закрывает очередь ровно один
/// раз при любом выходе — курсор исчерпан, курсор сломался, все consumer'ы
/// ушли или запрошена отмена.
pub fn spawn_reader(
    source_name: String,
    mut cursor: Box<dyn RecordCursor>,
    queue: Producer<Product>,
    progress_every: u64,
    token: CancellationToken,
) -> JoinHandle<ReadSummary> {
    tokio::spawn(async move {
        let mut summary = ReadSummary::default();

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!(source = %source_name, read = summary.read, "cancellation requested, stop reading");
                    summary.cancelled = true;
                    break;
                }
                item = cursor.next() => item,
            };

            let product = match item {
                Some(Ok(product)) => product,
                Some(Err(e)) if e.kind() == ErrorKind::Decode => {
                    tracing::warn!(source = %source_name, error = %e, "bad document, skipping");
                    summary.dropped_decodes += 1;
                    continue;
                }
                Some(Err(e)) => {
                    tracing::error!(source = %source_name, error = ?e, "cursor error, stop reading");
                    summary.read_error = Some(e.to_string());
                    break;
                }
                None => break,
            };

            let id = product.id;
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!(source = %source_name, product_id = id, "cancellation requested while queue full");
                    summary.cancelled = true;
                    break;
                }
                res = queue.put(product) => {
                    if res.is_err() {
                        tracing::error!(source = %source_name, product_id = id, "no workers left, stop reading");
                        summary.read_error = Some("queue has no consumers".into());
                        break;
                    }
                }
            }

            summary.read += 1;
            if progress_every > 0 && summary.read % progress_every == 0 {
                tracing::info!(
                    source = %source_name,
                    read = summary.read,
                    queued = queue.len(),
                    queue_capacity = queue.capacity(),
                    "reading"
                );
            }
        }

        queue.close();
        tracing::info!(
            source = %source_name,
            read = summary.read,
            dropped = summary.dropped_decodes,
            "reader finished, queue closed"
        );
        summary
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ferry_api::{FerryError, Price};
    use ferry_memory::{CursorItem, MemoryCursor};

    use super::*;
    use crate::queue;

    fn product(id: i64) -> Product {
        Product::new(id, format!("p{id}"), "", Price::ZERO, Utc::now())
    }

    async fn drain(rx: queue::Consumer<Product>) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(p) = rx.take().await {
            ids.push(p.id);
        }
        ids
    }

    #[tokio::test]
    async fn decode_errors_are_skipped() {
        let cursor = MemoryCursor::new(vec![
            CursorItem::Record(product(1)),
            CursorItem::Fail(FerryError::decode("price: expected double")),
            CursorItem::Record(product(2)),
        ]);
        let (tx, rx) = queue::bounded(8);
        let handle = spawn_reader("mem".into(), Box::new(cursor), tx, 0, CancellationToken::new());

        let summary = handle.await.unwrap();
        assert_eq!(summary.read, 2);
        assert_eq!(summary.dropped_decodes, 1);
        assert_eq!(summary.read_error, None);
        assert_eq!(drain(rx).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn read_error_stops_and_closes() {
        let cursor = MemoryCursor::new(vec![
            CursorItem::Record(product(1)),
            CursorItem::Fail(FerryError::read("connection reset by peer")),
            CursorItem::Record(product(2)),
        ]);
        let (tx, rx) = queue::bounded(8);
        let summary = spawn_reader("mem".into(), Box::new(cursor), tx, 0, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.read, 1);
        assert_eq!(summary.read_error.as_deref(), Some("connection reset by peer"));
        assert_eq!(drain(rx).await, vec![1]);
    }

    #[tokio::test]
    async fn cancel_unblocks_full_queue() {
        let cursor = MemoryCursor::new((1..=10).map(|i| CursorItem::Record(product(i))).collect());
        let (tx, rx) = queue::bounded(2);
        let token = CancellationToken::new();
        let handle = spawn_reader("mem".into(), Box::new(cursor), tx, 0, token.clone());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        token.cancel();
        let summary = handle.await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.read, 2);
        assert_eq!(drain(rx).await, vec![1, 2]);
    }
}
