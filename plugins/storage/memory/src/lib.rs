//! In-memory source и sink для тестов и прогонов без БД.
//!
//! Источник отдаёт заранее заданный сценарий (записи, битые документы,
//! обрыв курсора), sink хранит строки в `BTreeMap` и ведёт журнал попыток
//! вставки, чтобы тесты могли проверить порядок и счётчики.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use ferry_api::{
    DocumentSource, ErrorKind, FerryError, Product, RecordCursor, RecordSink, RecordWriter,
};

// ═══════════════════════════════════════════════════════════════
//  MemorySource
// ═══════════════════════════════════════════════════════════════

/// Один шаг сценария курсора.
#[derive(Debug, Clone)]
pub enum CursorItem {
    Record(Product),
    /// `ErrorKind::Decode` — документ пропускается; любой другой kind
    /// обрывает курсор.
    Fail(FerryError),
}

/// Курсор по сценарию. После фатальной ошибки возвращает только `None`.
pub struct MemoryCursor {
    items: VecDeque<CursorItem>,
    delay: Option<Duration>,
}

impl MemoryCursor {
    pub fn new(items: Vec<CursorItem>) -> Self {
        Self { items: items.into(), delay: None }
    }

    /// Пауза перед каждым элементом — имитация сетевого курсора.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl RecordCursor for MemoryCursor {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<Product, FerryError>>> + Send + '_>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.items.pop_front()? {
                CursorItem::Record(p) => Some(Ok(p)),
                CursorItem::Fail(e) => {
                    if e.kind() != ErrorKind::Decode {
                        self.items.clear();
                    }
                    Some(Err(e))
                }
            }
        })
    }
}

pub struct MemorySource {
    name: String,
    items: Vec<CursorItem>,
    delay: Option<Duration>,
    reachable: bool,
    connected: bool,
}

impl MemorySource {
    pub fn new(items: Vec<CursorItem>) -> Self {
        Self {
            name: "memory".into(),
            items,
            delay: None,
            reachable: true,
            connected: false,
        }
    }

    /// Источник из готовых записей, без ошибок.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self::new(products.into_iter().map(CursorItem::Record).collect())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `connect()` будет падать с `ErrorKind::Connection`.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }
}

impl DocumentSource for MemorySource {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            if !self.reachable {
                return Err(FerryError::connection(format!("[{}] server selection timeout", self.name)));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn stream(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn RecordCursor>, FerryError>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(FerryError::connection(format!("[{}] not connected", self.name)));
            }
            let mut cursor = MemoryCursor::new(self.items.clone());
            cursor.delay = self.delay;
            Ok(Box::new(cursor) as Box<dyn RecordCursor>)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemorySink
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct SinkState {
    rows: BTreeMap<i64, Product>,
    attempts: Vec<i64>,
    clears: usize,
    writers_opened: usize,
    writers_closed: usize,
}

/// Таблица в памяти с первичным ключом по `id`.
pub struct MemorySink {
    name: String,
    state: Arc<Mutex<SinkState>>,
    reject: Arc<HashSet<i64>>,
    write_delay: Option<Duration>,
    reachable: bool,
    connected: bool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            name: "memory".into(),
            state: Arc::new(Mutex::new(SinkState::default())),
            reject: Arc::new(HashSet::new()),
            write_delay: None,
            reachable: true,
            connected: false,
        }
    }

    /// Строки, которые уже лежат в таблице до запуска.
    /// Сбрасывает состояние — вызывать до `probe()`.
    pub fn with_existing(mut self, products: impl IntoIterator<Item = Product>) -> Self {
        let rows = products.into_iter().map(|p| (p.id, p)).collect();
        self.state = Arc::new(Mutex::new(SinkState { rows, ..SinkState::default() }));
        self
    }

    /// Вставка этих id всегда завершается ошибкой (имитация I/O сбоя).
    pub fn rejecting(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.reject = Arc::new(ids.into_iter().collect());
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Handle для инспекции после того, как sink отдан pipeline'у.
    pub fn probe(&self) -> SinkProbe {
        SinkProbe { state: self.state.clone() }
    }
}

impl RecordSink for MemorySink {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            if !self.reachable {
                return Err(FerryError::connection(format!("[{}] connection refused", self.name)));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn clear_target(&self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.rows.clear();
            state.clears += 1;
            Ok(())
        })
    }

    fn writer(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn RecordWriter>, FerryError>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(FerryError::connection(format!("[{}] not connected", self.name)));
            }
            self.state.lock().await.writers_opened += 1;
            Ok(Box::new(MemoryWriter {
                state: self.state.clone(),
                reject: self.reject.clone(),
                delay: self.write_delay,
            }) as Box<dyn RecordWriter>)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct MemoryWriter {
    state: Arc<Mutex<SinkState>>,
    reject: Arc<HashSet<i64>>,
    delay: Option<Duration>,
}

impl RecordWriter for MemoryWriter {
    fn insert<'a>(&'a mut self, product: &'a Product) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().await;
            state.attempts.push(product.id);
            if self.reject.contains(&product.id) {
                return Err(FerryError::write(format!("injected failure for id {}", product.id)));
            }
            if state.rows.contains_key(&product.id) {
                return Err(FerryError::write(format!(
                    "duplicate key value violates unique constraint \"products_pkey\": id={}",
                    product.id
                )));
            }
            state.rows.insert(product.id, product.clone());
            Ok(())
        })
    }

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            self.state.lock().await.writers_closed += 1;
        })
    }
}

/// Read-only взгляд на состояние `MemorySink`.
#[derive(Clone)]
pub struct SinkProbe {
    state: Arc<Mutex<SinkState>>,
}

impl SinkProbe {
    /// Id в порядке попыток вставки (включая неудачные).
    pub async fn attempts(&self) -> Vec<i64> {
        self.state.lock().await.attempts.clone()
    }

    /// Сохранённые строки, отсортированные по id.
    pub async fn rows(&self) -> Vec<Product> {
        self.state.lock().await.rows.values().cloned().collect()
    }

    pub async fn row_ids(&self) -> Vec<i64> {
        self.state.lock().await.rows.keys().copied().collect()
    }

    pub async fn clears(&self) -> usize {
        self.state.lock().await.clears
    }

    pub async fn writers_opened(&self) -> usize {
        self.state.lock().await.writers_opened
    }

    pub async fn writers_closed(&self) -> usize {
        self.state.lock().await.writers_closed
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ferry_api::Price;

    use super::*;

    fn product(id: i64) -> Product {
        Product::new(id, "n", "d", Price::from_cents(100).unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let mut sink = MemorySink::new();
        let probe = sink.probe();
        sink.connect().await.unwrap();
        let mut w = sink.writer().await.unwrap();

        w.insert(&product(1)).await.unwrap();
        let err = w.insert(&product(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(probe.attempts().await, vec![1, 1]);
        assert_eq!(probe.row_ids().await, vec![1]);
    }

    #[tokio::test]
    async fn clear_target_wipes_existing_rows() {
        let mut sink = MemorySink::new().with_existing([product(5)]);
        let probe = sink.probe();
        sink.connect().await.unwrap();
        sink.clear_target().await.unwrap();
        sink.clear_target().await.unwrap();
        assert!(probe.rows().await.is_empty());
        assert_eq!(probe.clears().await, 2);
    }

    #[tokio::test]
    async fn fatal_cursor_error_ends_stream() {
        let mut cursor = MemoryCursor::new(vec![
            CursorItem::Fail(FerryError::read("cursor killed")),
            CursorItem::Record(product(1)),
        ]);
        assert_eq!(cursor.next().await.unwrap().unwrap_err().kind(), ErrorKind::Read);
        assert!(cursor.next().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoints() {
        let mut source = MemorySource::new(vec![]).unreachable();
        assert_eq!(source.connect().await.unwrap_err().kind(), ErrorKind::Connection);
        assert!(source.stream().await.is_err());

        let mut sink = MemorySink::new().unreachable();
        assert_eq!(sink.connect().await.unwrap_err().kind(), ErrorKind::Connection);
        assert!(sink.writer().await.is_err());
    }
}
