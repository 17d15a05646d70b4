use std::future::Future;
use std::pin::Pin;

use crate::{FerryError, Product};

// ════════════════════════════════════════════════════════════════
//  Sink Traits
// ════════════════════════════════════════════════════════════════

/// Независимый handle записи в sink. Каждый worker владеет своим.
pub trait RecordWriter: Send {
    /// Вставить одну запись. Не идемпотентно: повторный `id` даёт
    /// `ErrorKind::Write` (нарушение первичного ключа).
    fn insert<'a>(&'a mut self, product: &'a Product) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + 'a>>;

    /// Вернуть handle. По умолчанию — просто drop.
    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}

/// Write-only реляционный sink.
pub trait RecordSink: Send + Sync {
    /// Установить соединение. Ошибка здесь фатальна для запуска.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>>;

    /// Очистить целевую таблицу перед запуском. Идемпотентно.
    fn clear_target(&self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>>;

    /// Открыть новый независимый handle записи.
    fn writer(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn RecordWriter>, FerryError>> + Send + '_>>;

    /// Закрыть соединение.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>>;

    /// Имя для логирования.
    fn name(&self) -> &str;
}
