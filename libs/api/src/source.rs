use std::future::Future;
use std::pin::Pin;

use crate::{FerryError, Product};

// ════════════════════════════════════════════════════════════════
//  Source Traits
// ════════════════════════════════════════════════════════════════

/// Серверный курсор по коллекции источника.
///
/// Ленивая, конечная, неперезапускаемая последовательность в порядке
/// итерации курсора. Каждый вызов `next()` возвращает:
/// - `Some(Ok(product))` — очередная запись;
/// - `Some(Err(e))` с `ErrorKind::Decode` — документ битый, курсор жив;
/// - `Some(Err(e))` с любым другим kind — курсор сломан, дальше читать нельзя;
/// - `None` — источник исчерпан.
pub trait RecordCursor: Send {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<Product, FerryError>>> + Send + '_>>;
}

/// Read-only источник документов.
pub trait DocumentSource: Send + Sync {
    /// Установить соединение. Ошибка здесь фатальна для запуска.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>>;

    /// Открыть курсор по всей коллекции.
    fn stream(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn RecordCursor>, FerryError>> + Send + '_>>;

    /// Закрыть соединение.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), FerryError>> + Send + '_>>;

    /// Имя для логирования.
    fn name(&self) -> &str;
}
