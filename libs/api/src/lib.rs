//! Общие типы ferry: запись, ошибки, трейты источника и sink'а.
//!
//! Этот крейт не зависит от драйверов БД — конкретные источники и sink'и
//! живут в `plugins/`, pipeline знает только трейты отсюда.

pub mod error;
pub mod record;
pub mod sink;
pub mod source;

pub use error::{ErrorKind, FerryError};
pub use record::{Price, Product};
pub use sink::{RecordSink, RecordWriter};
pub use source::{DocumentSource, RecordCursor};
