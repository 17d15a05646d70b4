use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

// ═══════════════════════════════════════════════════════════════
//  Bounded queue — reader → workers
// ═══════════════════════════════════════════════════════════════

/// Создать bounded FIFO очередь ёмкостью `capacity`.
///
/// Один `Producer` (им владеет reader) и клонируемый `Consumer`
/// (по клону на worker). Очередь — единственная точка синхронизации
/// между ними: каждый элемент достаётся ровно одному consumer'у.
///
/// # Panics
///
/// Если `capacity == 0` (как и `tokio::sync::mpsc::channel`).
pub fn bounded<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Producer { tx },
        Consumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Все consumer'ы ушли — элемент возвращается вызывающему.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

impl<T> std::fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("queue has no consumers")
    }
}

/// Пишущая сторона очереди.
pub struct Producer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Producer<T> {
    /// Положить элемент. Ждёт, пока в очереди не появится место
    /// (back-pressure на reader).
    pub async fn put(&self, item: T) -> Result<(), QueueClosed<T>> {
        self.tx.send(item).await.map_err(|mpsc::error::SendError(item)| QueueClosed(item))
    }

    /// Сигнал «больше элементов не будет». Уже буферизованные элементы
    /// остаются доступны consumer'ам. Потребляет producer — повторно
    /// закрыть нельзя.
    pub fn close(self) {
        drop(self.tx);
    }

    /// Элементов в буфере прямо сейчас.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ёмкость, заданная в `bounded`.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Читающая сторона очереди. Клоны делят один буфер.
pub struct Consumer<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

impl<T> Consumer<T> {
    /// Следующий элемент в FIFO порядке.
    ///
    /// Ждёт, пока очередь пуста и не закрыта. `None` — очередь закрыта
    /// и выбрана до конца; после этого каждый последующий вызов у любого
    /// consumer'а тоже возвращает `None`.
    pub async fn take(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn fifo_order() {
        let (tx, rx) = bounded(4);
        for i in 0..4 {
            tx.put(i).await.unwrap();
        }
        tx.close();
        let mut got = Vec::new();
        while let Some(i) = rx.take().await {
            got.push(i);
        }
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn put_waits_when_full() {
        let (tx, rx) = bounded(1);
        assert!(tx.is_empty());
        tx.put(1).await.unwrap();
        assert_eq!(tx.len(), 1);
        assert_eq!(tx.capacity(), 1);

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.put(2)).await;
        assert!(blocked.is_err(), "put must wait while the queue is full");

        assert_eq!(rx.take().await, Some(1));
        assert_eq!(tx.len(), 0);
        tokio::time::timeout(Duration::from_secs(1), tx.put(3)).await.unwrap().unwrap();
        assert_eq!(rx.take().await, Some(3));
    }

    #[tokio::test]
    async fn take_waits_until_put_or_close() {
        let (tx, rx) = bounded::<u32>(2);
        let waiting = tokio::time::timeout(Duration::from_millis(50), rx.take()).await;
        assert!(waiting.is_err(), "take must wait on an empty open queue");

        let reader = {
            let rx = rx.clone();
            tokio::spawn(async move { rx.take().await })
        };
        tx.put(7).await.unwrap();
        assert_eq!(reader.await.unwrap(), Some(7));

        let reader = {
            let rx = rx.clone();
            tokio::spawn(async move { rx.take().await })
        };
        tx.close();
        assert_eq!(reader.await.unwrap(), None);
    }

    #[tokio::test]
    async fn close_keeps_buffered_items() {
        let (tx, rx) = bounded(8);
        tx.put("a").await.unwrap();
        tx.put("b").await.unwrap();
        tx.close();

        let other = rx.clone();
        assert_eq!(rx.take().await, Some("a"));
        assert_eq!(other.take().await, Some("b"));
        assert_eq!(rx.take().await, None);
        assert_eq!(other.take().await, None);
        assert_eq!(rx.take().await, None);
    }

    #[tokio::test]
    async fn put_fails_without_consumers() {
        let (tx, rx) = bounded(2);
        drop(rx);
        assert_eq!(tx.put(5).await, Err(QueueClosed(5)));
    }
}
