use crate::TransportError;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct RxState {
    bytes: VecDeque<u8>,
    closed: bool,
}

/// Receive buffer shared between a stream's producer and its reader.
///
/// Every push or close bumps a generation counter on a `watch` channel so
/// waiters re-check the buffer.
#[derive(Debug)]
pub(crate) struct RxBuffer {
    state: Mutex<RxState>,
    generation: watch::Sender<u64>,
}

impl RxBuffer {
    pub(crate) fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            state: Mutex::new(RxState::default()),
            generation,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    pub(crate) fn push(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.lock().bytes.extend(data);
        self.bump();
    }

    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.bump();
    }

    /// Drops buffered bytes and reopens for a fresh connection.
    pub(crate) fn reset(&self) {
        let mut state = self.lock();
        state.bytes.clear();
        state.closed = false;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    pub(crate) fn peek(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        let state = self.lock();
        if state.bytes.len() < len {
            return Err(TransportError::InsufficientData {
                requested: len,
                available: state.bytes.len(),
            });
        }
        Ok(state.bytes.iter().take(len).copied().collect())
    }

    pub(crate) fn read(&self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.lock();
        if state.bytes.len() < len {
            return Err(TransportError::InsufficientData {
                requested: len,
                available: state.bytes.len(),
            });
        }
        Ok(state.bytes.drain(..len).collect())
    }

    pub(crate) async fn readable(&self, at_least: usize) -> Result<(), TransportError> {
        // Subscribe before checking so a push between the check and the
        // await still wakes us.
        let mut changes = self.generation.subscribe();
        loop {
            {
                let state = self.lock();
                if state.bytes.len() >= at_least {
                    return Ok(());
                }
                if state.closed {
                    return Err(TransportError::Closed);
                }
            }
            changes
                .changed()
                .await
                .map_err(|_| TransportError::Closed)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RxBuffer;
    use crate::TransportError;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn peek_does_not_consume() {
        let buf = RxBuffer::new();
        buf.push(&[1, 2, 3]);
        assert_eq!(buf.peek(2).unwrap(), vec![1, 2]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read(2).unwrap(), vec![1, 2]);
        assert_eq!(buf.len(), 1);
        assert!(matches!(
            buf.read(2),
            Err(TransportError::InsufficientData {
                requested: 2,
                available: 1
            })
        ));
    }

    #[tokio::test]
    async fn readable_wakes_on_push() {
        let buf = Arc::new(RxBuffer::new());
        let waiter = {
            let buf = buf.clone();
            tokio::spawn(async move { buf.readable(4).await })
        };
        buf.push(&[1, 2]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        buf.push(&[3, 4]);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn readable_fails_once_closed_short() {
        let buf = RxBuffer::new();
        buf.push(&[1]);
        buf.close();
        assert!(matches!(buf.readable(2).await, Err(TransportError::Closed)));
        buf.readable(1).await.unwrap();
    }
}
