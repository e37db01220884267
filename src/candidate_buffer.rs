use std::future::Future;

use crate::codec::CandidateBlob;

/// Remote candidate as buffered: `None` is the end-of-candidates marker.
pub type RemoteCandidate = Option<CandidateBlob>;

/// Returned by [`CandidateBuffer::enqueue`] once the buffer has been flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSealed(pub RemoteCandidate);

/// Remote candidates that arrived before the remote description was set.
///
/// FIFO, unbounded for the lifetime of the session. A flush applies every
/// entry in arrival order and seals the buffer; sealed buffers refuse new
/// entries until [`CandidateBuffer::reset`].
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<RemoteCandidate>,
    sealed: bool,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, candidate: RemoteCandidate) -> Result<(), BufferSealed> {
        if self.sealed {
            return Err(BufferSealed(candidate));
        }
        self.pending.push(candidate);
        Ok(())
    }

    /// Apply every buffered candidate through `apply`, in insertion order.
    ///
    /// A failing candidate does not stop the rest from being applied; the
    /// first failure is returned once the buffer is drained. On success the
    /// number of applied entries is returned.
    pub async fn flush_into<F, Fut, E>(&mut self, mut apply: F) -> Result<usize, E>
    where
        F: FnMut(RemoteCandidate) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.sealed = true;
        let mut applied = 0;
        let mut first_error = None;
        for candidate in std::mem::take(&mut self.pending) {
            match apply(candidate).await {
                Ok(()) => applied += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(applied),
        }
    }

    /// Drop buffered entries without applying them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.sealed = false;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn pending(&self) -> &[RemoteCandidate] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob(n: u32) -> RemoteCandidate {
        Some(CandidateBlob(json!({ "candidate": format!("candidate:{n}") })))
    }

    #[tokio::test]
    async fn flush_applies_in_arrival_order_and_empties() {
        let mut buffer = CandidateBuffer::new();
        buffer.enqueue(blob(1)).unwrap();
        buffer.enqueue(blob(2)).unwrap();
        buffer.enqueue(None).unwrap();

        let mut seen = Vec::new();
        let applied = buffer
            .flush_into(|candidate| {
                seen.push(candidate);
                async { Ok::<_, ()>(()) }
            })
            .await
            .unwrap();

        assert_eq!(applied, 3);
        assert_eq!(seen, vec![blob(1), blob(2), None]);
        assert!(buffer.is_empty());
        assert!(buffer.is_sealed());
    }

    #[tokio::test]
    async fn failure_does_not_drop_remaining_candidates() {
        let mut buffer = CandidateBuffer::new();
        for n in 1..=4 {
            buffer.enqueue(blob(n)).unwrap();
        }

        let mut attempted = 0;
        let result = buffer
            .flush_into(|candidate| {
                attempted += 1;
                let bad = candidate == blob(2) || candidate == blob(3);
                async move {
                    if bad {
                        Err(candidate)
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(attempted, 4);
        assert_eq!(result, Err(blob(2)));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn sealed_buffer_rejects_until_reset() {
        let mut buffer = CandidateBuffer::new();
        buffer
            .flush_into(|_| async { Ok::<_, ()>(()) })
            .await
            .unwrap();

        assert_eq!(buffer.enqueue(blob(9)), Err(BufferSealed(blob(9))));
        assert!(buffer.is_empty());

        buffer.reset();
        buffer.enqueue(blob(9)).unwrap();
        assert_eq!(buffer.pending(), &[blob(9)]);
    }

    #[test]
    fn clear_discards_without_sealing() {
        let mut buffer = CandidateBuffer::new();
        buffer.enqueue(blob(1)).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_sealed());
    }
}
