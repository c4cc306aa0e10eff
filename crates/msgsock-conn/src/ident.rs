use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::TryRngCore;

/// Identifier generation failure (e.g. the OS randomness source is
/// unavailable).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct IdError(pub String);

/// Generates a unique identifier for an accepted connection.
///
/// Generation may be slow or asynchronous; the accept path never blocks on
/// it. Raw data arriving before the id resolves is buffered and replayed.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// Produce an identifier for the connection with accept sequence `seq`.
    ///
    /// `seq` is a per-listener monotonically increasing counter; embedding
    /// it guarantees uniqueness even if two random components collide.
    async fn generate(&self, seq: u64) -> Result<String, IdError>;
}

/// Default generator: OS-random bytes, hex-encoded, suffixed with the
/// accept counter. The random component makes ids unguessable; the counter
/// makes them unique.
#[derive(Debug, Clone, Copy)]
pub struct RandomId {
    random_bytes: usize,
}

impl RandomId {
    pub fn new(random_bytes: usize) -> Self {
        Self { random_bytes }
    }
}

impl Default for RandomId {
    fn default() -> Self {
        Self { random_bytes: 12 }
    }
}

#[async_trait]
impl IdGenerator for RandomId {
    async fn generate(&self, seq: u64) -> Result<String, IdError> {
        let mut buf = vec![0u8; self.random_bytes];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|err| IdError(err.to_string()))?;

        let mut id = String::with_capacity(self.random_bytes * 2 + 21);
        for byte in &buf {
            id.push_str(&format!("{byte:02x}"));
        }
        id.push('-');
        id.push_str(&seq.to_string());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn id_embeds_sequence_counter() {
        let id = RandomId::default().generate(42).await.unwrap();
        assert!(id.ends_with("-42"));
        // 12 random bytes -> 24 hex chars before the separator.
        assert_eq!(id.split('-').next().unwrap().len(), 24);
    }

    #[tokio::test]
    async fn ids_unique_across_sequences() {
        let generator = RandomId::default();
        let a = generator.generate(1).await.unwrap();
        let b = generator.generate(2).await.unwrap();
        // Distinct even if the random components were to collide.
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn random_component_varies() {
        let generator = RandomId::default();
        let a = generator.generate(1).await.unwrap();
        let b = generator.generate(1).await.unwrap();
        assert_ne!(a, b);
    }
}
