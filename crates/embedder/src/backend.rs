use crate::error::Result;
use async_trait::async_trait;

/// Capability interface all embedding backends implement.
///
/// `embed` is order-preserving and returns exactly one vector per input.
/// Implementations classify their failures as transient or permanent via
/// [`crate::EmbedderError`]; the retry policy lives in [`crate::Embedder`],
/// not here.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Stable backend identifier, e.g. `local:hash-v1`
    fn id(&self) -> String;

    /// Fixed output dimension
    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic offline backend: hashes the text into a seeded PRNG and
/// projects it onto a unit-norm vector. Same text, same vector, always.
pub struct LocalHashBackend {
    model: String,
    dimension: usize,
}

impl LocalHashBackend {
    #[must_use]
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut state = fnv1a_64(text.as_bytes())
            ^ (self.dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            let bits = splitmix64(&mut state);
            let high = (bits >> 32) as u32;
            let mantissa = high >> 9;
            let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
            vector.push(unit.mul_add(2.0, -1.0));
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for LocalHashBackend {
    fn id(&self) -> String {
        format!("local:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

pub(crate) fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_is_deterministic() {
        let backend = LocalHashBackend::new("hash-v1", 64);
        let texts = vec!["fn main() {}".to_string(), "struct Foo;".to_string()];
        let first = backend.embed(&texts).await.unwrap();
        let second = backend.embed(&texts).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].len(), 64);
    }

    #[tokio::test]
    async fn local_vectors_are_unit_norm() {
        let backend = LocalHashBackend::new("hash-v1", 128);
        let vectors = backend.embed(&["some chunk text".to_string()]).await.unwrap();
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn different_texts_produce_different_vectors() {
        let backend = LocalHashBackend::new("hash-v1", 64);
        let vectors = backend
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }
}
