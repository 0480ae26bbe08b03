use async_trait::async_trait;

use crate::BoxError;

/// Boundary to whatever produces embeddings for the calling application.
///
/// Veclayer itself never generates embeddings; callers hand in vectors. The
/// trait exists so code sitting above the store can be written against one
/// interface and tested with [`FakeEmbeddings`].
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed a batch of documents.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BoxError>;

    /// Embed a single query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, BoxError>;

    /// Length of every vector this model returns.
    fn dimensions(&self) -> usize;
}

/// Deterministic bag-of-words embeddings for tests.
///
/// Each lowercase word is hashed into one of `dimensions` buckets and the
/// resulting count vector is L2-normalized, so texts sharing words have a
/// positive cosine similarity and identical texts embed identically.
#[derive(Debug, Clone)]
pub struct FakeEmbeddings {
    dimensions: usize,
}

impl FakeEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = fnv1a(&word.to_lowercase()) % self.dimensions as u64;
            vector[bucket as usize] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BoxError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, BoxError> {
        Ok(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
