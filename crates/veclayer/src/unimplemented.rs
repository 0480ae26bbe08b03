use async_trait::async_trait;
use veclayer_core::{
    CollectionStats, Document, HealthStatus, HybridQuery, MetadataFilter, MmrQuery, ProviderKind,
    Result, SearchQuery, SearchResult, VectorError, VectorProvider,
};

/// Stand-in for a declared backend that has no implementation yet.
///
/// Every operation, `initialize` included, fails with
/// `ProviderNotImplemented` naming the operation.
#[derive(Debug, Clone, Copy)]
pub struct UnimplementedProvider {
    kind: ProviderKind,
}

impl UnimplementedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    fn fail<T>(&self, operation: &str) -> Result<T> {
        Err(VectorError::not_implemented(self.kind, operation))
    }
}

#[async_trait]
impl VectorProvider for UnimplementedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn initialize(&self) -> Result<()> {
        self.fail("initialize")
    }

    async fn dispose(&self) -> Result<()> {
        self.fail("dispose")
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        self.fail("health_check")
    }

    async fn create_collection(&self, _name: &str) -> Result<()> {
        self.fail("create_collection")
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        self.fail("delete_collection")
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.fail("list_collections")
    }

    async fn collection_stats(&self, _name: &str) -> Result<CollectionStats> {
        self.fail("get_collection_stats")
    }

    async fn collection_exists(&self, _name: &str) -> Result<bool> {
        self.fail("collection_exists")
    }

    async fn upsert(&self, _collection: &str, _documents: &[Document]) -> Result<usize> {
        self.fail("upsert")
    }

    async fn delete(&self, _collection: &str, _ids: &[String]) -> Result<u64> {
        self.fail("delete")
    }

    async fn get(&self, _collection: &str, _ids: &[String]) -> Result<Vec<Document>> {
        self.fail("get")
    }

    async fn count(&self, _collection: &str, _filter: Option<&MetadataFilter>) -> Result<u64> {
        self.fail("count")
    }

    async fn search(&self, _collection: &str, _query: &SearchQuery) -> Result<Vec<SearchResult>> {
        self.fail("search")
    }

    async fn hybrid_search(
        &self,
        _collection: &str,
        _query: &HybridQuery,
    ) -> Result<Vec<SearchResult>> {
        self.fail("hybrid_search")
    }

    async fn mmr_search(&self, _collection: &str, _query: &MmrQuery) -> Result<Vec<SearchResult>> {
        self.fail("mmr_search")
    }

    async fn optimize(&self, _collection: &str) -> Result<()> {
        self.fail("optimize")
    }

    async fn vacuum(&self, _collection: &str) -> Result<()> {
        self.fail("vacuum")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veclayer_core::ErrorKind;

    #[tokio::test]
    async fn every_operation_reports_not_implemented() {
        let provider = UnimplementedProvider::new(ProviderKind::Qdrant);
        assert_eq!(provider.kind(), ProviderKind::Qdrant);

        let err = provider.initialize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotImplemented);
        assert_eq!(err.provider_kind(), Some(ProviderKind::Qdrant));
        assert_eq!(err.context().unwrap()["operation"], "initialize");

        let err = provider
            .search("docs", &SearchQuery::new(vec![1.0], 1))
            .await
            .unwrap_err();
        assert_eq!(err.context().unwrap()["operation"], "search");
    }
}
