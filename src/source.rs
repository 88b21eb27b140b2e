//! The seam between the orchestrator and the remote catalog.
use crate::dataspace::{CatalogQuery, MatchPolicy};
use crate::download::{DownloadOptions, DownloadOutcome};
use crate::product::ProductDescriptor;

pub trait ProductSource {
    async fn search(
        self: &Self,
        query: &CatalogQuery,
        policy: MatchPolicy,
    ) -> anyhow::Result<ProductDescriptor>;

    async fn download(
        self: &Self,
        product: &ProductDescriptor,
        options: &DownloadOptions,
    ) -> anyhow::Result<DownloadOutcome>;
}
