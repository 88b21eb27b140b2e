use crate::dataspace::{CatalogQuery, MatchPolicy};
use crate::download::{DownloadOptions, DownloadOutcome};
use crate::error::DownloadError;
use crate::product::{DateRange, ProductType, Satellite, TileCode};
use crate::source::ProductSource;
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub product_type: ProductType,
    pub satellite: Option<Satellite>,
    pub policy: MatchPolicy,
}

/// Search and download one product per tile, in order. The first failure stops the run.
pub async fn search_and_download(
    source: &impl ProductSource,
    tiles: &[TileCode],
    range: DateRange,
    search: &SearchOptions,
    download: &DownloadOptions,
) -> Result<Vec<DownloadOutcome>> {
    info!(
        tiles = tiles.len(),
        start = %range.start(),
        end = %range.end(),
        "Starting search and download"
    );
    let date = range.acquisition_date()?;
    if download.unzip {
        return Err(DownloadError::UnzipUnsupported.into());
    }

    let mut outcomes = Vec::with_capacity(tiles.len());
    for tile in tiles {
        let query = CatalogQuery::new(tile.clone(), date)
            .product_type(search.product_type)
            .satellite(search.satellite);

        let product = source
            .search(&query, search.policy)
            .await
            .with_context(|| format!("Search failed for tile {tile}"))?;

        let outcome = source
            .download(&product, download)
            .await
            .with_context(|| format!("Download of {} failed for tile {tile}", product.name))?;

        outcomes.push(outcome);
    }
    Ok(outcomes)
}
