use crate::config::Endpoints;
use crate::error::SearchError;
use crate::product::{ProductDescriptor, ProductType, Satellite, TileCode};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How to pick one product when the catalog returns several for a tile and date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Whatever the catalog lists first.
    First,
    /// Smallest `OriginDate`.
    #[default]
    Earliest,
    /// Greatest `OriginDate`.
    Latest,
    /// Fail unless exactly one product matches.
    Unique,
}

#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub tile: TileCode,
    pub date: NaiveDate,
    pub product_type: ProductType,
    pub satellite: Option<Satellite>,
    raw_filter: Option<String>,
}

impl CatalogQuery {
    pub fn new(tile: TileCode, date: NaiveDate) -> Self {
        Self {
            tile,
            date,
            product_type: ProductType::default(),
            satellite: None,
            raw_filter: None,
        }
    }

    pub fn product_type(mut self, product_type: ProductType) -> Self {
        self.product_type = product_type;
        self
    }

    pub fn satellite(mut self, satellite: Option<Satellite>) -> Self {
        self.satellite = satellite;
        self
    }

    /// Send `filter` as is instead of building one from the tile and date.
    pub fn raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.raw_filter = Some(filter.into());
        self
    }

    /// The OData `$filter` expression for this query.
    pub fn filter(&self) -> String {
        if let Some(raw) = &self.raw_filter {
            return raw.clone();
        }
        // Product names look like S2A_MSIL1C_20240116T162621_N0510_R040_T16QEJ_20240116T195753
        let token = format!("{}_{}", self.product_type.level(), self.date.format("%Y%m%d"));
        let mut filter = format!(
            "contains(Name, '{token}') and contains(Name, '{}')",
            self.tile
        );
        if let Some(satellite) = self.satellite {
            filter.push_str(&format!(" and startswith(Name, '{}')", satellite.prefix()));
        }
        filter
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub origin_date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ODataResponse {
    value: Vec<CatalogEntry>,
}

impl MatchPolicy {
    pub fn select(self: &Self, entries: Vec<CatalogEntry>, filter: &str) -> Result<CatalogEntry, SearchError> {
        let count = entries.len();
        let selected = match self {
            Self::First => entries.into_iter().next(),
            Self::Earliest => entries.into_iter().min_by_key(|e| e.origin_date),
            Self::Latest => entries.into_iter().max_by_key(|e| e.origin_date),
            Self::Unique if count > 1 => return Err(SearchError::Ambiguous { count }),
            Self::Unique => entries.into_iter().next(),
        };
        selected.ok_or_else(|| SearchError::Empty {
            filter: filter.to_string(),
        })
    }
}

/// Query the catalog and reduce the matches to one product with `policy`.
pub async fn search(
    client: &Client,
    endpoints: &Endpoints,
    query: &CatalogQuery,
    policy: MatchPolicy,
) -> Result<ProductDescriptor> {
    let filter = query.filter();
    let url = endpoints.products_url();
    debug!(%url, %filter, "Searching catalog");

    let response = client
        .get(&url)
        .query(&[("$filter", filter.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SearchError::Status { status, body }.into());
    }

    let entries = response.json::<ODataResponse>().await?.value;
    let candidates = entries.len();
    let entry = policy.select(entries, &filter)?;
    info!(
        tile = %query.tile,
        candidates,
        policy = ?policy,
        id = %entry.id,
        name = %entry.name,
        "Selected product"
    );

    Ok(ProductDescriptor {
        id: entry.id,
        name: entry.name,
        tile: query.tile.clone(),
        origin_date: entry.origin_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NAME_A: &str = "S2A_MSIL1C_20240116T162621_N0510_R040_T16QEJ_20240116T195753.SAFE";
    const NAME_B: &str = "S2A_MSIL1C_20240116T162621_N0500_R040_T16QEJ_20240116T180012.SAFE";

    fn query() -> CatalogQuery {
        CatalogQuery::new(
            TileCode::new("16QEJ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
        )
    }

    fn entry(id: &str, name: &str, origin: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            name: name.to_string(),
            origin_date: origin.parse().unwrap(),
        }
    }

    fn two_entries() -> Vec<CatalogEntry> {
        vec![
            entry("b", NAME_A, "2024-01-16T21:02:11.000Z"),
            entry("a", NAME_B, "2024-01-16T19:40:00.000Z"),
        ]
    }

    #[test]
    fn test_filter_for_l1c() {
        assert_eq!(
            query().filter(),
            "contains(Name, 'MSIL1C_20240116') and contains(Name, '16QEJ')"
        );
    }

    #[test]
    fn test_filter_for_l2a_with_satellite() {
        let query = query()
            .product_type(ProductType::L2A)
            .satellite(Some(Satellite::S2B));
        assert_eq!(
            query.filter(),
            "contains(Name, 'MSIL2A_20240116') and contains(Name, '16QEJ') and startswith(Name, 'S2B')"
        );
    }

    #[test]
    fn test_raw_filter_overrides_query() {
        let query = query().raw_filter("contains(Name, 'anything')");
        assert_eq!(query.filter(), "contains(Name, 'anything')");
    }

    #[test]
    fn test_policy_selection() {
        let filter = "f";
        assert_eq!(MatchPolicy::First.select(two_entries(), filter).unwrap().id, "b");
        assert_eq!(MatchPolicy::Earliest.select(two_entries(), filter).unwrap().id, "a");
        assert_eq!(MatchPolicy::Latest.select(two_entries(), filter).unwrap().id, "b");
        assert!(matches!(
            MatchPolicy::Unique.select(two_entries(), filter),
            Err(SearchError::Ambiguous { count: 2 })
        ));
    }

    #[test]
    fn test_every_policy_rejects_empty() {
        for policy in [
            MatchPolicy::First,
            MatchPolicy::Earliest,
            MatchPolicy::Latest,
            MatchPolicy::Unique,
        ] {
            assert!(matches!(
                policy.select(vec![], "f"),
                Err(SearchError::Empty { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_search_returns_single_match_verbatim() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/odata/v1/Products"))
            .and(query_param(
                "$filter",
                "contains(Name, 'MSIL1C_20240116') and contains(Name, '16QEJ')",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "@odata.context": "$metadata#Products",
                "value": [{
                    "@odata.mediaContentType": "application/octet-stream",
                    "Id": "22018785-4dca-4e29-b40f-926dd0c1aa99",
                    "Name": NAME_A,
                    "ContentLength": 812345678,
                    "OriginDate": "2024-01-16T21:02:11.000000Z",
                    "Online": true
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let endpoints = Endpoints::with_base(&mock_server.uri()).unwrap();
        let product = search(&Client::new(), &endpoints, &query(), MatchPolicy::Unique)
            .await
            .unwrap();

        assert_eq!(product.id, "22018785-4dca-4e29-b40f-926dd0c1aa99");
        assert_eq!(product.name, NAME_A);
        assert_eq!(product.tile.as_str(), "16QEJ");
        assert_eq!(
            product.origin_date,
            "2024-01-16T21:02:11Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_search_with_no_matches_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/odata/v1/Products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .mount(&mock_server)
            .await;

        let endpoints = Endpoints::with_base(&mock_server.uri()).unwrap();
        let err = search(&Client::new(), &endpoints, &query(), MatchPolicy::First)
            .await
            .unwrap_err();
        match err.downcast_ref::<SearchError>() {
            Some(SearchError::Empty { filter }) => assert!(filter.contains("16QEJ")),
            other => panic!("Expected an empty result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_checks_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid filter"))
            .mount(&mock_server)
            .await;

        let endpoints = Endpoints::with_base(&mock_server.uri()).unwrap();
        let err = search(&Client::new(), &endpoints, &query(), MatchPolicy::First)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SearchError>(),
            Some(SearchError::Status { body, .. }) if body == "Invalid filter"
        ));
    }
}
