use super::auth::{request_token, AccessToken};
use super::catalog::{self, CatalogQuery, MatchPolicy};
use crate::config::{Config, Credentials, Endpoints};
use crate::download::{self, DownloadOptions, DownloadOutcome};
use crate::error::DownloadError;
use crate::product::ProductDescriptor;
use crate::source::ProductSource;
use anyhow::Result;
use reqwest::{Client, Response};
use tracing::debug;

pub struct Provider {
    client: Client,
    endpoints: Endpoints,
    credentials: Credentials,
}

impl Provider {
    pub fn new(client: Client, endpoints: Endpoints, credentials: Credentials) -> Self {
        Self {
            client,
            endpoints,
            credentials,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config.http.build_client()?;
        Ok(Self::new(
            client,
            config.endpoints.clone(),
            config.credentials.clone(),
        ))
    }

    pub async fn access_token(self: &Self) -> Result<AccessToken> {
        let credentials = self.credentials.require()?;
        request_token(&self.client, &self.endpoints, credentials).await
    }

    /// Start streaming the archive of product `id` with a freshly issued token.
    pub async fn open_archive(self: &Self, id: &str) -> Result<Response> {
        let token = self.access_token().await?;
        let url = self.endpoints.product_value_url(id);
        debug!(%url, "Requesting archive");

        let response = self
            .client
            .get(url)
            .bearer_auth(token.secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status { status }.into());
        }
        Ok(response)
    }
}

impl ProductSource for Provider {
    async fn search(
        self: &Self,
        query: &CatalogQuery,
        policy: MatchPolicy,
    ) -> Result<ProductDescriptor> {
        catalog::search(&self.client, &self.endpoints, query, policy).await
    }

    async fn download(
        self: &Self,
        product: &ProductDescriptor,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome> {
        download::try_download(self, product, options).await
    }
}
