//! HTTP client for the Giftbit-style gift-card API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::model::{Brand, Region, Reward};
use super::{GiftProvider, ProviderError};
use crate::gifts::ClaimLink;

const BRAND_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
struct DirectLink {
    claim_url: String,
    short_id: String,
}

/// `POST /direct_links` answers with either shape depending on the account.
#[derive(Debug, Deserialize)]
struct DirectLinksResponse {
    #[serde(default)]
    direct_links: Option<Vec<DirectLink>>,
    #[serde(default)]
    direct_link: Option<DirectLink>,
}

#[derive(Debug, Deserialize)]
struct BrandsResponse {
    #[serde(default)]
    brands: Vec<Brand>,
}

#[derive(Debug, Deserialize)]
struct RegionsResponse {
    #[serde(default)]
    regions: Vec<Region>,
}

#[derive(Debug, Deserialize)]
struct RewardResponse {
    gift: Reward,
}

#[derive(Debug, Deserialize)]
struct RewardsResponse {
    #[serde(default)]
    gifts: Vec<Reward>,
}

#[derive(Debug, Deserialize)]
struct FundsResponse {
    balance_in_cents: i64,
}

/// Gift provider over HTTPS with bearer-key auth and a per-request timeout
#[derive(Clone)]
pub struct GiftbitClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GiftbitClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;
        Ok(request.bearer_auth(key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        self.authorized(request)?
            .send()
            .await
            .map_err(transport_error)
    }

    /// GET for listing endpoints, where any non-2xx means the provider is
    /// unavailable.
    async fn get_listing<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "provider answered {}",
                status.as_u16()
            )));
        }
        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable("request timed out".to_string())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

async fn request_failed(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::RequestFailed { status, body }
}

#[async_trait]
impl GiftProvider for GiftbitClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn list_brands(&self, region_code: Option<&str>) -> Result<Vec<Brand>, ProviderError> {
        let mut request = self
            .http
            .get(self.url("/brands"))
            .query(&[("limit", BRAND_PAGE_LIMIT.to_string())]);
        if let Some(region) = region_code {
            request = request.query(&[("region_code", region)]);
        }

        let body: BrandsResponse = self.get_listing(request).await?;
        tracing::debug!(count = body.brands.len(), region = ?region_code, "Fetched provider brands");
        Ok(body.brands)
    }

    async fn list_regions(&self) -> Result<Vec<Region>, ProviderError> {
        let body: RegionsResponse = self.get_listing(self.http.get(self.url("/regions"))).await?;
        Ok(body.regions)
    }

    async fn create_claim_link(
        &self,
        id: Uuid,
        brand_code: &str,
        amount_cents: i64,
    ) -> Result<ClaimLink, ProviderError> {
        let request = self.http.post(self.url("/direct_links")).json(&json!({
            "id": id.to_string(),
            "price_in_cents": amount_cents,
            "brand_codes": [brand_code],
            "link_count": 1,
        }));

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(request_failed(response).await);
        }

        let body: DirectLinksResponse = decode(response).await?;
        let link = body
            .direct_links
            .and_then(|links| links.into_iter().next())
            .or(body.direct_link)
            .ok_or_else(|| ProviderError::InvalidResponse("no claim link in response".to_string()))?;

        if link.claim_url.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("empty claim url".to_string()));
        }

        tracing::info!(gift_id = %id, short_id = %link.short_id, "Provider minted claim link");
        Ok(ClaimLink {
            claim_url: link.claim_url,
            short_id: link.short_id,
        })
    }

    async fn cancel(&self, id: Uuid) -> Result<(), ProviderError> {
        let response = self
            .send(self.http.delete(self.url(&format!("/gifts/{}", id))))
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(format!("reward {}", id))),
            _ => Err(request_failed(response).await),
        }
    }

    async fn reward(&self, id: Uuid) -> Result<Option<Reward>, ProviderError> {
        let response = self
            .send(self.http.get(self.url(&format!("/gifts/{}", id))))
            .await?;

        match response.status() {
            s if s.is_success() => {
                let body: RewardResponse = decode(response).await?;
                Ok(Some(body.gift))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(request_failed(response).await),
        }
    }

    async fn list_rewards(&self, limit: u32) -> Result<Vec<Reward>, ProviderError> {
        let request = self
            .http
            .get(self.url("/gifts"))
            .query(&[("limit", limit.to_string())]);
        let body: RewardsResponse = self.get_listing(request).await?;
        Ok(body.gifts)
    }

    async fn account_balance(&self) -> Option<i64> {
        match self
            .get_listing::<FundsResponse>(self.http.get(self.url("/funds")))
            .await
        {
            Ok(funds) => Some(funds.balance_in_cents),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read provider account funds");
                None
            }
        }
    }
}
