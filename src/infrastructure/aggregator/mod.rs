//! HTTP client for the aggregator's route and build endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::quote::{
    BuildData, BuildRouteRequest, BuildRouteService, RouteQuery, RouteSummary, RouteSummaryService,
};
use crate::shared::errors::BuildRouteError;
use crate::shared::types::Chain;

/// Every aggregator response is wrapped like this; `code == 0` means success.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteData {
    route_summary: RouteSummary,
    #[serde(default)]
    router_address: Option<String>,
}

/// Aggregator API client
pub struct AggregatorApiClient {
    http_client: Client,
    base_url: String,
    chain: Chain,
    client_id: String,
}

impl AggregatorApiClient {
    pub fn new(base_url: impl Into<String>, chain: Chain, client_id: impl Into<String>, timeout: Duration) -> Result<Self, BuildRouteError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain,
            client_id: client_id.into(),
        })
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{}/api/v1/{}", self.base_url, self.chain.as_str(), suffix)
    }

    async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BuildRouteError> {
        let status = response.status();
        let body = response.text().await?;

        let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(BuildRouteError::Decode(e.to_string())),
            Err(_) => {
                // Error bodies without data still carry { code, message }.
                return match serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body) {
                    Ok(err) => Err(BuildRouteError::Api { code: err.code, message: err.message }),
                    Err(_) => Err(BuildRouteError::Status { status: status.as_u16(), body }),
                };
            }
        };

        if !status.is_success() || envelope.code != 0 {
            let code = if envelope.code != 0 { envelope.code } else { status.as_u16() as i64 };
            return Err(BuildRouteError::Api { code, message: envelope.message });
        }

        envelope
            .data
            .ok_or_else(|| BuildRouteError::Decode("response has no data".to_string()))
    }
}

#[async_trait]
impl RouteSummaryService for AggregatorApiClient {
    async fn get_route(&self, query: &RouteQuery) -> Result<RouteSummary, BuildRouteError> {
        let url = self.endpoint("routes");
        info!("🔍 Fetching route {} -> {} for {} from {}", query.token_in, query.token_out, query.amount_in, url);

        let response = self
            .http_client
            .get(&url)
            .header("x-client-id", &self.client_id)
            .query(&[
                ("tokenIn", query.token_in.as_str()),
                ("tokenOut", query.token_out.as_str()),
                ("amountIn", query.amount_in.to_string().as_str()),
            ])
            .send()
            .await?;

        let data: RouteData = Self::read_envelope(response).await?;
        if let Some(router) = &data.router_address {
            debug!("Route served by router {}", router);
        }
        Ok(data.route_summary)
    }
}

#[async_trait]
impl BuildRouteService for AggregatorApiClient {
    async fn build_route(&self, request: &BuildRouteRequest) -> Result<BuildData, BuildRouteError> {
        let url = self.endpoint("route/build");
        debug!("Posting build request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .header("x-client-id", &self.client_id)
            .json(request)
            .send()
            .await?;

        match Self::read_envelope::<BuildData>(response).await {
            Ok(build) => {
                info!("✅ Route built: {} in -> {} out via {}", build.amount_in, build.amount_out, build.router_address);
                Ok(build)
            }
            Err(e) => {
                warn!("⚠️ Build endpoint returned an error: {}", e);
                Err(e)
            }
        }
    }
}
