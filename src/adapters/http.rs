use crate::domain::model::{Community, CommunityId, LinkInfo, ResourceSlot, TargetIdentity};
use crate::domain::ports::{RemoteClient, RemoteError, RemoteResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

const SESSION_HEADER: &str = "NDCAUTH";
const LANGUAGE_HEADER: &str = "NDCLANG";

/// Connection settings of the community service.
#[derive(Debug, Clone)]
pub struct HttpRemoteSettings {
    pub base_url: String,
    pub session_token: String,
    pub language: String,
    pub request_timeout: Option<Duration>,
}

/// [`RemoteClient`] speaking the community service's JSON API.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
    settings: HttpRemoteSettings,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(rename = "api:statuscode")]
    code: Option<i64>,
    #[serde(rename = "api:message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkResolutionResponse {
    link_info_v2: Option<LinkInfoV2>,
}

#[derive(Debug, Deserialize)]
struct LinkInfoV2 {
    extensions: Option<LinkExtensions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkExtensions {
    link_info: Option<LinkObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkObject {
    object_id: Option<String>,
    ndc_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CommunityResponse {
    community: CommunityBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommunityBody {
    ndc_id: i64,
    #[serde(default)]
    influencer_list: Vec<InfluencerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfluencerEntry {
    uid: String,
    monthly_fee: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WalletResponse {
    wallet: WalletBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletBody {
    total_coins: f64,
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::transport(err.to_string())
    }
}

impl HttpRemoteClient {
    pub fn new(settings: HttpRemoteSettings) -> RemoteResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn influencer_path(community: CommunityId, target: &TargetIdentity) -> String {
        format!("/x{}/s/influencer/{}", community, target)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(SESSION_HEADER, format!("sid={}", self.settings.session_token))
            .header(LANGUAGE_HEADER, &self.settings.language)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorize(request).send().await?;
        tracing::debug!("Remote response status: {}", response.status());

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiStatus>(&body) {
            Ok(ApiStatus {
                code: Some(code),
                message,
            }) => RemoteError::new(code, message.unwrap_or_else(|| status.to_string())),
            _ => RemoteError::new(i64::from(status.as_u16()), body),
        })
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> RemoteResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::transport(format!("Malformed response: {}", e)))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn resolve_reference(&self, reference: &str) -> RemoteResult<LinkInfo> {
        tracing::debug!("Resolving link: {}", reference);
        let request = self
            .client
            .get(self.url("/g/s/link-resolution"))
            .query(&[("q", reference)]);
        let body: LinkResolutionResponse = Self::decode(self.send(request).await?).await?;

        let link = body
            .link_info_v2
            .and_then(|info| info.extensions)
            .and_then(|ext| ext.link_info);
        Ok(match link {
            Some(link) => LinkInfo {
                object_id: link.object_id,
                community_id: link.ndc_id.map(CommunityId),
            },
            None => LinkInfo::default(),
        })
    }

    async fn get_community_info(&self, community: CommunityId) -> RemoteResult<Community> {
        let request = self
            .client
            .get(self.url(&format!("/g/s-x{}/community/info", community)))
            .query(&[("withInfluencerList", "1")]);
        let body: CommunityResponse = Self::decode(self.send(request).await?).await?;

        let slots = body
            .community
            .influencer_list
            .into_iter()
            .map(|entry| ResourceSlot {
                owner: TargetIdentity::new(entry.uid),
                size: entry.monthly_fee.unwrap_or(1),
            })
            .collect();
        Ok(Community {
            id: CommunityId(body.community.ndc_id),
            slots,
        })
    }

    async fn create_slot(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
        size: u32,
    ) -> RemoteResult<()> {
        let request = self
            .client
            .post(self.url(&Self::influencer_path(community, target)))
            .json(&serde_json::json!({ "monthlyFee": size }));
        self.send(request).await?;
        Ok(())
    }

    async fn delete_slot(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
    ) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.url(&Self::influencer_path(community, target)));
        self.send(request).await?;
        Ok(())
    }

    async fn perform_unit_transfer(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
    ) -> RemoteResult<()> {
        let subscribe = self.url(&format!(
            "{}/subscribe",
            Self::influencer_path(community, target)
        ));
        self.send(
            self.client
                .post(&subscribe)
                .json(&serde_json::json!({ "paymentContext": { "isAutoRenew": false } })),
        )
        .await?;
        self.send(self.client.delete(&subscribe)).await?;
        Ok(())
    }

    async fn get_balance(&self) -> RemoteResult<i64> {
        let request = self.client.get(self.url("/g/s/wallet"));
        let body: WalletResponse = Self::decode(self.send(request).await?).await?;
        Ok(body.wallet.total_coins as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> HttpRemoteClient {
        HttpRemoteClient::new(HttpRemoteSettings {
            base_url: server.base_url(),
            session_token: "abc".to_string(),
            language: "ru".to_string(),
            request_timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_requests_carry_session_and_language() {
        let server = MockServer::start();
        let wallet_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/g/s/wallet")
                .header("NDCAUTH", "sid=abc")
                .header("NDCLANG", "ru");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"wallet": {"totalCoins": 42.0}}));
        });

        let balance = client_for(&server).get_balance().await.unwrap();

        wallet_mock.assert();
        assert_eq!(balance, 42);
    }

    #[tokio::test]
    async fn test_service_error_is_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/x9/s/influencer/u1");
            then.status(400)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "api:statuscode": 3302,
                    "api:message": "Not a VIP"
                }));
        });

        let err = client_for(&server)
            .delete_slot(CommunityId(9), &TargetIdentity::new("u1"))
            .await
            .unwrap_err();

        assert_eq!(err.code, 3302);
        assert_eq!(err.message, "Not a VIP");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let client = HttpRemoteClient::new(HttpRemoteSettings {
            base_url: "http://127.0.0.1:1".to_string(),
            session_token: "abc".to_string(),
            language: "ru".to_string(),
            request_timeout: Some(Duration::from_secs(5)),
        })
        .unwrap();

        let err = client.get_balance().await.unwrap_err();

        assert_eq!(err.code, RemoteError::TRANSPORT);
    }

    #[tokio::test]
    async fn test_plain_error_body_falls_back_to_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/g/s/wallet");
            then.status(503).body("maintenance");
        });

        let err = client_for(&server).get_balance().await.unwrap_err();

        assert_eq!(err.code, 503);
        assert_eq!(err.message, "maintenance");
    }
}
