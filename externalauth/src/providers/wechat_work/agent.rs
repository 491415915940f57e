//! WeChat Work (enterprise WeChat) application agent.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{provider_error, Error, ProviderErrorKind};
use crate::http::HttpClient;

pub const API_BASE_URL: &str = "https://qyapi.weixin.qq.com";

/// Errcode returned when an OAuth code is invalid, expired or already used.
pub const ERR_OAUTH_CODE_WRONG: i64 = 40029;
const ERR_INVALID_ACCESS_TOKEN: i64 = 40014;
const ERR_ACCESS_TOKEN_EXPIRED: i64 = 42001;

pub const GENDER_MALE: &str = "1";
pub const GENDER_FEMALE: &str = "2";

// Refresh the cached access token this long before the provider expires it.
const TOKEN_EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Member profile returned by the user detail API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "userid", default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    /// Ids of every department the member belongs to, in provider order.
    #[serde(default)]
    pub department: Vec<i64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gender: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
}

/// WeChat Work capabilities a driver depends on.
#[async_trait]
pub trait Api: Send + Sync {
    /// Corporation id sent as `appid`.
    fn corp_id(&self) -> &str;

    /// Application agent id sent as `agentid`.
    fn agent_id(&self) -> i64;

    /// Resolve an OAuth code to the member's profile.
    ///
    /// `None` when the code belongs to someone who is not a member of the corporation.
    /// A rejected code is reported as `ProviderErrorKind::InvalidCode`.
    async fn user_info(&self, code: &str) -> Result<Option<UserInfo>, Error>;
}

#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl ApiStatus {
    fn is_token_error(&self) -> bool {
        self.errcode == ERR_INVALID_ACCESS_TOKEN || self.errcode == ERR_ACCESS_TOKEN_EXPIRED
    }

    fn check(&self) -> Result<(), Error> {
        match self.errcode {
            0 => Ok(()),
            ERR_OAUTH_CODE_WRONG => Err(provider_error(
                ProviderErrorKind::InvalidCode,
                &format!("{}: {}", self.errcode, self.errmsg),
            )),
            _ => Err(provider_error(
                ProviderErrorKind::Api,
                &format!("{}: {}", self.errcode, self.errmsg),
            )),
        }
    }
}

trait ApiResponse: DeserializeOwned {
    fn status(&self) -> &ApiStatus;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct CodeResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(rename = "UserId", default)]
    user_id: String,
}

impl ApiResponse for CodeResponse {
    fn status(&self) -> &ApiStatus {
        &self.status
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(flatten)]
    user: UserInfo,
}

impl ApiResponse for UserResponse {
    fn status(&self) -> &ApiStatus {
        &self.status
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// A WeChat Work application agent with a cached access token.
pub struct Agent {
    corp_id: String,
    agent_id: i64,
    secret: SecretString,
    base_url: String,
    http_client: HttpClient,
    token: RwLock<Option<CachedToken>>,
}

impl Agent {
    pub fn new(corp_id: String, agent_id: i64, secret: SecretString, http_client: HttpClient) -> Self {
        Self {
            corp_id,
            agent_id,
            secret,
            base_url: API_BASE_URL.to_string(),
            http_client,
            token: RwLock::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn access_token(&self) -> Result<String, Error> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another request may have refreshed it while we waited for the lock.
        if let Some(cached) = slot.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        debug!("Fetching WeChat Work access token for corp {}", self.corp_id);
        let response: TokenResponse = self
            .http_client
            .get(format!("{}/cgi-bin/gettoken", self.base_url))
            .query(&[
                ("corpid", self.corp_id.as_str()),
                ("corpsecret", self.secret.expose_secret().as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.status.check()?;

        let lifetime = (response.expires_in - TOKEN_EXPIRY_MARGIN_SECONDS).max(0);
        *slot = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        });
        Ok(response.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Call an authenticated API, refreshing the access token once if it was rejected.
    async fn call<T: ApiResponse>(&self, path: &str, params: &[(&str, &str)]) -> Result<T, Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut refreshed = false;
        loop {
            let token = self.access_token().await?;
            let body: T = self
                .http_client
                .get(&url)
                .query(&[("access_token", token.as_str())])
                .query(params)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if body.status().is_token_error() && !refreshed {
                warn!("WeChat Work rejected access token on {}, refreshing", path);
                self.invalidate_token().await;
                refreshed = true;
                continue;
            }
            body.status().check()?;
            return Ok(body);
        }
    }
}

#[async_trait]
impl Api for Agent {
    fn corp_id(&self) -> &str {
        &self.corp_id
    }

    fn agent_id(&self) -> i64 {
        self.agent_id
    }

    async fn user_info(&self, code: &str) -> Result<Option<UserInfo>, Error> {
        let identity: CodeResponse = self
            .call("/cgi-bin/user/getuserinfo", &[("code", code)])
            .await?;
        if identity.user_id.is_empty() {
            debug!("WeChat Work code resolved to a non-member");
            return Ok(None);
        }

        let detail: UserResponse = self
            .call("/cgi-bin/user/get", &[("userid", identity.user_id.as_str())])
            .await?;
        Ok(Some(detail.user))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::HttpClientBuilder;
    use mockito::{Matcher, Mock, Server, ServerGuard};

    fn agent_for(server_url: &str) -> Agent {
        let http_client = HttpClientBuilder::new().with_max_retries(0).build().unwrap();
        Agent::new(
            "corp".to_string(),
            1000002,
            SecretString::new("corp-secret".to_string()),
            http_client,
        )
        .with_base_url(server_url.to_string())
    }

    async fn mock_token(server: &mut ServerGuard, token: &str, hits: usize) -> Mock {
        server
            .mock("GET", "/cgi-bin/gettoken")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("corpid".into(), "corp".into()),
                Matcher::UrlEncoded("corpsecret".into(), "corp-secret".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"errcode":0,"errmsg":"ok","access_token":"{}","expires_in":7200}}"#,
                token
            ))
            .expect(hits)
            .create_async()
            .await
    }

    async fn mock_code(server: &mut ServerGuard, body: &str) -> Mock {
        server
            .mock("GET", "/cgi-bin/user/getuserinfo")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("access_token".into(), "tok".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
            ]))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_user_info_success() {
        let mut server = Server::new_async().await;
        let token = mock_token(&mut server, "tok", 1).await;
        let _code = mock_code(&mut server, r#"{"errcode":0,"errmsg":"ok","UserId":"zhangsan"}"#).await;
        let _mock = server
            .mock("GET", "/cgi-bin/user/get")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("access_token".into(), "tok".into()),
                Matcher::UrlEncoded("userid".into(), "zhangsan".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"errcode":0,"errmsg":"ok","userid":"zhangsan","name":"Zhang San",
                    "department":[3,1,3],"gender":"1","email":"zs@corp.example",
                    "avatar":"https://wework.qpic.cn/a/0"}"#,
            )
            .create_async()
            .await;

        let info = agent_for(&server.url())
            .user_info("the-code")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.user_id, "zhangsan");
        assert_eq!(info.department, vec![3, 1, 3]);
        assert_eq!(info.gender, GENDER_MALE);
        assert_eq!(info.email, "zs@corp.example");
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_info_wrong_code_is_invalid_code() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, "tok", 1).await;
        let _code = mock_code(&mut server, r#"{"errcode":40029,"errmsg":"invalid code"}"#).await;

        let err = agent_for(&server.url())
            .user_info("the-code")
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Provider(ProviderErrorKind::InvalidCode)
        );
    }

    #[tokio::test]
    async fn test_user_info_non_member_is_none() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, "tok", 1).await;
        let _code = mock_code(&mut server, r#"{"errcode":0,"errmsg":"ok","OpenId":"o-123"}"#).await;

        let info = agent_for(&server.url()).user_info("the-code").await.unwrap();
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn test_access_token_is_cached() {
        let mut server = Server::new_async().await;
        let token = mock_token(&mut server, "tok", 1).await;
        let _mock = server
            .mock("GET", "/cgi-bin/user/getuserinfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"errcode":0,"errmsg":"ok","OpenId":"o-123"}"#)
            .expect(2)
            .create_async()
            .await;

        let agent = agent_for(&server.url());
        agent.user_info("the-code").await.unwrap();
        agent.user_info("the-code").await.unwrap();
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let mut server = Server::new_async().await;
        let token = mock_token(&mut server, "tok", 2).await;
        let expired = server
            .mock("GET", "/cgi-bin/user/getuserinfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"errcode":42001,"errmsg":"access_token expired"}"#)
            .expect(2)
            .create_async()
            .await;

        let err = agent_for(&server.url())
            .user_info("the-code")
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Provider(ProviderErrorKind::Api));
        token.assert_async().await;
        expired.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/cgi-bin/gettoken")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"errcode":40001,"errmsg":"invalid credential"}"#)
            .create_async()
            .await;

        let err = agent_for(&server.url())
            .user_info("the-code")
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Provider(ProviderErrorKind::Api));
    }

    #[test]
    fn test_gender_accepts_number() {
        let info: UserInfo =
            serde_json::from_str(r#"{"userid":"u","gender":2,"department":[]}"#).unwrap();
        assert_eq!(info.gender, GENDER_FEMALE);
    }
}
