use std::sync::Arc;

use async_trait::async_trait;
use log::*;

use super::client::{Api, User};
use crate::driver::{
    authorize_url, invalid_code_as_params, issue_state, verify_callback, CallbackParams, Driver,
    LoginContext,
};
use crate::error::Error;
use crate::profile::{AuthResult, ProfileIndex};
use crate::redirect::{LoginRedirect, RedirectStyle};
use crate::state::STATE_LENGTH;

pub const AUTHORIZE_URL: &str = "https://login.live.com/oauth20_authorize.srf";

/// Session key holding the Windows Live login state.
pub const STATE_KEY: &str = "externalauthdriver-windowslive";

/// Windows Live driver configuration.
#[derive(Clone)]
pub struct Config {
    pub client: Arc<dyn Api>,
    pub scope: String,
}

impl Config {
    pub fn create(self) -> OAuthDriver {
        OAuthDriver::new(self)
    }
}

/// Windows Live OAuth driver. Redirects with a plain `302 Found`.
pub struct OAuthDriver {
    client: Arc<dyn Api>,
    scope: String,
}

impl OAuthDriver {
    pub fn new(config: Config) -> Self {
        Self {
            client: config.client,
            scope: config.scope,
        }
    }
}

#[async_trait]
impl Driver for OAuthDriver {
    async fn external_login(&self, ctx: LoginContext<'_>) -> Result<LoginRedirect, Error> {
        let state = issue_state(ctx.store, STATE_KEY, STATE_LENGTH).await?;

        let mut url = authorize_url(AUTHORIZE_URL)?;
        url.query_pairs_mut()
            .append_pair("client_id", self.client.client_id())
            .append_pair("scope", &self.scope)
            .append_pair("state", state.as_str())
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", ctx.auth_url);

        Ok(LoginRedirect::new(url, RedirectStyle::Found))
    }

    async fn auth_request(
        &self,
        ctx: LoginContext<'_>,
        params: &CallbackParams,
    ) -> Result<Option<AuthResult>, Error> {
        let code = match verify_callback(ctx.store, STATE_KEY, params).await? {
            Some(code) => code,
            None => return Ok(None),
        };

        let token = self
            .client
            .access_token(&code, ctx.auth_url)
            .await
            .map_err(invalid_code_as_params)?;
        if token.access_token.is_empty() {
            warn!("Windows Live returned an empty access token");
            return Ok(None);
        }

        let user = match self.client.user(&token.access_token).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        info!("Windows Live login for account {}", user.id);
        Ok(Some(to_auth_result(user, token.access_token)))
    }
}

fn to_auth_result(user: User, access_token: String) -> AuthResult {
    let mut result = AuthResult::new(user.id);
    let profile = &mut result.profile;
    profile.set_value(ProfileIndex::FIRST_NAME, user.first_name);
    profile.set_value(ProfileIndex::LAST_NAME, user.last_name);
    profile.set_value(ProfileIndex::LOCALE, user.locale);
    profile.set_value(ProfileIndex::ACCESS_TOKEN, access_token);
    profile.set_value(ProfileIndex::NAME, user.name);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{provider_error, ErrorKind, ProviderErrorKind};
    use crate::providers::windows_live::AccessToken;
    use crate::state::{MemoryStateStore, StateStore};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CALLBACK: &str = "https://host.example/auth/windowslive/callback";

    enum TokenReply {
        Token(&'static str),
        InvalidCode,
        Outage,
    }

    struct StubApi {
        token: TokenReply,
        user: Option<User>,
        exchanges: AtomicUsize,
    }

    impl StubApi {
        fn new(token: TokenReply, user: Option<User>) -> Arc<Self> {
            Arc::new(Self {
                token,
                user,
                exchanges: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Api for StubApi {
        fn client_id(&self) -> &str {
            "live-client"
        }

        async fn access_token(&self, code: &str, redirect_uri: &str) -> Result<AccessToken, Error> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            assert_eq!(code, "the-code");
            assert_eq!(redirect_uri, CALLBACK);
            match self.token {
                TokenReply::Token(token) => Ok(AccessToken {
                    access_token: token.to_string(),
                    ..Default::default()
                }),
                TokenReply::InvalidCode => Err(provider_error(
                    ProviderErrorKind::InvalidCode,
                    "400: invalid_grant",
                )),
                TokenReply::Outage => Err(provider_error(ProviderErrorKind::Api, "503")),
            }
        }

        async fn user(&self, access_token: &str) -> Result<Option<User>, Error> {
            assert_eq!(access_token, "tok");
            Ok(self.user.clone())
        }
    }

    fn roberto() -> User {
        User {
            id: "8c8ce076ca27823f".to_string(),
            name: "Roberto Tamburello".to_string(),
            first_name: "Roberto".to_string(),
            last_name: "Tamburello".to_string(),
            locale: "en_US".to_string(),
        }
    }

    fn driver(api: Arc<StubApi>) -> OAuthDriver {
        Config {
            client: api,
            scope: "wl.basic wl.emails".to_string(),
        }
        .create()
    }

    async fn begin(driver: &OAuthDriver, store: &MemoryStateStore) -> String {
        let redirect = driver
            .external_login(LoginContext::new(store, CALLBACK))
            .await
            .unwrap();
        let query: HashMap<_, _> = redirect.url.query_pairs().into_owned().collect();
        query["state"].clone()
    }

    #[tokio::test]
    async fn test_external_login_builds_authorize_url() {
        let store = MemoryStateStore::new();
        let driver = driver(StubApi::new(TokenReply::Token("tok"), None));
        let redirect = driver
            .external_login(LoginContext::new(&store, CALLBACK))
            .await
            .unwrap();

        assert_eq!(redirect.style, RedirectStyle::Found);
        assert!(redirect.location().starts_with(AUTHORIZE_URL));
        assert_eq!(redirect.url.fragment(), None);

        let query: HashMap<_, _> = redirect.url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "live-client");
        assert_eq!(query["scope"], "wl.basic wl.emails");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], CALLBACK);
        assert_eq!(query["state"].len(), STATE_LENGTH);

        let stored = store.load(STATE_KEY).await.unwrap().unwrap();
        assert_eq!(stored.as_str(), query["state"]);
    }

    #[tokio::test]
    async fn test_successful_callback_maps_profile() {
        let store = MemoryStateStore::new();
        let driver = driver(StubApi::new(TokenReply::Token("tok"), Some(roberto())));
        let state = begin(&driver, &store).await;

        let params = CallbackParams::new(Some("the-code"), Some(state.as_str()));
        let result = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &params)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.account, "8c8ce076ca27823f");
        let profile = &result.profile;
        assert_eq!(profile.value(&ProfileIndex::FIRST_NAME), Some("Roberto"));
        assert_eq!(profile.value(&ProfileIndex::LAST_NAME), Some("Tamburello"));
        assert_eq!(profile.value(&ProfileIndex::LOCALE), Some("en_US"));
        assert_eq!(profile.value(&ProfileIndex::ACCESS_TOKEN), Some("tok"));
        assert_eq!(
            profile.value(&ProfileIndex::NAME),
            Some("Roberto Tamburello")
        );

        // The same code/state pair replayed is no longer a login in progress.
        let replay = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &params)
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn test_mismatched_state_skips_exchange() {
        let store = MemoryStateStore::new();
        let api = StubApi::new(TokenReply::Token("tok"), Some(roberto()));
        let driver = driver(api.clone());
        let state = begin(&driver, &store).await;

        let forged = CallbackParams::new(Some("the-code"), Some("forged"));
        let err = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &forged)
            .await
            .unwrap_err();
        assert!(err.is_params_error());
        assert_eq!(api.exchanges.load(Ordering::SeqCst), 0);

        // The pending state survives a mismatch, so the genuine callback still succeeds.
        let genuine = CallbackParams::new(Some("the-code"), Some(state.as_str()));
        let result = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &genuine)
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_invalid_code_is_params_error_and_state_is_consumed() {
        let store = MemoryStateStore::new();
        let driver = driver(StubApi::new(TokenReply::InvalidCode, None));
        let state = begin(&driver, &store).await;

        let params = CallbackParams::new(Some("the-code"), Some(state.as_str()));
        let err = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &params)
            .await
            .unwrap_err();
        assert!(err.is_params_error());
        assert!(store.load(STATE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_outage_is_passed_through() {
        let store = MemoryStateStore::new();
        let driver = driver(StubApi::new(TokenReply::Outage, None));
        let state = begin(&driver, &store).await;

        let params = CallbackParams::new(Some("the-code"), Some(state.as_str()));
        let err = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &params)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Provider(ProviderErrorKind::Api));
        assert!(store.load(STATE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_access_token_is_not_applicable() {
        let store = MemoryStateStore::new();
        let driver = driver(StubApi::new(TokenReply::Token(""), Some(roberto())));
        let state = begin(&driver, &store).await;

        let params = CallbackParams::new(Some("the-code"), Some(state.as_str()));
        let result = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &params)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_missing_user_is_not_applicable() {
        let store = MemoryStateStore::new();
        let driver = driver(StubApi::new(TokenReply::Token("tok"), None));
        let state = begin(&driver, &store).await;

        let params = CallbackParams::new(Some("the-code"), Some(state.as_str()));
        let result = driver
            .auth_request(LoginContext::new(&store, CALLBACK), &params)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
