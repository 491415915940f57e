use std::sync::Arc;

use async_trait::async_trait;
use log::*;
use url::Url;

use super::agent::{Api, UserInfo, GENDER_FEMALE, GENDER_MALE};
use crate::driver::{
    authorize_url, invalid_code_as_params, issue_state, verify_callback, CallbackParams, Driver,
    LoginContext,
};
use crate::error::Error;
use crate::profile::{AuthResult, Gender, ProfileIndex};
use crate::redirect::{LoginRedirect, RedirectStyle};
use crate::state::STATE_LENGTH;

pub const OAUTH_URL: &str = "https://open.weixin.qq.com/connect/oauth2/authorize";
pub const QR_URL: &str = "https://open.work.weixin.qq.com/wwopen/sso/qrConnect";

/// Fragment the in-app browser requires on the OAuth authorize URL.
const OAUTH_FRAGMENT: &str = "wechat_redirect";

/// Session key shared by the OAuth and QR drivers.
pub const STATE_KEY: &str = "externalauthdriver-wechatwork";

/// Repeatable attribute holding one department id per organizational unit.
pub const DEPARTMENT: ProfileIndex = ProfileIndex::new("WechatWorkDepartment");

/// WeChat Work OAuth driver configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub agent: Arc<dyn Api>,
    pub scope: String,
}

impl OAuthConfig {
    pub fn create(self) -> OAuthDriver {
        OAuthDriver::new(self)
    }
}

/// WeChat Work QR-code login driver configuration.
#[derive(Clone)]
pub struct QrConfig {
    pub agent: Arc<dyn Api>,
}

impl QrConfig {
    pub fn create(self) -> QrDriver {
        QrDriver::new(self)
    }
}

/// Login from inside the WeChat Work client through its OAuth page.
pub struct OAuthDriver {
    agent: Arc<dyn Api>,
    scope: String,
}

impl OAuthDriver {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            agent: config.agent,
            scope: config.scope,
        }
    }
}

/// Login from a desktop browser by scanning a QR code with the WeChat Work app.
pub struct QrDriver {
    agent: Arc<dyn Api>,
}

impl QrDriver {
    pub fn new(config: QrConfig) -> Self {
        Self {
            agent: config.agent,
        }
    }
}

#[async_trait]
impl Driver for OAuthDriver {
    async fn external_login(&self, ctx: LoginContext<'_>) -> Result<LoginRedirect, Error> {
        let state = issue_state(ctx.store, STATE_KEY, STATE_LENGTH).await?;

        let mut url = agent_url(OAUTH_URL, self.agent.as_ref())?;
        url.query_pairs_mut()
            .append_pair("scope", &self.scope)
            .append_pair("state", state.as_str())
            .append_pair("redirect_uri", ctx.auth_url);
        url.set_fragment(Some(OAUTH_FRAGMENT));

        Ok(LoginRedirect::new(url, RedirectStyle::MetaRefresh))
    }

    async fn auth_request(
        &self,
        ctx: LoginContext<'_>,
        params: &CallbackParams,
    ) -> Result<Option<AuthResult>, Error> {
        auth_request_with_agent(self.agent.as_ref(), ctx, params).await
    }
}

#[async_trait]
impl Driver for QrDriver {
    async fn external_login(&self, ctx: LoginContext<'_>) -> Result<LoginRedirect, Error> {
        let state = issue_state(ctx.store, STATE_KEY, STATE_LENGTH).await?;

        let mut url = agent_url(QR_URL, self.agent.as_ref())?;
        url.query_pairs_mut()
            .append_pair("state", state.as_str())
            .append_pair("redirect_uri", ctx.auth_url);

        Ok(LoginRedirect::new(url, RedirectStyle::MetaRefresh))
    }

    async fn auth_request(
        &self,
        ctx: LoginContext<'_>,
        params: &CallbackParams,
    ) -> Result<Option<AuthResult>, Error> {
        auth_request_with_agent(self.agent.as_ref(), ctx, params).await
    }
}

fn agent_url(base: &str, agent: &dyn Api) -> Result<Url, Error> {
    let mut url = authorize_url(base)?;
    url.query_pairs_mut()
        .append_pair("appid", agent.corp_id())
        .append_pair("agentid", &agent.agent_id().to_string());
    Ok(url)
}

async fn auth_request_with_agent(
    agent: &dyn Api,
    ctx: LoginContext<'_>,
    params: &CallbackParams,
) -> Result<Option<AuthResult>, Error> {
    let code = match verify_callback(ctx.store, STATE_KEY, params).await? {
        Some(code) => code,
        None => return Ok(None),
    };

    let info = match agent
        .user_info(&code)
        .await
        .map_err(invalid_code_as_params)?
    {
        Some(info) => info,
        None => return Ok(None),
    };

    info!("WeChat Work login for member {}", info.user_id);
    Ok(Some(to_auth_result(info)))
}

fn gender(code: &str) -> Option<Gender> {
    match code {
        GENDER_MALE => Some(Gender::Male),
        GENDER_FEMALE => Some(Gender::Female),
        _ => None,
    }
}

fn to_auth_result(info: UserInfo) -> AuthResult {
    let mut result = AuthResult::new(info.user_id);
    let profile = &mut result.profile;
    profile.set_value(ProfileIndex::AVATAR, info.avatar);
    profile.set_value(ProfileIndex::EMAIL, info.email);
    if let Some(gender) = gender(&info.gender) {
        profile.set_value(ProfileIndex::GENDER, gender.as_str());
    }
    profile.set_value(ProfileIndex::NAME, info.name.clone());
    profile.set_value(ProfileIndex::NICKNAME, info.name);
    for department in info.department {
        profile.add_value(DEPARTMENT, department.to_string());
    }
    result
}
