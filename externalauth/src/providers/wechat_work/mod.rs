//! WeChat Work (enterprise WeChat) login, through the in-app OAuth page or a QR code.

mod agent;
mod driver;

pub use agent::{
    Agent, Api, UserInfo, API_BASE_URL, ERR_OAUTH_CODE_WRONG, GENDER_FEMALE, GENDER_MALE,
};
pub use driver::{
    OAuthConfig, OAuthDriver, QrConfig, QrDriver, DEPARTMENT, OAUTH_URL, QR_URL, STATE_KEY,
};
