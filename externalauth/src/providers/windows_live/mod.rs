//! Windows Live (Microsoft account) OAuth login.

mod client;
mod driver;

pub use client::{AccessToken, Api, Client, Urls, User, TOKEN_URL, USER_URL};
pub use driver::{Config, OAuthDriver, AUTHORIZE_URL, STATE_KEY};
