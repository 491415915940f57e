//! Named drivers available to the login routes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::*;
use secrecy::SecretString;

use externalauth::http::{HttpClient, HttpClientBuilder};
use externalauth::providers::{wechat_work, windows_live};
use externalauth::{Driver, Error};
use service::config::Config;

pub const WINDOWS_LIVE: &str = "windowslive";
pub const WECHAT_WORK: &str = "wechatwork";
pub const WECHAT_WORK_QR: &str = "wechatwork-qr";

/// Driver configurations built once at startup. Immutable afterwards.
#[derive(Clone, Default)]
pub struct Registry {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(mut self, name: &str, driver: impl Driver + 'static) -> Self {
        self.drivers.insert(name.to_string(), Arc::new(driver));
        self
    }

    /// Register the drivers of every provider whose credentials are fully configured.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let http_client = http_client(config)?;
        let mut registry = Self::new();

        match config.windows_live() {
            Some(settings) => {
                let client = windows_live::Client::new(
                    settings.client_id,
                    SecretString::new(settings.client_secret),
                    http_client.clone(),
                );
                registry = registry.with_driver(
                    WINDOWS_LIVE,
                    windows_live::Config {
                        client: Arc::new(client),
                        scope: settings.scope,
                    }
                    .create(),
                );
            }
            None => info!("Windows Live credentials not configured, driver disabled"),
        }

        match config.wechat_work() {
            Some(settings) => {
                let agent: Arc<dyn wechat_work::Api> = Arc::new(wechat_work::Agent::new(
                    settings.corp_id,
                    settings.agent_id,
                    SecretString::new(settings.secret),
                    http_client,
                ));
                registry = registry
                    .with_driver(
                        WECHAT_WORK,
                        wechat_work::OAuthConfig {
                            agent: agent.clone(),
                            scope: settings.scope,
                        }
                        .create(),
                    )
                    .with_driver(WECHAT_WORK_QR, wechat_work::QrConfig { agent }.create());
            }
            None => info!("WeChat Work credentials not configured, drivers disabled"),
        }

        info!("Registered external auth drivers: {:?}", registry.names());
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}

fn http_client(config: &Config) -> Result<HttpClient, Error> {
    HttpClientBuilder::new()
        .with_timeout(Duration::from_secs(config.http_timeout_seconds))
        .with_max_retries(config.http_max_retries)
        .build()
}
