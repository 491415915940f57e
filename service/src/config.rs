use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;

pub const DEFAULT_WINDOWS_LIVE_SCOPE: &str = "wl.basic wl.emails";
pub const DEFAULT_WECHAT_WORK_SCOPE: &str = "snsapi_base";

const REDACTED: &str = "[REDACTED]";

/// Registered Windows Live application.
#[derive(Clone, PartialEq)]
pub struct WindowsLiveSettings {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl fmt::Debug for WindowsLiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsLiveSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Registered WeChat Work application agent.
#[derive(Clone, PartialEq)]
pub struct WechatWorkSettings {
    pub corp_id: String,
    pub agent_id: i64,
    pub secret: String,
    pub scope: String,
}

impl fmt::Debug for WechatWorkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WechatWorkSettings")
            .field("corp_id", &self.corp_id)
            .field("agent_id", &self.agent_id)
            .field("secret", &REDACTED)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Externally reachable base URL of this server. Provider callbacks are sent to
    /// `{public_base_url}/auth/{driver}/callback`.
    #[arg(long, env, default_value = "http://localhost:4000")]
    public_base_url: String,

    /// Session inactivity expiry in seconds. A pending login expires with its session.
    #[arg(long, env, default_value_t = 600)]
    pub session_expiry_seconds: u64,

    /// Only send the session cookie over HTTPS
    #[arg(long, env, default_value_t = false)]
    pub session_secure_cookie: bool,

    /// Timeout in seconds for each request to an identity provider
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_seconds: u64,

    /// Retries of a provider request after a transient failure
    #[arg(long, env, default_value_t = 3)]
    pub http_max_retries: u32,

    /// The Windows Live application (client) ID.
    #[arg(long, env)]
    windows_live_client_id: Option<String>,

    /// The Windows Live application secret.
    #[arg(long, env)]
    windows_live_client_secret: Option<String>,

    /// Space separated scopes requested from Windows Live.
    #[arg(long, env, default_value = DEFAULT_WINDOWS_LIVE_SCOPE)]
    windows_live_scope: String,

    /// The WeChat Work corporation ID.
    #[arg(long, env)]
    wechat_work_corp_id: Option<String>,

    /// The WeChat Work application agent ID.
    #[arg(long, env)]
    wechat_work_agent_id: Option<i64>,

    /// The WeChat Work application secret.
    #[arg(long, env)]
    wechat_work_secret: Option<String>,

    /// Scope requested on the WeChat Work OAuth page.
    #[arg(long, env, default_value = DEFAULT_WECHAT_WORK_SCOPE)]
    wechat_work_scope: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn public_base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    pub fn set_public_base_url(mut self, public_base_url: String) -> Self {
        self.public_base_url = public_base_url;
        self
    }

    /// Callback URL registered with the provider for the named driver.
    pub fn callback_url(&self, driver: &str) -> String {
        format!("{}/auth/{}/callback", self.public_base_url(), driver)
    }

    /// Windows Live settings, `None` unless both credentials are present.
    pub fn windows_live(&self) -> Option<WindowsLiveSettings> {
        Some(WindowsLiveSettings {
            client_id: present(&self.windows_live_client_id)?,
            client_secret: present(&self.windows_live_client_secret)?,
            scope: self.windows_live_scope.clone(),
        })
    }

    /// WeChat Work settings, `None` unless corporation, agent and secret are all present.
    pub fn wechat_work(&self) -> Option<WechatWorkSettings> {
        Some(WechatWorkSettings {
            corp_id: present(&self.wechat_work_corp_id)?,
            agent_id: self.wechat_work_agent_id?,
            secret: present(&self.wechat_work_secret)?,
            scope: self.wechat_work_scope.clone(),
        })
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| REDACTED)
}

// Secrets are printed as a placeholder, never their value.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("interface", &self.interface)
            .field("port", &self.port)
            .field("log_level_filter", &self.log_level_filter)
            .field("public_base_url", &self.public_base_url)
            .field("session_expiry_seconds", &self.session_expiry_seconds)
            .field("session_secure_cookie", &self.session_secure_cookie)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field("http_max_retries", &self.http_max_retries)
            .field("windows_live_client_id", &self.windows_live_client_id)
            .field(
                "windows_live_client_secret",
                &redacted(&self.windows_live_client_secret),
            )
            .field("windows_live_scope", &self.windows_live_scope)
            .field("wechat_work_corp_id", &self.wechat_work_corp_id)
            .field("wechat_work_agent_id", &self.wechat_work_agent_id)
            .field("wechat_work_secret", &redacted(&self.wechat_work_secret))
            .field("wechat_work_scope", &self.wechat_work_scope)
            .finish()
    }
}
