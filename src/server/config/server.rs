// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The server configuration, read from and written to YAML through the `Config` trait.

use std::{collections::BTreeMap, path::PathBuf};

use crate::{
    core::{
        comms::{security_policy::SecurityPolicy, url::url_matches_except_host},
        config::Config,
    },
    server::constants,
    types::{service_types::ApplicationType, DecodingOptions, MessageSecurityMode, UAString},
};

use super::{endpoint::ServerEndpoint, limits::Limits};

/// Token id an endpoint lists to accept anonymous users
pub const ANONYMOUS_USER_TOKEN_ID: &str = "ANONYMOUS";

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TcpConfig {
    /// Seconds a new connection may take to send its hello
    pub hello_timeout: u32,
    /// Interface to listen on, also the host of the advertised endpoint urls
    pub host: String,
    /// 0 lets the operating system choose
    pub port: u16,
}

/// A user name and password that may activate sessions
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ServerUserToken {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
}

impl ServerUserToken {
    pub fn user_pass<T>(user: T, pass: T) -> Self
    where
        T: Into<String>,
    {
        ServerUserToken {
            user: user.into(),
            pass: Some(pass.into()),
        }
    }

    pub fn is_valid(&self, id: &str) -> bool {
        let problems = [
            (id == ANONYMOUS_USER_TOKEN_ID, "uses the reserved anonymous id"),
            (self.user.is_empty(), "has no user name"),
            (self.pass.is_none(), "has no password"),
        ];
        problems
            .iter()
            .filter(|(failed, _)| *failed)
            .inspect(|(_, problem)| error!("User token {} {}", id, problem))
            .count()
            == 0
    }
}

/// Lifetimes granted to secure channel tokens
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "defaults::min_token_lifetime_ms")]
    pub min_token_lifetime_ms: u32,
    #[serde(default = "defaults::max_token_lifetime_ms")]
    pub max_token_lifetime_ms: u32,
    /// Lifetime granted when the client requests 0
    #[serde(default = "defaults::default_token_lifetime_ms")]
    pub default_token_lifetime_ms: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            min_token_lifetime_ms: defaults::min_token_lifetime_ms(),
            max_token_lifetime_ms: defaults::max_token_lifetime_ms(),
            default_token_lifetime_ms: defaults::default_token_lifetime_ms(),
        }
    }
}

impl ChannelConfig {
    /// Revises the lifetime a client requested for a token
    pub fn revise_token_lifetime(&self, requested_lifetime: u32) -> u32 {
        if requested_lifetime == 0 {
            self.default_token_lifetime_ms
        } else {
            requested_lifetime.clamp(self.min_token_lifetime_ms, self.max_token_lifetime_ms)
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "defaults::min_session_timeout_ms")]
    pub min_session_timeout_ms: f64,
    #[serde(default = "defaults::max_session_timeout_ms")]
    pub max_session_timeout_ms: f64,
    /// Maximum number of sessions, open or not yet activated
    #[serde(default = "defaults::max_sessions")]
    pub max_sessions: usize,
    /// Interval between sweeps closing sessions that have been idle past their timeout
    #[serde(default = "defaults::session_sweep_interval_ms")]
    pub session_sweep_interval_ms: u64,
    /// When false, closing or expiring a session deletes its subscriptions. When true they
    /// are detached and live on until their own lifetime expires or they are transferred.
    #[serde(default)]
    pub subscriptions_outlive_sessions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_session_timeout_ms: defaults::min_session_timeout_ms(),
            max_session_timeout_ms: defaults::max_session_timeout_ms(),
            max_sessions: defaults::max_sessions(),
            session_sweep_interval_ms: defaults::session_sweep_interval_ms(),
            subscriptions_outlive_sessions: false,
        }
    }
}

impl SessionConfig {
    /// Revises the session timeout a client requested
    pub fn revise_session_timeout(&self, requested_timeout: f64) -> f64 {
        if !requested_timeout.is_finite() || requested_timeout <= 0.0 {
            self.max_session_timeout_ms
        } else {
            requested_timeout.clamp(self.min_session_timeout_ms, self.max_session_timeout_ms)
        }
    }
}

/// Settings of the built in random value feed
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "defaults::update_interval_ms")]
    pub update_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            update_interval_ms: defaults::update_interval_ms(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
    pub tcp_config: TcpConfig,
    #[serde(default)]
    pub limits: Limits,
    /// Users allowed in by user name and password, keyed by token id
    #[serde(default)]
    pub user_tokens: BTreeMap<String, ServerUserToken>,
    /// Advertised in the application description
    #[serde(default)]
    pub discovery_urls: Vec<String>,
    /// Id of the endpoint GetEndpoints falls back to for an unparseable url
    #[serde(default)]
    pub default_endpoint: Option<String>,
    pub endpoints: BTreeMap<String, ServerEndpoint>,
    #[serde(default)]
    pub secure_channel: ChannelConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Period of the subscription timer
    #[serde(default = "defaults::subscription_poll_interval_ms")]
    pub subscription_poll_interval_ms: u64,
    /// Used when a publish request carries no timeout hint
    #[serde(default = "defaults::publish_timeout_default_ms")]
    pub publish_timeout_default_ms: u64,
    /// Tag manifest in the JSON tag export format, loaded into the address space at startup
    #[serde(default)]
    pub tag_manifest: Option<PathBuf>,
    /// Random value feed for the tags of the manifest
    #[serde(default)]
    pub simulation: SimulationConfig,
}

mod defaults {
    use crate::server::constants;

    pub fn subscription_poll_interval_ms() -> u64 {
        constants::SUBSCRIPTION_TIMER_RATE_MS
    }

    pub fn publish_timeout_default_ms() -> u64 {
        constants::DEFAULT_PUBLISH_TIMEOUT_MS
    }

    pub fn min_token_lifetime_ms() -> u32 {
        constants::MIN_TOKEN_LIFETIME_MS
    }

    pub fn max_token_lifetime_ms() -> u32 {
        constants::MAX_TOKEN_LIFETIME_MS
    }

    pub fn default_token_lifetime_ms() -> u32 {
        constants::DEFAULT_TOKEN_LIFETIME_MS
    }

    pub fn min_session_timeout_ms() -> f64 {
        constants::MIN_SESSION_TIMEOUT_MS
    }

    pub fn max_session_timeout_ms() -> f64 {
        constants::MAX_SESSION_TIMEOUT_MS
    }

    pub fn max_sessions() -> usize {
        constants::MAX_SESSIONS
    }

    pub fn session_sweep_interval_ms() -> u64 {
        constants::SESSION_SWEEP_INTERVAL_MS
    }

    pub fn update_interval_ms() -> u64 {
        constants::DEFAULT_SIMULATION_INTERVAL_MS
    }
}

impl ServerConfig {
    /// Every configuration problem, in the order they are checked
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.endpoints.is_empty() {
            problems.push("no endpoints are defined".to_string());
        }
        let bad_endpoints = self
            .endpoints
            .iter()
            .filter(|(id, endpoint)| !endpoint.is_valid(id, &self.user_tokens));
        for (id, _) in bad_endpoints {
            problems.push(format!("endpoint {} is invalid", id));
        }
        if let Some(id) = &self.default_endpoint {
            if !self.endpoints.contains_key(id) {
                problems.push(format!("default endpoint {} does not exist", id));
            }
        }
        for (id, _) in self.user_tokens.iter().filter(|(id, t)| !t.is_valid(id)) {
            problems.push(format!("user token {} is invalid", id));
        }
        let limits = &self.limits;
        let zero_limits = [
            ("max_array_length", limits.max_array_length),
            ("max_string_length", limits.max_string_length),
            ("max_byte_string_length", limits.max_byte_string_length),
        ];
        for (name, _) in zero_limits.iter().filter(|(_, value)| *value == 0) {
            problems.push(format!("limit {} is 0", name));
        }
        let channel = &self.secure_channel;
        if channel.min_token_lifetime_ms > channel.max_token_lifetime_ms {
            problems.push("min token lifetime exceeds the max".to_string());
        }
        if self.session.min_session_timeout_ms > self.session.max_session_timeout_ms {
            problems.push("min session timeout exceeds the max".to_string());
        }
        if self.session.max_sessions == 0 {
            problems.push("max sessions is 0".to_string());
        }
        if self.subscription_poll_interval_ms == 0 {
            problems.push("subscription poll interval is 0".to_string());
        }
        if self.simulation.enabled && self.simulation.update_interval_ms == 0 {
            problems.push("simulation interval is 0".to_string());
        }
        problems
    }
}

impl Config for ServerConfig {
    fn is_valid(&self) -> bool {
        for (what, value) in [
            ("application name", &self.application_name),
            ("application uri", &self.application_uri),
            ("product uri", &self.product_uri),
        ] {
            if value.is_empty() {
                warn!("Server configuration has no {}", what);
            }
        }
        let problems = self.problems();
        for problem in &problems {
            error!("Server configuration is invalid, {}", problem);
        }
        problems.is_empty()
    }

    fn application_name(&self) -> UAString {
        UAString::from(&self.application_name)
    }

    fn application_uri(&self) -> UAString {
        UAString::from(&self.application_uri)
    }

    fn product_uri(&self) -> UAString {
        UAString::from(&self.product_uri)
    }

    fn application_type(&self) -> ApplicationType {
        ApplicationType::Server
    }

    fn discovery_urls(&self) -> Option<Vec<UAString>> {
        (!self.discovery_urls.is_empty())
            .then(|| self.discovery_urls.iter().map(UAString::from).collect())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            application_name: String::new(),
            application_uri: String::new(),
            product_uri: String::new(),
            tcp_config: TcpConfig {
                host: "127.0.0.1".to_string(),
                port: constants::DEFAULT_PORT,
                hello_timeout: constants::DEFAULT_HELLO_TIMEOUT_SECONDS,
            },
            limits: Limits::default(),
            user_tokens: BTreeMap::new(),
            discovery_urls: Vec::new(),
            default_endpoint: None,
            endpoints: BTreeMap::new(),
            secure_channel: ChannelConfig::default(),
            session: SessionConfig::default(),
            subscription_poll_interval_ms: defaults::subscription_poll_interval_ms(),
            publish_timeout_default_ms: defaults::publish_timeout_default_ms(),
            tag_manifest: None,
            simulation: SimulationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Name the factory server announces itself with
    pub const FACTORY_APPLICATION_NAME: &'static str =
        "VBL Digital Factory OPC UA Server - Random Value Simulator";

    /// The configuration of the factory deployment: every interface, port 4842, one anonymous
    /// endpoint without security at `/vblfactory`.
    pub fn factory() -> Self {
        let endpoint = ServerEndpoint::new_none(
            constants::ENDPOINT_PATH,
            &[ANONYMOUS_USER_TOKEN_ID.to_string()],
        );
        let host = "0.0.0.0".to_string();
        let port = constants::DEFAULT_PORT;
        ServerConfig {
            application_name: Self::FACTORY_APPLICATION_NAME.to_string(),
            application_uri: "urn:vbl:digital-factory:opcua-server".to_string(),
            product_uri: "urn:vbl:digital-factory".to_string(),
            discovery_urls: vec![format!(
                "opc.tcp://{}:{}{}",
                host,
                port,
                constants::ENDPOINT_PATH
            )],
            tcp_config: TcpConfig {
                host,
                port,
                hello_timeout: constants::DEFAULT_HELLO_TIMEOUT_SECONDS,
            },
            default_endpoint: Some("none".to_string()),
            endpoints: BTreeMap::from([("none".to_string(), endpoint)]),
            ..Default::default()
        }
    }

    /// `opc.tcp://host:port`, endpoint paths are appended to it
    pub fn base_endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.tcp_config.host, self.tcp_config.port)
    }

    pub fn decoding_options(&self) -> DecodingOptions {
        let limits = &self.limits;
        DecodingOptions {
            client_offset: chrono::Duration::zero(),
            max_message_size: limits.max_message_size,
            max_chunk_count: limits.max_chunk_count,
            max_string_length: limits.max_string_length,
            max_byte_string_length: limits.max_byte_string_length,
            max_array_length: limits.max_array_length,
            ..Default::default()
        }
    }

    pub fn default_endpoint(&self) -> Option<&ServerEndpoint> {
        self.default_endpoint
            .as_ref()
            .and_then(|id| self.endpoints.get(id))
    }

    /// The endpoint at the path of `endpoint_url` with the given policy and mode. The host
    /// of the url is not compared.
    pub fn find_endpoint(
        &self,
        endpoint_url: &str,
        base_endpoint_url: &str,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> Option<&ServerEndpoint> {
        self.endpoints.values().find(|e| {
            e.security_policy() == security_policy
                && e.message_security_mode() == security_mode
                && url_matches_except_host(&e.endpoint_url(base_endpoint_url), endpoint_url)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempdir::TempDir;

    use super::*;

    #[test]
    fn factory_config_is_valid() {
        let config = ServerConfig::factory();
        assert!(config.is_valid());
        assert_eq!(config.tcp_config.port, 4842);
        let endpoint = config.default_endpoint().unwrap();
        assert_eq!(endpoint.path, "/vblfactory");
        assert!(endpoint.supports_anonymous());
        assert_eq!(
            endpoint.endpoint_url(&config.base_endpoint_url()),
            "opc.tcp://0.0.0.0:4842/vblfactory"
        );
        assert!(!config.session.subscriptions_outlive_sessions);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let tmp_dir = TempDir::new("vbl_opcua_config").unwrap();
        let path: PathBuf = tmp_dir.path().join("server.conf");

        let mut config = ServerConfig::factory();
        config.user_tokens.insert(
            "operator".to_string(),
            ServerUserToken::user_pass("operator", "secret"),
        );
        config
            .endpoints
            .get_mut("none")
            .unwrap()
            .user_token_ids
            .insert("operator".to_string());
        config.session.subscriptions_outlive_sessions = true;
        config.tag_manifest = Some(PathBuf::from("tags.json"));
        config.simulation.enabled = true;

        config.save(&path).unwrap();
        let loaded: ServerConfig = ServerConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let yaml = r#"
application_name: Factory
application_uri: "urn:factory"
product_uri: "urn:factory"
tcp_config:
  hello_timeout: 5
  host: 127.0.0.1
  port: 4842
endpoints:
  none:
    path: /vblfactory
    security_policy: None
    security_mode: None
    user_token_ids:
      - ANONYMOUS
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.is_valid());
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.secure_channel, ChannelConfig::default());
        assert_eq!(
            config.subscription_poll_interval_ms,
            constants::SUBSCRIPTION_TIMER_RATE_MS
        );
        assert!(config.tag_manifest.is_none());
        assert!(!config.simulation.enabled);
    }

    #[test]
    fn invalid_config_is_detected() {
        let mut config = ServerConfig::factory();
        config.endpoints.clear();
        assert!(!config.is_valid());

        let mut config = ServerConfig::factory();
        config.user_tokens.insert(
            ANONYMOUS_USER_TOKEN_ID.to_string(),
            ServerUserToken::user_pass("x", "y"),
        );
        assert!(!config.is_valid());

        let mut config = ServerConfig::factory();
        config
            .endpoints
            .get_mut("none")
            .unwrap()
            .user_token_ids
            .insert("nobody".to_string());
        assert!(!config.is_valid());

        let mut config = ServerConfig::factory();
        config.endpoints.get_mut("none").unwrap().security_mode = "Sign".to_string();
        assert!(!config.is_valid());

        let mut config = ServerConfig::factory();
        config.endpoints.get_mut("none").unwrap().security_policy = "Rot13".to_string();
        assert!(!config.is_valid());

        let mut config = ServerConfig::factory();
        config.save(&PathBuf::from("/nonexistent/dir/server.conf")).unwrap_err();
        config.default_endpoint = Some("missing".to_string());
        assert!(!config.is_valid());
    }

    #[test]
    fn token_lifetime_and_session_timeout_are_revised() {
        let channel = ChannelConfig::default();
        assert_eq!(channel.revise_token_lifetime(0), constants::DEFAULT_TOKEN_LIFETIME_MS);
        assert_eq!(channel.revise_token_lifetime(1), constants::MIN_TOKEN_LIFETIME_MS);
        assert_eq!(
            channel.revise_token_lifetime(u32::MAX),
            constants::MAX_TOKEN_LIFETIME_MS
        );
        assert_eq!(channel.revise_token_lifetime(30_000), 30_000);

        let session = SessionConfig::default();
        assert_eq!(session.revise_session_timeout(1.0), constants::MIN_SESSION_TIMEOUT_MS);
        assert_eq!(session.revise_session_timeout(1e9), constants::MAX_SESSION_TIMEOUT_MS);
        assert_eq!(session.revise_session_timeout(30_000.0), 30_000.0);
        assert_eq!(session.revise_session_timeout(0.0), constants::MAX_SESSION_TIMEOUT_MS);
    }

    #[test]
    fn find_endpoint_ignores_host() {
        let config = ServerConfig::factory();
        let base = config.base_endpoint_url();
        assert!(config
            .find_endpoint(
                "opc.tcp://plc-gateway:4842/vblfactory",
                &base,
                SecurityPolicy::None,
                MessageSecurityMode::None
            )
            .is_some());
        assert!(config
            .find_endpoint(
                "opc.tcp://plc-gateway:4842/other",
                &base,
                SecurityPolicy::None,
                MessageSecurityMode::None
            )
            .is_none());
        assert!(config
            .find_endpoint(
                "opc.tcp://plc-gateway:4842/vblfactory",
                &base,
                SecurityPolicy::Basic256Sha256,
                MessageSecurityMode::SignAndEncrypt
            )
            .is_none());
    }
}
