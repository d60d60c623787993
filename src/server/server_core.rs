// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{future::Either, stream::FuturesUnordered, StreamExt};
use tokio::{
    net::TcpListener,
    sync::mpsc,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::{
    core::config::Config,
    sync::RwLock,
    types::{service_types::ServerState, DateTime, UAString},
};

use super::{
    address_space::AddressSpace,
    authenticator::DefaultAuthenticator,
    config::ServerConfig,
    info::{ServerInfo, FACTORY_NAMESPACE_URI},
    secure_channel::SecureChannelManager,
    session::{controller::SessionController, manager::SessionManager, message_handler::MessageHandler},
    subscriptions::SubscriptionCache,
    tags::{TagFeed, TagManifest, TagSimulator, TagUpdate, TagVariable},
};

/// Interval of the ServerStatus refresh
const SERVER_STATUS_INTERVAL_MS: u64 = 1000;

/// The server: accepts connections and runs the periodic tasks shared by all of them.
pub struct ServerCore {
    info: Arc<ServerInfo>,
    address_space: Arc<AddressSpace>,
    subscriptions: Arc<SubscriptionCache>,
    session_manager: Arc<RwLock<SessionManager>>,
    secure_channels: Arc<SecureChannelManager>,
    // Open connections
    connections: FuturesUnordered<JoinHandle<u32>>,
    tag_feed: Option<TagFeed>,
    tag_sender: mpsc::Sender<TagUpdate>,
    tag_variables: Vec<TagVariable>,
    token: CancellationToken,
}

/// Reference to a running server, to update tags, inspect state and stop it.
#[derive(Clone)]
pub struct ServerHandle {
    info: Arc<ServerInfo>,
    address_space: Arc<AddressSpace>,
    subscriptions: Arc<SubscriptionCache>,
    session_manager: Arc<RwLock<SessionManager>>,
    tag_sender: mpsc::Sender<TagUpdate>,
    token: CancellationToken,
}

impl ServerHandle {
    pub fn info(&self) -> &Arc<ServerInfo> {
        &self.info
    }

    pub fn address_space(&self) -> &Arc<AddressSpace> {
        &self.address_space
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionCache> {
        &self.subscriptions
    }

    pub fn session_manager(&self) -> &RwLock<SessionManager> {
        &self.session_manager
    }

    /// Sender of the tag feed, for whatever drives the tag values
    pub fn tag_sender(&self) -> mpsc::Sender<TagUpdate> {
        self.tag_sender.clone()
    }

    /// Stops the server, closing every connection
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl ServerCore {
    /// Builds the server and its address space, loading the tag manifest of the configuration.
    /// Nothing is bound until [`ServerCore::run`].
    pub fn new(config: ServerConfig) -> Result<(Self, ServerHandle), String> {
        if !config.is_valid() {
            return Err("Configuration is invalid".to_string());
        }
        let config = Arc::new(config);
        let authenticator = Arc::new(DefaultAuthenticator::new(config.user_tokens.clone()));
        let info = Arc::new(ServerInfo::new(config.clone(), authenticator));

        let address_space = Arc::new(AddressSpace::new());
        address_space.register_namespace(&config.application_uri);
        let namespace = address_space.register_namespace(FACTORY_NAMESPACE_URI);
        address_space.set_server_array(vec![UAString::from(&config.application_uri)]);
        address_space.update_server_status(info.start_time(), info.state(), info.build_info());

        let subscriptions = Arc::new(SubscriptionCache::new(config.limits.subscriptions));
        address_space.set_data_change_listener(subscriptions.clone());

        let tag_variables = match config.tag_manifest {
            Some(ref path) => {
                let manifest = TagManifest::load(path)
                    .map_err(|_| format!("Cannot load tag manifest {}", path.to_string_lossy()))?;
                manifest
                    .populate(&address_space, namespace)
                    .map_err(|e| format!("Cannot populate the address space with the tags: {}", e))?
            }
            None => {
                info!("No tag manifest configured, the address space has no tags");
                Vec::new()
            }
        };

        let session_manager = Arc::new(RwLock::new(SessionManager::new(
            info.clone(),
            subscriptions.clone(),
        )));
        let (tag_feed, tag_sender) = TagFeed::new(address_space.clone());
        let token = CancellationToken::new();

        let handle = ServerHandle {
            info: info.clone(),
            address_space: address_space.clone(),
            subscriptions: subscriptions.clone(),
            session_manager: session_manager.clone(),
            tag_sender: tag_sender.clone(),
            token: token.clone(),
        };
        Ok((
            Self {
                info,
                address_space,
                subscriptions,
                session_manager,
                secure_channels: Arc::new(SecureChannelManager::new()),
                connections: FuturesUnordered::new(),
                tag_feed: Some(tag_feed),
                tag_sender,
                tag_variables,
                token,
            },
            handle,
        ))
    }

    /// The variables created from the tag manifest
    pub fn tag_variables(&self) -> &[TagVariable] {
        &self.tag_variables
    }

    /// Binds the configured address and serves connections until the server is cancelled.
    pub async fn run(self) -> Result<(), String> {
        let Some(addr) = self.get_socket_address() else {
            error!("Cannot resolve server address, check server configuration");
            return Err("Cannot resolve server address, check server configuration".to_owned());
        };

        info!("Try to bind address at {}", addr);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind socket: {:?}", e);
                return Err(format!("Failed to bind socket: {:?}", e));
            }
        };
        self.run_with_listener(listener).await
    }

    /// Serves connections from a listener that is already bound.
    pub async fn run_with_listener(mut self, listener: TcpListener) -> Result<(), String> {
        self.log_endpoint_info();

        self.info.start_time.store(Arc::new(DateTime::now()));
        self.info.set_state(ServerState::Running);
        self.update_server_status();

        let tasks = self.start_tasks();

        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Listener has no local address: {:?}", e))?;
        info!("Now listening for connections on {}", local_addr);

        let mut connection_counter = 0;
        loop {
            let conn_fut = if self.connections.is_empty() {
                Either::Left(futures::future::pending::<Option<Result<u32, JoinError>>>())
            } else {
                Either::Right(self.connections.next())
            };

            tokio::select! {
                conn_res = conn_fut => {
                    match conn_res {
                        Some(Ok(id)) => info!("Connection {} terminated", id),
                        Some(Err(e)) => error!("Connection panic! {}", e),
                        None => {}
                    }
                }
                rs = listener.accept() => {
                    match rs {
                        Ok((socket, addr)) => {
                            info!("Accept new connection from {} ({})", addr, connection_counter);
                            let controller = SessionController::new(
                                socket,
                                self.secure_channels.clone(),
                                self.session_manager.clone(),
                                MessageHandler::new(
                                    self.info.clone(),
                                    self.address_space.clone(),
                                    self.subscriptions.clone(),
                                ),
                                self.info.clone(),
                                self.token.child_token(),
                            );
                            let id = connection_counter;
                            self.connections.push(tokio::spawn(async move {
                                controller.run().await;
                                id
                            }));
                            connection_counter += 1;
                        }
                        Err(e) => {
                            error!("Failed to accept client connection: {:?}", e);
                        }
                    }
                }
                _ = self.token.cancelled() => break,
            }
        }

        info!("Server is stopping, waiting for {} connections to close", self.connections.len());
        self.info.set_state(ServerState::Shutdown);
        while let Some(result) = self.connections.next().await {
            if let Err(e) = result {
                error!("Connection panic! {}", e);
            }
        }
        trace_write_lock!(self.session_manager).close_all();
        for task in tasks {
            let _ = task.await;
        }
        self.update_server_status();
        info!("Server has stopped");
        Ok(())
    }

    fn update_server_status(&self) {
        self.address_space.update_server_status(
            self.info.start_time(),
            self.info.state(),
            self.info.build_info(),
        );
    }

    /// Starts the subscription ticker, the session sweep, the server status refresh and the
    /// tag feed. Each stops when the server is cancelled.
    fn start_tasks(&mut self) -> Vec<JoinHandle<()>> {
        let config = &self.info.config;
        let mut tasks = Vec::with_capacity(5);

        tasks.push(tokio::spawn(Self::run_subscription_ticks(
            config.subscription_poll_interval_ms,
            self.subscriptions.clone(),
            self.token.clone(),
        )));
        tasks.push(tokio::spawn(Self::run_session_sweep(
            config.session.session_sweep_interval_ms,
            self.session_manager.clone(),
            self.token.clone(),
        )));
        tasks.push(tokio::spawn(Self::run_server_status_updates(
            self.info.clone(),
            self.address_space.clone(),
            self.token.clone(),
        )));
        if let Some(tag_feed) = self.tag_feed.take() {
            tasks.push(tokio::spawn(tag_feed.run(self.token.clone())));
        }
        if config.simulation.enabled {
            let simulator = TagSimulator::new(
                self.tag_variables.clone(),
                Duration::from_millis(config.simulation.update_interval_ms),
                self.tag_sender.clone(),
            );
            tasks.push(tokio::spawn(simulator.run(self.token.clone())));
        }
        tasks
    }

    async fn run_subscription_ticks(
        interval: u64,
        subscriptions: Arc<SubscriptionCache>,
        token: CancellationToken,
    ) {
        if interval == 0 {
            warn!("Subscription poll interval is 0, subscriptions will not be published");
            token.cancelled().await;
            return;
        }
        let mut tick = tokio::time::interval(Duration::from_millis(interval));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => subscriptions.periodic_tick(),
            }
        }
    }

    async fn run_session_sweep(
        interval: u64,
        session_manager: Arc<RwLock<SessionManager>>,
        token: CancellationToken,
    ) {
        let mut tick = tokio::time::interval(Duration::from_millis(interval.max(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => {
                    let expired = trace_write_lock!(session_manager).sweep_expired(Instant::now());
                    if !expired.is_empty() {
                        debug!("Session sweep closed sessions {:?}", expired);
                    }
                }
            }
        }
    }

    async fn run_server_status_updates(
        info: Arc<ServerInfo>,
        address_space: Arc<AddressSpace>,
        token: CancellationToken,
    ) {
        let mut tick = tokio::time::interval(Duration::from_millis(SERVER_STATUS_INTERVAL_MS));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => {
                    address_space.update_server_status(info.start_time(), info.state(), info.build_info());
                }
            }
        }
    }

    /// Log information about the endpoints on this server
    fn log_endpoint_info(&self) {
        let config = &self.info.config;
        info!("OPC UA Server: {}", config.application_name);
        info!("Base url: {}", config.base_endpoint_url());
        info!("Supported endpoints:");
        for (id, endpoint) in &config.endpoints {
            let users: Vec<String> = endpoint.user_token_ids.iter().cloned().collect();
            let users = users.join(", ");
            info!("Endpoint \"{}\": {}", id, endpoint.path);
            info!("  Security Mode:    {}", endpoint.security_mode);
            info!("  Security Policy:  {}", endpoint.security_policy);
            info!("  Supported user tokens - {}", users);
        }
    }

    /// Returns the server socket address.
    fn get_socket_address(&self) -> Option<SocketAddr> {
        // Resolve this host / port to an address (or not)
        let config = &self.info.config;
        let address = format!("{}:{}", config.tcp_config.host, config.tcp_config.port);
        if let Ok(mut addrs_iter) = address.to_socket_addrs() {
            addrs_iter.next()
        } else {
            None
        }
    }
}
