//! Connection management for the application and admin sessions
//!
//! Builds one descriptor per scope from the [`ConnectionConfig`], opens a
//! driver client for each, and releases them in reverse acquisition order.

use std::fmt;
use std::future::IntoFuture;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential, ReadPreference, SelectionCriteria, ServerAddress};
use mongodb::Client;
use tracing::{debug, error, info};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Username used for the administrative session
pub const ADMIN_USER: &str = "admin";

/// Database the administrative session authenticates against
pub const ADMIN_DATABASE: &str = "admin";

/// Default bound on establishing a session
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which logical session a handle belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionScope {
    Application,
    Admin,
}

impl fmt::Display for ConnectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionScope::Application => write!(f, "application"),
            ConnectionScope::Admin => write!(f, "admin"),
        }
    }
}

/// Everything needed to open one authenticated session
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub scope: ConnectionScope,
    pub host: String,
    pub port: u16,
    pub username: String,
    password: String,
    /// Database the credentials are checked against, also the default database
    pub database: String,
}

impl ConnectionDescriptor {
    /// Descriptor for the application user against the target database
    pub fn application(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self {
            scope: ConnectionScope::Application,
            host: config.host.clone(),
            port: config.port_number()?,
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database_name.clone(),
        })
    }

    /// Descriptor for the administrative user against the admin database
    pub fn admin(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self {
            scope: ConnectionScope::Admin,
            host: config.host.clone(),
            port: config.port_number()?,
            username: ADMIN_USER.to_string(),
            password: config.admin_password.clone(),
            database: ADMIN_DATABASE.to_string(),
        })
    }

    /// Connection string with the password masked, for logs
    pub fn redacted_uri(&self) -> String {
        format!(
            "mongodb://{}:***@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    /// Driver options for this descriptor
    pub fn client_options(&self, connect_timeout: Duration) -> ClientOptions {
        let credential = Credential::builder()
            .username(self.username.clone())
            .password(self.password.clone())
            .source(self.database.clone())
            .build();

        ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: self.host.clone(),
                port: Some(self.port),
            }])
            .credential(credential)
            .default_database(self.database.clone())
            .app_name(format!("mongo-sample-{}", self.scope))
            .connect_timeout(connect_timeout)
            .server_selection_timeout(connect_timeout)
            .build()
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("scope", &self.scope)
            .field("uri", &self.redacted_uri())
            .finish()
    }
}

/// An established, releasable session with the backing store
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Scope this session was opened for
    fn scope(&self) -> ConnectionScope;

    /// Lightweight liveness probe
    async fn ping(&self) -> Result<()>;

    /// Close the session. Consumes the handle so it is released once.
    async fn release(self) -> Result<()>;
}

/// Opens sessions from descriptors
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Session;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Handle>;
}

/// [`Connector`] backed by the MongoDB driver
#[derive(Clone, Debug)]
pub struct MongoConnector {
    connect_timeout: Duration,
}

impl MongoConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for MongoConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Handle = ConnectionHandle;

    /// Build a driver client for `descriptor`
    ///
    /// The driver connects lazily, so this only validates the options. No
    /// network round trip happens here: reachability and credentials are
    /// first exercised by the health gate's probe.
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<ConnectionHandle> {
        info!(
            "Connecting {} session to {}",
            descriptor.scope,
            descriptor.redacted_uri()
        );

        let options = descriptor.client_options(self.connect_timeout);
        let client = Client::with_options(options).map_err(|source| Error::Connection {
            scope: descriptor.scope,
            source,
        })?;

        Ok(ConnectionHandle {
            scope: descriptor.scope,
            database: descriptor.database.clone(),
            client,
            release_timeout: self.connect_timeout,
        })
    }
}

/// Driver session owned by the lifecycle controller
#[derive(Debug)]
pub struct ConnectionHandle {
    scope: ConnectionScope,
    database: String,
    client: Client,
    release_timeout: Duration,
}

impl ConnectionHandle {
    /// Underlying driver client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Database this session targets
    pub fn database(&self) -> mongodb::Database {
        self.client.database(&self.database)
    }
}

#[async_trait]
impl Session for ConnectionHandle {
    fn scope(&self) -> ConnectionScope {
        self.scope
    }

    async fn ping(&self) -> Result<()> {
        self.database()
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .await
            .map_err(|e| Error::Probe(e.to_string()))?;
        Ok(())
    }

    async fn release(self) -> Result<()> {
        let Self {
            scope,
            client,
            release_timeout,
            ..
        } = self;

        debug!("Disconnecting {} session", scope);
        tokio::time::timeout(release_timeout, client.shutdown().into_future())
            .await
            .map_err(|_| {
                Error::Teardown(vec![format!(
                    "{scope} session did not disconnect within {release_timeout:?}"
                )])
            })
    }
}

/// Release handles in the given order, attempting every one
///
/// A failing release is logged and does not stop the remaining ones. All
/// failures are aggregated into a single [`Error::Teardown`].
pub async fn release_all<S: Session>(handles: Vec<S>) -> Result<()> {
    let mut failures = Vec::new();

    for handle in handles {
        let scope = handle.scope();
        match handle.release().await {
            Ok(()) => info!("Released {} session", scope),
            Err(e) => {
                error!("Failed to release {} session: {}", scope, e);
                failures.push(format!("{scope}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Teardown(failures))
    }
}
