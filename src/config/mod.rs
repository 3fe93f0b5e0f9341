use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Full connection URL handed to the driver
    pub url: String,
    /// Database holding the ads collection (MongoDB only)
    pub name: String,
    /// Collection holding the ads (MongoDB only)
    pub collection: String,
    /// Connection pool size (SQLite only)
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Mongodb,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty means any origin
    pub allowed_origins: Vec<String>,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("DATABASE_BACKEND")
            .unwrap_or_else(|| "mongodb".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongodb" | "mongo" => DatabaseBackend::Mongodb,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'mongodb'. Supported values: mongodb, sqlite"
                );
                DatabaseBackend::Mongodb
            }
        };

        let connection_string = lookup("DB_CONNECTION_STRING")
            .filter(|v| !v.trim().is_empty())
            .context("DB_CONNECTION_STRING must be set")?;

        let db_name = lookup("DB_NAME").unwrap_or_else(|| "ad_sdk".to_string());
        let collection = lookup("DB_COLLECTION").unwrap_or_else(|| "ads".to_string());

        let url = match backend {
            DatabaseBackend::Mongodb => mongo_uri(
                &connection_string,
                lookup("DB_USERNAME").as_deref(),
                lookup("DB_PASSWORD").as_deref(),
                &db_name,
            ),
            DatabaseBackend::Sqlite => connection_string,
        };

        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or_else(DatabaseConfig::default_max_connections);

        let api_host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = lookup("PORT")
            .unwrap_or_else(|| "8088".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty() && *origin != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url,
                name: db_name,
                collection,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            cors: CorsConfig { allowed_origins },
        })
    }
}

/// A bare host plus credentials becomes an Atlas SRV URI; anything with a
/// scheme is used as given.
fn mongo_uri(
    connection_string: &str,
    username: Option<&str>,
    password: Option<&str>,
    db_name: &str,
) -> String {
    if connection_string.contains("://") {
        return connection_string.to_string();
    }

    match (username, password) {
        (Some(user), Some(pass)) => format!(
            "mongodb+srv://{}:{}@{connection_string}/{db_name}?retryWrites=true&w=majority",
            urlencoding::encode(user),
            urlencoding::encode(pass),
        ),
        _ => format!("mongodb://{connection_string}"),
    }
}
