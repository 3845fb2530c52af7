//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string (unset: in-memory store)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `PAYMENT_CURRENCY`: currency for payment intents (default: `"usd"`)
/// - `AUTH_TOKENS`: `token=email` pairs separated by `,`
/// - `BOOTSTRAP_ADMIN`: email made admin at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payment_currency: String,
    pub auth_tokens: Vec<(String, String)>,
    pub bootstrap_admin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            payment_currency: std::env::var("PAYMENT_CURRENCY")
                .unwrap_or(defaults.payment_currency),
            auth_tokens: std::env::var("AUTH_TOKENS")
                .map(|raw| parse_auth_tokens(&raw))
                .unwrap_or_default(),
            bootstrap_admin: std::env::var("BOOTSTRAP_ADMIN")
                .ok()
                .filter(|email| !email.is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 5,
            payment_currency: "usd".to_string(),
            auth_tokens: Vec::new(),
            bootstrap_admin: None,
        }
    }
}

/// Parses `token=email,token=email`. Malformed pairs are skipped.
fn parse_auth_tokens(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, email) = pair.split_once('=')?;
            let (token, email) = (token.trim(), email.trim());
            if token.is_empty() || email.is_empty() {
                return None;
            }
            Some((token.to_string(), email.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.payment_currency, "usd");
        assert!(config.auth_tokens.is_empty());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_parse_auth_tokens() {
        let tokens = parse_auth_tokens(" t1 = a@example.com,broken,=x@example.com,t2=b@example.com,");
        assert_eq!(
            tokens,
            vec![
                ("t1".to_string(), "a@example.com".to_string()),
                ("t2".to_string(), "b@example.com".to_string()),
            ]
        );
        assert!(parse_auth_tokens("").is_empty());
    }
}
