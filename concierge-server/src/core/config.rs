use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
///
/// # Environment variables
///
/// Every field can be overridden through the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/concierge | Working directory (database, logs) |
/// | HTTP_PORT | 3000 | HTTP service port |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | PUBLIC_BASE_URL | http://localhost:3000 | Public URL for redirects/webhooks |
/// | MENU_SERVICE_URL | http://localhost:4000 | Pricing/menu sheet service |
/// | PAYMENT_API_URL | https://api.xendit.co | Payment gateway base URL |
/// | PAYMENT_SECRET_KEY | (empty) | Gateway secret key (Basic auth) |
/// | PAYMENT_CALLBACK_TOKEN | (empty) | Shared secret for gateway callbacks |
/// | WHATSAPP_API_URL | (empty) | Messaging platform send endpoint |
/// | WHATSAPP_ACCESS_TOKEN | (empty) | Messaging platform bearer token |
/// | WHATSAPP_VERIFY_TOKEN | (empty) | Inbound webhook verification token |
/// | FLOW_PRIVATE_KEY_PATH | private.pem | RSA key for the Flow channel |
/// | FLOW_PRIVATE_KEY_PASSPHRASE | (unset) | Optional key passphrase |
/// | STORAGE_ENDPOINT | (empty) | Object storage upload endpoint |
/// | STORAGE_BUCKET | invoices | Bucket for generated invoices |
/// | STORAGE_ACCESS_TOKEN | (empty) | Object storage bearer token |
/// | STORAGE_PUBLIC_URL | (empty) | Public base URL for stored objects |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/concierge HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for database and log files
    pub work_dir: String,
    /// HTTP API service port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,
    /// Public base URL used in redirect and webhook URLs handed to the gateway
    pub public_base_url: String,

    // === Pricing / menu sheet service ===
    pub menu_service_url: String,

    // === Payment gateway ===
    pub payment_api_url: String,
    pub payment_secret_key: String,
    /// Pre-shared secret the gateway echoes in `x-callback-token`
    pub payment_callback_token: String,
    /// Hosted invoice lifetime before the gateway expires it
    pub invoice_duration_secs: u64,
    /// Outbound gateway call timeout
    pub gateway_timeout: Duration,
    /// Bounded retries for transient gateway failures
    pub gateway_max_retries: u32,

    // === Messaging platform ===
    pub whatsapp_api_url: String,
    pub whatsapp_access_token: String,
    pub whatsapp_verify_token: String,

    // === Flow channel ===
    pub flow_private_key_path: String,
    pub flow_private_key_passphrase: Option<String>,

    // === Object storage ===
    pub storage_endpoint: String,
    pub storage_bucket: String,
    pub storage_access_token: String,
    pub storage_public_url: String,

    // === Background loops ===
    /// Sliding session expiry
    pub session_ttl_hours: i64,
    /// Outbox drain interval
    pub outbox_poll_secs: u64,
    /// Automation scan interval
    pub automation_interval_secs: u64,
    /// Send a payment reminder once an unpaid link is this old
    pub reminder_after_hours: i64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults where unset.
    pub fn from_env() -> Self {
        Self {
            work_dir: env_or("WORK_DIR", "/var/lib/concierge"),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: env_or("ENVIRONMENT", "development"),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:3000"),

            menu_service_url: env_or("MENU_SERVICE_URL", "http://localhost:4000"),

            payment_api_url: env_or("PAYMENT_API_URL", "https://api.xendit.co"),
            payment_secret_key: env_or("PAYMENT_SECRET_KEY", ""),
            payment_callback_token: env_or("PAYMENT_CALLBACK_TOKEN", ""),
            invoice_duration_secs: env_parse("INVOICE_DURATION_SECS", 86_400),
            gateway_timeout: Duration::from_millis(env_parse("GATEWAY_TIMEOUT_MS", 15_000)),
            gateway_max_retries: env_parse("GATEWAY_MAX_RETRIES", 3),

            whatsapp_api_url: env_or("WHATSAPP_API_URL", ""),
            whatsapp_access_token: env_or("WHATSAPP_ACCESS_TOKEN", ""),
            whatsapp_verify_token: env_or("WHATSAPP_VERIFY_TOKEN", ""),

            flow_private_key_path: env_or("FLOW_PRIVATE_KEY_PATH", "private.pem"),
            flow_private_key_passphrase: std::env::var("FLOW_PRIVATE_KEY_PASSPHRASE").ok(),

            storage_endpoint: env_or("STORAGE_ENDPOINT", ""),
            storage_bucket: env_or("STORAGE_BUCKET", "invoices"),
            storage_access_token: env_or("STORAGE_ACCESS_TOKEN", ""),
            storage_public_url: env_or("STORAGE_PUBLIC_URL", ""),

            session_ttl_hours: env_parse("SESSION_TTL_HOURS", 24),
            outbox_poll_secs: env_parse("OUTBOX_POLL_SECS", 10),
            automation_interval_secs: env_parse("AUTOMATION_INTERVAL_SECS", 3_600),
            reminder_after_hours: env_parse("REMINDER_AFTER_HOURS", 6),
        }
    }

    /// Override the paths/ports that matter in tests.
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
