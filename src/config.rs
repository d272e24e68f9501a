use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// Where lifecycle notifications go: "webhook", "resend", or "disabled"
    pub notify_mode: String,
    pub notify_webhook_url: Option<String>,
    pub resend_api_key: Option<String>,
    pub notify_from_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BAZAAR_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "bazaar.db".to_string()),
            base_url,
            dev_mode,
            notify_mode: env::var("NOTIFY_MODE").unwrap_or_else(|_| "disabled".to_string()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            notify_from_email: env::var("NOTIFY_FROM_EMAIL").ok(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
