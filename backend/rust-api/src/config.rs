use std::env;
use std::str::FromStr;

const DEV_SECRET_KEY: &str = "dev-secret-only-for-local-testing";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub session: SessionConfig,
    pub gemini: GeminiConfig,
    pub generation: GenerationConfig,
    pub rate_limit: RateLimitConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Redis,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(SessionBackend::Redis),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(format!("unknown session backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_uri: String,
    pub secret_key: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    /// Idle lifetime of the server-side record; the cookie itself has no expiry.
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub batch_size: usize,
    pub max_failed_batches: usize,
    pub max_questions: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub generate_per_minute: u32,
    pub default_per_hour: u32,
    /// Key limits on `X-Forwarded-For`/`Forwarded`/`X-Real-IP` instead of the
    /// socket peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub watermark_text: String,
    pub brand_text: String,
    pub footer_text: String,
    pub regular_font_path: String,
    pub bold_font_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            session: SessionConfig {
                backend: SessionBackend::Redis,
                redis_uri: "redis://127.0.0.1:6379/0".to_string(),
                secret_key: DEV_SECRET_KEY.to_string(),
                cookie_name: "quiz_session".to_string(),
                cookie_secure: false,
                ttl_seconds: 86_400,
            },
            gemini: GeminiConfig {
                api_key: String::new(),
                model: "gemini-2.0-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                timeout_secs: 30,
            },
            generation: GenerationConfig {
                batch_size: 10,
                max_failed_batches: 3,
                max_questions: 50,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                generate_per_minute: 3,
                default_per_hour: 100,
                trust_proxy_headers: false,
            },
            report: ReportConfig {
                watermark_text: "QuizzSpark.com".to_string(),
                brand_text: "Gemini Quiz Generator".to_string(),
                footer_text: "Test your skills → QuizzSpark.com/quiz".to_string(),
                regular_font_path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
                bold_font_path: "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"
                    .to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::from_settings(&settings, &app_env)
    }

    /// Resolves every field from layered settings, then well-known plain
    /// environment variables, then the built-in defaults.
    pub fn from_settings(
        settings: &config::Config,
        app_env: &str,
    ) -> Result<Self, config::ConfigError> {
        let defaults = Config::default();

        let secret_key = match lookup(settings, "session.secret_key", "SECRET_KEY") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "SECRET_KEY must be set in production".to_string(),
                ));
            }
            None => {
                eprintln!("WARNING: Using default SECRET_KEY (dev mode only!)");
                defaults.session.secret_key.clone()
            }
        };

        let session = SessionConfig {
            backend: parse_or(
                settings,
                "session.backend",
                "SESSION_BACKEND",
                defaults.session.backend,
            )?,
            redis_uri: lookup(settings, "session.redis_uri", "REDIS_URI")
                .unwrap_or(defaults.session.redis_uri),
            secret_key,
            cookie_name: lookup(settings, "session.cookie_name", "SESSION_COOKIE_NAME")
                .unwrap_or(defaults.session.cookie_name),
            cookie_secure: parse_or(
                settings,
                "session.cookie_secure",
                "SESSION_COOKIE_SECURE",
                app_env == "prod",
            )?,
            ttl_seconds: parse_or(
                settings,
                "session.ttl_seconds",
                "SESSION_TTL_SECONDS",
                defaults.session.ttl_seconds,
            )?,
        };

        let gemini = GeminiConfig {
            api_key: lookup(settings, "gemini.api_key", "GEMINI_API_KEY").unwrap_or_default(),
            model: lookup(settings, "gemini.model", "GEMINI_MODEL")
                .unwrap_or(defaults.gemini.model),
            base_url: lookup(settings, "gemini.base_url", "GEMINI_BASE_URL")
                .unwrap_or(defaults.gemini.base_url),
            timeout_secs: parse_or(
                settings,
                "gemini.timeout_secs",
                "GEMINI_TIMEOUT_SECS",
                defaults.gemini.timeout_secs,
            )?,
        };

        let generation = GenerationConfig {
            batch_size: parse_or(
                settings,
                "generation.batch_size",
                "GENERATION_BATCH_SIZE",
                defaults.generation.batch_size,
            )?
            .max(1),
            max_failed_batches: parse_or(
                settings,
                "generation.max_failed_batches",
                "GENERATION_MAX_FAILED_BATCHES",
                defaults.generation.max_failed_batches,
            )?
            .max(1),
            max_questions: parse_or(
                settings,
                "generation.max_questions",
                "GENERATION_MAX_QUESTIONS",
                defaults.generation.max_questions,
            )?
            .max(1),
        };

        let rate_limit = RateLimitConfig {
            enabled: parse_or(
                settings,
                "rate_limit.enabled",
                "RATE_LIMIT_ENABLED",
                defaults.rate_limit.enabled,
            )?,
            generate_per_minute: parse_or(
                settings,
                "rate_limit.generate_per_minute",
                "RATE_LIMIT_GENERATE_PER_MINUTE",
                defaults.rate_limit.generate_per_minute,
            )?,
            default_per_hour: parse_or(
                settings,
                "rate_limit.default_per_hour",
                "RATE_LIMIT_DEFAULT_PER_HOUR",
                defaults.rate_limit.default_per_hour,
            )?,
            trust_proxy_headers: parse_or(
                settings,
                "rate_limit.trust_proxy_headers",
                "RATE_LIMIT_TRUST_PROXY_HEADERS",
                defaults.rate_limit.trust_proxy_headers,
            )?,
        };

        let report = ReportConfig {
            watermark_text: lookup(settings, "report.watermark_text", "REPORT_WATERMARK_TEXT")
                .unwrap_or(defaults.report.watermark_text),
            brand_text: lookup(settings, "report.brand_text", "REPORT_BRAND_TEXT")
                .unwrap_or(defaults.report.brand_text),
            footer_text: lookup(settings, "report.footer_text", "REPORT_FOOTER_TEXT")
                .unwrap_or(defaults.report.footer_text),
            regular_font_path: lookup(settings, "report.regular_font_path", "REPORT_FONT_PATH")
                .unwrap_or(defaults.report.regular_font_path),
            bold_font_path: lookup(settings, "report.bold_font_path", "REPORT_BOLD_FONT_PATH")
                .unwrap_or(defaults.report.bold_font_path),
        };

        Ok(Config {
            bind_addr: lookup(settings, "server.bind_addr", "BIND_ADDR")
                .unwrap_or(defaults.bind_addr),
            session,
            gemini,
            generation,
            rate_limit,
            report,
        })
    }
}

fn lookup(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| env::var(env_key).ok())
        .filter(|value| !value.trim().is_empty())
}

fn parse_or<T>(
    settings: &config::Config,
    key: &str,
    env_key: &str,
    default: T,
) -> Result<T, config::ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(settings, key, env_key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            config::ConfigError::Message(format!("invalid value for {}: {}", key, e))
        }),
        None => Ok(default),
    }
}
