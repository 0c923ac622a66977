use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub client_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    pub api_url: String,
    pub model: String,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub reset_token_ttl_minutes: i64,
    pub reset_sweep_seconds: u64,
    pub mail: MailConfig,
    pub ollama: OllamaConfig,
    pub cors_origins: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "lex"),
            audience: env_or("JWT_AUDIENCE", "lex-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24),
        };
        let mail = MailConfig {
            api_url: env_or("MAIL_API_URL", "https://api.resend.com"),
            api_key: std::env::var("RESEND_API_KEY")?,
            from: env_or("MAIL_FROM", "onboarding@resend.dev"),
            client_url: env_or("CLIENT_URL", "http://localhost:5173"),
        };
        let ollama = OllamaConfig {
            api_url: env_or("OLLAMA_API_URL", "http://localhost:11434/api"),
            model: env_or("OLLAMA_MODEL", "llama3.2:1b"),
            max_attempts: env_parse("GENERATION_MAX_ATTEMPTS", 3),
        };
        Ok(Self {
            database_url,
            jwt,
            reset_token_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", 60),
            reset_sweep_seconds: env_parse("RESET_SWEEP_SECONDS", 15 * 60),
            mail,
            ollama,
            cors_origins: parse_origins(&env_or("CORS_ORIGIN", "")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("http://a.test, http://b.test,,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }
}
