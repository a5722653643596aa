use std::time::Duration;

use anyhow::{bail, Context};

/// Longest lifetime accepted for session or reset tokens.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub kind: DbKind,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub frontend_url: String,
    pub reset_token_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests never touch the process env.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let kind = match or("DB_TYPE", "postgres").to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => DbKind::Postgres,
            "memory" => DbKind::Memory,
            other => bail!("DB_TYPE: unsupported database type {other:?}"),
        };

        let url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let db_port: u16 = or("DB_PORT", "5432").parse().context("DB_PORT")?;
                let password = or("DB_PASSWORD", "");
                let credentials = if password.is_empty() {
                    or("DB_USER", "postgres")
                } else {
                    format!("{}:{}", or("DB_USER", "postgres"), password)
                };
                format!(
                    "postgres://{}@{}:{}/{}",
                    credentials,
                    or("DB_HOST", "localhost"),
                    db_port,
                    or("DB_NAME", "momentask")
                )
            }
        };

        let database = DatabaseConfig {
            kind,
            url,
            max_connections: or("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS")?,
        };

        let jwt = JwtConfig {
            secret: get("JWT_SECRET")
                .filter(|s| !s.is_empty())
                .context("JWT_SECRET must be set")?,
            ttl: parse_duration(&or("JWT_EXPIRATION", "7d")).context("JWT_EXPIRATION")?,
        };

        let reset_minutes: u64 = or("RESET_TOKEN_TTL_MINUTES", "60")
            .parse()
            .context("RESET_TOKEN_TTL_MINUTES")?;
        let reset_token_ttl = reset_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .filter(|ttl| *ttl <= MAX_DURATION)
            .context("RESET_TOKEN_TTL_MINUTES is longer than a year")?;

        Ok(Self {
            host: or("APP_HOST", "0.0.0.0"),
            port: or("APP_PORT", "3000").parse().context("APP_PORT")?,
            database,
            jwt,
            frontend_url: or("FRONTEND_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            reset_token_ttl,
        })
    }
}

/// Parses token lifetimes like `3600`, `45m`, `12h` or `7d`.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        bail!("invalid duration {raw:?}");
    }
    let value: u64 = digits.parse().with_context(|| format!("invalid duration {raw:?}"))?;
    let secs_per_unit = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        other => bail!("unknown duration unit {other:?}"),
    };
    if value == 0 {
        bail!("duration must be positive");
    }
    let secs = value
        .checked_mul(secs_per_unit)
        .filter(|secs| *secs <= MAX_DURATION.as_secs())
        .with_context(|| format!("duration {raw:?} is longer than a year"))?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("45m").unwrap(), Duration::from_secs(45 * 60));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(12 * 3600));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86400));
        assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(14 * 86400));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-5m").is_err());
        assert!(parse_duration("10y").is_err());
    }

    #[test]
    fn durations_past_a_year_are_rejected() {
        assert_eq!(parse_duration("365d").unwrap(), MAX_DURATION);
        assert!(parse_duration("366d").is_err());
        assert!(parse_duration("100000000d").is_err());
        assert!(parse_duration("99999999999999999999").is_err());

        let huge_jwt = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("JWT_EXPIRATION", "100000000d"),
        ]));
        assert!(huge_jwt.is_err());

        let huge_reset = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("RESET_TOKEN_TTL_MINUTES", "18446744073709551615"),
        ]));
        assert!(huge_reset.is_err());
    }

    #[test]
    fn defaults_apply_with_only_secret() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.database.kind, DbKind::Postgres);
        assert_eq!(cfg.database.url, "postgres://postgres@localhost:5432/momentask");
        assert_eq!(cfg.jwt.ttl, Duration::from_secs(7 * 86400));
        assert_eq!(cfg.reset_token_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.frontend_url, "http://localhost:5173");
    }

    #[test]
    fn builds_database_url_from_parts() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("DB_HOST", "db"),
            ("DB_PORT", "6543"),
            ("DB_USER", "habits"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "tracker"),
            ("APP_PORT", "8081"),
            ("FRONTEND_URL", "https://app.example.com/"),
        ]))
        .unwrap();
        assert_eq!(cfg.database.url, "postgres://habits:pw@db:6543/tracker");
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.frontend_url, "https://app.example.com");
    }

    #[test]
    fn database_url_wins_over_parts() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("DATABASE_URL", "postgres://u:p@h/d"),
            ("DB_HOST", "ignored"),
        ]))
        .unwrap();
        assert_eq!(cfg.database.url, "postgres://u:p@h/d");
    }

    #[test]
    fn missing_secret_or_bad_db_type_fails() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("DB_TYPE", "mysql")]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_TYPE"));
    }

    #[test]
    fn memory_db_type_is_accepted() {
        let cfg =
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("DB_TYPE", "memory")])).unwrap();
        assert_eq!(cfg.database.kind, DbKind::Memory);
    }
}
