use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket that holds uploaded binaries.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base under which objects are publicly readable, e.g. `https://cdn.example.com/images-bucket`.
    pub public_url: String,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        // argon2 crate defaults (19 MiB, t=2, p=1)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub hash: HashConfig,
    pub fetch_timeout_secs: u64,
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

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "imagehost"),
            audience: env_or("JWT_AUDIENCE", "imagehost-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("STORAGE_ENDPOINT")?,
            bucket: std::env::var("STORAGE_BUCKET")?,
            access_key: std::env::var("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY")?,
            region: env_or("STORAGE_REGION", "us-east-1"),
            public_url: std::env::var("STORAGE_PUBLIC_URL")?,
        };
        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_parse("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env_parse("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: env_parse("ARGON2_PARALLELISM", defaults.parallelism),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            hash,
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 10),
        })
    }
}
