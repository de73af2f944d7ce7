use log::warn;
use serde::Deserialize;

/// Config file read from the working directory at startup.
pub const CONFIG_FILE: &str = "clinica.toml";

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Resolved startup configuration. Backend url/key are optional — when either
/// is missing the service runs against the local store instead of failing.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub admin_password: String,
}

impl AppConfig {
    pub fn remote_configured(&self) -> bool {
        self.backend_url.is_some() && self.backend_key.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    backend: BackendSection,
    #[serde(default)]
    admin: AdminSection,
}

#[derive(Debug, Default, Deserialize)]
struct BackendSection {
    url: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminSection {
    password: Option<String>,
}

/// Load configuration from `clinica.toml`, with environment overrides
/// CLINICA_BACKEND_URL, CLINICA_BACKEND_KEY and CLINICA_ADMIN_PASSWORD.
pub fn load() -> AppConfig {
    let file: FileConfig = match std::fs::read_to_string(CONFIG_FILE) {
        Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
            warn!("Failed to parse {}: {} — ignoring file", CONFIG_FILE, e);
            FileConfig::default()
        }),
        Err(_) => FileConfig::default(),
    };

    resolve(
        file,
        env_var("CLINICA_BACKEND_URL"),
        env_var("CLINICA_BACKEND_KEY"),
        env_var("CLINICA_ADMIN_PASSWORD"),
    )
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Merge file and environment sources. Environment wins. An invalid backend
/// URL disables remote mode rather than failing startup.
pub fn resolve(
    file: FileConfig,
    env_url: Option<String>,
    env_key: Option<String>,
    env_password: Option<String>,
) -> AppConfig {
    let backend_url = env_url
        .or(file.backend.url)
        .filter(|v| !v.is_empty())
        .and_then(|u| match url::Url::parse(&u) {
            Ok(_) => Some(u),
            Err(e) => {
                warn!("Invalid backend URL {:?}: {} — remote mode disabled", u, e);
                None
            }
        });
    let backend_key = env_key.or(file.backend.key).filter(|v| !v.is_empty());

    if backend_url.is_none() || backend_key.is_none() {
        warn!("Content backend not configured — edits will persist to the local store");
    }

    let admin_password = env_password
        .or(file.admin.password)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

    AppConfig {
        backend_url,
        backend_key,
        admin_password,
    }
}
