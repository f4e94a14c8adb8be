//! Configuración del servidor leída desde variables de entorno (y `.env`).

use std::env;
use std::path::PathBuf;

/// Secreto usado sólo en desarrollo cuando no se define `BOLETIN_JWT_SECRET`.
const SECRETO_DESARROLLO: &str = "boletin360-dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modo {
    Desarrollo,
    Produccion,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub db_url: String,
    pub jwt_secret: String,
    pub token_ttl_horas: i64,
    pub modo: Modo,
    pub cors_origin: Option<String>,
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind: "127.0.0.1:8080".to_string(),
            db_url: "sqlite://data/boletin360.db".to_string(),
            jwt_secret: SECRETO_DESARROLLO.to_string(),
            token_ttl_horas: 12,
            modo: Modo::Desarrollo,
            cors_origin: None,
            admin_username: "admin".to_string(),
            admin_password: None,
        }
    }
}

// load .env if present
fn load_dotenv() {
    let _ = dotenv::dotenv();
}

impl AppConfig {
    /// Lee la configuración del entorno del proceso.
    pub fn from_env() -> Result<Self, String> {
        load_dotenv();
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Versión parametrizable: recibe una función de búsqueda de variables,
    /// lo que permite probar sin tocar el entorno real.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = AppConfig::default();

        if let Some(modo) = get("BOLETIN_ENV") {
            cfg.modo = match modo.to_lowercase().as_str() {
                "production" | "produccion" | "prod" => Modo::Produccion,
                "development" | "desarrollo" | "dev" => Modo::Desarrollo,
                other => return Err(format!("BOLETIN_ENV has unsupported value: {}", other)),
            };
        }
        if let Some(b) = get("BOLETIN_BIND") {
            cfg.bind = b;
        }
        if let Some(u) = get("BOLETIN_DB_URL") {
            cfg.db_url = u;
        }
        match get("BOLETIN_JWT_SECRET") {
            Some(s) => cfg.jwt_secret = s,
            None if cfg.modo == Modo::Produccion => {
                return Err("BOLETIN_JWT_SECRET is required in production".to_string());
            }
            None => {}
        }
        if let Some(ttl) = get("BOLETIN_TOKEN_TTL_HOURS") {
            cfg.token_ttl_horas = match ttl.parse::<i64>() {
                Ok(h) if h > 0 => h,
                _ => return Err(format!("BOLETIN_TOKEN_TTL_HOURS must be a positive integer: {}", ttl)),
            };
        }
        cfg.cors_origin = get("BOLETIN_CORS_ORIGIN");
        if let Some(u) = get("BOLETIN_ADMIN_USER") {
            cfg.admin_username = u;
        }
        cfg.admin_password = get("BOLETIN_ADMIN_PASSWORD");
        Ok(cfg)
    }

    pub fn es_desarrollo(&self) -> bool {
        self.modo == Modo::Desarrollo
    }

    /// Ruta local del archivo sqlite, o `None` para una base en memoria.
    /// Acepta `sqlite://`, `file://` o una ruta simple.
    pub fn db_path(&self) -> Option<PathBuf> {
        let url = self.db_url.as_str();
        let path = if let Some(p) = url.strip_prefix("sqlite://") {
            p
        } else if let Some(p) = url.strip_prefix("file://") {
            p
        } else {
            url
        };
        if path == ":memory:" { None } else { Some(PathBuf::from(path)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8080");
        assert_eq!(cfg.token_ttl_horas, 12);
        assert!(cfg.es_desarrollo());
        assert_eq!(cfg.db_path(), Some(PathBuf::from("data/boletin360.db")));
    }

    #[test]
    fn test_production_requires_secret() {
        let err = AppConfig::from_lookup(lookup_from(&[("BOLETIN_ENV", "production")])).unwrap_err();
        assert!(err.contains("BOLETIN_JWT_SECRET"));

        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("BOLETIN_ENV", "production"),
            ("BOLETIN_JWT_SECRET", "s3cr3t"),
            ("BOLETIN_TOKEN_TTL_HOURS", "2"),
        ]))
        .unwrap();
        assert_eq!(cfg.modo, Modo::Produccion);
        assert_eq!(cfg.token_ttl_horas, 2);
    }

    #[test]
    fn test_db_url_schemes() {
        let mut cfg = AppConfig::default();
        cfg.db_url = "file:///tmp/b.db".to_string();
        assert_eq!(cfg.db_path(), Some(PathBuf::from("/tmp/b.db")));
        cfg.db_url = ":memory:".to_string();
        assert_eq!(cfg.db_path(), None);
    }

    #[test]
    fn test_invalid_ttl() {
        assert!(AppConfig::from_lookup(lookup_from(&[("BOLETIN_TOKEN_TTL_HOURS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("BOLETIN_TOKEN_TTL_HOURS", "abc")])).is_err());
    }
}
