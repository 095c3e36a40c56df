use blinks_core::{BlinksApi, Error, Result};
use std::path::Path;
use std::sync::Arc;

pub mod backends;
pub mod config;
pub mod raw;

pub use backends::*;
pub use config::ApiConfig;

/// Builds a backend by name: `http` or `memory`.
pub async fn create_backend(kind: &str, config: &ApiConfig, seed: Option<&Path>) -> Result<Arc<dyn BlinksApi>> {
    match kind {
        "http" => {
            let backend = HttpBackend::new(config)?;
            tracing::info!("🌐 Using HTTP backend at {}", config.base_url);
            Ok(Arc::new(backend))
        }
        "memory" => {
            let backend = match seed {
                Some(path) => MemoryBackend::from_seed_file(path).await?,
                None => MemoryBackend::new(),
            };
            tracing::info!("🧠 Using in-memory backend");
            Ok(Arc::new(backend))
        }
        other => Err(Error::InvalidInput(format!(
            "Unknown backend: {}. Available backends: http, memory",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::config::ApiConfig;
    pub use super::create_backend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_backend_by_name() {
        let config = ApiConfig::new().with_url("http://localhost:8000");
        assert_eq!(create_backend("memory", &config, None).await.unwrap().name(), "memory");
        assert_eq!(create_backend("http", &config, None).await.unwrap().name(), "http");
        assert!(matches!(
            create_backend("carrier-pigeon", &config, None).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
