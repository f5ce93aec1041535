//! Generator adapters: HTTP routines and a scripted mock.

pub mod http;
pub mod mock;

use std::sync::Arc;

pub use http::{HttpGenerator, HttpGeneratorConfig};
pub use mock::{MockGenerator, MockResponse};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::GenerationConfig;
use crate::domain::ports::Generator;

/// Build the generator named by `config.backend`.
pub fn create_generator(config: &GenerationConfig) -> DomainResult<Arc<dyn Generator>> {
    match config.backend.as_str() {
        "http" => Ok(Arc::new(HttpGenerator::new(HttpGeneratorConfig::from(config))?)),
        "mock" => Ok(Arc::new(MockGenerator::new())),
        other => Err(DomainError::ValidationFailed(format!("unknown generator backend: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_generator_by_backend() {
        let mut config = GenerationConfig::default();
        assert_eq!(create_generator(&config).unwrap().name(), "http");

        config.backend = "mock".into();
        assert_eq!(create_generator(&config).unwrap().name(), "mock");

        config.backend = "carrier-pigeon".into();
        assert!(create_generator(&config).is_err());
    }
}
