use crate::error::ConfigError;
use crate::runtime::RuntimeVariable;
use crate::traits::Component;
use serde_json::Value;
use std::sync::Arc;

pub mod client;
pub mod server;

macro_rules! register_components {
    ($($kind:expr => $type:ty),* $(,)?) => {
        /// Build an application from its kind and JSON configuration (`null` for defaults).
        pub fn create_component(
            kind: &str,
            data: Value,
            runtime: Arc<RuntimeVariable>,
        ) -> Result<Box<dyn Component>, ConfigError> {
            match kind {
                $(
                    $kind => Ok(Box::new(<$type>::from_json(data, runtime)?)),
                )*
                _ => Err(ConfigError::UnknownKind(kind.to_string())),
            }
        }

        pub fn component_kinds() -> Vec<&'static str> {
            vec![$($kind),*]
        }
    };
}

register_components!(
    "HttpClient" => client::Client,
    "HttpServer" => server::Server,
);
