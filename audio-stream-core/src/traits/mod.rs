pub mod endpoint_device;
pub mod endpoint_provider;
pub mod engine_client;
