pub mod clock;
pub mod config;
pub mod rpc;
pub mod store;
pub mod verifier;
pub mod wallet;

pub use clock::SystemClockAdapter;
pub use config::{testnet_registry, AdapterConfig, ConfigError, RuntimeProfile};
pub use rpc::{JsonRpcClient, JsonRpcReader};
pub use store::RecordStoreAdapter;
pub use verifier::VerifierHttpAdapter;
pub use wallet::WalletProxyAdapter;
