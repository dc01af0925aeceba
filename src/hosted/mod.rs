// Hosted backend adapters: the row API as a ContentStore and the auth API
// as an IdentityProvider, sharing one HTTP client.

pub mod client;
pub mod identity;
pub mod store;

pub use client::HostedClient;
pub use identity::HostedIdentity;
pub use store::HostedStore;
