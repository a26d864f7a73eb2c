#[cfg(feature = "provider-hashing")]
pub mod hashing;

#[cfg(feature = "provider-http")]
pub mod http;
