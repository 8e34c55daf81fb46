//! Firestore adapter over the v1 REST API.

mod auth;
mod client;
mod codec;

pub use auth::{AuthorizedUser, Credentials, ServiceAccountKey, TokenSource};
pub use client::{DEFAULT_DATABASE, FIRESTORE_ENDPOINT, FirestoreClient};
pub use codec::{decode_value, encode_value, quote_field_path};
