//! Typed values persisted to a key-value store
//!
//! - `codec`: JSON and raw-scalar encodings
//! - `binding`: the persisted binding and its UI accessor
//! - `reactive`: signal trait and change subscriptions

pub mod binding;
pub mod codec;
pub mod reactive;

pub use binding::{Binding, PersistedBinding};
pub use codec::{Codec, CodecError, JsonCodec, RawCodec, RawScalar};
pub use reactive::{Signal, Subscription};
