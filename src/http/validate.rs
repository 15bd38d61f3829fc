//! Payload validation
//!
//! A validator checks that a decoded payload has the shape the caller
//! expects and may normalize it. Rejection is reported as a message and
//! surfaces as [`Error::Validation`](crate::Error::Validation); it is never
//! retried.

use crate::types::JsonValue;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Checks a decoded payload
pub trait Validator: Send + Sync {
    /// Return the accepted payload or a description of what is wrong
    fn validate(&self, payload: JsonValue) -> std::result::Result<JsonValue, String>;
}

/// [`Validator`] backed by a closure
pub struct FnValidator<F>(F);

impl<F> FnValidator<F>
where
    F: Fn(JsonValue) -> std::result::Result<JsonValue, String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(JsonValue) -> std::result::Result<JsonValue, String> + Send + Sync,
{
    fn validate(&self, payload: JsonValue) -> std::result::Result<JsonValue, String> {
        (self.0)(payload)
    }
}

/// Accepts payloads that deserialize into `T`
pub struct TypedValidator<T>(PhantomData<fn() -> T>);

impl<T> TypedValidator<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypedValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Validator for TypedValidator<T> {
    fn validate(&self, payload: JsonValue) -> std::result::Result<JsonValue, String> {
        T::deserialize(&payload).map_err(|e| e.to_string())?;
        Ok(payload)
    }
}
