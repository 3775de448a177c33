//! Thin typed clients.
//!
//! Clients are pure data flow: a request variant is serialized to envelope
//! bytes, handed to a [`Transport`], and the response envelope is decoded
//! back into a typed value. There is no proxy machinery; the transport (an
//! RPC stack, an in-process manager in tests) decides how bytes reach a
//! replica.

use crate::core::error::{PlexusError, PlexusResult};
use crate::primitives::counter::{CounterRequest, CounterResponse, CounterResult, COUNTER_TYPE};
use crate::wire::codec;
use crate::wire::proto::{ResponseKind, ServiceId, ServiceRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Carries envelope bytes to a replica and returns the response bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a command envelope through the replicated log.
    async fn execute_command(&self, request: Vec<u8>) -> PlexusResult<Vec<u8>>;

    /// Submit a query envelope.
    async fn execute_query(&self, request: Vec<u8>) -> PlexusResult<Vec<u8>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute_command(&self, request: Vec<u8>) -> PlexusResult<Vec<u8>> {
        (**self).execute_command(request).await
    }

    async fn execute_query(&self, request: Vec<u8>) -> PlexusResult<Vec<u8>> {
        (**self).execute_query(request).await
    }
}

/// Untyped client for one service identity.
pub struct RawServiceClient<T> {
    transport: T,
    id: ServiceId,
}

impl<T: Transport> RawServiceClient<T> {
    /// Create a client for the given identity.
    pub fn new(transport: T, id: ServiceId) -> Self {
        Self { transport, id }
    }

    /// The identity this client addresses.
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Explicitly create the service.
    pub async fn create(&self) -> PlexusResult<()> {
        let request = codec::encode(&ServiceRequest::create(self.id.clone()));
        let response = self.transport.execute_command(request).await?;
        match decode_response(&response)? {
            ResponseKind::Create(_) => Ok(()),
            other => Err(unexpected("create", &other)),
        }
    }

    /// Delete the service.
    pub async fn delete(&self) -> PlexusResult<()> {
        let request = codec::encode(&ServiceRequest::delete(self.id.clone()));
        let response = self.transport.execute_command(request).await?;
        match decode_response(&response)? {
            ResponseKind::Delete(_) => Ok(()),
            other => Err(unexpected("delete", &other)),
        }
    }

    /// Submit an opaque command payload and return the response payload.
    pub async fn command(&self, payload: Vec<u8>) -> PlexusResult<Vec<u8>> {
        let request = codec::encode(&ServiceRequest::command(self.id.clone(), payload));
        let response = self.transport.execute_command(request).await?;
        match decode_response(&response)? {
            ResponseKind::Command(bytes) => Ok(bytes),
            other => Err(unexpected("command", &other)),
        }
    }

    /// Submit an opaque query payload and return the response payload.
    pub async fn query(&self, payload: Vec<u8>) -> PlexusResult<Vec<u8>> {
        let request = codec::encode(&ServiceRequest::query(self.id.clone(), payload));
        let response = self.transport.execute_query(request).await?;
        match decode_response(&response)? {
            ResponseKind::Query(bytes) => Ok(bytes),
            other => Err(unexpected("query", &other)),
        }
    }
}

/// List hosted services, optionally filtered by type tag (empty = all).
pub async fn list_services<T: Transport>(
    transport: &T,
    type_filter: &str,
) -> PlexusResult<Vec<ServiceId>> {
    let request = codec::encode(&ServiceRequest::metadata(type_filter));
    let response = transport.execute_query(request).await?;
    match decode_response(&response)? {
        ResponseKind::Metadata(metadata) => Ok(metadata.services),
        other => Err(unexpected("metadata", &other)),
    }
}

/// Typed client for the counter primitive.
pub struct CounterClient<T> {
    raw: RawServiceClient<T>,
}

impl<T: Transport> CounterClient<T> {
    /// Create a client for the counter with the given name.
    pub fn new(transport: T, name: impl Into<String>) -> Self {
        Self {
            raw: RawServiceClient::new(transport, ServiceId::new(name, COUNTER_TYPE)),
        }
    }

    /// The identity this client addresses.
    pub fn id(&self) -> &ServiceId {
        self.raw.id()
    }

    /// Explicitly create the counter.
    pub async fn create(&self) -> PlexusResult<()> {
        self.raw.create().await
    }

    /// Delete the counter.
    pub async fn delete(&self) -> PlexusResult<()> {
        self.raw.delete().await
    }

    /// Overwrite the value, returning the previous value.
    pub async fn set(&self, value: i64) -> PlexusResult<i64> {
        match self.execute(CounterRequest::set(value)).await? {
            CounterResult::Set(set) => Ok(set.previous_value),
            other => Err(unexpected_counter("set", &other)),
        }
    }

    /// Read the current value.
    pub async fn get(&self) -> PlexusResult<i64> {
        let payload = self.raw.query(codec::encode(&CounterRequest::get())).await?;
        let response: CounterResponse = codec::decode(&payload)?;
        match response.op {
            Some(CounterResult::Get(get)) => Ok(get.value),
            Some(other) => Err(unexpected_counter("get", &other)),
            None => Err(PlexusError::decode("counter response missing op")),
        }
    }

    /// Set the value to `update` iff the current value equals `expect`.
    pub async fn check_and_set(&self, expect: i64, update: i64) -> PlexusResult<bool> {
        match self
            .execute(CounterRequest::check_and_set(expect, update))
            .await?
        {
            CounterResult::CheckAndSet(cas) => Ok(cas.succeeded),
            other => Err(unexpected_counter("check_and_set", &other)),
        }
    }

    /// Add `delta` (or one, if zero), returning `(previous, next)`.
    pub async fn increment(&self, delta: i64) -> PlexusResult<(i64, i64)> {
        match self.execute(CounterRequest::increment(delta)).await? {
            CounterResult::Increment(inc) => Ok((inc.previous_value, inc.next_value)),
            other => Err(unexpected_counter("increment", &other)),
        }
    }

    /// Subtract `delta` (or one, if zero), returning `(previous, next)`.
    pub async fn decrement(&self, delta: i64) -> PlexusResult<(i64, i64)> {
        match self.execute(CounterRequest::decrement(delta)).await? {
            CounterResult::Decrement(dec) => Ok((dec.previous_value, dec.next_value)),
            other => Err(unexpected_counter("decrement", &other)),
        }
    }

    async fn execute(&self, request: CounterRequest) -> PlexusResult<CounterResult> {
        let payload = self.raw.command(codec::encode(&request)).await?;
        let response: CounterResponse = codec::decode(&payload)?;
        response
            .op
            .ok_or_else(|| PlexusError::decode("counter response missing op"))
    }
}

fn decode_response(bytes: &[u8]) -> PlexusResult<ResponseKind> {
    let response: crate::wire::proto::ServiceResponse = codec::decode(bytes)?;
    response
        .kind
        .ok_or_else(|| PlexusError::decode("response envelope missing kind"))
}

fn unexpected(expected: &str, got: &ResponseKind) -> PlexusError {
    let got = match got {
        ResponseKind::Create(_) => "create",
        ResponseKind::Delete(_) => "delete",
        ResponseKind::Command(_) => "command",
        ResponseKind::Query(_) => "query",
        ResponseKind::Metadata(_) => "metadata",
    };
    PlexusError::decode(format!("expected {expected} response, got {got}"))
}

fn unexpected_counter(expected: &str, got: &CounterResult) -> PlexusError {
    let got = match got {
        CounterResult::Set(_) => "set",
        CounterResult::Get(_) => "get",
        CounterResult::CheckAndSet(_) => "check_and_set",
        CounterResult::Increment(_) => "increment",
        CounterResult::Decrement(_) => "decrement",
    };
    PlexusError::decode(format!("expected {expected} response, got {got}"))
}
