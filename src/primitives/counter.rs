//! Replicated atomic counter primitive.
//!
//! The reference primitive: a single signed 64-bit value with set/get,
//! check-and-set, and delta arithmetic. Wrap-around on i64 arithmetic is the
//! defined semantics. Every response carries the current log index as
//! metadata. The counter retains no per-index state, so it always consents
//! to log truncation.
//!
//! Wire messages are implemented by hand like the envelope types; the tags
//! below are the counter's stable payload contract.

use crate::core::context::InstanceContext;
use crate::core::error::{PlexusError, PlexusResult};
use crate::service::primitive::PrimitiveService;
use crate::wire::codec;
use async_trait::async_trait;
use prost::{DecodeError, Message};
use std::io::{BufRead, Write};

/// Type tag the counter registers under.
pub const COUNTER_TYPE: &str = "counter";

// ============================================================================
// Wire messages
// ============================================================================

/// Response metadata common to every counter operation.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CounterMetadata {
    /// Log index at which the operation executed.
    pub index: u64, // field 1
}

impl Message for CounterMetadata {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.index != 0 {
            prost::encoding::uint64::encode(1, &self.index, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::uint64::merge(wire_type, &mut self.index, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        if self.index != 0 {
            prost::encoding::uint64::encoded_len(1, &self.index)
        } else {
            0
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Overwrite the counter value.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct SetRequest {
    pub value: i64, // field 1
}

/// Read the counter value.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GetRequest {}

/// Conditionally overwrite the counter value.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CheckAndSetRequest {
    pub expect: i64, // field 1
    pub update: i64, // field 2
}

/// Add to the counter value; a zero delta means increment by one.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct IncrementRequest {
    pub delta: i64, // field 1
}

/// Subtract from the counter value; a zero delta means decrement by one.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct DecrementRequest {
    pub delta: i64, // field 1
}

impl Message for SetRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.value != 0 {
            prost::encoding::int64::encode(1, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        if self.value != 0 {
            prost::encoding::int64::encoded_len(1, &self.value)
        } else {
            0
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for GetRequest {
    fn encode_raw(&self, _buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        prost::encoding::skip_field(wire_type, tag, buf, ctx)
    }

    fn encoded_len(&self) -> usize {
        0
    }

    fn clear(&mut self) {}
}

impl Message for CheckAndSetRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.expect != 0 {
            prost::encoding::int64::encode(1, &self.expect, buf);
        }
        if self.update != 0 {
            prost::encoding::int64::encode(2, &self.update, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.expect, buf, ctx),
            2 => prost::encoding::int64::merge(wire_type, &mut self.update, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.expect != 0 {
            len += prost::encoding::int64::encoded_len(1, &self.expect);
        }
        if self.update != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.update);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for IncrementRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.delta != 0 {
            prost::encoding::int64::encode(1, &self.delta, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.delta, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        if self.delta != 0 {
            prost::encoding::int64::encoded_len(1, &self.delta)
        } else {
            0
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for DecrementRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.delta != 0 {
            prost::encoding::int64::encode(1, &self.delta, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.delta, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        if self.delta != 0 {
            prost::encoding::int64::encoded_len(1, &self.delta)
        } else {
            0
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Response to [`SetRequest`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct SetResponse {
    pub metadata: Option<CounterMetadata>, // field 1
    pub previous_value: i64,               // field 2
}

/// Response to [`GetRequest`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct GetResponse {
    pub metadata: Option<CounterMetadata>, // field 1
    pub value: i64,                        // field 2
}

/// Response to [`CheckAndSetRequest`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CheckAndSetResponse {
    pub metadata: Option<CounterMetadata>, // field 1
    pub succeeded: bool,                   // field 2
}

/// Response to [`IncrementRequest`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct IncrementResponse {
    pub metadata: Option<CounterMetadata>, // field 1
    pub previous_value: i64,               // field 2
    pub next_value: i64,                   // field 3
}

/// Response to [`DecrementRequest`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct DecrementResponse {
    pub metadata: Option<CounterMetadata>, // field 1
    pub previous_value: i64,               // field 2
    pub next_value: i64,                   // field 3
}

impl Message for SetResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if let Some(metadata) = &self.metadata {
            prost::encoding::message::encode(1, metadata, buf);
        }
        if self.previous_value != 0 {
            prost::encoding::int64::encode(2, &self.previous_value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let metadata = self.metadata.get_or_insert_with(CounterMetadata::default);
                prost::encoding::message::merge(wire_type, metadata, buf, ctx)
            }
            2 => prost::encoding::int64::merge(wire_type, &mut self.previous_value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(metadata) = &self.metadata {
            len += prost::encoding::message::encoded_len(1, metadata);
        }
        if self.previous_value != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.previous_value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for GetResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if let Some(metadata) = &self.metadata {
            prost::encoding::message::encode(1, metadata, buf);
        }
        if self.value != 0 {
            prost::encoding::int64::encode(2, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let metadata = self.metadata.get_or_insert_with(CounterMetadata::default);
                prost::encoding::message::merge(wire_type, metadata, buf, ctx)
            }
            2 => prost::encoding::int64::merge(wire_type, &mut self.value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(metadata) = &self.metadata {
            len += prost::encoding::message::encoded_len(1, metadata);
        }
        if self.value != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for CheckAndSetResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if let Some(metadata) = &self.metadata {
            prost::encoding::message::encode(1, metadata, buf);
        }
        if self.succeeded {
            prost::encoding::bool::encode(2, &self.succeeded, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let metadata = self.metadata.get_or_insert_with(CounterMetadata::default);
                prost::encoding::message::merge(wire_type, metadata, buf, ctx)
            }
            2 => prost::encoding::bool::merge(wire_type, &mut self.succeeded, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(metadata) = &self.metadata {
            len += prost::encoding::message::encoded_len(1, metadata);
        }
        if self.succeeded {
            len += prost::encoding::bool::encoded_len(2, &self.succeeded);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for IncrementResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if let Some(metadata) = &self.metadata {
            prost::encoding::message::encode(1, metadata, buf);
        }
        if self.previous_value != 0 {
            prost::encoding::int64::encode(2, &self.previous_value, buf);
        }
        if self.next_value != 0 {
            prost::encoding::int64::encode(3, &self.next_value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let metadata = self.metadata.get_or_insert_with(CounterMetadata::default);
                prost::encoding::message::merge(wire_type, metadata, buf, ctx)
            }
            2 => prost::encoding::int64::merge(wire_type, &mut self.previous_value, buf, ctx),
            3 => prost::encoding::int64::merge(wire_type, &mut self.next_value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(metadata) = &self.metadata {
            len += prost::encoding::message::encoded_len(1, metadata);
        }
        if self.previous_value != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.previous_value);
        }
        if self.next_value != 0 {
            len += prost::encoding::int64::encoded_len(3, &self.next_value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Message for DecrementResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if let Some(metadata) = &self.metadata {
            prost::encoding::message::encode(1, metadata, buf);
        }
        if self.previous_value != 0 {
            prost::encoding::int64::encode(2, &self.previous_value, buf);
        }
        if self.next_value != 0 {
            prost::encoding::int64::encode(3, &self.next_value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let metadata = self.metadata.get_or_insert_with(CounterMetadata::default);
                prost::encoding::message::merge(wire_type, metadata, buf, ctx)
            }
            2 => prost::encoding::int64::merge(wire_type, &mut self.previous_value, buf, ctx),
            3 => prost::encoding::int64::merge(wire_type, &mut self.next_value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(metadata) = &self.metadata {
            len += prost::encoding::message::encoded_len(1, metadata);
        }
        if self.previous_value != 0 {
            len += prost::encoding::int64::encoded_len(2, &self.previous_value);
        }
        if self.next_value != 0 {
            len += prost::encoding::int64::encoded_len(3, &self.next_value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Counter operation sub-kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterOp {
    /// field 1
    Set(SetRequest),
    /// field 2
    Get(GetRequest),
    /// field 3
    CheckAndSet(CheckAndSetRequest),
    /// field 4
    Increment(IncrementRequest),
    /// field 5
    Decrement(DecrementRequest),
}

/// Counter request payload: one discriminated operation.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CounterRequest {
    pub op: Option<CounterOp>, // oneof, fields 1-5
}

impl CounterRequest {
    /// Build a set request.
    pub fn set(value: i64) -> Self {
        Self {
            op: Some(CounterOp::Set(SetRequest { value })),
        }
    }

    /// Build a get request.
    pub fn get() -> Self {
        Self {
            op: Some(CounterOp::Get(GetRequest {})),
        }
    }

    /// Build a check-and-set request.
    pub fn check_and_set(expect: i64, update: i64) -> Self {
        Self {
            op: Some(CounterOp::CheckAndSet(CheckAndSetRequest {
                expect,
                update,
            })),
        }
    }

    /// Build an increment request.
    pub fn increment(delta: i64) -> Self {
        Self {
            op: Some(CounterOp::Increment(IncrementRequest { delta })),
        }
    }

    /// Build a decrement request.
    pub fn decrement(delta: i64) -> Self {
        Self {
            op: Some(CounterOp::Decrement(DecrementRequest { delta })),
        }
    }
}

impl Message for CounterRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        match &self.op {
            Some(CounterOp::Set(value)) => prost::encoding::message::encode(1, value, buf),
            Some(CounterOp::Get(value)) => prost::encoding::message::encode(2, value, buf),
            Some(CounterOp::CheckAndSet(value)) => prost::encoding::message::encode(3, value, buf),
            Some(CounterOp::Increment(value)) => prost::encoding::message::encode(4, value, buf),
            Some(CounterOp::Decrement(value)) => prost::encoding::message::encode(5, value, buf),
            None => {}
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let mut value = match self.op.take() {
                    Some(CounterOp::Set(value)) => value,
                    _ => SetRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterOp::Set(value));
                result
            }
            2 => {
                let mut value = match self.op.take() {
                    Some(CounterOp::Get(value)) => value,
                    _ => GetRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterOp::Get(value));
                result
            }
            3 => {
                let mut value = match self.op.take() {
                    Some(CounterOp::CheckAndSet(value)) => value,
                    _ => CheckAndSetRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterOp::CheckAndSet(value));
                result
            }
            4 => {
                let mut value = match self.op.take() {
                    Some(CounterOp::Increment(value)) => value,
                    _ => IncrementRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterOp::Increment(value));
                result
            }
            5 => {
                let mut value = match self.op.take() {
                    Some(CounterOp::Decrement(value)) => value,
                    _ => DecrementRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterOp::Decrement(value));
                result
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        match &self.op {
            Some(CounterOp::Set(value)) => prost::encoding::message::encoded_len(1, value),
            Some(CounterOp::Get(value)) => prost::encoding::message::encoded_len(2, value),
            Some(CounterOp::CheckAndSet(value)) => prost::encoding::message::encoded_len(3, value),
            Some(CounterOp::Increment(value)) => prost::encoding::message::encoded_len(4, value),
            Some(CounterOp::Decrement(value)) => prost::encoding::message::encoded_len(5, value),
            None => 0,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Counter response sub-kind, mirroring [`CounterOp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterResult {
    /// field 1
    Set(SetResponse),
    /// field 2
    Get(GetResponse),
    /// field 3
    CheckAndSet(CheckAndSetResponse),
    /// field 4
    Increment(IncrementResponse),
    /// field 5
    Decrement(DecrementResponse),
}

/// Counter response payload.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CounterResponse {
    pub op: Option<CounterResult>, // oneof, fields 1-5
}

impl Message for CounterResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        match &self.op {
            Some(CounterResult::Set(value)) => prost::encoding::message::encode(1, value, buf),
            Some(CounterResult::Get(value)) => prost::encoding::message::encode(2, value, buf),
            Some(CounterResult::CheckAndSet(value)) => {
                prost::encoding::message::encode(3, value, buf)
            }
            Some(CounterResult::Increment(value)) => {
                prost::encoding::message::encode(4, value, buf)
            }
            Some(CounterResult::Decrement(value)) => {
                prost::encoding::message::encode(5, value, buf)
            }
            None => {}
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => {
                let mut value = match self.op.take() {
                    Some(CounterResult::Set(value)) => value,
                    _ => SetResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterResult::Set(value));
                result
            }
            2 => {
                let mut value = match self.op.take() {
                    Some(CounterResult::Get(value)) => value,
                    _ => GetResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterResult::Get(value));
                result
            }
            3 => {
                let mut value = match self.op.take() {
                    Some(CounterResult::CheckAndSet(value)) => value,
                    _ => CheckAndSetResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterResult::CheckAndSet(value));
                result
            }
            4 => {
                let mut value = match self.op.take() {
                    Some(CounterResult::Increment(value)) => value,
                    _ => IncrementResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterResult::Increment(value));
                result
            }
            5 => {
                let mut value = match self.op.take() {
                    Some(CounterResult::Decrement(value)) => value,
                    _ => DecrementResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.op = Some(CounterResult::Decrement(value));
                result
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        match &self.op {
            Some(CounterResult::Set(value)) => prost::encoding::message::encoded_len(1, value),
            Some(CounterResult::Get(value)) => prost::encoding::message::encoded_len(2, value),
            Some(CounterResult::CheckAndSet(value)) => {
                prost::encoding::message::encoded_len(3, value)
            }
            Some(CounterResult::Increment(value)) => {
                prost::encoding::message::encoded_len(4, value)
            }
            Some(CounterResult::Decrement(value)) => {
                prost::encoding::message::encoded_len(5, value)
            }
            None => 0,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot record: the counter's entire state.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub value: i64, // field 1
}

impl Message for CounterSnapshot {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if self.value != 0 {
            prost::encoding::int64::encode(1, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: prost::encoding::WireType,
        buf: &mut impl prost::bytes::Buf,
        ctx: prost::encoding::DecodeContext,
    ) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match tag {
            1 => prost::encoding::int64::merge(wire_type, &mut self.value, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        if self.value != 0 {
            prost::encoding::int64::encoded_len(1, &self.value)
        } else {
            0
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Service
// ============================================================================

/// The counter service implementation.
#[derive(Debug, Default)]
pub struct CounterService {
    value: i64,
}

impl CounterService {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a boxed counter, suitable for registry registration.
    pub fn factory() -> Box<dyn PrimitiveService> {
        Box::new(Self::new())
    }

    fn metadata(ctx: &InstanceContext) -> Option<CounterMetadata> {
        Some(CounterMetadata {
            index: ctx.current_index(),
        })
    }

    fn get_response(&self, ctx: &InstanceContext) -> CounterResponse {
        CounterResponse {
            op: Some(CounterResult::Get(GetResponse {
                metadata: Self::metadata(ctx),
                value: self.value,
            })),
        }
    }
}

#[async_trait]
impl PrimitiveService for CounterService {
    async fn apply_command(
        &mut self,
        ctx: &InstanceContext,
        payload: &[u8],
    ) -> PlexusResult<Vec<u8>> {
        let request: CounterRequest = codec::decode(payload)?;
        let op = request
            .op
            .ok_or_else(|| PlexusError::decode("counter request missing op"))?;

        let result = match op {
            CounterOp::Set(set) => {
                let previous_value = self.value;
                self.value = set.value;
                CounterResult::Set(SetResponse {
                    metadata: Self::metadata(ctx),
                    previous_value,
                })
            }
            CounterOp::Get(_) => {
                return Ok(codec::encode(&self.get_response(ctx)));
            }
            CounterOp::CheckAndSet(cas) => {
                let succeeded = self.value == cas.expect;
                if succeeded {
                    self.value = cas.update;
                }
                CounterResult::CheckAndSet(CheckAndSetResponse {
                    metadata: Self::metadata(ctx),
                    succeeded,
                })
            }
            CounterOp::Increment(increment) => {
                let previous_value = self.value;
                let delta = if increment.delta == 0 {
                    1
                } else {
                    increment.delta
                };
                self.value = previous_value.wrapping_add(delta);
                CounterResult::Increment(IncrementResponse {
                    metadata: Self::metadata(ctx),
                    previous_value,
                    next_value: self.value,
                })
            }
            CounterOp::Decrement(decrement) => {
                let previous_value = self.value;
                let delta = if decrement.delta == 0 {
                    1
                } else {
                    decrement.delta
                };
                self.value = previous_value.wrapping_sub(delta);
                CounterResult::Decrement(DecrementResponse {
                    metadata: Self::metadata(ctx),
                    previous_value,
                    next_value: self.value,
                })
            }
        };

        Ok(codec::encode(&CounterResponse { op: Some(result) }))
    }

    async fn apply_query(&self, ctx: &InstanceContext, payload: &[u8]) -> PlexusResult<Vec<u8>> {
        let request: CounterRequest = codec::decode(payload)?;
        match request.op {
            Some(CounterOp::Get(_)) => Ok(codec::encode(&self.get_response(ctx))),
            Some(_) => Err(PlexusError::service(
                "only get may be issued as a counter query",
            )),
            None => Err(PlexusError::decode("counter request missing op")),
        }
    }

    fn snapshot(&self, output: &mut dyn Write) -> PlexusResult<()> {
        codec::write_delimited(&CounterSnapshot { value: self.value }, output)
    }

    fn restore(&mut self, input: &mut dyn BufRead) -> PlexusResult<()> {
        let snapshot: CounterSnapshot = codec::read_delimited(input)?;
        self.value = snapshot.value;
        Ok(())
    }
}
