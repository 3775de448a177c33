//! Protobuf encoding for envelope types.
//!
//! This module provides manual prost::Message implementations for the
//! request/response envelope without proto codegen. The field-tag layout is
//! the crate's stable wire contract: changing a tag changes every byte stream
//! replicas exchange, including snapshots.

use prost::{DecodeError, Message};

// ============================================================================
// ServiceId
// ============================================================================

/// Identity of one hosted primitive: a `(name, type)` pair.
///
/// Ordering is lexicographic by `(type, name)`. This is the order used for
/// metadata listings and the snapshot stream, so it must be stable across
/// replicas and releases.
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub name: String,         // field 1
    pub service_type: String, // field 2 ("type")
}

impl ServiceId {
    /// Create an identity from name and type tag.
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
        }
    }
}

impl Ord for ServiceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.service_type, &self.name).cmp(&(&other.service_type, &other.name))
    }
}

impl PartialOrd for ServiceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service_type, self.name)
    }
}

impl Message for ServiceId {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if !self.name.is_empty() {
            prost::encoding::string::encode(1, &self.name, buf);
        }
        if !self.service_type.is_empty() {
            prost::encoding::string::encode(2, &self.service_type, buf);
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
            1 => prost::encoding::string::merge(wire_type, &mut self.name, buf, ctx),
            2 => prost::encoding::string::merge(wire_type, &mut self.service_type, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if !self.name.is_empty() {
            len += prost::encoding::string::encoded_len(1, &self.name);
        }
        if !self.service_type.is_empty() {
            len += prost::encoding::string::encoded_len(2, &self.service_type);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Empty lifecycle messages
// ============================================================================

/// Request body for explicit service creation. Carries no fields.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct CreateRequest {}

/// Response body acknowledging service creation. Carries no fields.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct CreateResponse {}

/// Request body for service deletion. Carries no fields.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct DeleteRequest {}

/// Response body acknowledging service deletion. Carries no fields.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct DeleteResponse {}

macro_rules! empty_message {
    ($name:ident) => {
        impl Message for $name {
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
    };
}

empty_message!(CreateRequest);
empty_message!(CreateResponse);
empty_message!(DeleteRequest);
empty_message!(DeleteResponse);

// ============================================================================
// Metadata
// ============================================================================

/// Request body listing hosted services, optionally filtered by type.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct MetadataRequest {
    /// Type tag filter; empty matches every service.
    pub service_type: String, // field 1 ("type")
}

impl Message for MetadataRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if !self.service_type.is_empty() {
            prost::encoding::string::encode(1, &self.service_type, buf);
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
            1 => prost::encoding::string::merge(wire_type, &mut self.service_type, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        if self.service_type.is_empty() {
            0
        } else {
            prost::encoding::string::encoded_len(1, &self.service_type)
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Response body carrying the sorted list of hosted service identities.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct MetadataResponse {
    pub services: Vec<ServiceId>, // field 1
}

impl Message for MetadataResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        prost::encoding::message::encode_repeated(1, &self.services, buf);
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
            1 => prost::encoding::message::merge_repeated(wire_type, &mut self.services, buf, ctx),
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        prost::encoding::message::encoded_len_repeated(1, &self.services)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// ServiceRequest
// ============================================================================

/// Sub-kind of a request envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Explicit service creation. field 2
    Create(CreateRequest),
    /// Service deletion. field 3
    Delete(DeleteRequest),
    /// Opaque mutating payload for the addressed service. field 4
    Command(Vec<u8>),
    /// Opaque non-mutating payload for the addressed service. field 5
    Query(Vec<u8>),
    /// Service listing. field 6
    Metadata(MetadataRequest),
}

/// Inbound request envelope: a target identity plus one sub-kind.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ServiceRequest {
    /// Target service identity. Not consulted for metadata requests.
    pub id: Option<ServiceId>, // field 1
    /// The operation sub-kind.
    pub kind: Option<RequestKind>, // oneof, fields 2-6
}

impl ServiceRequest {
    /// Build a create request for the given identity.
    pub fn create(id: ServiceId) -> Self {
        Self {
            id: Some(id),
            kind: Some(RequestKind::Create(CreateRequest {})),
        }
    }

    /// Build a delete request for the given identity.
    pub fn delete(id: ServiceId) -> Self {
        Self {
            id: Some(id),
            kind: Some(RequestKind::Delete(DeleteRequest {})),
        }
    }

    /// Build a command request carrying an opaque payload.
    pub fn command(id: ServiceId, payload: Vec<u8>) -> Self {
        Self {
            id: Some(id),
            kind: Some(RequestKind::Command(payload)),
        }
    }

    /// Build a query request carrying an opaque payload.
    pub fn query(id: ServiceId, payload: Vec<u8>) -> Self {
        Self {
            id: Some(id),
            kind: Some(RequestKind::Query(payload)),
        }
    }

    /// Build a metadata request with an optional type filter (empty = all).
    pub fn metadata(service_type: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: Some(RequestKind::Metadata(MetadataRequest {
                service_type: service_type.into(),
            })),
        }
    }
}

impl Message for ServiceRequest {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        if let Some(id) = &self.id {
            prost::encoding::message::encode(1, id, buf);
        }
        match &self.kind {
            Some(RequestKind::Create(value)) => prost::encoding::message::encode(2, value, buf),
            Some(RequestKind::Delete(value)) => prost::encoding::message::encode(3, value, buf),
            Some(RequestKind::Command(value)) => prost::encoding::bytes::encode(4, value, buf),
            Some(RequestKind::Query(value)) => prost::encoding::bytes::encode(5, value, buf),
            Some(RequestKind::Metadata(value)) => prost::encoding::message::encode(6, value, buf),
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
                let id = self.id.get_or_insert_with(ServiceId::default);
                prost::encoding::message::merge(wire_type, id, buf, ctx)
            }
            2 => {
                let mut value = match self.kind.take() {
                    Some(RequestKind::Create(value)) => value,
                    _ => CreateRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(RequestKind::Create(value));
                result
            }
            3 => {
                let mut value = match self.kind.take() {
                    Some(RequestKind::Delete(value)) => value,
                    _ => DeleteRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(RequestKind::Delete(value));
                result
            }
            4 => {
                let mut value = match self.kind.take() {
                    Some(RequestKind::Command(value)) => value,
                    _ => Vec::new(),
                };
                let result = prost::encoding::bytes::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(RequestKind::Command(value));
                result
            }
            5 => {
                let mut value = match self.kind.take() {
                    Some(RequestKind::Query(value)) => value,
                    _ => Vec::new(),
                };
                let result = prost::encoding::bytes::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(RequestKind::Query(value));
                result
            }
            6 => {
                let mut value = match self.kind.take() {
                    Some(RequestKind::Metadata(value)) => value,
                    _ => MetadataRequest::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(RequestKind::Metadata(value));
                result
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(id) = &self.id {
            len += prost::encoding::message::encoded_len(1, id);
        }
        len += match &self.kind {
            Some(RequestKind::Create(value)) => prost::encoding::message::encoded_len(2, value),
            Some(RequestKind::Delete(value)) => prost::encoding::message::encoded_len(3, value),
            Some(RequestKind::Command(value)) => prost::encoding::bytes::encoded_len(4, value),
            Some(RequestKind::Query(value)) => prost::encoding::bytes::encoded_len(5, value),
            Some(RequestKind::Metadata(value)) => prost::encoding::message::encoded_len(6, value),
            None => 0,
        };
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// ServiceResponse
// ============================================================================

/// Sub-kind of a response envelope, mirroring [`RequestKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// Creation acknowledged. field 1
    Create(CreateResponse),
    /// Deletion acknowledged. field 2
    Delete(DeleteResponse),
    /// Opaque command response bytes. field 3
    Command(Vec<u8>),
    /// Opaque query response bytes. field 4
    Query(Vec<u8>),
    /// Service listing. field 5
    Metadata(MetadataResponse),
}

/// Outbound response envelope.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ServiceResponse {
    /// The response sub-kind.
    pub kind: Option<ResponseKind>, // oneof, fields 1-5
}

impl ServiceResponse {
    /// Build an empty create acknowledgement.
    pub fn create() -> Self {
        Self {
            kind: Some(ResponseKind::Create(CreateResponse {})),
        }
    }

    /// Build an empty delete acknowledgement.
    pub fn delete() -> Self {
        Self {
            kind: Some(ResponseKind::Delete(DeleteResponse {})),
        }
    }

    /// Wrap opaque command response bytes.
    pub fn command(payload: Vec<u8>) -> Self {
        Self {
            kind: Some(ResponseKind::Command(payload)),
        }
    }

    /// Wrap opaque query response bytes.
    pub fn query(payload: Vec<u8>) -> Self {
        Self {
            kind: Some(ResponseKind::Query(payload)),
        }
    }

    /// Wrap a service listing.
    pub fn metadata(services: Vec<ServiceId>) -> Self {
        Self {
            kind: Some(ResponseKind::Metadata(MetadataResponse { services })),
        }
    }
}

impl Message for ServiceResponse {
    fn encode_raw(&self, buf: &mut impl prost::bytes::BufMut)
    where
        Self: Sized,
    {
        match &self.kind {
            Some(ResponseKind::Create(value)) => prost::encoding::message::encode(1, value, buf),
            Some(ResponseKind::Delete(value)) => prost::encoding::message::encode(2, value, buf),
            Some(ResponseKind::Command(value)) => prost::encoding::bytes::encode(3, value, buf),
            Some(ResponseKind::Query(value)) => prost::encoding::bytes::encode(4, value, buf),
            Some(ResponseKind::Metadata(value)) => prost::encoding::message::encode(5, value, buf),
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
                let mut value = match self.kind.take() {
                    Some(ResponseKind::Create(value)) => value,
                    _ => CreateResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(ResponseKind::Create(value));
                result
            }
            2 => {
                let mut value = match self.kind.take() {
                    Some(ResponseKind::Delete(value)) => value,
                    _ => DeleteResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(ResponseKind::Delete(value));
                result
            }
            3 => {
                let mut value = match self.kind.take() {
                    Some(ResponseKind::Command(value)) => value,
                    _ => Vec::new(),
                };
                let result = prost::encoding::bytes::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(ResponseKind::Command(value));
                result
            }
            4 => {
                let mut value = match self.kind.take() {
                    Some(ResponseKind::Query(value)) => value,
                    _ => Vec::new(),
                };
                let result = prost::encoding::bytes::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(ResponseKind::Query(value));
                result
            }
            5 => {
                let mut value = match self.kind.take() {
                    Some(ResponseKind::Metadata(value)) => value,
                    _ => MetadataResponse::default(),
                };
                let result = prost::encoding::message::merge(wire_type, &mut value, buf, ctx);
                self.kind = Some(ResponseKind::Metadata(value));
                result
            }
            _ => prost::encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        match &self.kind {
            Some(ResponseKind::Create(value)) => prost::encoding::message::encoded_len(1, value),
            Some(ResponseKind::Delete(value)) => prost::encoding::message::encoded_len(2, value),
            Some(ResponseKind::Command(value)) => prost::encoding::bytes::encoded_len(3, value),
            Some(ResponseKind::Query(value)) => prost::encoding::bytes::encoded_len(4, value),
            Some(ResponseKind::Metadata(value)) => prost::encoding::message::encoded_len(5, value),
            None => 0,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
