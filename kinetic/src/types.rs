//! Domain value types and their bidirectional mappings to the wire-level
//! protobuf enumerations. Public ordinals here are independent of the
//! protobuf ordinals; every enum carries `from_proto`/`to_proto`.

use kinetic_proto as wire;

macro_rules! bridge_enum {
    ($name:ident, $proto:ty, $( $variant:ident <=> $proto_variant:ident ),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            /// `None` when the wire enum carries its zero/"invalid" ordinal
            /// or any value this crate doesn't recognize — proto3 enums
            /// always decode to *some* i32, so this boundary has to be
            /// total even though the domain type isn't.
            pub fn from_proto(value: $proto) -> Option<Self> {
                match value {
                    $( <$proto>::$proto_variant => Some($name::$variant), )+
                    _ => None,
                }
            }

            pub fn to_proto(self) -> $proto {
                match self {
                    $( $name::$variant => <$proto>::$proto_variant, )+
                }
            }
        }
    };
}

bridge_enum!(Algorithm, wire::Algorithm,
    Sha1 <=> Sha1,
    Sha2 <=> Sha2,
    Sha3 <=> Sha3,
    Crc32 <=> Crc32,
    Crc64 <=> Crc64,
    Crc32C <=> Crc32C,
);

bridge_enum!(Synchronization, wire::Synchronization,
    WriteThrough <=> Writethrough,
    WriteBack <=> Writeback,
    Flush <=> Flush,
);

bridge_enum!(Priority, wire::Priority,
    Lowest <=> Lowest,
    Lower <=> Lower,
    Normal <=> Normal,
    Higher <=> Higher,
    Highest <=> Highest,
);

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

bridge_enum!(LogType, wire::LogType,
    Utilizations <=> Utilizations,
    Temperatures <=> Temperatures,
    Capacities <=> Capacities,
    Configuration <=> Configuration,
    Statistics <=> Statistics,
    Messages <=> Messages,
    Limits <=> Limits,
    Device <=> Device,
);

bridge_enum!(AclPermission, wire::Permission,
    Read <=> Read,
    Write <=> Write,
    Delete <=> Delete,
    Range <=> Range,
    Setup <=> Setup,
    P2pOp <=> PeerToPeer,
    GetLog <=> Getlog,
    Security <=> Security,
    PowerManagement <=> PowerManagement,
);

bridge_enum!(AclAlgorithm, wire::HmacAlgorithm,
    HmacSha1 <=> HmacSha1,
);

bridge_enum!(PowerLevel, wire::PowerLevel,
    Operational <=> Operational,
    Hibernate <=> Hibernate,
    Shutdown <=> Shutdown,
    Fail <=> Fail,
);

bridge_enum!(PinOpType, wire::PinOpType,
    SecureErase <=> SecureErasePinop,
    Erase <=> ErasePinop,
    Lock <=> LockPinop,
    Unlock <=> UnlockPinop,
);

/// One entry per request/response pair the wire protocol recognizes.
/// `request()`/`response()` map between the two without going through
/// the protobuf ordinal twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Get,
    Put,
    Delete,
    GetNext,
    GetPrevious,
    GetKeyRange,
    GetVersion,
    Setup,
    GetLog,
    Security,
    Peer2PeerPush,
    NoOp,
    FlushAllData,
    PinOp,
    MediaScan,
    MediaOptimize,
    StartBatch,
    EndBatch,
    AbortBatch,
    SetPowerLevel,
}

impl MessageType {
    pub fn request_proto(self) -> wire::MessageType {
        use wire::MessageType as W;
        match self {
            MessageType::Get => W::Get,
            MessageType::Put => W::Put,
            MessageType::Delete => W::Delete,
            MessageType::GetNext => W::Getnext,
            MessageType::GetPrevious => W::Getprevious,
            MessageType::GetKeyRange => W::Getkeyrange,
            MessageType::GetVersion => W::Getversion,
            MessageType::Setup => W::Setup,
            MessageType::GetLog => W::Getlog,
            MessageType::Security => W::Security,
            MessageType::Peer2PeerPush => W::Peer2Peerpush,
            MessageType::NoOp => W::Noop,
            MessageType::FlushAllData => W::Flushalldata,
            MessageType::PinOp => W::Pinop,
            MessageType::MediaScan => W::Mediascan,
            MessageType::MediaOptimize => W::Mediaoptimize,
            MessageType::StartBatch => W::StartBatch,
            MessageType::EndBatch => W::EndBatch,
            MessageType::AbortBatch => W::AbortBatch,
            MessageType::SetPowerLevel => W::SetPowerLevel,
        }
    }

    /// Maps a wire `MessageType` ordinal back to its domain variant,
    /// accepting either the request or the response side of the pair
    /// (a `GetLog` statistics entry tags a message kind, not a
    /// direction). `None` for `INVALID_MESSAGE_TYPE` or an ordinal this
    /// crate doesn't recognize.
    pub fn from_proto(value: wire::MessageType) -> Option<Self> {
        use wire::MessageType as W;
        match value {
            W::Get | W::GetResponse => Some(MessageType::Get),
            W::Put | W::PutResponse => Some(MessageType::Put),
            W::Delete | W::DeleteResponse => Some(MessageType::Delete),
            W::Getnext | W::GetnextResponse => Some(MessageType::GetNext),
            W::Getprevious | W::GetpreviousResponse => Some(MessageType::GetPrevious),
            W::Getkeyrange | W::GetkeyrangeResponse => Some(MessageType::GetKeyRange),
            W::Getversion | W::GetversionResponse => Some(MessageType::GetVersion),
            W::Setup | W::SetupResponse => Some(MessageType::Setup),
            W::Getlog | W::GetlogResponse => Some(MessageType::GetLog),
            W::Security | W::SecurityResponse => Some(MessageType::Security),
            W::Peer2Peerpush | W::Peer2PeerpushResponse => Some(MessageType::Peer2PeerPush),
            W::Noop | W::NoopResponse => Some(MessageType::NoOp),
            W::Flushalldata | W::FlushalldataResponse => Some(MessageType::FlushAllData),
            W::Pinop | W::PinopResponse => Some(MessageType::PinOp),
            W::Mediascan | W::MediascanResponse => Some(MessageType::MediaScan),
            W::Mediaoptimize | W::MediaoptimizeResponse => Some(MessageType::MediaOptimize),
            W::StartBatch | W::StartBatchResponse => Some(MessageType::StartBatch),
            W::EndBatch | W::EndBatchResponse => Some(MessageType::EndBatch),
            W::AbortBatch | W::AbortBatchResponse => Some(MessageType::AbortBatch),
            W::SetPowerLevel | W::SetPowerLevelResponse => Some(MessageType::SetPowerLevel),
            W::InvalidMessageType => None,
        }
    }

    pub fn response_proto(self) -> wire::MessageType {
        use wire::MessageType as W;
        match self {
            MessageType::Get => W::GetResponse,
            MessageType::Put => W::PutResponse,
            MessageType::Delete => W::DeleteResponse,
            MessageType::GetNext => W::GetnextResponse,
            MessageType::GetPrevious => W::GetpreviousResponse,
            MessageType::GetKeyRange => W::GetkeyrangeResponse,
            MessageType::GetVersion => W::GetversionResponse,
            MessageType::Setup => W::SetupResponse,
            MessageType::GetLog => W::GetlogResponse,
            MessageType::Security => W::SecurityResponse,
            MessageType::Peer2PeerPush => W::Peer2PeerpushResponse,
            MessageType::NoOp => W::NoopResponse,
            MessageType::FlushAllData => W::FlushalldataResponse,
            MessageType::PinOp => W::PinopResponse,
            MessageType::MediaScan => W::MediascanResponse,
            MessageType::MediaOptimize => W::MediaoptimizeResponse,
            MessageType::StartBatch => W::StartBatchResponse,
            MessageType::EndBatch => W::EndBatchResponse,
            MessageType::AbortBatch => W::AbortBatchResponse,
            MessageType::SetPowerLevel => W::SetPowerLevelResponse,
        }
    }
}

/// A key/value entry as seen by the caller. `value` travels outside the
/// protobuf envelope, as the raw value blob (see the wire frame layout).
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub version: Vec<u8>,
    pub new_version: Vec<u8>,
    pub tag: Vec<u8>,
    pub algorithm: Option<Algorithm>,
    pub synchronization: Synchronization,
    pub force: bool,
    pub metadata_only: bool,
}

impl Default for Synchronization {
    fn default() -> Self {
        Synchronization::WriteBack
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyRange {
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub start_key_inclusive: bool,
    pub end_key_inclusive: bool,
    pub max_returned: i32,
    pub reverse: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Interface {
    pub name: String,
    pub mac_address: Vec<u8>,
    pub ipv4_address: Vec<u8>,
    pub ipv6_address: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub vendor: String,
    pub model: String,
    pub serial_number: Vec<u8>,
    pub world_wide_name: Vec<u8>,
    pub version: String,
    pub compilation_date: String,
    pub source_hash: String,
    pub protocol_version: String,
    pub protocol_compilation_date: String,
    pub protocol_source_hash: String,
    pub interfaces: Vec<Interface>,
    pub port: i32,
    pub tls_port: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Limits {
    pub max_key_size: i32,
    pub max_value_size: i32,
    pub max_version_size: i32,
    pub max_tag_size: i32,
    pub max_connections: i32,
    pub max_outstanding_read_requests: i32,
    pub max_outstanding_write_requests: i32,
    pub max_message_size: i32,
    pub max_key_range_count: i32,
    pub max_operation_count_per_batch: i32,
    pub max_batch_count_per_device: i32,
    pub max_pin_size: i32,
    pub max_batch_size: i32,
    pub max_percent_full: i32,
}

/// Snapshot taken once, at handshake time, and held for the life of the
/// session — see the "adopt once, then hold" design note.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    pub configuration: Configuration,
    pub limits: Limits,
}

#[derive(Debug, Clone, Default)]
pub struct Utilization {
    pub name: String,
    pub value: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Temperature {
    pub name: String,
    pub current: f32,
    pub minimum: f32,
    pub maximum: f32,
    pub target: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Capacity {
    pub nominal_capacity_in_bytes: u64,
    pub portion_full: f32,
}

/// A per-message-type request counter, as reported by `LogType::Statistics`.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub message_type: Option<MessageType>,
    pub count: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GetLogResult {
    pub utilizations: Vec<Utilization>,
    pub temperatures: Vec<Temperature>,
    pub capacity: Option<Capacity>,
    pub configuration: Option<Configuration>,
    pub statistics: Vec<Statistics>,
    pub messages: Vec<Vec<u8>>,
    pub limits: Option<Limits>,
    pub device: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub offset: i64,
    pub value: Vec<u8>,
    pub permissions: Vec<AclPermission>,
    pub tls_required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub identity: i64,
    pub key: Vec<u8>,
    pub hmac_algorithm: Option<AclAlgorithm>,
    pub scopes: Vec<Scope>,
    pub max_priority: Option<Priority>,
}

#[derive(Debug, Clone, Default)]
pub struct Acl {
    pub identities: Vec<Identity>,
}

/// One entry in a [`P2PPush`]; may itself carry a nested push, forming a
/// tree rather than a flat list.
#[derive(Debug, Clone, Default)]
pub struct P2POperationItem {
    pub key: Vec<u8>,
    pub version: Vec<u8>,
    pub new_key: Vec<u8>,
    pub force: bool,
    pub nested_push: Option<Box<P2PPush>>,
}

#[derive(Debug, Clone, Default)]
pub struct P2PPush {
    pub peer_host: String,
    pub peer_port: i32,
    pub peer_tls: bool,
    pub operations: Vec<P2POperationItem>,
}

#[derive(Debug, Clone, Default)]
pub struct P2PStatus {
    pub all_operations_succeeded: bool,
    pub per_operation: Vec<crate::status::Status>,
}

impl From<wire::Interface> for Interface {
    fn from(w: wire::Interface) -> Self {
        Interface {
            name: w.name,
            mac_address: w.mac_address,
            ipv4_address: w.ipv4_address,
            ipv6_address: w.ipv6_address,
        }
    }
}

impl From<wire::Configuration> for Configuration {
    fn from(w: wire::Configuration) -> Self {
        Configuration {
            vendor: w.vendor,
            model: w.model,
            serial_number: w.serial_number,
            world_wide_name: w.world_wide_name,
            version: w.version,
            compilation_date: w.compilation_date,
            source_hash: w.source_hash,
            protocol_version: w.protocol_version,
            protocol_compilation_date: w.protocol_compilation_date,
            protocol_source_hash: w.protocol_source_hash,
            interfaces: w.interface.into_iter().map(Into::into).collect(),
            port: w.port,
            tls_port: w.tls_port,
        }
    }
}

impl From<wire::Limits> for Limits {
    fn from(w: wire::Limits) -> Self {
        Limits {
            max_key_size: w.max_key_size,
            max_value_size: w.max_value_size,
            max_version_size: w.max_version_size,
            max_tag_size: w.max_tag_size,
            max_connections: w.max_connections,
            max_outstanding_read_requests: w.max_outstanding_read_requests,
            max_outstanding_write_requests: w.max_outstanding_write_requests,
            max_message_size: w.max_message_size,
            max_key_range_count: w.max_key_range_count,
            max_operation_count_per_batch: w.max_operation_count_per_batch,
            max_batch_count_per_device: w.max_batch_count_per_device,
            max_pin_size: w.max_pin_size,
            max_batch_size: w.max_batch_size,
            max_percent_full: w.max_percent_full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_round_trips_through_proto() {
        for a in [
            Algorithm::Sha1,
            Algorithm::Sha2,
            Algorithm::Sha3,
            Algorithm::Crc32,
            Algorithm::Crc64,
            Algorithm::Crc32C,
        ] {
            assert_eq!(Algorithm::from_proto(a.to_proto()), Some(a));
        }
    }

    #[test]
    fn log_type_round_trips_through_proto() {
        for l in [
            LogType::Utilizations,
            LogType::Temperatures,
            LogType::Capacities,
            LogType::Configuration,
            LogType::Statistics,
            LogType::Messages,
            LogType::Limits,
            LogType::Device,
        ] {
            assert_eq!(LogType::from_proto(l.to_proto()), Some(l));
        }
    }

    #[test]
    fn bridge_enum_rejects_the_invalid_ordinal() {
        assert_eq!(Algorithm::from_proto(wire::Algorithm::InvalidAlgorithm), None);
    }

    #[test]
    fn message_type_round_trips_through_request_and_response_proto() {
        let all = [
            MessageType::Get,
            MessageType::Put,
            MessageType::Delete,
            MessageType::GetNext,
            MessageType::GetPrevious,
            MessageType::GetKeyRange,
            MessageType::GetVersion,
            MessageType::Setup,
            MessageType::GetLog,
            MessageType::Security,
            MessageType::Peer2PeerPush,
            MessageType::NoOp,
            MessageType::FlushAllData,
            MessageType::PinOp,
            MessageType::MediaScan,
            MessageType::MediaOptimize,
            MessageType::StartBatch,
            MessageType::EndBatch,
            MessageType::AbortBatch,
            MessageType::SetPowerLevel,
        ];
        for m in all {
            assert_eq!(MessageType::from_proto(m.request_proto()), Some(m));
            assert_eq!(MessageType::from_proto(m.response_proto()), Some(m));
        }
    }

    #[test]
    fn message_type_from_proto_rejects_invalid() {
        assert_eq!(MessageType::from_proto(wire::MessageType::InvalidMessageType), None);
    }

    #[test]
    fn record_defaults_to_write_back_and_empty_buffers() {
        let record = Record::default();
        assert!(record.key.is_empty());
        assert!(record.value.is_empty());
        assert!(!record.force);
        assert_eq!(record.synchronization, Synchronization::WriteBack);
    }

    #[test]
    fn key_range_defaults_to_empty_and_forward() {
        let range = KeyRange::default();
        assert!(range.start_key.is_empty());
        assert!(range.end_key.is_empty());
        assert!(!range.reverse);
        assert_eq!(range.max_returned, 0);
    }

    #[test]
    fn interface_converts_field_by_field_from_wire() {
        let w = wire::Interface {
            name: "eth0".to_string(),
            mac_address: vec![1, 2, 3],
            ipv4_address: vec![10, 0, 0, 1],
            ipv6_address: vec![],
        };
        let interface: Interface = w.into();
        assert_eq!(interface.name, "eth0");
        assert_eq!(interface.mac_address, vec![1, 2, 3]);
        assert_eq!(interface.ipv4_address, vec![10, 0, 0, 1]);
    }

    #[test]
    fn configuration_converts_nested_interfaces_from_wire() {
        let w = wire::Configuration {
            vendor: "Seagate".to_string(),
            model: "Kinetic-HDD".to_string(),
            interface: vec![wire::Interface {
                name: "eth0".to_string(),
                ..Default::default()
            }],
            port: 8123,
            tls_port: 8443,
            ..Default::default()
        };
        let configuration: Configuration = w.into();
        assert_eq!(configuration.vendor, "Seagate");
        assert_eq!(configuration.interfaces.len(), 1);
        assert_eq!(configuration.interfaces[0].name, "eth0");
        assert_eq!(configuration.port, 8123);
        assert_eq!(configuration.tls_port, 8443);
    }

    #[test]
    fn limits_converts_every_field_from_wire() {
        let w = wire::Limits {
            max_key_size: 4096,
            max_value_size: 1024 * 1024,
            max_batch_size: 512,
            ..Default::default()
        };
        let limits: Limits = w.into();
        assert_eq!(limits.max_key_size, 4096);
        assert_eq!(limits.max_value_size, 1024 * 1024);
        assert_eq!(limits.max_batch_size, 512);
    }
}
