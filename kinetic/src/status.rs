//! The remote status taxonomy. Ordinals here are independent of the
//! protobuf wire ordinals in `kinetic_proto::StatusCode`; [`StatusCode::from_proto`]
//! and [`StatusCode::to_proto`] bridge the two.

use kinetic_proto::StatusCode as ProtoStatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,

    // client-local
    ClientIoError,
    ClientShutdown,
    ClientInternalError,
    ClientResponseHmacVerificationError,
    ProtocolErrorResponseNoAckSequence,

    // remote authentication / authorization
    RemoteHmacError,
    RemoteNotAuthorized,
    RemoteClusterVersionMismatch,
    RemoteNoSuchHmacAlgorithm,
    RemoteDeviceLocked,
    RemoteDeviceAlreadyUnlocked,

    // remote request shape
    RemoteInvalidRequest,
    RemoteHeaderRequired,
    RemoteNotAttempted,

    // remote data
    RemoteNotFound,
    RemoteVersionMismatch,
    RemoteDataError,
    RemotePermDataError,
    RemoteNoSpace,

    // remote runtime
    RemoteInternalError,
    RemoteServiceBusy,
    RemoteExpired,
    RemoteConnectionError,
    RemoteConnectionTerminated,
    RemoteNestedOperationErrors,
    RemoteInvalidBatch,
    RemoteHibernate,
    RemoteShutdown,
    RemoteOtherError,

    // carried forward from the original source though unused by any
    // operation this crate exposes; kept so the taxonomy stays a strict
    // superset of what a real drive can return.
    RemoteInvalidExecute,
    RemoteExecuteComplete,
}

impl StatusCode {
    pub fn from_proto(code: ProtoStatusCode) -> Self {
        match code {
            ProtoStatusCode::Success => StatusCode::Ok,
            ProtoStatusCode::HmacFailure => StatusCode::RemoteHmacError,
            ProtoStatusCode::NotAuthorized => StatusCode::RemoteNotAuthorized,
            ProtoStatusCode::VersionFailure | ProtoStatusCode::ClusterVersionFailure => {
                StatusCode::RemoteClusterVersionMismatch
            }
            ProtoStatusCode::NoSuchHmacAlgorithm => StatusCode::RemoteNoSuchHmacAlgorithm,
            ProtoStatusCode::DeviceLocked => StatusCode::RemoteDeviceLocked,
            ProtoStatusCode::DeviceAlreadyUnlocked => StatusCode::RemoteDeviceAlreadyUnlocked,
            ProtoStatusCode::InvalidRequest => StatusCode::RemoteInvalidRequest,
            ProtoStatusCode::HeaderRequired => StatusCode::RemoteHeaderRequired,
            ProtoStatusCode::NotAttempted => StatusCode::RemoteNotAttempted,
            ProtoStatusCode::NotFound => StatusCode::RemoteNotFound,
            ProtoStatusCode::VersionMismatch => StatusCode::RemoteVersionMismatch,
            ProtoStatusCode::DataError => StatusCode::RemoteDataError,
            ProtoStatusCode::PermDataError => StatusCode::RemotePermDataError,
            ProtoStatusCode::NoSpace => StatusCode::RemoteNoSpace,
            ProtoStatusCode::InternalError => StatusCode::RemoteInternalError,
            ProtoStatusCode::ServiceBusy => StatusCode::RemoteServiceBusy,
            ProtoStatusCode::Expired => StatusCode::RemoteExpired,
            ProtoStatusCode::RemoteConnectionError => StatusCode::RemoteConnectionError,
            ProtoStatusCode::ConnectionTerminated => StatusCode::RemoteConnectionTerminated,
            ProtoStatusCode::NestedOperationErrors => StatusCode::RemoteNestedOperationErrors,
            ProtoStatusCode::InvalidBatch => StatusCode::RemoteInvalidBatch,
            ProtoStatusCode::Hibernate => StatusCode::RemoteHibernate,
            ProtoStatusCode::Shutdown => StatusCode::RemoteShutdown,
            ProtoStatusCode::InvalidExecute => StatusCode::RemoteInvalidExecute,
            ProtoStatusCode::ExecuteComplete => StatusCode::RemoteExecuteComplete,
            ProtoStatusCode::OtherError | ProtoStatusCode::InvalidStatusCode => {
                StatusCode::RemoteOtherError
            }
        }
    }

    pub fn to_proto(self) -> ProtoStatusCode {
        match self {
            StatusCode::Ok => ProtoStatusCode::Success,
            StatusCode::RemoteHmacError => ProtoStatusCode::HmacFailure,
            StatusCode::RemoteNotAuthorized => ProtoStatusCode::NotAuthorized,
            StatusCode::RemoteClusterVersionMismatch => ProtoStatusCode::ClusterVersionFailure,
            StatusCode::RemoteNoSuchHmacAlgorithm => ProtoStatusCode::NoSuchHmacAlgorithm,
            StatusCode::RemoteDeviceLocked => ProtoStatusCode::DeviceLocked,
            StatusCode::RemoteDeviceAlreadyUnlocked => ProtoStatusCode::DeviceAlreadyUnlocked,
            StatusCode::RemoteInvalidRequest => ProtoStatusCode::InvalidRequest,
            StatusCode::RemoteHeaderRequired => ProtoStatusCode::HeaderRequired,
            StatusCode::RemoteNotAttempted => ProtoStatusCode::NotAttempted,
            StatusCode::RemoteNotFound => ProtoStatusCode::NotFound,
            StatusCode::RemoteVersionMismatch => ProtoStatusCode::VersionMismatch,
            StatusCode::RemoteDataError => ProtoStatusCode::DataError,
            StatusCode::RemotePermDataError => ProtoStatusCode::PermDataError,
            StatusCode::RemoteNoSpace => ProtoStatusCode::NoSpace,
            StatusCode::RemoteInternalError => ProtoStatusCode::InternalError,
            StatusCode::RemoteServiceBusy => ProtoStatusCode::ServiceBusy,
            StatusCode::RemoteExpired => ProtoStatusCode::Expired,
            StatusCode::RemoteConnectionError => ProtoStatusCode::RemoteConnectionError,
            StatusCode::RemoteConnectionTerminated => ProtoStatusCode::ConnectionTerminated,
            StatusCode::RemoteNestedOperationErrors => ProtoStatusCode::NestedOperationErrors,
            StatusCode::RemoteInvalidBatch => ProtoStatusCode::InvalidBatch,
            StatusCode::RemoteHibernate => ProtoStatusCode::Hibernate,
            StatusCode::RemoteShutdown => ProtoStatusCode::Shutdown,
            StatusCode::RemoteInvalidExecute => ProtoStatusCode::InvalidExecute,
            StatusCode::RemoteExecuteComplete => ProtoStatusCode::ExecuteComplete,
            StatusCode::RemoteOtherError => ProtoStatusCode::OtherError,
            // client-local codes have no wire representation; callers never
            // send them, they're only ever constructed locally.
            StatusCode::ClientIoError
            | StatusCode::ClientShutdown
            | StatusCode::ClientInternalError
            | StatusCode::ClientResponseHmacVerificationError
            | StatusCode::ProtocolErrorResponseNoAckSequence => ProtoStatusCode::OtherError,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

/// A response's outcome: a code plus an optional human-readable message
/// and, for cluster version mismatches, the version the server expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    pub expected_cluster_version: Option<i64>,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            code: StatusCode::Ok,
            message: String::new(),
            expected_cluster_version: None,
        }
    }

    pub fn client_local(code: StatusCode, message: impl Into<String>) -> Self {
        Status {
            code,
            message: message.into(),
            expected_cluster_version: None,
        }
    }

    pub fn from_proto(status: &kinetic_proto::Status) -> Self {
        let code = ProtoStatusCode::try_from(status.code)
            .unwrap_or(ProtoStatusCode::InvalidStatusCode);
        Status {
            code: StatusCode::from_proto(code),
            message: status.status_message.clone(),
            expected_cluster_version: if status.expected_cluster_version != 0 {
                Some(status.expected_cluster_version)
            } else {
                None
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    /// Maps a client-local failure onto the same taxonomy a remote status
    /// uses, so callers can inspect one `Status` regardless of which side
    /// of the wire produced it.
    pub fn from_client_error(err: &crate::error::KineticError) -> Self {
        use crate::error::KineticError;
        let code = match err {
            KineticError::Io(_) | KineticError::Tls(_) => StatusCode::ClientIoError,
            KineticError::Protocol(_) => StatusCode::ProtocolErrorResponseNoAckSequence,
            KineticError::Internal(_) => StatusCode::ClientInternalError,
            KineticError::Poisoned => StatusCode::ClientInternalError,
            KineticError::Timeout => StatusCode::ClientIoError,
            KineticError::HmacVerification => StatusCode::ClientResponseHmacVerificationError,
            KineticError::Shutdown => StatusCode::ClientShutdown,
        };
        Status::client_local(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_proto_ordinals() {
        let codes = [
            StatusCode::Ok,
            StatusCode::RemoteHmacError,
            StatusCode::RemoteNotFound,
            StatusCode::RemoteClusterVersionMismatch,
            StatusCode::RemoteInvalidBatch,
        ];
        for code in codes {
            assert_eq!(StatusCode::from_proto(code.to_proto()), code);
        }
    }
}
