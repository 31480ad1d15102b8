/// Numeric status code carried by every [`crate::Status`].
#[allow(non_camel_case_types)]
pub type status_code_t = u16;

/// Common status codes (0-999).
pub mod StatusCode {
    use super::status_code_t;

    pub const OK: status_code_t = 0;
    pub const NOT_IMPLEMENTED: status_code_t = 1;
    pub const INVALID_ARG: status_code_t = 3;
    pub const INVALID_CONFIG: status_code_t = 4;
    pub const INTERRUPTED: status_code_t = 27;
    pub const IO_ERROR: status_code_t = 69;
    pub const OS_ERROR: status_code_t = 72;
    pub const UNKNOWN: status_code_t = 999;
}

/// RPC transport status codes (2xxx).
pub mod RPCCode {
    use super::status_code_t;

    pub const TIMEOUT: status_code_t = 2005;
    pub const INVALID_ADDR: status_code_t = 2006;
    pub const SEND_FAILED: status_code_t = 2007;
    pub const SOCKET_ERROR: status_code_t = 2010;
    pub const REQUEST_REFUSED: status_code_t = 2012;
    pub const SOCKET_CLOSED: status_code_t = 2013;
    pub const CONNECT_FAILED: status_code_t = 2014;
}

/// Directory service status codes (5xxx).
pub mod DirCode {
    use super::status_code_t;

    /// The record's version moved on the DIR side between read and write.
    pub const CONCURRENT_MODIFICATION: status_code_t = 5000;
    pub const SERVICE_NOT_FOUND: status_code_t = 5001;
    pub const MAPPING_NOT_FOUND: status_code_t = 5002;
    pub const CONFIGURATION_NOT_FOUND: status_code_t = 5003;
    pub const REGISTRATION_REJECTED: status_code_t = 5004;
}

/// Render a status code as its symbolic name.
pub fn to_string(code: status_code_t) -> &'static str {
    match code {
        StatusCode::OK => "OK",
        StatusCode::NOT_IMPLEMENTED => "NotImplemented",
        StatusCode::INVALID_ARG => "InvalidArg",
        StatusCode::INVALID_CONFIG => "InvalidConfig",
        StatusCode::INTERRUPTED => "Interrupted",
        StatusCode::IO_ERROR => "IoError",
        StatusCode::OS_ERROR => "OsError",
        StatusCode::UNKNOWN => "Unknown",
        RPCCode::TIMEOUT => "RPC::Timeout",
        RPCCode::INVALID_ADDR => "RPC::InvalidAddr",
        RPCCode::SEND_FAILED => "RPC::SendFailed",
        RPCCode::SOCKET_ERROR => "RPC::SocketError",
        RPCCode::REQUEST_REFUSED => "RPC::RequestRefused",
        RPCCode::SOCKET_CLOSED => "RPC::SocketClosed",
        RPCCode::CONNECT_FAILED => "RPC::ConnectFailed",
        DirCode::CONCURRENT_MODIFICATION => "Dir::ConcurrentModification",
        DirCode::SERVICE_NOT_FOUND => "Dir::ServiceNotFound",
        DirCode::MAPPING_NOT_FOUND => "Dir::MappingNotFound",
        DirCode::CONFIGURATION_NOT_FOUND => "Dir::ConfigurationNotFound",
        DirCode::REGISTRATION_REJECTED => "Dir::RegistrationRejected",
        _ => "Unrecognized",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_names() {
        assert_eq!(to_string(StatusCode::OK), "OK");
        assert_eq!(
            to_string(DirCode::CONCURRENT_MODIFICATION),
            "Dir::ConcurrentModification"
        );
        assert_eq!(to_string(RPCCode::TIMEOUT), "RPC::Timeout");
        assert_eq!(to_string(12345), "Unrecognized");
    }

    #[test]
    fn test_code_ranges_disjoint() {
        assert!(StatusCode::UNKNOWN < 1000);
        assert!(RPCCode::TIMEOUT >= 2000 && RPCCode::TIMEOUT < 3000);
        assert!(DirCode::CONCURRENT_MODIFICATION >= 5000);
    }
}
