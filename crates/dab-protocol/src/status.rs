//! DAB status codes.
//!
//! Devices report outcomes through an integer `status` field in the
//! response body. Two local sentinels exist alongside the protocol codes:
//! `UNKNOWN` when a response carried no usable status field, and `TIMEOUT`
//! when no response arrived before the local deadline. Both are outside the
//! range of legitimate device-reported codes.

/// Response body carried no `status` field.
pub const UNKNOWN: i64 = -1;

/// No reply arrived before the call deadline. Local sentinel, never sent
/// by a device.
pub const TIMEOUT: i64 = 100;

/// Operation succeeded.
pub const OK: i64 = 200;

/// Request invalid or malformed.
pub const BAD_REQUEST: i64 = 400;

/// Request refused.
pub const FORBIDDEN: i64 = 403;

/// Target of the request does not exist.
pub const NOT_FOUND: i64 = 404;

/// Device-side internal error.
pub const INTERNAL_ERROR: i64 = 500;

/// Operation is not implemented on this device.
pub const NOT_IMPLEMENTED: i64 = 501;

/// True when the code is the success code.
pub fn is_ok(code: i64) -> bool {
    code == OK
}

/// True when the code is the local timeout sentinel.
pub fn is_timeout(code: i64) -> bool {
    code == TIMEOUT
}

/// True when the code is the "no status field" sentinel.
pub fn is_unknown(code: i64) -> bool {
    code == UNKNOWN
}

/// Stable human-readable phrase for a status code.
pub fn describe(code: i64) -> &'static str {
    match code {
        UNKNOWN => "unknown error (no status reported)",
        TIMEOUT => "timed out waiting for a response",
        OK => "ok",
        BAD_REQUEST => "request invalid or malformed",
        FORBIDDEN => "request refused",
        NOT_FOUND => "target not found",
        INTERNAL_ERROR => "device internal error",
        NOT_IMPLEMENTED => "operation not implemented",
        _ => "unrecognized status code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_distinct_from_protocol_codes() {
        for code in [OK, BAD_REQUEST, FORBIDDEN, NOT_FOUND, INTERNAL_ERROR, NOT_IMPLEMENTED] {
            assert_ne!(code, UNKNOWN);
            assert_ne!(code, TIMEOUT);
        }
    }

    #[test]
    fn test_describe_covers_sentinels() {
        assert_eq!(describe(TIMEOUT), "timed out waiting for a response");
        assert_eq!(describe(UNKNOWN), "unknown error (no status reported)");
        assert_eq!(describe(999), "unrecognized status code");
    }
}
