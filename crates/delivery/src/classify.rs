use nudge_channels::TransmitError;

/// How the retry loop treats a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Server-wide throttle: pause every sender, retry without spending budget.
    RateLimited,
    /// Retrying cannot help: return the error to the caller.
    Terminal,
    /// Worth another attempt while budget remains.
    Transient,
}

const RATE_LIMITED_ERRCODE: &str = "M_LIMIT_EXCEEDED";

/// Error codes for bad requests, forbidden/invalid credentials, unsupported
/// room versions and malformed payloads.
const TERMINAL_ERRCODES: &[&str] = &[
    "M_BAD_JSON",
    "M_NOT_JSON",
    "M_FORBIDDEN",
    "M_UNKNOWN_TOKEN",
    "M_MISSING_TOKEN",
    "M_INVALID_PARAM",
    "M_TOO_LARGE",
    "M_UNSUPPORTED_ROOM_VERSION",
    "M_INCOMPATIBLE_ROOM_VERSION",
];

pub fn classify(error: &TransmitError) -> Outcome {
    match error {
        TransmitError::Server {
            status, errcode, ..
        } => {
            let errcode = errcode.as_deref();
            if errcode == Some(RATE_LIMITED_ERRCODE) || *status == 429 {
                Outcome::RateLimited
            } else if errcode.is_some_and(|code| TERMINAL_ERRCODES.contains(&code)) {
                Outcome::Terminal
            } else if matches!(status, 400 | 401 | 403) {
                Outcome::Terminal
            } else {
                Outcome::Transient
            }
        },
        TransmitError::Malformed { .. } => Outcome::Terminal,
        TransmitError::Transport { .. } => Outcome::Transient,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(429, Some("M_LIMIT_EXCEEDED"), Outcome::RateLimited)]
    #[case(429, None, Outcome::RateLimited)]
    #[case(400, Some("M_BAD_JSON"), Outcome::Terminal)]
    #[case(400, Some("M_NOT_JSON"), Outcome::Terminal)]
    #[case(403, Some("M_FORBIDDEN"), Outcome::Terminal)]
    #[case(401, Some("M_UNKNOWN_TOKEN"), Outcome::Terminal)]
    #[case(400, Some("M_UNSUPPORTED_ROOM_VERSION"), Outcome::Terminal)]
    #[case(400, None, Outcome::Terminal)]
    #[case(500, Some("M_UNKNOWN"), Outcome::Transient)]
    #[case(502, None, Outcome::Transient)]
    #[case(504, None, Outcome::Transient)]
    #[case(404, Some("M_NOT_FOUND"), Outcome::Transient)]
    fn classifies_server_errors(
        #[case] status: u16,
        #[case] errcode: Option<&str>,
        #[case] expected: Outcome,
    ) {
        let err = TransmitError::server(status, errcode, "test");
        assert_eq!(classify(&err), expected);
    }

    #[test]
    fn transport_failures_are_transient() {
        assert_eq!(
            classify(&TransmitError::timeout("deadline")),
            Outcome::Transient
        );
        assert_eq!(
            classify(&TransmitError::transport("connection reset")),
            Outcome::Transient
        );
    }

    #[test]
    fn malformed_payload_is_terminal() {
        assert_eq!(
            classify(&TransmitError::malformed("invalid json")),
            Outcome::Terminal
        );
    }
}
