use super::ProviderError;

/// How a failed chain read should be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorClass {
    RateLimited,
    Forbidden,
    /// The node forgot the filter it was asked about
    StaleFilter,
    /// The endpoint could not be reached at all
    Connection,
    Unclassified,
}

/// HTTP statuses and JSON-RPC codes, only counted when they stand alone
const RATE_LIMIT_CODES: &[&str] = &["429", "-32005"];

const RATE_LIMIT_SIGNALS: &[&str] = &[
    "too many requests",
    "rate limit",
    "limit exceeded",
    "exceeded the rps",
];

const FORBIDDEN_CODES: &[&str] = &["403"];

const FORBIDDEN_SIGNALS: &[&str] = &["forbidden", "access denied"];

const STALE_FILTER_SIGNALS: &[&str] = &[
    "filter not found",
    "filter does not exist",
    "unknown filter",
];

const CONNECTION_SIGNALS: &[&str] = &[
    "error sending request",
    "connection refused",
    "connection reset",
    "dns error",
    "tcp connect error",
];

pub fn classify(error: &ProviderError) -> RpcErrorClass {
    classify_message(&error.to_string())
}

pub(crate) fn classify_message(message: &str) -> RpcErrorClass {
    let message = message.to_lowercase();
    let matches_any = |signals: &[&str]| signals.iter().any(|signal| message.contains(signal));
    let has_code = |codes: &[&str]| codes.iter().any(|code| contains_code(&message, code));

    if has_code(RATE_LIMIT_CODES) || matches_any(RATE_LIMIT_SIGNALS) {
        RpcErrorClass::RateLimited
    } else if has_code(FORBIDDEN_CODES) || matches_any(FORBIDDEN_SIGNALS) {
        RpcErrorClass::Forbidden
    } else if matches_any(STALE_FILTER_SIGNALS) {
        RpcErrorClass::StaleFilter
    } else if matches_any(CONNECTION_SIGNALS) {
        RpcErrorClass::Connection
    } else {
        RpcErrorClass::Unclassified
    }
}

/// `code` occurs outside of any longer number, hash or word
fn contains_code(message: &str, code: &str) -> bool {
    message.match_indices(code).any(|(start, _)| {
        let before = message[..start].chars().next_back();
        let after = message[start + code.len()..].chars().next();

        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limits() {
        let error = ProviderError::CustomError("HTTP 429 Too Many Requests".to_string());

        assert_eq!(classify(&error), RpcErrorClass::RateLimited);
        assert_eq!(
            classify_message("(code: -32005, message: limit exceeded, data: None)"),
            RpcErrorClass::RateLimited
        );
    }

    #[test]
    fn classifies_bans() {
        assert_eq!(classify_message("403 Forbidden"), RpcErrorClass::Forbidden);
    }

    #[test]
    fn ignores_status_codes_inside_numbers_and_hashes() {
        assert_eq!(
            classify_message("(code: -32000, message: missing trie node 4039fa1c, data: None)"),
            RpcErrorClass::Unclassified
        );
        assert_eq!(
            classify_message("(code: -32000, message: header not found for block 7429001)"),
            RpcErrorClass::Unclassified
        );
        assert_eq!(
            classify_message("execution reverted: 0x08c379a0000000000000000000000000000000403"),
            RpcErrorClass::Unclassified
        );
    }

    #[test]
    fn classifies_standalone_status_codes() {
        assert_eq!(
            classify_message("Deserialization Error: (code: 429)"),
            RpcErrorClass::RateLimited
        );
        assert_eq!(classify_message("HTTP status 403"), RpcErrorClass::Forbidden);
        assert_eq!(
            classify_message("(code: -32005, message: daily request count exceeded)"),
            RpcErrorClass::RateLimited
        );
    }

    #[test]
    fn classifies_forgotten_filters() {
        assert_eq!(
            classify_message("(code: -32000, message: filter not found, data: None)"),
            RpcErrorClass::StaleFilter
        );
    }

    #[test]
    fn classifies_unreachable_endpoints() {
        assert_eq!(
            classify_message("error sending request for url (https://bsc-dataseed.binance.org/)"),
            RpcErrorClass::Connection
        );
    }

    #[test]
    fn leaves_everything_else_unclassified() {
        assert_eq!(
            classify_message("header not found"),
            RpcErrorClass::Unclassified
        );
    }
}
