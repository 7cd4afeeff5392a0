use crate::lightning::error::RemoteError;

// Code the node uses when a channel to the peer is already pending or open.
pub const DUPLICATE_OR_PENDING_CODE: i64 = 177;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Transient,
    TooEarly,
    PeerOffline,
    InsufficientFunds,
    DuplicateOrPending,
    TooManyPending,
    Unclassified,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Transient | ErrorClass::TooEarly)
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::TooEarly => "too_early",
            ErrorClass::PeerOffline => "peer_offline",
            ErrorClass::InsufficientFunds => "insufficient_funds",
            ErrorClass::DuplicateOrPending => "duplicate_or_pending",
            ErrorClass::TooManyPending => "too_many_pending",
            ErrorClass::Unclassified => "unclassified",
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Matcher {
    Prefix(&'static str),
    Suffix(&'static str),
    #[allow(dead_code)]
    Exact(&'static str),
    Code(i64),
}

impl Matcher {
    fn matches(self, error: &RemoteError) -> bool {
        match self {
            Matcher::Prefix(p) => error.message.starts_with(p),
            Matcher::Suffix(s) => error.message.ends_with(s),
            Matcher::Exact(e) => error.message == e,
            Matcher::Code(c) => error.code == c,
        }
    }
}

// First match wins.
const RULES: &[(Matcher, ErrorClass)] = &[
    (
        Matcher::Prefix("peer is not connected"),
        ErrorClass::PeerOffline,
    ),
    (Matcher::Suffix("is not online"), ErrorClass::PeerOffline),
    (
        Matcher::Prefix("not enough witness outputs"),
        ErrorClass::InsufficientFunds,
    ),
    (
        Matcher::Code(DUPLICATE_OR_PENDING_CODE),
        ErrorClass::DuplicateOrPending,
    ),
    (
        Matcher::Prefix("Number of pending channels exceed"),
        ErrorClass::TooManyPending,
    ),
    (
        Matcher::Prefix("chain backend is still syncing"),
        ErrorClass::Transient,
    ),
    (
        Matcher::Prefix("channels cannot be created before"),
        ErrorClass::TooEarly,
    ),
];

pub fn classify(error: &RemoteError) -> ErrorClass {
    RULES
        .iter()
        .find(|(matcher, _)| matcher.matches(error))
        .map(|(_, class)| *class)
        .unwrap_or(ErrorClass::Unclassified)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentFailure {
    AlreadyPaid,
    NoRoute,
    Other(String),
}

const NO_ROUTE_MESSAGES: &[&str] = &[
    "insufficient local balance",
    "unable to find a path to destination",
    "insufficient_balance",
];

pub fn classify_payment_error(message: &str) -> PaymentFailure {
    if message == "invoice is already paid" {
        PaymentFailure::AlreadyPaid
    } else if NO_ROUTE_MESSAGES.contains(&message) {
        PaymentFailure::NoRoute
    } else {
        PaymentFailure::Other(message.to_string())
    }
}
