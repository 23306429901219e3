use crate::Error;
use std::fmt;

/// Codespace of errors raised by the Cosmos SDK itself.
const SDK_CODESPACE: &str = "sdk";

/// `ErrWrongSequence` in the SDK codespace.
const CODE_WRONG_SEQUENCE: u32 = 32;

/// `ErrMempoolIsFull` in the SDK codespace.
const CODE_MEMPOOL_FULL: u32 = 20;

/// Classification of a failed broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Failure {
    /// The chain expected a different account sequence.
    SequenceMismatch { expected: u64 },
    /// The node's mempool cannot accept more transactions.
    MempoolFull,
    /// The node could not be reached or the connection dropped.
    Network,
    /// The transaction violated a chain rule.
    BusinessRejection { code: u32 },
    /// Anything that could not be classified.
    Unknown,
}

impl Failure {
    /// Classify a non-zero `CheckTx` response.
    pub fn of_rejection(code: u32, codespace: &str, log: &str) -> Self {
        if codespace == SDK_CODESPACE {
            match code {
                CODE_WRONG_SEQUENCE => {
                    return match expected_sequence(log) {
                        Some(expected) => Self::SequenceMismatch { expected },
                        None => Self::Unknown,
                    }
                }
                CODE_MEMPOOL_FULL => return Self::MempoolFull,
                _ => {}
            }
        }

        // Some modules wrap the ante handler error under their own codespace
        if let Some(failure) = Self::of_text(log) {
            return failure;
        }
        Self::BusinessRejection { code }
    }

    /// Classify a transport or RPC error.
    pub fn of_error(error: &Error) -> Self {
        match error {
            Error::Network(_) => Self::Network,
            Error::Status { status, .. } if *status >= 500 => Self::Network,
            Error::Status { .. } | Error::Malformed(_) => Self::Unknown,
            Error::Rpc { message, data, .. } => Self::of_text(data)
                .or_else(|| Self::of_text(message))
                .unwrap_or(Self::Unknown),
        }
    }

    /// Fallback for errors that only surface as text (CometBFT RPC errors carry no ABCI code).
    fn of_text(text: &str) -> Option<Self> {
        let text = text.to_ascii_lowercase();
        if text.contains("account sequence mismatch") {
            return Some(match expected_sequence(&text) {
                Some(expected) => Self::SequenceMismatch { expected },
                None => Self::Unknown,
            });
        }
        if text.contains("mempool is full") {
            return Some(Self::MempoolFull);
        }
        if text.contains("connection reset by peer") || text.contains("connection refused") {
            return Some(Self::Network);
        }
        None
    }

    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SequenceMismatch { .. } => "sequence_mismatch",
            Self::MempoolFull => "mempool_full",
            Self::Network => "network",
            Self::BusinessRejection { .. } => "business_rejection",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceMismatch { expected } => write!(f, "sequence mismatch (expected {expected})"),
            Self::BusinessRejection { code } => write!(f, "business rejection (code {code})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Extract `N` from `"account sequence mismatch, expected N, got M"`.
fn expected_sequence(log: &str) -> Option<u64> {
    let (_, rest) = log.split_once("expected ")?;
    let digits: &str = {
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        &rest[..end]
    };
    digits.parse().ok()
}
