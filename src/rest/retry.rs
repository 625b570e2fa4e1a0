//! Shared retry context and canned log messages used by the REST client so
//! every endpoint reports retries, exhaustion, and hard failures the same way.

use anyhow::Error;
use std::time::Duration;

macro_rules! log_with_retry_ctx {
    ($level:ident, $ctx:expr, $($rest:tt)*) => {{
        if let Some(subject) = $ctx.subject {
            tracing::$level!(
                endpoint = $ctx.messages.endpoint,
                subject = subject,
                $($rest)*
            );
        } else {
            tracing::$level!(endpoint = $ctx.messages.endpoint, $($rest)*);
        }
    }};
}

/// Logging labels for one REST endpoint.
#[derive(Clone, Copy)]
pub(crate) struct RetryMessages {
    pub(crate) endpoint: &'static str,
    pub(crate) retry: &'static str,
    pub(crate) exhausted: &'static str,
    pub(crate) rejected: &'static str,
}

/// Context passed into `retry_with_backoff` so callers can attach the
/// validator or orchestrator a request is about.
#[derive(Clone, Copy)]
pub(crate) struct RetryContext<'a> {
    subject: Option<&'a str>,
    messages: &'a RetryMessages,
}

impl<'a> RetryContext<'a> {
    pub(crate) fn new(messages: &'a RetryMessages) -> Self {
        Self {
            subject: None,
            messages,
        }
    }

    pub(crate) fn with_subject(messages: &'a RetryMessages, subject: &'a str) -> Self {
        Self {
            subject: Some(subject),
            messages,
        }
    }

    pub(crate) fn endpoint(&self) -> &'static str {
        self.messages.endpoint
    }

    pub(crate) fn log_retry(&self, attempt: usize, backoff: Duration, err: &Error) {
        let backoff_ms = backoff.as_millis().min(u128::from(u64::MAX)) as u64;
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            backoff_ms,
            error = %err,
            "{}",
            self.messages.retry
        );
    }

    pub(crate) fn log_exhausted(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(error, self, attempt, error = %err, "{}", self.messages.exhausted);
    }

    pub(crate) fn log_rejected(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(error, self, attempt, error = %err, "{}", self.messages.rejected);
    }
}

pub(crate) const VALIDATORS_RETRY: RetryMessages = RetryMessages {
    endpoint: "validators",
    retry: "bonded validators request failed; retrying",
    exhausted: "bonded validators request exhausted retries",
    rejected: "bonded validators response rejected",
};

pub(crate) const DELEGATE_KEYS_RETRY: RetryMessages = RetryMessages {
    endpoint: "delegate_keys",
    retry: "delegate keys request failed; retrying",
    exhausted: "delegate keys request exhausted retries",
    rejected: "delegate keys response rejected",
};

pub(crate) const EVENT_NONCE_RETRY: RetryMessages = RetryMessages {
    endpoint: "event_nonce",
    retry: "event nonce request failed; retrying",
    exhausted: "event nonce request exhausted retries",
    rejected: "event nonce response rejected",
};
