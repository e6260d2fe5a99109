//! Failure taxonomy (spec.md §4.6), generalized from the teacher's
//! `aivcs-core::self_healing::{FailureClass, classify_failure}` (rename the
//! variants to the dApp-test taxonomy: `{selector, timeout, wallet,
//! assertion, network, unknown}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Selector,
    Timeout,
    Wallet,
    Assertion,
    Network,
    Unknown,
}

/// Classifies by case-insensitive substring heuristics against `error` and
/// `logs` combined. Checked in a fixed priority order so a message matching
/// more than one heuristic (e.g. a wallet popup that also times out) lands
/// on the more specific class.
pub fn classify_failure(error: &str, logs: &str) -> FailureClass {
    let combined = format!("{error} {logs}").to_lowercase();

    if combined.contains("wallet")
        || combined.contains("metamask")
        || combined.contains("notification popup")
        || combined.contains("siwe")
    {
        return FailureClass::Wallet;
    }
    if combined.contains("selector")
        || combined.contains("locator")
        || combined.contains("no element matches")
        || combined.contains("element not found")
    {
        return FailureClass::Selector;
    }
    if combined.contains("timeout") || combined.contains("timed out") {
        return FailureClass::Timeout;
    }
    if combined.contains("assert")
        || combined.contains("expected")
        || combined.contains("tobevisible")
        || combined.contains("toequal")
    {
        return FailureClass::Assertion;
    }
    if combined.contains("net::err_")
        || combined.contains("econnrefused")
        || combined.contains("enotfound")
        || combined.contains("etimedout")
        || combined.contains("fetch failed")
    {
        return FailureClass::Network;
    }

    FailureClass::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_selector_failure() {
        assert_eq!(
            classify_failure("locator.click: no element matches 'swap-button'", ""),
            FailureClass::Selector
        );
    }

    #[test]
    fn classifies_timeout_failure() {
        assert_eq!(
            classify_failure("locator.click: Timeout 30000ms exceeded", ""),
            FailureClass::Timeout
        );
    }

    #[test]
    fn classifies_wallet_failure_over_timeout() {
        assert_eq!(
            classify_failure("wallet notification popup timed out", ""),
            FailureClass::Wallet
        );
    }

    #[test]
    fn classifies_assertion_failure() {
        assert_eq!(
            classify_failure("Expected element to be visible, received hidden", ""),
            FailureClass::Assertion
        );
    }

    #[test]
    fn classifies_network_failure() {
        assert_eq!(classify_failure("net::ERR_CONNECTION_REFUSED", ""), FailureClass::Network);
    }

    #[test]
    fn falls_back_to_unknown() {
        assert_eq!(classify_failure("something strange happened", ""), FailureClass::Unknown);
    }

    #[test]
    fn checks_logs_as_well_as_error() {
        assert_eq!(classify_failure("step failed", "selector not found in snapshot"), FailureClass::Selector);
    }
}
