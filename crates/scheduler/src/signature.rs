//! Webhook signature verification (C2 external interface, spec.md §6).
//!
//! Both algorithms are grounded exactly on the original system's
//! `_verify_github_signature`/`_verify_slack_signature`: same header
//! formats, same replay window, same constant-time comparison via
//! `subtle::ConstantTimeEq` in place of a language-native constant-time
//! compare.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SLACK_REPLAY_WINDOW_SECS: i64 = 60 * 5;

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify a GitHub `X-Hub-Signature-256` header against the raw request
/// body and the workflow's configured webhook secret.
pub fn verify_github_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_sig) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected_hex = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(hex_sig, &expected_hex)
}

/// Verify a Slack `X-Slack-Signature` header, rejecting requests whose
/// `X-Slack-Request-Timestamp` falls outside a 5 minute replay window.
pub fn verify_slack_signature(timestamp: &str, signature: &str, body: &[u8], signing_secret: &str, now_unix: i64) -> bool {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_unix - ts).abs() > SLACK_REPLAY_WINDOW_SECS {
        return false;
    }

    let Some(hex_sig) = signature.strip_prefix("v0=") else {
        return false;
    };

    let Ok(body_str) = std::str::from_utf8(body) else {
        return false;
    };
    let base_string = format!("v0:{timestamp}:{body_str}");

    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(base_string.as_bytes());
    let expected_hex = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(hex_sig, &expected_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_sig(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn github_signature_round_trips() {
        let payload = br#"{"action":"opened"}"#;
        let sig = github_sig(payload, "s3cr3t");
        assert!(verify_github_signature(payload, &sig, "s3cr3t"));
    }

    #[test]
    fn github_signature_rejects_wrong_secret() {
        let payload = br#"{"action":"opened"}"#;
        let sig = github_sig(payload, "s3cr3t");
        assert!(!verify_github_signature(payload, &sig, "wrong"));
    }

    #[test]
    fn github_signature_requires_sha256_prefix() {
        assert!(!verify_github_signature(b"x", "abcdef", "secret"));
    }

    #[test]
    fn slack_signature_round_trips() {
        let timestamp = "1700000000";
        let body = br#"{"type":"event_callback"}"#;
        let base = format!("v0:{timestamp}:{}", std::str::from_utf8(body).unwrap());
        let mut mac = HmacSha256::new_from_slice(b"signing-secret").unwrap();
        mac.update(base.as_bytes());
        let sig = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_slack_signature(timestamp, &sig, body, "signing-secret", 1700000000));
    }

    #[test]
    fn slack_signature_rejects_stale_timestamp() {
        let timestamp = "1700000000";
        let body = br#"{"type":"event_callback"}"#;
        let base = format!("v0:{timestamp}:{}", std::str::from_utf8(body).unwrap());
        let mut mac = HmacSha256::new_from_slice(b"signing-secret").unwrap();
        mac.update(base.as_bytes());
        let sig = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

        assert!(!verify_slack_signature(timestamp, &sig, body, "signing-secret", 1700000000 + 600));
    }
}
