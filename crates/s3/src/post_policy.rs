//! Browser-based POST upload policies signed with AWS Signature V4

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;

use bucketfs_core::{BackendError, BackendResult, KeyCondition, PostPolicy};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Credentials used to sign a policy
pub(crate) struct SigningCredentials<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
}

/// Sign `policy` at `now`, returning the form fields for the upload
pub(crate) fn sign_post_policy(
    policy: &PostPolicy,
    creds: &SigningCredentials<'_>,
    now: jiff::Timestamp,
) -> BackendResult<BTreeMap<String, String>> {
    let date = now.strftime("%Y%m%d").to_string();
    let amz_date = now.strftime("%Y%m%dT%H%M%SZ").to_string();
    let credential = format!(
        "{}/{date}/{}/{SERVICE}/aws4_request",
        creds.access_key, creds.region
    );

    let mut conditions = vec![json!(["eq", "$bucket", policy.bucket])];
    let key = match &policy.key {
        KeyCondition::Exact(key) => {
            conditions.push(json!(["eq", "$key", key]));
            key.clone()
        }
        KeyCondition::StartsWith(prefix) => {
            conditions.push(json!(["starts-with", "$key", prefix]));
            prefix.clone()
        }
    };
    if let Some(content_type) = &policy.content_type {
        conditions.push(json!(["eq", "$Content-Type", content_type]));
    }
    conditions.push(json!(["eq", "$x-amz-date", amz_date]));
    conditions.push(json!(["eq", "$x-amz-algorithm", ALGORITHM]));
    conditions.push(json!(["eq", "$x-amz-credential", credential]));
    if let Some(token) = creds.session_token {
        conditions.push(json!(["eq", "$x-amz-security-token", token]));
    }

    let document: Value = json!({
        "expiration": expiration(policy.expiration),
        "conditions": conditions,
    });
    let encoded = BASE64.encode(document.to_string());

    let signing_key = derive_signing_key(creds.secret_key, &date, creds.region, SERVICE)?;
    let signature = hex::encode(hmac_sha256(&signing_key, encoded.as_bytes())?);

    let mut fields = BTreeMap::from([
        ("bucket".to_string(), policy.bucket.clone()),
        ("key".to_string(), key),
        ("policy".to_string(), encoded),
        ("x-amz-algorithm".to_string(), ALGORITHM.to_string()),
        ("x-amz-credential".to_string(), credential),
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-signature".to_string(), signature),
    ]);
    if let Some(content_type) = &policy.content_type {
        fields.insert("Content-Type".to_string(), content_type.clone());
    }
    if let Some(token) = creds.session_token {
        fields.insert("x-amz-security-token".to_string(), token.to_string());
    }
    Ok(fields)
}

/// ISO 8601 with millisecond precision, as S3 expects in policies
fn expiration(ts: jiff::Timestamp) -> String {
    format!(
        "{}.{:03}Z",
        ts.strftime("%Y-%m-%dT%H:%M:%S"),
        ts.subsec_millisecond()
    )
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> BackendResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BackendError::transport(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> BackendResult<Vec<u8>> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, service.as_bytes())?;
    hmac_sha256(&service_key, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> SigningCredentials<'static> {
        SigningCredentials {
            access_key: "AKIDEXAMPLE",
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            session_token: None,
            region: "us-east-1",
        }
    }

    fn decode_policy(fields: &BTreeMap<String, String>) -> Value {
        let raw = BASE64.decode(&fields["policy"]).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn test_signing_key_matches_aws_example() {
        // Key derivation example from the AWS Signature V4 documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_exact_key_policy() {
        let now: jiff::Timestamp = "2024-03-01T12:00:00Z".parse().unwrap();
        let expires: jiff::Timestamp = "2024-03-02T12:00:00.250Z".parse().unwrap();
        let policy = PostPolicy::new("photos", KeyCondition::Exact("cat.png".into()), expires)
            .with_content_type("image/png");

        let fields = sign_post_policy(&policy, &creds(), now).unwrap();
        assert_eq!(fields["bucket"], "photos");
        assert_eq!(fields["key"], "cat.png");
        assert_eq!(fields["Content-Type"], "image/png");
        assert_eq!(fields["x-amz-date"], "20240301T120000Z");
        assert_eq!(
            fields["x-amz-credential"],
            "AKIDEXAMPLE/20240301/us-east-1/s3/aws4_request"
        );
        assert_eq!(fields["x-amz-signature"].len(), 64);

        let document = decode_policy(&fields);
        assert_eq!(document["expiration"], "2024-03-02T12:00:00.250Z");
        let conditions = document["conditions"].as_array().unwrap();
        assert!(conditions.contains(&json!(["eq", "$key", "cat.png"])));
        assert!(conditions.contains(&json!(["eq", "$Content-Type", "image/png"])));
    }

    #[test]
    fn test_prefix_policy_and_session_token() {
        let now: jiff::Timestamp = "2024-03-01T12:00:00Z".parse().unwrap();
        let policy = PostPolicy::new("photos", KeyCondition::StartsWith("up/".into()), now);
        let creds = SigningCredentials {
            session_token: Some("token"),
            ..creds()
        };

        let fields = sign_post_policy(&policy, &creds, now).unwrap();
        assert!(!fields.contains_key("Content-Type"));
        assert_eq!(fields["x-amz-security-token"], "token");

        let document = decode_policy(&fields);
        let conditions = document["conditions"].as_array().unwrap();
        assert!(conditions.contains(&json!(["starts-with", "$key", "up/"])));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let now: jiff::Timestamp = "2024-03-01T12:00:00Z".parse().unwrap();
        let policy = PostPolicy::new("photos", KeyCondition::Exact("a".into()), now);
        let a = sign_post_policy(&policy, &creds(), now).unwrap();
        let b = sign_post_policy(&policy, &creds(), now).unwrap();
        assert_eq!(a["x-amz-signature"], b["x-amz-signature"]);
    }
}
