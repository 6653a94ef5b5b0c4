//! AWS Signature Version 4 request signing for JSON-protocol POST/GET calls.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    /// Headers to sign besides `host` and `x-amz-date`.
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

/// Returns the headers to attach: `x-amz-date`, optionally
/// `x-amz-security-token`, and `authorization`.
pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.push(("host".to_string(), request.host.to_string()));
    headers.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token".to_string(), token.expose_secret().to_string()));
    }
    headers.sort_by(|left, right| left.0.cmp(&right.0));

    let canonical_headers: String =
        headers.iter().map(|(name, value)| format!("{name}:{value}\n")).collect();
    let signed_headers =
        headers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        request.path,
        canonical_headers,
        signed_headers,
        sha256_hex(request.payload)
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(credentials.secret_access_key.expose_secret(), &date, region, service);
    let signature = encode_hex(&hmac(&key, string_to_sign.as_bytes()));

    let mut output = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = &credentials.session_token {
        output.push(("x-amz-security-token".to_string(), token.expose_secret().to_string()));
    }
    output.push((
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    ));
    output
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let region_key = hmac(&date_key, region.as_bytes());
    let service_key = hmac(&region_key, service.as_bytes());
    hmac(&service_key, b"aws4_request")
}

fn hmac(key: &[u8], payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Sha256::digest(payload).to_vec(),
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(payload: &[u8]) -> String {
    encode_hex(Sha256::digest(payload).as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{encode_hex, sign, signing_key, Credentials, SigningRequest};

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string().into(),
            session_token: None,
        }
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    #[test]
    fn signing_key_matches_published_derivation_example() {
        let key = signing_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "20150830", "us-east-1", "iam");
        assert_eq!(
            encode_hex(&key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn get_vanilla_request_matches_published_signature() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).single().expect("valid timestamp");
        let request = SigningRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            headers: &[],
            payload: b"",
        };

        let headers = sign(&request, &example_credentials(), "us-east-1", "service", now);

        assert_eq!(header(&headers, "x-amz-date"), Some("20150830T123600Z"));
        assert_eq!(
            header(&headers, "authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;x-amz-date, \
                 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
            )
        );
    }

    #[test]
    fn session_token_is_signed_and_attached() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().expect("valid timestamp");
        let credentials = Credentials {
            session_token: Some("session-token".to_string().into()),
            ..example_credentials()
        };
        let request = SigningRequest {
            method: "POST",
            host: "athena.us-west-2.amazonaws.com",
            path: "/",
            headers: &[
                ("Content-Type", "application/x-amz-json-1.1"),
                ("X-Amz-Target", "AmazonAthena.GetQueryExecution"),
            ],
            payload: br#"{"QueryExecutionId":"abc"}"#,
        };

        let headers = sign(&request, &credentials, "us-west-2", "athena", now);
        let authorization = header(&headers, "authorization").expect("authorization header");

        assert_eq!(header(&headers, "x-amz-security-token"), Some("session-token"));
        assert!(authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target"
        ));
        assert!(authorization.contains("/20240102/us-west-2/athena/aws4_request"));
    }
}
