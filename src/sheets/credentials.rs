use anyhow::{anyhow, Context, Result};
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ring::signature::RsaKeyPair;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read-only access to spreadsheets; nothing is ever written back.
const SHEETS_READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The fields of a service account JSON key that the token exchange needs.
#[derive(Debug, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: u64,
    iat: u64,
}

#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

impl ServiceAccount {
    pub fn try_from_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("Failed to deserialize service account key")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file at {}", path.display()))?;
        Self::try_from_str(&content)
            .with_context(|| format!("Invalid credentials file at {}", path.display()))
    }

    fn claims(&self, now: DateTime<Utc>) -> JwtClaims<'_> {
        JwtClaims {
            iss: &self.client_email,
            scope: SHEETS_READ_ONLY_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp() as u64,
            exp: (now + Duration::hours(1)).timestamp() as u64,
        }
    }

    /// Header and claims, base64url encoded and joined by '.'.
    fn signing_input(&self, now: DateTime<Utc>) -> Result<String> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
        };
        let header_b64 = BASE64_URL_SAFE_NO_PAD
            .encode(serde_json::to_string(&header).context("Failed to encode jwt header")?);
        let claims_b64 = BASE64_URL_SAFE_NO_PAD.encode(
            serde_json::to_string(&self.claims(now)).context("Failed to encode jwt claims")?,
        );
        Ok(format!("{}.{}", header_b64, claims_b64))
    }

    fn key_pair(&self) -> Result<RsaKeyPair> {
        let mut reader = std::io::Cursor::new(self.private_key.as_bytes());
        let key = rustls_pemfile::read_one(&mut reader).context("Invalid PEM private key")?;
        match key {
            Some(rustls_pemfile::Item::Pkcs8Key(der)) => RsaKeyPair::from_pkcs8(der.secret_pkcs8_der())
                .map_err(|e| anyhow!("Failed to create RSA key pair from PKCS#8 key: {}", e)),
            Some(rustls_pemfile::Item::Pkcs1Key(der)) => RsaKeyPair::from_der(der.secret_pkcs1_der())
                .map_err(|e| anyhow!("Failed to create RSA key pair from PKCS#1 key: {}", e)),
            _ => Err(anyhow!("Service account key has no RSA private key")),
        }
    }

    /// Build a signed RS256 assertion valid for one hour from `now`.
    pub fn signed_jwt(&self, now: DateTime<Utc>) -> Result<String> {
        let key_pair = self.key_pair()?;
        let signing_input = self.signing_input(now)?;

        let mut signature = vec![0; key_pair.public().modulus_len()];
        key_pair
            .sign(
                &ring::signature::RSA_PKCS1_SHA256,
                &ring::rand::SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| anyhow!("Failed to sign jwt"))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            BASE64_URL_SAFE_NO_PAD.encode(&signature)
        ))
    }

    /// Exchange a signed assertion for a bearer access token.
    pub async fn fetch_access_token(&self, client: &reqwest::Client) -> Result<AccessToken> {
        let jwt = self.signed_jwt(Utc::now())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())];

        let response = client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .context("Failed to reach the Google token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Token exchange rejected ({}). Check the service account key. {}",
                status,
                body.trim()
            );
        }

        response
            .json::<AccessToken>()
            .await
            .context("Failed to parse access token response")
    }
}
