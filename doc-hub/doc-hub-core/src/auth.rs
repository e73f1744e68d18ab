use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub teams: Vec<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;
}

pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: String) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}

/// Rejects every token; used when no signing secret is configured.
pub struct DenyAll;

#[async_trait]
impl TokenVerifier for DenyAll {
    async fn verify(&self, _token: &str) -> Option<Claims> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn hs256_roundtrip_keeps_teams() {
        let claims = Claims {
            sub: "alice".into(),
            teams: vec!["ops".into()],
        };
        let verifier = Hs256Verifier::new("secret".into());
        let verified = verifier.verify(&token("secret", &claims)).await.unwrap();
        assert_eq!(verified.sub, "alice");
        assert_eq!(verified.teams, vec!["ops".to_string()]);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let claims = Claims {
            sub: "alice".into(),
            teams: Vec::new(),
        };
        let verifier = Hs256Verifier::new("secret".into());
        assert!(verifier.verify(&token("other", &claims)).await.is_none());
        assert!(DenyAll.verify(&token("secret", &claims)).await.is_none());
    }
}
