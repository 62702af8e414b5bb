use uuid::Uuid;

use crate::services::ingest::IngestError;
use crate::utils::auth::validate_jwt;

/// Turns a bearer credential into the id of the subject it was issued to
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, credential: &str) -> Result<Uuid, IngestError>;
}

pub struct JwtIdentityProvider {
    secret: String,
}

impl JwtIdentityProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn authenticate(&self, credential: &str) -> Result<Uuid, IngestError> {
        let claims = validate_jwt(credential, &self.secret)
            .map_err(|e| IngestError::Unauthenticated(format!("Couldn't validate JWT: {}", e)))?;

        Uuid::parse_str(&claims.sub)
            .map_err(|_| IngestError::Unauthenticated("Invalid subject in token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::auth::create_jwt;
    use chrono::Duration;

    #[test]
    fn test_authenticate_returns_subject() {
        let user_id = Uuid::new_v4();
        let token = create_jwt(&user_id.to_string(), "s3cret", Duration::minutes(5)).unwrap();
        let provider = JwtIdentityProvider::new("s3cret");
        assert_eq!(provider.authenticate(&token).unwrap(), user_id);
    }

    #[test]
    fn test_non_uuid_subject_is_unauthenticated() {
        let token = create_jwt("alice", "s3cret", Duration::minutes(5)).unwrap();
        let provider = JwtIdentityProvider::new("s3cret");
        assert!(matches!(
            provider.authenticate(&token),
            Err(IngestError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_garbage_credential_is_unauthenticated() {
        let provider = JwtIdentityProvider::new("s3cret");
        assert!(matches!(
            provider.authenticate("not-a-jwt"),
            Err(IngestError::Unauthenticated(_))
        ));
    }
}
