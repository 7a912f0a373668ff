//! Connection identity.
//!
//! Before a socket is accepted, its credential (an HS256 JWT issued by the
//! auth service) is verified and turned into an [`Identity`]. Display names
//! come from the token's `name` claim, then from the profile lookup, and
//! finally from a placeholder derived from the participant id. A failing
//! lookup never blocks the connection.

use crate::participant::{fallback_display_name, Identity};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default budget for a profile lookup.
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_secs(2);

/// Credential verification errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was supplied.
    #[error("Authentication required")]
    MissingCredential,

    /// Signature, format, or expiry check failed.
    #[error("Invalid token: {0}")]
    InvalidCredential(#[from] jsonwebtoken::errors::Error),

    /// The token verified but names no user.
    #[error("Token carries no user id")]
    MissingSubject,
}

/// Profile lookup errors. Always recovered from.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No lookup is configured.
    #[error("Profile lookup not configured")]
    Unavailable,

    /// The request failed.
    #[error("Profile request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The profile has no usable name.
    #[error("Profile has no name")]
    NoName,

    /// The lookup took too long.
    #[error("Profile lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Resolves a participant's display name from an external profile store.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Look up the display name for `participant_id`.
    ///
    /// `credential` is the connection's own token, forwarded so the profile
    /// store can authorize the request.
    async fn display_name(
        &self,
        participant_id: &str,
        credential: &str,
    ) -> Result<String, ProfileError>;
}

/// A lookup that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProfileLookup;

#[async_trait]
impl ProfileLookup for NoProfileLookup {
    async fn display_name(&self, _: &str, _: &str) -> Result<String, ProfileError> {
        Err(ProfileError::Unavailable)
    }
}

#[derive(Debug, Deserialize)]
struct Profile {
    name: Option<String>,
}

/// Fetches `{"name": ...}` from the auth service's profile endpoint.
#[derive(Debug, Clone)]
pub struct HttpProfileLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpProfileLookup {
    /// Create a lookup against `url` (e.g. `http://auth:3001/api/auth/profile`).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ProfileLookup for HttpProfileLookup {
    async fn display_name(
        &self,
        participant_id: &str,
        credential: &str,
    ) -> Result<String, ProfileError> {
        debug!(participant = %participant_id, url = %self.url, "Fetching profile");

        let profile: Profile = self
            .client
            .get(&self.url)
            .bearer_auth(credential)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        non_blank(profile.name).ok_or(ProfileError::NoName)
    }
}

/// JWT claims accepted from the auth service.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    sub: Option<String>,
    name: Option<String>,
}

/// Verifies credentials and resolves identities.
pub struct IdentityGate {
    key: DecodingKey,
    validation: Validation,
    profiles: Arc<dyn ProfileLookup>,
    profile_timeout: Duration,
}

impl IdentityGate {
    /// Create a gate for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            profiles: Arc::new(NoProfileLookup),
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
        }
    }

    /// Use `profiles` to resolve names missing from the token.
    #[must_use]
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileLookup>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Bound the time spent in the profile lookup.
    #[must_use]
    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }

    /// Verify a credential and resolve the connection's identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is missing, malformed, expired,
    /// signed with the wrong key, or carries no user id. Profile lookup
    /// failures are not errors.
    pub async fn resolve(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;
        let participant_id =
            non_blank(claims.user_id.or(claims.sub)).ok_or(AuthError::MissingSubject)?;

        if let Some(name) = non_blank(claims.name) {
            return Ok(Identity::new(participant_id, name));
        }

        let display_name = match self.lookup(&participant_id, token).await {
            Ok(name) => name,
            Err(ProfileError::Unavailable) => fallback_display_name(&participant_id),
            Err(e) => {
                warn!(
                    participant = %participant_id,
                    error = %e,
                    "Profile lookup failed, using placeholder name"
                );
                fallback_display_name(&participant_id)
            }
        };

        Ok(Identity::new(participant_id, display_name))
    }

    async fn lookup(&self, participant_id: &str, token: &str) -> Result<String, ProfileError> {
        tokio::time::timeout(
            self.profile_timeout,
            self.profiles.display_name(participant_id, token),
        )
        .await
        .map_err(|_| ProfileError::Timeout(self.profile_timeout))?
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::{routing::get, Json, Router};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    struct FixedLookup(Result<&'static str, ()>);

    #[async_trait]
    impl ProfileLookup for FixedLookup {
        async fn display_name(&self, _: &str, _: &str) -> Result<String, ProfileError> {
            self.0.map(str::to_string).map_err(|_| ProfileError::NoName)
        }
    }

    struct SlowLookup;

    #[async_trait]
    impl ProfileLookup for SlowLookup {
        async fn display_name(&self, _: &str, _: &str) -> Result<String, ProfileError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("Too Late".to_string())
        }
    }

    /// Serve a profile endpoint on an ephemeral port, returning its base URL.
    ///
    /// `/profile` answers `{"name": "Carol"}` only to `expected_token`,
    /// `/anonymous` has no name, and `/broken` always fails.
    async fn profile_service(expected_token: String) -> String {
        let profile = move |headers: HeaderMap| {
            let authorized = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                == Some(format!("Bearer {expected_token}").as_str());
            async move {
                if authorized {
                    Ok(Json(json!({"name": "  Carol  "})))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }
        };

        let app = Router::new()
            .route("/profile", get(profile))
            .route("/anonymous", get(|| async { Json(json!({"name": null})) }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_lookup_forwards_credential() {
        let base = profile_service("good-token".to_string()).await;
        let lookup = HttpProfileLookup::new(format!("{base}/profile"));

        assert_eq!(lookup.display_name("u-1", "good-token").await.unwrap(), "Carol");
        assert!(matches!(
            lookup.display_name("u-1", "other-token").await,
            Err(ProfileError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_http_lookup_without_usable_name() {
        let base = profile_service("good-token".to_string()).await;

        let anonymous = HttpProfileLookup::new(format!("{base}/anonymous"));
        assert!(matches!(
            anonymous.display_name("u-1", "good-token").await,
            Err(ProfileError::NoName)
        ));

        let broken = HttpProfileLookup::new(format!("{base}/broken"));
        assert!(matches!(
            broken.display_name("u-1", "good-token").await,
            Err(ProfileError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_through_http_profiles() {
        let jwt = token(json!({"userId": "u-42", "exp": now() + 3600}), SECRET);
        let base = profile_service(jwt.clone()).await;

        // The connection's own token is what the profile service sees
        let gate = IdentityGate::new(SECRET)
            .with_profiles(Arc::new(HttpProfileLookup::new(format!("{base}/profile"))));
        assert_eq!(
            gate.resolve(Some(&jwt)).await.unwrap(),
            Identity::new("u-42", "Carol")
        );

        for path in ["anonymous", "broken"] {
            let gate = IdentityGate::new(SECRET)
                .with_profiles(Arc::new(HttpProfileLookup::new(format!("{base}/{path}"))));
            assert_eq!(
                gate.resolve(Some(&jwt)).await.unwrap().display_name,
                "User u-42",
                "fallback after /{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_uses_name_claim() {
        let gate = IdentityGate::new(SECRET);
        let jwt = token(
            json!({"userId": "65a1f0c2", "name": "Alice", "exp": now() + 3600}),
            SECRET,
        );

        let identity = gate.resolve(Some(&jwt)).await.unwrap();
        assert_eq!(identity, Identity::new("65a1f0c2", "Alice"));
    }

    #[tokio::test]
    async fn test_resolve_accepts_sub() {
        let gate = IdentityGate::new(SECRET);
        let jwt = token(json!({"sub": "abcdef", "exp": now() + 3600}), SECRET);

        let identity = gate.resolve(Some(&jwt)).await.unwrap();
        assert_eq!(identity, Identity::new("abcdef", "User abcd"));
    }

    #[tokio::test]
    async fn test_resolve_consults_profiles() {
        let gate = IdentityGate::new(SECRET).with_profiles(Arc::new(FixedLookup(Ok("Bob"))));
        let jwt = token(json!({"userId": "u-42", "exp": now() + 3600}), SECRET);

        assert_eq!(gate.resolve(Some(&jwt)).await.unwrap().display_name, "Bob");
    }

    #[tokio::test]
    async fn test_failed_lookup_falls_back() {
        let gate = IdentityGate::new(SECRET).with_profiles(Arc::new(FixedLookup(Err(()))));
        let jwt = token(json!({"userId": "u-42", "exp": now() + 3600}), SECRET);

        assert_eq!(gate.resolve(Some(&jwt)).await.unwrap().display_name, "User u-42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_falls_back() {
        let gate = IdentityGate::new(SECRET)
            .with_profiles(Arc::new(SlowLookup))
            .with_profile_timeout(Duration::from_millis(50));
        let jwt = token(json!({"userId": "u-42", "exp": now() + 3600}), SECRET);

        assert_eq!(gate.resolve(Some(&jwt)).await.unwrap().display_name, "User u-42");
    }

    #[tokio::test]
    async fn test_rejects_bad_credentials() {
        let gate = IdentityGate::new(SECRET);

        assert!(matches!(
            gate.resolve(None).await,
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            gate.resolve(Some("  ")).await,
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            gate.resolve(Some("not-a-jwt")).await,
            Err(AuthError::InvalidCredential(_))
        ));

        let wrong_key = token(json!({"userId": "u", "exp": now() + 3600}), "other");
        assert!(matches!(
            gate.resolve(Some(&wrong_key)).await,
            Err(AuthError::InvalidCredential(_))
        ));

        let expired = token(json!({"userId": "u", "exp": now() - 3600}), SECRET);
        assert!(matches!(
            gate.resolve(Some(&expired)).await,
            Err(AuthError::InvalidCredential(_))
        ));

        let no_exp = token(json!({"userId": "u"}), SECRET);
        assert!(matches!(
            gate.resolve(Some(&no_exp)).await,
            Err(AuthError::InvalidCredential(_))
        ));

        let no_user = token(json!({"name": "Nobody", "exp": now() + 3600}), SECRET);
        assert!(matches!(
            gate.resolve(Some(&no_user)).await,
            Err(AuthError::MissingSubject)
        ));
    }
}
