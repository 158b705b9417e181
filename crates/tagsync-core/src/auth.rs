//! Credential sign-in against the service's auth endpoints.
//!
//! Strategies are tried in order and the first one that yields a session
//! cookie wins. A strategy that errors (transport failure, bad JSON) is
//! logged and treated like one that found nothing.

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::http::{Cookie, Session};

pub const CSRF_PATH: &str = "/api/auth/csrf";
pub const SIGNIN_PATH: &str = "/api/auth/signin/credentials";
pub const CALLBACK_PATH: &str = "/api/auth/callback/credentials";
pub const UPLOAD_PATH: &str = "/api/upload";

/// Absolute endpoint URLs derived from the service base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base: String,
    pub host: String,
    pub csrf: String,
    pub signin: String,
    pub callback: String,
    pub upload: String,
}

impl Endpoints {
    pub fn new(api_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(api_url).with_context(|| format!("invalid API URL: {}", api_url))?;
        let host = parsed
            .host_str()
            .with_context(|| format!("API URL has no host: {}", api_url))?
            .to_string();
        let base = api_url.trim_end_matches('/').to_string();
        Ok(Self {
            csrf: format!("{}{}", base, CSRF_PATH),
            signin: format!("{}{}", base, SIGNIN_PATH),
            callback: format!("{}{}", base, CALLBACK_PATH),
            upload: format!("{}{}", base, UPLOAD_PATH),
            host,
            base,
        })
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque session credential (value of the marker cookie).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken(<{} bytes>)", self.0.len())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed: no strategy produced a session cookie")]
    Exhausted,
}

/// One way of turning credentials into a session cookie.
pub trait AuthStrategy {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy did not obtain a credential.
    fn attempt(
        &self,
        session: &mut Session,
        endpoints: &Endpoints,
        credentials: &Credentials,
        marker: &str,
    ) -> Result<Option<SessionToken>>;
}

#[derive(Debug, Deserialize)]
struct CsrfResponse {
    #[serde(rename = "csrfToken")]
    csrf_token: Option<String>,
}

/// CSRF token, then sign-in, then the same payload against the callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsrfFlow;

impl AuthStrategy for CsrfFlow {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn attempt(
        &self,
        session: &mut Session,
        endpoints: &Endpoints,
        credentials: &Credentials,
        marker: &str,
    ) -> Result<Option<SessionToken>> {
        let csrf = session.get(&endpoints.csrf).context("fetch CSRF token")?;
        if csrf.status != 200 {
            tracing::warn!("Failed to get CSRF token: {}", csrf.status);
            return Ok(None);
        }
        let token = match csrf.json::<CsrfResponse>().context("parse CSRF response")?.csrf_token {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::warn!("No CSRF token found in response");
                return Ok(None);
            }
        };

        let payload = [
            ("email", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
            ("redirect", "false"),
            ("csrfToken", token.as_str()),
            ("callbackUrl", endpoints.base.as_str()),
            ("json", "true"),
        ];

        let signin = session
            .post_form(&endpoints.signin, &payload, true)
            .context("sign-in request")?;
        if signin.status != 200 {
            tracing::warn!("Initial signin failed: {}", signin.status);
            return Ok(None);
        }

        let callback = session
            .post_form(&endpoints.callback, &payload, true)
            .context("callback request")?;
        if callback.status != 200 {
            tracing::warn!(
                "Authentication callback failed: {} - {}",
                callback.status,
                callback.text()
            );
            return Ok(None);
        }

        let found = session.session_token(marker)?.map(SessionToken::new);
        if found.is_none() {
            tracing::warn!("No session token found in response cookies");
        }
        Ok(found)
    }
}

/// Credentials posted straight to the callback endpoint, redirects followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCallback;

impl AuthStrategy for DirectCallback {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn attempt(
        &self,
        session: &mut Session,
        endpoints: &Endpoints,
        credentials: &Credentials,
        marker: &str,
    ) -> Result<Option<SessionToken>> {
        let payload = [
            ("email", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
            ("redirect", "false"),
            ("callbackUrl", endpoints.base.as_str()),
        ];
        let response = session
            .post_form(&endpoints.callback, &payload, true)
            .context("direct callback request")?;
        let found = session.session_token(marker)?.map(SessionToken::new);
        if found.is_none() {
            tracing::warn!("Direct authentication failed: {}", response.status);
        }
        Ok(found)
    }
}

/// CSRF flow first, then the direct callback.
pub fn default_strategies() -> Vec<Box<dyn AuthStrategy>> {
    vec![Box::new(CsrfFlow), Box::new(DirectCallback)]
}

/// Run `strategies` in order; the first credential wins.
pub fn authenticate_with(
    strategies: &[Box<dyn AuthStrategy>],
    session: &mut Session,
    endpoints: &Endpoints,
    credentials: &Credentials,
    marker: &str,
) -> Result<SessionToken, AuthError> {
    for strategy in strategies {
        match strategy.attempt(session, endpoints, credentials, marker) {
            Ok(Some(token)) => {
                tracing::info!(strategy = strategy.name(), "Authentication successful");
                return Ok(token);
            }
            Ok(None) => {
                tracing::info!(strategy = strategy.name(), "auth strategy found no session cookie");
            }
            Err(e) => {
                tracing::warn!(strategy = strategy.name(), "auth strategy failed: {:#}", e);
            }
        }
    }
    Err(AuthError::Exhausted)
}

pub fn authenticate(
    session: &mut Session,
    endpoints: &Endpoints,
    credentials: &Credentials,
    marker: &str,
) -> Result<SessionToken, AuthError> {
    authenticate_with(&default_strategies(), session, endpoints, credentials, marker)
}

/// Install an existing session token as the marker cookie for the API host.
/// Fails if the jar refuses the cookie, since every upload would then be unauthenticated.
pub fn install_token(
    session: &mut Session,
    endpoints: &Endpoints,
    marker: &str,
    token: &str,
) -> Result<SessionToken> {
    session
        .add_cookie(&Cookie::host_only(&endpoints.host, marker, token))
        .context("install session token cookie")?;
    Ok(SessionToken::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    #[test]
    fn endpoints_from_base_url() {
        let e = Endpoints::new("http://localhost:3001/").unwrap();
        assert_eq!(e.base, "http://localhost:3001");
        assert_eq!(e.host, "localhost");
        assert_eq!(e.csrf, "http://localhost:3001/api/auth/csrf");
        assert_eq!(e.signin, "http://localhost:3001/api/auth/signin/credentials");
        assert_eq!(e.callback, "http://localhost:3001/api/auth/callback/credentials");
        assert_eq!(e.upload, "http://localhost:3001/api/upload");
    }

    #[test]
    fn endpoints_reject_bad_url() {
        assert!(Endpoints::new("not a url").is_err());
        assert!(Endpoints::new("localhost:3001").is_err());
    }

    struct Scripted {
        outcome: fn() -> Result<Option<SessionToken>>,
    }

    impl AuthStrategy for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn attempt(
            &self,
            _session: &mut Session,
            _endpoints: &Endpoints,
            _credentials: &Credentials,
            _marker: &str,
        ) -> Result<Option<SessionToken>> {
            (self.outcome)()
        }
    }

    fn creds() -> Credentials {
        Credentials {
            email: "user@example.com".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn error_falls_through_to_next_strategy() {
        let strategies: Vec<Box<dyn AuthStrategy>> = vec![
            Box::new(Scripted {
                outcome: || Err(anyhow::anyhow!("connection refused")),
            }),
            Box::new(Scripted {
                outcome: || Ok(Some(SessionToken::new("tok"))),
            }),
        ];
        let mut session = Session::new(&HttpConfig::default()).unwrap();
        let endpoints = Endpoints::new("http://localhost:3001").unwrap();
        let token =
            authenticate_with(&strategies, &mut session, &endpoints, &creds(), "marker").unwrap();
        assert_eq!(token.as_str(), "tok");
    }

    #[test]
    fn all_strategies_empty_is_exhausted() {
        let strategies: Vec<Box<dyn AuthStrategy>> = vec![
            Box::new(Scripted {
                outcome: || Ok(None),
            }),
            Box::new(Scripted {
                outcome: || Ok(None),
            }),
        ];
        let mut session = Session::new(&HttpConfig::default()).unwrap();
        let endpoints = Endpoints::new("http://localhost:3001").unwrap();
        let err = authenticate_with(&strategies, &mut session, &endpoints, &creds(), "marker")
            .unwrap_err();
        assert!(matches!(err, AuthError::Exhausted));
    }

    #[test]
    fn first_success_stops_the_walk() {
        let first = Scripted {
            outcome: || Ok(Some(SessionToken::new("a"))),
        };
        let second = Scripted {
            outcome: || Ok(Some(SessionToken::new("b"))),
        };
        let strategies: Vec<Box<dyn AuthStrategy>> = vec![Box::new(first), Box::new(second)];
        let mut session = Session::new(&HttpConfig::default()).unwrap();
        let endpoints = Endpoints::new("http://localhost:3001").unwrap();
        let token =
            authenticate_with(&strategies, &mut session, &endpoints, &creds(), "marker").unwrap();
        assert_eq!(token.as_str(), "a");
    }

    #[test]
    fn install_token_sets_marker_cookie() {
        let mut session = Session::new(&HttpConfig::default()).unwrap();
        let endpoints = Endpoints::new("http://localhost:3001").unwrap();
        install_token(&mut session, &endpoints, "next-auth.session-token", "abc").unwrap();
        let cookies = session.cookies().unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain, "localhost");
        assert_eq!(
            session.session_token("next-auth.session-token").unwrap(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn install_token_refused_by_jar_is_an_error() {
        let mut session = Session::new(&HttpConfig::default()).unwrap();
        let endpoints = Endpoints::new("http://localhost:3001").unwrap();
        let err = install_token(&mut session, &endpoints, "__Secure-next-auth.session-token", "abc")
            .unwrap_err();
        assert!(err
            .downcast_ref::<crate::http::HttpError>()
            .is_some_and(|e| matches!(e, crate::http::HttpError::CookieRejected { .. })));
        assert!(session.cookies().unwrap().is_empty());
    }
}
