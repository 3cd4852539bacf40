//! OAuth2 user authentication for Google APIs.
//!
//! The first run walks the operator through the authorization-code flow and
//! persists the resulting tokens. Later runs reuse the saved tokens and
//! refresh them when they are about to expire.

use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{DriveError, Result};
use crate::models::{ClientSecrets, ClientSecretsFile};

/// Google Drive API scope.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens closer than this to expiry are treated as expired.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Load the application's client secrets file.
pub fn load_client_secrets<P: AsRef<Path>>(path: P) -> Result<ClientSecrets> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| DriveError::CredentialsFileError {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ClientSecretsFile = serde_json::from_str(&content)?;
    file.installed
        .or(file.web)
        .ok_or(DriveError::MissingClientSection)
}

/// OAuth2 tokens with expiration tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now() + Duration::minutes(EXPIRY_MARGIN_MINUTES)
    }
}

/// Token file on local disk.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved tokens. `Ok(None)` means no token file exists yet.
    pub fn load(&self) -> Result<Option<Tokens>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tokens = serde_json::from_str(&content)?;
        Ok(Some(tokens))
    }

    /// Write tokens, readable by the owner only.
    pub fn save(&self, tokens: &Tokens) -> Result<()> {
        info!("Saving credential file to: {}", self.path.display());

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&self.path)?;

        // mode() only applies on creation
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        serde_json::to_writer_pretty(&file, tokens)?;
        Ok(())
    }
}

/// Authorization-code flow against the endpoints named in the client secrets.
pub struct OAuthFlow {
    client: OAuthClient,
    http: Client,
}

impl OAuthFlow {
    pub fn new(secrets: &ClientSecrets) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(secrets.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(secrets.auth_uri.clone()).map_err(|e| {
                DriveError::AuthenticationError(format!("Invalid auth URL: {}", e))
            })?)
            .set_token_uri(TokenUrl::new(secrets.token_uri.clone()).map_err(|e| {
                DriveError::AuthenticationError(format!("Invalid token URL: {}", e))
            })?)
            .set_redirect_uri(
                RedirectUrl::new(secrets.redirect_uri().to_string()).map_err(|e| {
                    DriveError::AuthenticationError(format!("Invalid redirect URL: {}", e))
                })?,
            );

        // oauth2 expects a client that does not follow redirects
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, http })
    }

    /// URL the operator opens in a browser, plus the CSRF state value.
    pub fn authorization_url(&self) -> (String, String) {
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Tokens> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| DriveError::AuthenticationError(format!("Token exchange failed: {}", e)))?;

        let refresh_token = token_result
            .refresh_token()
            .ok_or_else(|| {
                DriveError::AuthenticationError(
                    "No refresh token received. Ensure offline access was requested.".to_string(),
                )
            })?
            .secret()
            .clone();

        Ok(Tokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: expiry_from(token_result.expires_in()),
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

        // Google usually omits the refresh token on refresh
        let refresh_token = token_result
            .refresh_token()
            .map(|t| t.secret().clone())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(Tokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: expiry_from(token_result.expires_in()),
        })
    }
}

fn expiry_from(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    let expires_in = expires_in.unwrap_or_else(|| std::time::Duration::from_secs(3600));
    Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1))
}

/// Pull the authorization code out of what the operator pasted.
///
/// Accepts either the bare code or the full redirect URL carrying a
/// `code` query parameter.
pub fn parse_authorization_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let url = oauth2::url::Url::parse(trimmed).ok()?;
        return url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned());
    }

    Some(trimmed.to_string())
}

/// Supplies valid access tokens, refreshing and persisting as needed.
#[derive(Clone)]
pub struct Authenticator {
    flow: Arc<OAuthFlow>,
    store: Arc<TokenStore>,
    tokens: Arc<RwLock<Tokens>>,
}

impl Authenticator {
    /// Load saved tokens or run the interactive flow, reading the
    /// authorization code from `input`.
    pub async fn obtain<R: BufRead>(
        secrets: &ClientSecrets,
        store: TokenStore,
        input: &mut R,
    ) -> Result<Self> {
        let flow = OAuthFlow::new(secrets)?;

        let tokens = match store.load() {
            Ok(Some(tokens)) if !tokens.is_expired() => tokens,
            Ok(Some(tokens)) => match flow.refresh(&tokens.refresh_token).await {
                Ok(fresh) => {
                    store.save(&fresh)?;
                    fresh
                }
                Err(e) => {
                    warn!("Saved token could not be refreshed ({}), re-authorizing", e);
                    authorize_interactively(&flow, &store, input).await?
                }
            },
            Ok(None) => authorize_interactively(&flow, &store, input).await?,
            Err(e) => {
                warn!(
                    "Saved token at {} is unreadable ({}), re-authorizing",
                    store.path().display(),
                    e
                );
                authorize_interactively(&flow, &store, input).await?
            }
        };

        Ok(Self::from_parts(flow, store, tokens))
    }

    /// Build an authenticator around tokens that are already known.
    pub fn with_tokens(secrets: &ClientSecrets, store: TokenStore, tokens: Tokens) -> Result<Self> {
        Ok(Self::from_parts(OAuthFlow::new(secrets)?, store, tokens))
    }

    fn from_parts(flow: OAuthFlow, store: TokenStore, tokens: Tokens) -> Self {
        Self {
            flow: Arc::new(flow),
            store: Arc::new(store),
            tokens: Arc::new(RwLock::new(tokens)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let tokens = self.tokens.read().await;
            if !tokens.is_expired() {
                return Ok(tokens.access_token.clone());
            }
        }

        let mut tokens = self.tokens.write().await;
        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        info!("Refreshing expired access token");
        let fresh = self.flow.refresh(&tokens.refresh_token).await?;
        self.store.save(&fresh)?;
        *tokens = fresh;

        Ok(tokens.access_token.clone())
    }
}

async fn authorize_interactively<R: BufRead>(
    flow: &OAuthFlow,
    store: &TokenStore,
    input: &mut R,
) -> Result<Tokens> {
    let (auth_url, _state) = flow.authorization_url();
    println!(
        "Go to the following link in your browser then type the authorization code: \n{}",
        auth_url
    );

    let mut line = String::new();
    input.read_line(&mut line).map_err(|e| {
        DriveError::AuthenticationError(format!("Unable to read authorization code: {}", e))
    })?;
    let code = parse_authorization_code(&line).ok_or_else(|| {
        DriveError::AuthenticationError("No authorization code entered".to_string())
    })?;

    let tokens = flow.exchange_code(&code).await?;
    store.save(&tokens)?;
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "test_id".to_string(),
            client_secret: "test_secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uris: vec!["http://localhost".to_string()],
        }
    }

    #[test]
    fn test_tokens_expiration() {
        let expired = Tokens {
            access_token: "test".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        assert!(expired.is_expired());

        let valid = Tokens {
            expires_at: Utc::now() + Duration::hours(1),
            ..expired.clone()
        };
        assert!(!valid.is_expired());

        let nearly = Tokens {
            expires_at: Utc::now() + Duration::minutes(4),
            ..expired
        };
        assert!(nearly.is_expired());
    }

    #[test]
    fn test_authorization_url_generation() {
        let flow = OAuthFlow::new(&secrets()).unwrap();
        let (url, csrf_token) = flow.authorization_url();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth"));
        assert!(url.contains("client_id=test_id"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("scope="));
        assert!(!csrf_token.is_empty());
    }

    #[test]
    fn test_parse_authorization_code() {
        assert_eq!(parse_authorization_code("4/abc\n"), Some("4/abc".to_string()));
        assert_eq!(
            parse_authorization_code("http://localhost/?state=x&code=4%2Fabc&scope=s"),
            Some("4/abc".to_string())
        );
        assert_eq!(parse_authorization_code("http://localhost/?state=x"), None);
        assert_eq!(parse_authorization_code("  \n"), None);
    }

    #[test]
    fn test_invalid_token_url_rejected() {
        let mut bad = secrets();
        bad.token_uri = "not a url".to_string();
        assert!(OAuthFlow::new(&bad).is_err());
    }
}
