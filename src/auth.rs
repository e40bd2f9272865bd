use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;

use crate::config::AuthConfig;

const AUTH_FILE_NAME: &str = "auth.json";
const ACCOUNT_CLAIM_NAMESPACE: &str = "https://api.openai.com/auth";
const ACCOUNT_CLAIM: &str = "chatgpt_account_id";

/// Upstream bearer token plus the account it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub account_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Source of upstream credentials. `None` means "not signed in".
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Option<Credentials>;
}

/// Fixed credentials from config (and tests).
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Option<Credentials>);

impl StaticCredentials {
    #[must_use]
    pub fn new(access_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self(Some(Credentials {
            access_token: access_token.into(),
            account_id: account_id.into(),
        }))
    }

    #[must_use]
    pub fn absent() -> Self {
        Self(None)
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthFile {
    #[serde(default)]
    tokens: Option<AuthTokens>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// Reads the first parseable `auth.json` out of a list of home directories
/// on every call, so a fresh sign-in is picked up without a restart.
#[derive(Debug, Clone)]
pub struct AuthFileCredentials {
    search_dirs: Vec<PathBuf>,
}

impl AuthFileCredentials {
    #[must_use]
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// `$CHATGPT_LOCAL_HOME`, `$CODEX_HOME`, `~/.chatgpt-local`, `~/.codex`.
    #[must_use]
    pub fn default_search_dirs() -> Vec<PathBuf> {
        Self::search_dirs_from(
            |var| std::env::var_os(var).map(PathBuf::from),
            dirs::home_dir(),
        )
    }

    fn search_dirs_from(
        env: impl Fn(&str) -> Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Vec<PathBuf> {
        let mut search_dirs = Vec::with_capacity(4);
        for var in ["CHATGPT_LOCAL_HOME", "CODEX_HOME"] {
            if let Some(dir) = env(var).filter(|dir| !dir.as_os_str().is_empty()) {
                search_dirs.push(dir);
            }
        }
        if let Some(home) = home {
            search_dirs.push(home.join(".chatgpt-local"));
            search_dirs.push(home.join(".codex"));
        }
        search_dirs
    }

    #[must_use]
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    async fn read_first(&self) -> Option<AuthFile> {
        for dir in &self.search_dirs {
            let path = dir.join(AUTH_FILE_NAME);
            match read_auth_file(&path).await {
                Some(file) => return Some(file),
                None => continue,
            }
        }
        None
    }
}

async fn read_auth_file(path: &Path) -> Option<AuthFile> {
    let raw = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(file) => Some(file),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "skipping unparsable auth file");
            None
        }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for AuthFileCredentials {
    async fn credentials(&self) -> Option<Credentials> {
        let tokens = self.read_first().await?.tokens?;
        let access_token = tokens.access_token.filter(|t| !t.is_empty())?;
        let account_id = tokens
            .account_id
            .filter(|a| !a.is_empty())
            .or_else(|| tokens.id_token.as_deref().and_then(account_id_from_id_token))?;
        Some(Credentials {
            access_token,
            account_id,
        })
    }
}

/// Decode the payload segment of a JWT without verifying it.
#[must_use]
pub fn parse_jwt_claims(token: &str) -> Option<Value> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&decoded).ok()
}

fn account_id_from_id_token(id_token: &str) -> Option<String> {
    let claims = parse_jwt_claims(id_token)?;
    claims
        .get(ACCOUNT_CLAIM_NAMESPACE)?
        .get(ACCOUNT_CLAIM)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pick the provider the config asks for.
#[must_use]
pub fn provider_from_config(auth: &AuthConfig) -> Box<dyn CredentialProvider> {
    if let (Some(token), Some(account)) = (&auth.access_token, &auth.account_id) {
        if !token.trim().is_empty() && !account.trim().is_empty() {
            return Box::new(StaticCredentials::new(token.trim(), account.trim()));
        }
    }
    let search_dirs = if auth.home_dirs.is_empty() {
        AuthFileCredentials::default_search_dirs()
    } else {
        auth.home_dirs.iter().map(PathBuf::from).collect()
    };
    Box::new(AuthFileCredentials::new(search_dirs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(claims: &Value) -> String {
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("eyJhbGciOiJub25lIn0.{payload}.sig")
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chatgate-auth-{tag}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_search_dirs_order_and_home_fallback() {
        let env = |var: &str| match var {
            "CHATGPT_LOCAL_HOME" => Some(PathBuf::from("/srv/chatgpt")),
            "CODEX_HOME" => Some(PathBuf::new()),
            _ => None,
        };
        let dirs = AuthFileCredentials::search_dirs_from(env, Some(PathBuf::from("/home/u")));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/srv/chatgpt"),
                PathBuf::from("/home/u/.chatgpt-local"),
                PathBuf::from("/home/u/.codex"),
            ]
        );
        assert!(AuthFileCredentials::search_dirs_from(|_| None, None).is_empty());
    }

    #[test]
    fn test_default_search_dirs_use_home_dir() {
        let search_dirs = AuthFileCredentials::default_search_dirs();
        if let Some(home) = dirs::home_dir() {
            assert!(search_dirs.contains(&home.join(".codex")));
        }
    }

    #[test]
    fn test_jwt_claims() {
        let token = jwt(&json!({"sub": "u"}));
        assert_eq!(parse_jwt_claims(&token), Some(json!({"sub": "u"})));
        assert!(parse_jwt_claims("not-a-jwt").is_none());
        assert!(parse_jwt_claims("a.b.c.d").is_none());
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let creds = StaticCredentials::new("tok", "acct").credentials().await.unwrap();
        assert_eq!(creds.account_id, "acct");
        assert!(StaticCredentials::absent().credentials().await.is_none());
        assert!(!format!("{creds:?}").contains("tok"));
    }

    #[tokio::test]
    async fn test_auth_file_derives_account_from_id_token() {
        let empty = temp_dir("empty");
        let bad = temp_dir("bad");
        std::fs::write(bad.join(AUTH_FILE_NAME), "{not json").unwrap();
        let good = temp_dir("good");
        let id_token = jwt(&json!({ACCOUNT_CLAIM_NAMESPACE: {ACCOUNT_CLAIM: "acct-9"}}));
        std::fs::write(
            good.join(AUTH_FILE_NAME),
            json!({"tokens": {"access_token": "tok", "id_token": id_token}}).to_string(),
        )
        .unwrap();

        let provider = AuthFileCredentials::new(vec![empty, bad, good]);
        let creds = provider.credentials().await.unwrap();
        assert_eq!(creds.access_token, "tok");
        assert_eq!(creds.account_id, "acct-9");
    }

    #[tokio::test]
    async fn test_auth_file_without_account_is_absent() {
        let dir = temp_dir("noacct");
        std::fs::write(
            dir.join(AUTH_FILE_NAME),
            json!({"tokens": {"access_token": "tok"}}).to_string(),
        )
        .unwrap();
        assert!(AuthFileCredentials::new(vec![dir]).credentials().await.is_none());
    }

    #[test]
    fn test_provider_from_config_prefers_static_pair() {
        let auth = AuthConfig {
            access_token: Some("tok".into()),
            account_id: Some("acct".into()),
            home_dirs: Vec::new(),
        };
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let creds = rt.block_on(provider_from_config(&auth).credentials());
        assert_eq!(creds.map(|c| c.account_id).as_deref(), Some("acct"));
    }
}
