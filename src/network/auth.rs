use crate::config::Secret;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;

// * How a client authenticates against its integration.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    Anonymous,
    Basic { username: String, password: Secret },
    Bearer(Secret),
}

impl Credentials {
    // * Bearer token wins; basic auth needs both halves; otherwise anonymous.
    pub fn from_parts(
        token: Option<&Secret>,
        username: Option<&str>,
        password: Option<&Secret>,
    ) -> Self {
        match (token, username, password) {
            (Some(token), _, _) => Credentials::Bearer(token.clone()),
            (None, Some(username), Some(password)) => Credentials::Basic {
                username: username.to_string(),
                password: password.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }

    // * Short label for logs; never includes the secret.
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::Basic { .. } => "basic",
            Credentials::Bearer(_) => "bearer",
        }
    }

    // * Attaches the Authorization header to an outgoing request.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Anonymous => request,
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose()))
            }
            Credentials::Bearer(token) => request.bearer_auth(token.expose()),
        }
    }
}

// * Every integration speaks JSON.
pub fn apply_json_headers(headers: &mut HeaderMap) {
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
}
