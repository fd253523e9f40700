//! Custom axum extractors for Chatline

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use validator::Validate;

use crate::{Error, InputRejection};

/// Header carrying the caller's identity, set by the gateway authorizer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Fallback identity header when no user id is present
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Identity used when the request carries nothing better
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Longest identifier kept as a rate-limit key
const MAX_CLIENT_ID_LENGTH: usize = 128;

/// JSON extractor that validates the deserialized value automatically.
///
/// Replaces `Json<T>` + manual `.validate()` calls in handlers.
/// Requires `T: DeserializeOwned + Validate`.
///
/// All input errors (deserialization + validation) return 400. Bodies whose
/// strings are not valid Unicode (invalid UTF-8, unpaired surrogate escapes)
/// are rejected as `invalid_encoding` input rather than as malformed JSON.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

/// Rejection type for `ValidatedJson`:
/// - JSON deserialization errors → 400 (via `Error::Validation`)
/// - Undecodable string content → 400 (via `Error::InputRejected`)
/// - Validation errors → 400 (via `Error::Validation`)
#[derive(Debug)]
pub enum ValidatedJsonRejection {
    Json(JsonRejection),
    Encoding(JsonRejection),
    Validation(Error),
}

impl ValidatedJsonRejection {
    fn from_json(rejection: JsonRejection) -> Self {
        if is_encoding_fault(&rejection) {
            ValidatedJsonRejection::Encoding(rejection)
        } else {
            ValidatedJsonRejection::Json(rejection)
        }
    }
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        match self {
            ValidatedJsonRejection::Json(e) => Error::Validation(e.body_text()).into_response(),
            ValidatedJsonRejection::Encoding(e) => {
                tracing::debug!(detail = %e.body_text(), "Undecodable request body");
                Error::InputRejected(InputRejection::InvalidEncoding).into_response()
            }
            ValidatedJsonRejection::Validation(e) => e.into_response(),
        }
    }
}

/// serde_json messages for string content that does not decode to Unicode
const ENCODING_FAULTS: &[&str] = &["unicode code point", "surrogate", "hex escape"];

/// serde_json files these under syntax errors and only names them in the
/// message text. Data errors can echo client values, so they are never checked.
fn is_encoding_fault(rejection: &JsonRejection) -> bool {
    match rejection {
        JsonRejection::JsonSyntaxError(_) => {
            let text = rejection.body_text();
            ENCODING_FAULTS.iter().any(|fault| text.contains(fault))
        }
        _ => false,
    }
}

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::from_json)?;
        value.validate().map_err(|e| {
            ValidatedJsonRejection::Validation(Error::Validation(format!(
                "Validation failed: {}",
                e
            )))
        })?;
        Ok(ValidatedJson(value))
    }
}

/// Rate-limit identity of the caller.
///
/// Resolved from `x-user-id`, then the first hop of `x-forwarded-for`,
/// then [`ANONYMOUS_CLIENT`]. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(USER_ID_HEADER)
            .or_else(|| {
                header(FORWARDED_FOR_HEADER)
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or(ANONYMOUS_CLIENT);

        ClientId(id.chars().take(MAX_CLIENT_ID_LENGTH).collect())
    }
}

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientId::from_parts(parts))
    }
}
