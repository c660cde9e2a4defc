use std::sync::Arc;
use std::time::Duration;

use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{ChatMessage, EnhanceError, EnhanceResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn build_https_client() -> EnhanceResult<HyperClient> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Ok(Client::builder().build::<_, Body>(connector))
}

/// Normalises a base URL so that endpoint paths can be appended.
pub(crate) fn sanitize_base_url(provider: &str, input: &str) -> EnhanceResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(EnhanceError::configuration(format!(
            "{provider} base URL must start with http:// or https://"
        )));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>().map_err(|err| {
        EnhanceError::configuration(format!("invalid {provider} base URL: {err}"))
    })?;
    Ok(base)
}

pub(crate) fn chat_endpoint(provider: &str, base_url: &str) -> EnhanceResult<Uri> {
    format!("{base_url}chat/completions")
        .parse::<Uri>()
        .map_err(|err| EnhanceError::configuration(format!("invalid {provider} endpoint: {err}")))
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts `choices[0].message.content` from a response body.
pub(crate) fn first_choice_content(bytes: &[u8]) -> EnhanceResult<String> {
    let response: ChatCompletionResponse = serde_json::from_slice(bytes)
        .map_err(|err| EnhanceError::invalid_response(format!("failed to decode body: {err}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| EnhanceError::invalid_response("missing choices[0].message.content"))
}

/// Connection details shared by the chat-completion backends.
pub(crate) struct ChatEndpoint<'a> {
    pub(crate) client: &'a HyperClient,
    pub(crate) provider: &'static str,
    pub(crate) endpoint: &'a Uri,
    pub(crate) api_key: &'a str,
    pub(crate) timeout: Duration,
}

/// Posts a chat completion and returns the first choice's content.
///
/// The whole exchange, including reading the body, is bounded by the
/// endpoint timeout.
pub(crate) async fn post_chat_completion(
    target: &ChatEndpoint<'_>,
    payload: &ChatCompletionRequest,
) -> EnhanceResult<String> {
    let body = serde_json::to_vec(payload).map_err(|err| {
        EnhanceError::transport(format!("failed to encode {} request: {err}", target.provider))
    })?;

    let request_id = Uuid::new_v4().to_string();
    let request = Request::post(target.endpoint.clone())
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", target.api_key))
        .header(REQUEST_ID_HEADER, request_id.as_str())
        .body(Body::from(body))
        .map_err(|err| {
            EnhanceError::transport(format!("failed to build {} request: {err}", target.provider))
        })?;

    debug!(provider = target.provider, %request_id, model = %payload.model, "posting chat completion");

    let exchange = async {
        let response = target.client.request(request).await.map_err(|err| {
            EnhanceError::transport(format!("{} request failed: {err}", target.provider))
        })?;
        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            EnhanceError::transport(format!("failed to read {} response: {err}", target.provider))
        })?;
        Ok::<_, EnhanceError>((status, bytes))
    };

    let (status, bytes) = timeout(target.timeout, exchange)
        .await
        .map_err(|_| EnhanceError::Timeout {
            after: target.timeout,
        })??;

    if !status.is_success() {
        let reason = String::from_utf8_lossy(&bytes).trim().to_owned();
        let reason = if reason.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_owned()
        } else {
            reason
        };
        return Err(EnhanceError::RequestFailed {
            status: status.as_u16(),
            reason,
        });
    }

    first_choice_content(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_requires_scheme() {
        let err = sanitize_base_url("OpenAI", "api.openai.com").expect_err("missing scheme");
        assert!(matches!(err, EnhanceError::Configuration { .. }));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = sanitize_base_url("OpenAI", "https://example.com/v1").unwrap();
        assert_eq!(base, "https://example.com/v1/");
        assert_eq!(
            chat_endpoint("OpenAI", &base).unwrap().to_string(),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn extracts_first_choice() {
        let body = br#"{"choices":[{"message":{"content":"hi"}},{"message":{"content":"no"}}]}"#;
        assert_eq!(first_choice_content(body).unwrap(), "hi");
    }

    #[test]
    fn missing_content_is_invalid() {
        let bodies: [&[u8]; 3] = [br#"{"choices":[]}"#, br#"{"choices":[{"message":{}}]}"#, b"nope"];
        for body in bodies {
            assert!(matches!(
                first_choice_content(body),
                Err(EnhanceError::InvalidResponse { .. })
            ));
        }
    }
}
