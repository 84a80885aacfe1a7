//! Hosted key-value store reached over its REST interface.
//!
//! Speaks the Upstash/Vercel KV dialect: `GET {url}/get/{key}` and
//! `POST {url}/set/{key}` with the value as the raw body, authenticated with a
//! bearer token. Replies are `{"result": ...}` or `{"error": "..."}`.

use async_trait::async_trait;
use log::*;
use reqwest::Url;
use serde::Deserialize;

use super::{KvStore, StorageError};

#[derive(Deserialize, Debug)]
struct Reply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct RestKvStore {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl RestKvStore {
    pub fn new(base_url: &str, token: &str) -> Result<Self, StorageError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StorageError::Backend(format!("invalid url {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::Backend(format!(
                "{} cannot be used as a base url",
                base_url
            )));
        }
        Ok(RestKvStore {
            client: reqwest::Client::new(),
            base_url,
            token: token.to_string(),
        })
    }

    /// `{base}/{command}/{key}`, with `key` percent-encoded into a single
    /// path segment.
    fn command_url(&self, command: &str, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(command).push(key);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Reply, StorageError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        parse_reply(status, &body)
    }
}

fn parse_reply(status: reqwest::StatusCode, body: &str) -> Result<Reply, StorageError> {
    let reply: Option<Reply> = serde_json::from_str(body).ok();
    match reply {
        Some(Reply {
            error: Some(err), ..
        }) => Err(StorageError::Backend(err)),
        Some(reply) if status.is_success() => Ok(reply),
        _ => Err(StorageError::Backend(format!("unexpected reply {}", status))),
    }
}

/// Maps a `get` result to the stored string. Values stored by other clients
/// may come back as JSON rather than a string; those are re-serialized.
fn result_to_value(result: Option<serde_json::Value>) -> Option<String> {
    match result {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
}

#[async_trait]
impl KvStore for RestKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let url = self.command_url("get", key);
        trace!("GET {}", url);
        let reply = self.send(self.client.get(url)).await?;
        Ok(result_to_value(reply.result))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let url = self.command_url("set", key);
        trace!("POST {}", url);
        self.send(self.client.post(url).body(value)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "kv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn command_url_strips_trailing_slash_and_encodes_key() {
        let store = RestKvStore::new("https://kv.example.com/", "t").unwrap();
        assert_eq!(
            store.command_url("get", "messages").as_str(),
            "https://kv.example.com/get/messages"
        );
        assert_eq!(
            store.command_url("set", "a b/c").as_str(),
            "https://kv.example.com/set/a%20b%2Fc"
        );
    }

    #[test]
    fn command_url_keeps_base_path() {
        let store = RestKvStore::new("https://kv.example.com/v1", "t").unwrap();
        assert_eq!(
            store.command_url("get", "messages").as_str(),
            "https://kv.example.com/v1/get/messages"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            RestKvStore::new("not a url", "t"),
            Err(StorageError::Backend(_))
        ));
        assert!(matches!(
            RestKvStore::new("mailto:kv@example.com", "t"),
            Err(StorageError::Backend(_))
        ));
    }

    #[test]
    fn null_result_means_missing_key() {
        let reply = parse_reply(StatusCode::OK, r#"{"result":null}"#).unwrap();
        assert_eq!(result_to_value(reply.result), None);
    }

    #[test]
    fn string_result_is_returned_verbatim() {
        let reply = parse_reply(StatusCode::OK, r#"{"result":"[]"}"#).unwrap();
        assert_eq!(result_to_value(reply.result).as_deref(), Some("[]"));
    }

    #[test]
    fn json_result_is_reserialized() {
        let reply = parse_reply(
            StatusCode::OK,
            r#"{"result":[{"text":"hi","timestamp":"2024-01-01T00:00:00.000Z"}]}"#,
        )
        .unwrap();
        let value = result_to_value(reply.result).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&value).unwrap();
        assert_eq!(parsed[0]["text"], "hi");
    }

    #[test]
    fn error_reply_is_backend_error() {
        let err = parse_reply(StatusCode::UNAUTHORIZED, r#"{"error":"Unauthorized"}"#)
            .unwrap_err();
        match err {
            StorageError::Backend(msg) => assert_eq!(msg, "Unauthorized"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_json_failure_is_backend_error() {
        assert!(matches!(
            parse_reply(StatusCode::BAD_GATEWAY, "<html>"),
            Err(StorageError::Backend(_))
        ));
    }
}
