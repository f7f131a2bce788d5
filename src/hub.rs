use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::farcaster::{Cast, CastId, Embed, Hash, Parent};

pub const DEFAULT_HUB_URL: &str = "http://127.0.0.1:2281";

const CAST_ADD: &str = "MESSAGE_TYPE_CAST_ADD";
const USERNAME_DATA_TYPE: &str = "USER_DATA_TYPE_USERNAME";
const MAX_PAGE_SIZE: usize = 1000;
const MAX_REPLY_PAGES: usize = 16;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HUB_URL.to_string(),
            user_agent: format!("fargo/{}", crate::VERSION),
            timeout: Duration::from_secs(20),
            http_client: None,
        }
    }
}

pub trait HubSource: Send + Sync {
    fn casts_by_fid(&self, fid: u64, limit: usize) -> Result<Vec<Cast>>;
    fn cast_by_id(&self, id: CastId) -> Result<Cast>;
    fn casts_by_parent(&self, parent: CastId) -> Result<Vec<Cast>>;
    fn username(&self, fid: u64) -> Result<Option<String>>;
    fn fid_by_name(&self, name: &str) -> Result<u64>;
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("hub client user agent required");
        }
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            bail!("hub url required");
        }
        url::Url::parse(&base_url).with_context(|| format!("parse hub url {base_url}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout)
                .build()
                .context("build hub http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(path, query)?;
        let response = response
            .error_for_status()
            .with_context(|| format!("hub request {path}"))?;
        response
            .json()
            .with_context(|| format!("decode hub response {path}"))
    }

    fn send(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::blocking::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, ?query, "hub request");
        self.http
            .get(&url)
            .query(query)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("send hub request {path}"))
    }

    fn messages(
        &self,
        path: &str,
        query: &[(&str, String)],
        limit: usize,
        max_pages: usize,
    ) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..max_pages {
            let page_size = limit.saturating_sub(messages.len()).clamp(1, MAX_PAGE_SIZE);
            let mut params = query.to_vec();
            params.push(("pageSize", page_size.to_string()));
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }
            let page: MessagesResponse = self.get_json(path, &params)?;
            messages.extend(page.messages);
            match page.next_page_token {
                Some(token) if !token.is_empty() && messages.len() < limit => {
                    page_token = Some(token)
                }
                _ => break,
            }
        }
        messages.truncate(limit);
        Ok(messages)
    }
}

impl HubSource for Client {
    fn casts_by_fid(&self, fid: u64, limit: usize) -> Result<Vec<Cast>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = [("fid", fid.to_string()), ("reverse", "true".to_string())];
        let pages = limit.div_ceil(MAX_PAGE_SIZE);
        let messages = self.messages("/v1/castsByFid", &query, limit, pages)?;
        Ok(messages.into_iter().filter_map(Message::into_cast).collect())
    }

    fn cast_by_id(&self, id: CastId) -> Result<Cast> {
        let query = [("fid", id.fid.to_string()), ("hash", id.hash.to_hex())];
        let message: Message = self.get_json("/v1/castById", &query)?;
        match message.into_cast() {
            Some(cast) => Ok(cast),
            None => bail!("{} is not a cast", id.hash),
        }
    }

    fn casts_by_parent(&self, parent: CastId) -> Result<Vec<Cast>> {
        let query = [("fid", parent.fid.to_string()), ("hash", parent.hash.to_hex())];
        let messages = self.messages(
            "/v1/castsByParent",
            &query,
            MAX_PAGE_SIZE * MAX_REPLY_PAGES,
            MAX_REPLY_PAGES,
        )?;
        Ok(messages.into_iter().filter_map(Message::into_cast).collect())
    }

    fn username(&self, fid: u64) -> Result<Option<String>> {
        let query = [
            ("fid", fid.to_string()),
            ("user_data_type", USERNAME_DATA_TYPE.to_string()),
        ];
        let response = self.send("/v1/userDataByFid", &query)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let message: UserDataMessage = response
            .error_for_status()
            .context("hub request /v1/userDataByFid")?
            .json()
            .context("decode hub response /v1/userDataByFid")?;
        Ok(message.username())
    }

    fn fid_by_name(&self, name: &str) -> Result<u64> {
        let name = name.trim().trim_start_matches('@');
        let query = [("name", name.to_string())];
        let response = self.send("/v1/userNameProofByName", &query)?;
        if response.status() == StatusCode::NOT_FOUND {
            bail!("unknown fname @{name}");
        }
        let proof: UserNameProof = response
            .error_for_status()
            .context("hub request /v1/userNameProofByName")?
            .json()
            .context("decode hub response /v1/userNameProofByName")?;
        Ok(proof.fid)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub data: Option<MessageData>,
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(rename = "type")]
    pub message_type: String,
    pub fid: u64,
    #[serde(default)]
    pub timestamp: u32,
    #[serde(default)]
    pub cast_add_body: Option<CastAddBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastAddBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mentions: Vec<u64>,
    #[serde(default)]
    pub mentions_positions: Vec<u32>,
    #[serde(default)]
    pub embeds: Vec<WireEmbed>,
    #[serde(default)]
    pub parent_cast_id: Option<WireCastId>,
    #[serde(default)]
    pub parent_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCastId {
    pub fid: u64,
    pub hash: String,
}

impl WireCastId {
    fn parse(&self) -> Option<CastId> {
        match self.hash.parse::<Hash>() {
            Ok(hash) => Some(CastId::new(self.fid, hash)),
            Err(err) => {
                tracing::debug!(hash = %self.hash, error = %err, "skipping malformed cast id");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEmbed {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cast_id: Option<WireCastId>,
}

impl Message {
    pub fn into_cast(self) -> Option<Cast> {
        let data = self.data?;
        if data.message_type != CAST_ADD {
            return None;
        }
        let body = data.cast_add_body?;
        let hash = match self.hash.parse::<Hash>() {
            Ok(hash) => hash,
            Err(err) => {
                tracing::debug!(hash = %self.hash, error = %err, "skipping cast with bad hash");
                return None;
            }
        };

        let embeds = body
            .embeds
            .iter()
            .filter_map(|embed| match (&embed.cast_id, &embed.url) {
                (Some(id), _) => id.parse().map(Embed::Cast),
                (None, Some(url)) if !url.is_empty() => Some(Embed::Url(url.clone())),
                _ => None,
            })
            .collect();
        let parent = match (&body.parent_cast_id, body.parent_url) {
            (Some(id), _) => id.parse().map(Parent::Cast),
            (None, Some(url)) if !url.is_empty() => Some(Parent::Url(url)),
            _ => None,
        };

        Some(Cast {
            id: CastId::new(data.fid, hash),
            timestamp: data.timestamp,
            text: body.text,
            mentions: body.mentions,
            mentions_positions: body.mentions_positions,
            embeds,
            parent,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataMessage {
    #[serde(default)]
    pub data: Option<UserData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub user_data_body: Option<UserDataBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDataBody {
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub value: String,
}

impl UserDataMessage {
    pub fn username(self) -> Option<String> {
        let body = self.data?.user_data_body?;
        if !body.data_type.is_empty() && body.data_type != USERNAME_DATA_TYPE {
            return None;
        }
        let value = body.value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserNameProof {
    pub fid: u64,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAST_JSON: &str = r#"{
      "data": {
        "type": "MESSAGE_TYPE_CAST_ADD",
        "fid": 2,
        "timestamp": 48994466,
        "network": "FARCASTER_NETWORK_MAINNET",
        "castAddBody": {
          "embedsDeprecated": [],
          "mentions": [3],
          "parentCastId": {
            "fid": 226,
            "hash": "0xa48dd46161d8e57725f5e26e34ec19c13ff7f3b9"
          },
          "text": "hi  there",
          "mentionsPositions": [3],
          "embeds": [
            {"url": "https://example.com/a"},
            {"castId": {"fid": 5, "hash": "0x0101010101010101010101010101010101010101"}},
            {}
          ]
        }
      },
      "hash": "0xd2b1ddc6c88e865a33cb1a565e0058d757042974",
      "hashScheme": "HASH_SCHEME_BLAKE3",
      "signature": "aGVsbG8=",
      "signatureScheme": "SIGNATURE_SCHEME_ED25519",
      "signer": "0x78ff9a768cf1678be3e9be4a77d6f3b4"
    }"#;

    #[test]
    fn cast_add_message_converts() {
        let message: Message = serde_json::from_str(CAST_JSON).unwrap();
        let cast = message.into_cast().unwrap();
        assert_eq!(cast.id.fid, 2);
        assert_eq!(
            cast.id.hash.to_hex(),
            "0xd2b1ddc6c88e865a33cb1a565e0058d757042974"
        );
        assert_eq!(cast.timestamp, 48_994_466);
        assert_eq!(cast.mentions, vec![3]);
        assert_eq!(cast.mentions_positions, vec![3]);
        assert_eq!(cast.embeds.len(), 2);
        assert_eq!(cast.embeds[0], Embed::Url("https://example.com/a".into()));
        assert!(matches!(cast.embeds[1], Embed::Cast(id) if id.fid == 5));
        assert_eq!(cast.parent_cast().map(|id| id.fid), Some(226));
    }

    #[test]
    fn other_message_types_are_skipped() {
        let json = r#"{
          "data": {"type": "MESSAGE_TYPE_REACTION_ADD", "fid": 2, "timestamp": 1},
          "hash": "0xd2b1ddc6c88e865a33cb1a565e0058d757042974"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert!(message.into_cast().is_none());
    }

    #[test]
    fn parent_url_is_kept_when_no_parent_cast() {
        let json = r#"{
          "messages": [{
            "data": {
              "type": "MESSAGE_TYPE_CAST_ADD", "fid": 9, "timestamp": 5,
              "castAddBody": {"text": "gm", "parentUrl": "https://warpcast.com/~/channel/gm"}
            },
            "hash": "0x0202020202020202020202020202020202020202"
          }],
          "nextPageToken": ""
        }"#;
        let page: MessagesResponse = serde_json::from_str(json).unwrap();
        let cast = page.messages.into_iter().next().unwrap().into_cast().unwrap();
        assert_eq!(
            cast.parent,
            Some(Parent::Url("https://warpcast.com/~/channel/gm".into()))
        );
        assert!(cast.embeds.is_empty());
    }

    #[test]
    fn username_is_read_from_user_data_body() {
        let json = r#"{
          "data": {
            "type": "MESSAGE_TYPE_USER_DATA_ADD", "fid": 6833, "timestamp": 83433831,
            "userDataBody": {"type": "USER_DATA_TYPE_USERNAME", "value": "alice"}
          },
          "hash": "0x327b8f47218c369ae01cc453cc23efc79f10181f"
        }"#;
        let message: UserDataMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.username(), Some("alice".to_string()));
    }

    #[test]
    fn client_requires_user_agent_and_valid_url() {
        let empty_agent = ClientConfig {
            user_agent: " ".into(),
            ..ClientConfig::default()
        };
        assert!(Client::new(empty_agent).is_err());
        let bad_url = ClientConfig {
            base_url: "not a url".into(),
            ..ClientConfig::default()
        };
        assert!(Client::new(bad_url).is_err());
        let client = Client::new(ClientConfig {
            base_url: "http://hub.example:2281/".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://hub.example:2281");
    }
}
