//! Cookie-authenticated client for the Bilibili web API.
//!
//! Every endpoint answers with a `{code, message, data}` envelope; a non-zero
//! `code` is surfaced as [`PlatformError::Api`] unless it has a more specific
//! meaning. Each request carries the cookie of the account it acts for, so
//! one client serves every account.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Platform, Profile};
use crate::error::PlatformError;
use crate::model::{
    Account, InboundMessage, MessageCategory, Target, TargetContext, TargetKind,
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

const CODE_NOT_LOGGED_IN: i64 = -101;
const CODE_CAPTCHA: i64 = 12015;

const RELATION_FOLLOWING: i64 = 2;
const RELATION_MUTUAL: i64 = 6;
const RELATION_BLACKLISTED: i64 = 128;

/// Dynamics default to this comment-area type when the detail omits it.
const DYNAMIC_COMMENT_TYPE: u32 = 11;
const VIDEO_COMMENT_TYPE: u32 = 1;

/// Base URLs of the two API hosts.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api: String,
    pub vc: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: "https://api.bilibili.com".to_string(),
            vc: "https://api.vc.bilibili.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Both hosts served from one base. Used with mock servers.
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            api: base.clone(),
            vc: base,
        }
    }
}

/// What the platform says about a target, cached per run.
#[derive(Debug, Clone, Default)]
struct Detail {
    author_uid: Option<u64>,
    author_name: Option<String>,
    text: String,
    comment_oid: Option<u64>,
    comment_type: u32,
    aid: Option<u64>,
}

pub struct BilibiliClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    details: Mutex<HashMap<String, Detail>>,
    uids: Mutex<HashMap<String, u64>>,
}

impl BilibiliClient {
    pub fn new(timeout: Duration) -> Result<Self, PlatformError> {
        Self::with_endpoints(Endpoints::default(), timeout)
    }

    pub fn with_endpoints(endpoints: Endpoints, timeout: Duration) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("https://www.bilibili.com/"));
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://www.bilibili.com"));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoints,
            details: Mutex::new(HashMap::new()),
            uids: Mutex::new(HashMap::new()),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api, path)
    }

    fn vc(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.vc, path)
    }

    /// Send with the account's cookie and unwrap the envelope's `data`.
    async fn call(
        &self,
        account: &Account,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<Value, PlatformError> {
        let resp = request
            .header(header::COOKIE, account.credential.as_str())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PlatformError::Http {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        let envelope: Envelope = resp.json().await.map_err(|e| PlatformError::Decode {
            context: context.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(account = %account.remark, context, code = envelope.code, "api response");
        check_code(envelope.code, envelope.message)?;
        Ok(envelope.data)
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        account: &Account,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, PlatformError> {
        let data = self.call(account, request, context).await?;
        serde_json::from_value(data).map_err(|e| PlatformError::Decode {
            context: context.to_string(),
            reason: e.to_string(),
        })
    }

    async fn detail(&self, account: &Account, target: &Target) -> Result<Detail, PlatformError> {
        let cached = lock(&self.details).get(&target.canonical_url).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let detail = match target.kind {
            TargetKind::Dynamic => self.dynamic_detail(account, &target.id).await?,
            TargetKind::Video => self.video_detail(account, &target.id).await?,
        };
        lock(&self.details).insert(target.canonical_url.clone(), detail.clone());
        Ok(detail)
    }

    async fn dynamic_detail(&self, account: &Account, id: &str) -> Result<Detail, PlatformError> {
        let request = self
            .http
            .get(self.api("/x/polymer/web-dynamic/desktop/v1/detail"))
            .query(&[("id", id)]);
        let data: DynamicDetailData = self.call_as(account, request, "dynamic detail").await?;

        let mut detail = Detail {
            comment_type: DYNAMIC_COMMENT_TYPE,
            ..Detail::default()
        };
        for module in data.item.modules {
            if let Some(author) = module.module_author {
                detail.author_uid = lenient_u64(&author.user.mid);
                detail.author_name = author.user.name;
            }
            if let Some(desc) = module.module_desc {
                for node in desc.rich_text_nodes {
                    let text = node.text.or(node.orig_text).unwrap_or_default();
                    detail.text.push_str(&text);
                }
            }
            if let Some(stat) = module.module_stat {
                detail.comment_oid = lenient_u64(&stat.comment.comment_id);
                if let Some(kind) = lenient_u64(&stat.comment.comment_type) {
                    detail.comment_type = kind as u32;
                }
            }
            if let Some(dynamic) = module.module_dynamic
                && let Some(archive) = dynamic.dyn_archive
            {
                detail.aid = lenient_u64(&archive.aid);
            }
        }
        Ok(detail)
    }

    async fn video_detail(&self, account: &Account, id: &str) -> Result<Detail, PlatformError> {
        let request = self.http.get(self.api("/x/web-interface/view"));
        let request = match id.strip_prefix("av") {
            Some(aid) => request.query(&[("aid", aid)]),
            None => request.query(&[("bvid", id)]),
        };
        let data: VideoDetailData = self.call_as(account, request, "video detail").await?;
        Ok(Detail {
            author_uid: Some(data.owner.mid),
            author_name: Some(data.owner.name),
            text: format!("{}\n{}", data.title, data.desc).trim().to_string(),
            comment_oid: Some(data.aid),
            comment_type: VIDEO_COMMENT_TYPE,
            aid: Some(data.aid),
        })
    }

    async fn account_uid(&self, account: &Account) -> Result<u64, PlatformError> {
        let cached = lock(&self.uids).get(&account.remark).copied();
        if let Some(uid) = cached {
            return Ok(uid);
        }
        Ok(self.verify(account).await?.uid)
    }

    async fn list_feed(
        &self,
        account: &Account,
        category: MessageCategory,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        let (path, context) = match category {
            MessageCategory::Reply => ("/x/msgfeed/reply", "reply feed"),
            _ => ("/x/msgfeed/at", "mention feed"),
        };
        let data: FeedData = self
            .call_as(account, self.http.get(self.api(path)), context)
            .await?;
        Ok(data
            .items
            .into_iter()
            .map(|item| InboundMessage {
                id: item.id.to_string(),
                category,
                text: item.item.source_content,
                sender: item.user.nickname,
                url: item.item.uri.filter(|u| !u.is_empty()),
                timestamp: from_unix(item.reply_time.or(item.at_time)),
            })
            .collect())
    }

    async fn list_direct(&self, account: &Account) -> Result<Vec<InboundMessage>, PlatformError> {
        let request = self
            .http
            .get(self.vc("/session_svr/v1/session_svr/get_sessions"))
            .query(&[("session_type", "1")]);
        let sessions: SessionsData = self.call_as(account, request, "sessions").await?;

        let mut messages = Vec::new();
        for session in sessions.session_list.unwrap_or_default() {
            if session.unread_count == 0 {
                continue;
            }
            let request = self
                .http
                .get(self.vc("/svr_sync/v1/svr_sync/fetch_session_msgs"))
                .query(&[
                    ("talker_id", session.talker_id.to_string()),
                    ("session_type", "1".to_string()),
                    ("size", session.unread_count.to_string()),
                ]);
            let data: SessionMessagesData = self.call_as(account, request, "session messages").await?;
            for msg in data.messages.unwrap_or_default() {
                // System notices and non-text payloads carry no readable text.
                if matches!(msg.msg_source, 8 | 9) || msg.msg_type != 1 {
                    continue;
                }
                messages.push(InboundMessage {
                    id: format!("{}:{}", session.talker_id, msg.msg_seqno),
                    category: MessageCategory::Direct,
                    text: unwrap_content(&msg.content),
                    sender: Some(format!("uid {}", msg.sender_uid)),
                    url: Some(format!(
                        "https://message.bilibili.com/#/whisper/mid{}",
                        session.talker_id
                    )),
                    timestamp: from_unix(Some(msg.timestamp)),
                });
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl Platform for BilibiliClient {
    async fn verify(&self, account: &Account) -> Result<Profile, PlatformError> {
        let request = self.http.get(self.api("/x/web-interface/nav"));
        let nav: NavData = self.call_as(account, request, "nav").await?;
        if !nav.is_login {
            return Err(PlatformError::NotLoggedIn);
        }
        lock(&self.uids).insert(account.remark.clone(), nav.mid);
        tracing::info!(account = %account.remark, uid = nav.mid, name = %nav.uname, "login verified");
        Ok(Profile {
            uid: nav.mid,
            name: nav.uname,
        })
    }

    async fn fetch_context(
        &self,
        account: &Account,
        target: &Target,
    ) -> Result<TargetContext, PlatformError> {
        let detail = self.detail(account, target).await?;
        Ok(TargetContext {
            text: detail.text,
            author: detail.author_name,
        })
    }

    async fn follow(&self, account: &Account, target: &Target) -> Result<(), PlatformError> {
        let detail = self.detail(account, target).await?;
        let author = detail.author_uid.ok_or_else(|| PlatformError::MissingData {
            context: target.canonical_url.clone(),
            field: "author uid".to_string(),
        })?;

        let mid = self.account_uid(account).await?;
        let request = self
            .http
            .get(self.api("/x/relation"))
            .query(&[("fid", author), ("mid", mid)]);
        let relation: RelationData = self.call_as(account, request, "relation").await?;
        match relation.attribute {
            RELATION_FOLLOWING | RELATION_MUTUAL => {
                tracing::debug!(account = %account.remark, author, "already following");
                return Ok(());
            }
            RELATION_BLACKLISTED => return Err(PlatformError::Blocked { author }),
            _ => {}
        }

        let csrf = csrf_token(account)?;
        let request = self.http.post(self.api("/x/relation/modify")).form(&[
            ("fid", author.to_string()),
            ("act", "1".to_string()),
            ("re_src", "11".to_string()),
            ("csrf", csrf),
        ]);
        self.call(account, request, "follow").await.map(drop)
    }

    async fn like(&self, account: &Account, target: &Target) -> Result<(), PlatformError> {
        let csrf = csrf_token(account)?;
        let request = match target.kind {
            TargetKind::Dynamic => self
                .http
                .post(self.vc("/dynamic_like/v1/dynamic_like/thumb"))
                .form(&[
                    ("dynamic_id", target.id.clone()),
                    ("optype", "1".to_string()),
                    ("csrf_token", csrf.clone()),
                    ("csrf", csrf),
                ]),
            TargetKind::Video => {
                let aid = self.detail(account, target).await?.aid.ok_or_else(|| {
                    PlatformError::MissingData {
                        context: target.canonical_url.clone(),
                        field: "aid".to_string(),
                    }
                })?;
                self.http
                    .post(self.api("/x/web-interface/archive/like"))
                    .form(&[
                        ("aid", aid.to_string()),
                        ("like", "1".to_string()),
                        ("csrf", csrf),
                    ])
            }
        };
        self.call(account, request, "like").await.map(drop)
    }

    async fn comment(
        &self,
        account: &Account,
        target: &Target,
        text: &str,
    ) -> Result<(), PlatformError> {
        let detail = self.detail(account, target).await?;
        let oid = detail.comment_oid.ok_or_else(|| PlatformError::MissingData {
            context: target.canonical_url.clone(),
            field: "comment oid".to_string(),
        })?;
        let csrf = csrf_token(account)?;
        let request = self.http.post(self.api("/x/v2/reply/add")).form(&[
            ("oid", oid.to_string()),
            ("type", detail.comment_type.to_string()),
            ("message", text.to_string()),
            ("plat", "1".to_string()),
            ("csrf", csrf),
        ]);
        let data = self.call(account, request, "comment").await?;
        let rpid = lenient_u64(&data["rpid"]).unwrap_or_default();
        tracing::debug!(account = %account.remark, rpid, "comment posted");
        Ok(())
    }

    async fn repost(
        &self,
        account: &Account,
        target: &Target,
        text: &str,
    ) -> Result<(), PlatformError> {
        let csrf = csrf_token(account)?;
        let request = match target.kind {
            TargetKind::Dynamic => self
                .http
                .post(self.vc("/dynamic_repost/v1/dynamic_repost/repost"))
                .form(&[
                    ("dynamic_id", target.id.clone()),
                    ("content", text.to_string()),
                    ("type", "4".to_string()),
                    ("csrf_token", csrf.clone()),
                    ("csrf", csrf),
                ]),
            TargetKind::Video => {
                let aid = self.detail(account, target).await?.aid.ok_or_else(|| {
                    PlatformError::MissingData {
                        context: target.canonical_url.clone(),
                        field: "aid".to_string(),
                    }
                })?;
                let body = serde_json::json!({
                    "dyn_req": {
                        "content": {"contents": [{"raw_text": text, "type": 1, "biz_id": ""}]},
                        "scene": 5,
                    },
                    "web_repost_src": {"revs_id": {"dyn_type": 8, "rid": aid}},
                });
                self.http
                    .post(self.api("/x/dynamic/feed/create/dyn"))
                    .query(&[("csrf", csrf)])
                    .json(&body)
            }
        };
        self.call(account, request, "repost").await.map(drop)
    }

    async fn list_messages(
        &self,
        account: &Account,
        category: MessageCategory,
    ) -> Result<Vec<InboundMessage>, PlatformError> {
        match category {
            MessageCategory::Direct => self.list_direct(account).await,
            MessageCategory::Mention | MessageCategory::Reply => {
                self.list_feed(account, category).await
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check_code(code: i64, message: String) -> Result<(), PlatformError> {
    match code {
        0 => Ok(()),
        CODE_NOT_LOGGED_IN => Err(PlatformError::NotLoggedIn),
        CODE_CAPTCHA => Err(PlatformError::Captcha),
        _ => Err(PlatformError::Api { code, message }),
    }
}

/// The `bili_jct` cookie doubles as the CSRF token.
fn csrf_token(account: &Account) -> Result<String, PlatformError> {
    account
        .credential
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "bili_jct")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(PlatformError::NotLoggedIn)
}

/// Ids arrive as numbers or numeric strings depending on the endpoint.
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Direct-message text is itself a JSON document `{"content": "..."}`.
fn unwrap_content(raw: &str) -> String {
    #[derive(Deserialize)]
    struct Body {
        content: String,
    }
    serde_json::from_str::<Body>(raw)
        .map(|b| b.content)
        .unwrap_or_else(|_| raw.to_string())
}

fn from_unix(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_else(Utc::now)
}

// --- API types ---

#[derive(Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct NavData {
    #[serde(rename = "isLogin", default)]
    is_login: bool,
    #[serde(default)]
    mid: u64,
    #[serde(default)]
    uname: String,
}

#[derive(Deserialize)]
struct RelationData {
    #[serde(default)]
    attribute: i64,
}

#[derive(Deserialize)]
struct DynamicDetailData {
    item: DynamicItem,
}

#[derive(Deserialize)]
struct DynamicItem {
    #[serde(default)]
    modules: Vec<DynamicModule>,
}

#[derive(Deserialize)]
struct DynamicModule {
    module_author: Option<ModuleAuthor>,
    module_desc: Option<ModuleDesc>,
    module_stat: Option<ModuleStat>,
    module_dynamic: Option<ModuleDynamic>,
}

#[derive(Deserialize)]
struct ModuleAuthor {
    user: AuthorUser,
}

#[derive(Deserialize)]
struct AuthorUser {
    #[serde(default)]
    mid: Value,
    name: Option<String>,
}

#[derive(Deserialize)]
struct ModuleDesc {
    #[serde(default)]
    rich_text_nodes: Vec<RichTextNode>,
}

#[derive(Deserialize)]
struct RichTextNode {
    text: Option<String>,
    orig_text: Option<String>,
}

#[derive(Deserialize)]
struct ModuleStat {
    comment: StatComment,
}

#[derive(Deserialize)]
struct StatComment {
    #[serde(default)]
    comment_id: Value,
    #[serde(default)]
    comment_type: Value,
}

#[derive(Deserialize)]
struct ModuleDynamic {
    dyn_archive: Option<DynArchive>,
}

#[derive(Deserialize)]
struct DynArchive {
    #[serde(default)]
    aid: Value,
}

#[derive(Deserialize)]
struct VideoDetailData {
    aid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    desc: String,
    owner: VideoOwner,
}

#[derive(Deserialize)]
struct VideoOwner {
    mid: u64,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct FeedData {
    #[serde(default)]
    items: Vec<FeedItem>,
}

#[derive(Deserialize)]
struct FeedItem {
    id: u64,
    user: FeedUser,
    item: FeedContent,
    reply_time: Option<i64>,
    at_time: Option<i64>,
}

#[derive(Deserialize)]
struct FeedUser {
    nickname: Option<String>,
}

#[derive(Deserialize)]
struct FeedContent {
    #[serde(default)]
    source_content: String,
    uri: Option<String>,
}

#[derive(Deserialize)]
struct SessionsData {
    session_list: Option<Vec<Session>>,
}

#[derive(Deserialize)]
struct Session {
    talker_id: u64,
    #[serde(default)]
    unread_count: u32,
}

#[derive(Deserialize)]
struct SessionMessagesData {
    messages: Option<Vec<SessionMessage>>,
}

#[derive(Deserialize)]
struct SessionMessage {
    msg_seqno: u64,
    #[serde(default)]
    msg_source: i64,
    #[serde(default)]
    msg_type: i64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    sender_uid: u64,
    #[serde(default)]
    timestamp: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn account() -> Account {
        Account {
            remark: "main".to_string(),
            credential: "SESSDATA=abc; bili_jct=tok123; DedeUserID=9".to_string(),
            ..Account::default()
        }
    }

    async fn client(server: &MockServer) -> BilibiliClient {
        BilibiliClient::with_endpoints(Endpoints::single(&server.uri()), Duration::from_secs(5))
            .unwrap()
    }

    fn ok(data: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "0", "data": data}))
    }

    async fn mount_nav(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/x/web-interface/nav"))
            .respond_with(ok(json!({"isLogin": true, "mid": 9, "uname": "tester"})))
            .mount(server)
            .await;
    }

    async fn mount_dynamic(server: &MockServer, id: &str) {
        Mock::given(method("GET"))
            .and(path("/x/polymer/web-dynamic/desktop/v1/detail"))
            .and(query_param("id", id))
            .respond_with(ok(json!({"item": {"modules": [
                {"module_type": "MODULE_TYPE_AUTHOR", "module_author": {"user": {"mid": 777, "name": "UP"}}},
                {"module_type": "MODULE_TYPE_DESC", "module_desc": {"rich_text_nodes": [
                    {"type": "RICH_TEXT_NODE_TYPE_TEXT", "text": "转发抽"},
                    {"type": "RICH_TEXT_NODE_TYPE_LOTTERY", "orig_text": "键盘"}
                ]}},
                {"module_type": "MODULE_TYPE_STAT", "module_stat": {"comment": {"comment_id": "555", "comment_type": 17}}}
            ]}})))
            .mount(server)
            .await;
    }

    #[test]
    fn csrf_comes_from_bili_jct() {
        assert_eq!(csrf_token(&account()).unwrap(), "tok123");
        let no_token = Account {
            credential: "SESSDATA=abc".to_string(),
            ..account()
        };
        assert!(matches!(csrf_token(&no_token), Err(PlatformError::NotLoggedIn)));
    }

    #[test]
    fn special_codes_map_to_variants() {
        assert!(matches!(check_code(-101, String::new()), Err(PlatformError::NotLoggedIn)));
        assert!(matches!(check_code(12015, String::new()), Err(PlatformError::Captcha)));
        assert!(matches!(
            check_code(-400, "bad".to_string()),
            Err(PlatformError::Api { code: -400, .. })
        ));
    }

    #[test]
    fn direct_message_body_is_unwrapped() {
        assert_eq!(unwrap_content(r#"{"content":"恭喜中奖"}"#), "恭喜中奖");
        assert_eq!(unwrap_content("plain"), "plain");
    }

    #[tokio::test]
    async fn verify_sends_cookie_and_reads_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/web-interface/nav"))
            .and(header("cookie", "SESSDATA=abc; bili_jct=tok123; DedeUserID=9"))
            .respond_with(ok(json!({"isLogin": true, "mid": 9, "uname": "tester"})))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client(&server).await.verify(&account()).await.unwrap();
        assert_eq!(profile.uid, 9);
        assert_eq!(profile.name, "tester");
    }

    #[tokio::test]
    async fn expired_cookie_is_not_logged_in() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/web-interface/nav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"code": -101, "message": "账号未登录", "data": {"isLogin": false}}),
            ))
            .mount(&server)
            .await;

        let err = client(&server).await.verify(&account()).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotLoggedIn));
    }

    #[tokio::test]
    async fn http_failure_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let err = client(&server).await.verify(&account()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Http { status: 412, .. }));
    }

    #[tokio::test]
    async fn dynamic_context_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/polymer/web-dynamic/desktop/v1/detail"))
            .respond_with(ok(json!({"item": {"modules": [
                {"module_author": {"user": {"mid": 777, "name": "UP"}}},
                {"module_desc": {"rich_text_nodes": [{"text": "转发抽"}, {"orig_text": "键盘"}]}}
            ]}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let target = Target::dynamic("100");
        let ctx = client.fetch_context(&account(), &target).await.unwrap();
        assert_eq!(ctx.text, "转发抽键盘");
        assert_eq!(ctx.author.as_deref(), Some("UP"));
        client.fetch_context(&account(), &target).await.unwrap();
    }

    #[tokio::test]
    async fn follow_skips_modify_when_already_following() {
        let server = MockServer::start().await;
        mount_nav(&server).await;
        mount_dynamic(&server, "100").await;
        Mock::given(method("GET"))
            .and(path("/x/relation"))
            .and(query_param("fid", "777"))
            .respond_with(ok(json!({"attribute": 2})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/x/relation/modify"))
            .respond_with(ok(Value::Null))
            .expect(0)
            .mount(&server)
            .await;

        client(&server)
            .await
            .follow(&account(), &Target::dynamic("100"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn follow_blacklisted_author_is_blocked() {
        let server = MockServer::start().await;
        mount_nav(&server).await;
        mount_dynamic(&server, "100").await;
        Mock::given(method("GET"))
            .and(path("/x/relation"))
            .respond_with(ok(json!({"attribute": 128})))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .follow(&account(), &Target::dynamic("100"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Blocked { author: 777 }));
    }

    #[tokio::test]
    async fn follow_posts_modify_with_csrf() {
        let server = MockServer::start().await;
        mount_nav(&server).await;
        mount_dynamic(&server, "100").await;
        Mock::given(method("GET"))
            .and(path("/x/relation"))
            .respond_with(ok(json!({"attribute": 0})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/x/relation/modify"))
            .and(body_string_contains("fid=777"))
            .and(body_string_contains("csrf=tok123"))
            .respond_with(ok(Value::Null))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .follow(&account(), &Target::dynamic("100"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn comment_uses_detail_oid_and_type() {
        let server = MockServer::start().await;
        mount_dynamic(&server, "100").await;
        Mock::given(method("POST"))
            .and(path("/x/v2/reply/add"))
            .and(body_string_contains("oid=555"))
            .and(body_string_contains("type=17"))
            .respond_with(ok(json!({"rpid": 1})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .comment(&account(), &Target::dynamic("100"), "好耶")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn comment_captcha_surfaces() {
        let server = MockServer::start().await;
        mount_dynamic(&server, "100").await;
        Mock::given(method("POST"))
            .and(path("/x/v2/reply/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"code": 12015, "message": "需要验证码", "data": null}),
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .comment(&account(), &Target::dynamic("100"), "好耶")
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Captcha));
    }

    #[tokio::test]
    async fn dynamic_like_and_repost_use_vc_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dynamic_like/v1/dynamic_like/thumb"))
            .and(body_string_contains("dynamic_id=100"))
            .respond_with(ok(Value::Null))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dynamic_repost/v1/dynamic_repost/repost"))
            .and(body_string_contains("dynamic_id=100"))
            .respond_with(ok(Value::Null))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let target = Target::dynamic("100");
        client.like(&account(), &target).await.unwrap();
        client.repost(&account(), &target, "冲").await.unwrap();
    }

    #[tokio::test]
    async fn video_actions_use_aid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/web-interface/view"))
            .and(query_param("bvid", "BV1xx411c7mD"))
            .respond_with(ok(json!({
                "aid": 170001, "title": "新品", "desc": "三连抽奖",
                "owner": {"mid": 42, "name": "UP"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/x/web-interface/archive/like"))
            .and(body_string_contains("aid=170001"))
            .respond_with(ok(Value::Null))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/x/dynamic/feed/create/dyn"))
            .and(query_param("csrf", "tok123"))
            .respond_with(ok(Value::Null))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let target = Target::video("BV1xx411c7mD");
        client.like(&account(), &target).await.unwrap();
        client.repost(&account(), &target, "分享").await.unwrap();
    }

    #[tokio::test]
    async fn reply_feed_becomes_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/msgfeed/reply"))
            .respond_with(ok(json!({"items": [{
                "id": 31,
                "user": {"mid": 5, "nickname": "UP"},
                "item": {"source_content": "恭喜中奖", "uri": "https://t.bilibili.com/1"},
                "reply_time": 1700000000
            }]})))
            .mount(&server)
            .await;

        let messages = client(&server)
            .await
            .list_messages(&account(), MessageCategory::Reply)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "31");
        assert_eq!(messages[0].sender.as_deref(), Some("UP"));
        assert_eq!(messages[0].timestamp.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn direct_messages_skip_system_and_non_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session_svr/v1/session_svr/get_sessions"))
            .respond_with(ok(json!({"session_list": [
                {"talker_id": 8, "unread_count": 3},
                {"talker_id": 9, "unread_count": 0}
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/svr_sync/v1/svr_sync/fetch_session_msgs"))
            .and(query_param("talker_id", "8"))
            .respond_with(ok(json!({"messages": [
                {"msg_seqno": 1, "msg_source": 0, "msg_type": 1, "content": "{\"content\":\"你中奖了\"}", "sender_uid": 8, "timestamp": 1700000000},
                {"msg_seqno": 2, "msg_source": 8, "msg_type": 1, "content": "{\"content\":\"系统\"}", "sender_uid": 8, "timestamp": 1700000000},
                {"msg_seqno": 3, "msg_source": 0, "msg_type": 2, "content": "{}", "sender_uid": 8, "timestamp": 1700000000}
            ]})))
            .expect(1)
            .mount(&server)
            .await;

        let messages = client(&server)
            .await
            .list_messages(&account(), MessageCategory::Direct)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "8:1");
        assert_eq!(messages[0].text, "你中奖了");
    }
}
