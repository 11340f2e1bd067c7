use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::TextGenerator;
use crate::model::TargetContext;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
const MAX_TOKENS: u32 = 150;

static PARENTHESISED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(].*?[)）]").expect("valid parenthesis regex"));
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\S+").expect("valid mention regex"));
static TOPIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#.*?#").expect("valid topic regex"));

/// Settings for [`DeepSeekGenerator`].
#[derive(Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Ask the model to mention the commenter's nickname.
    pub add_name: bool,
    pub request_timeout: Duration,
}

/// Comment generator backed by an OpenAI-compatible chat completions API.
pub struct DeepSeekGenerator {
    config: DeepSeekConfig,
    http: reqwest::Client,
}

impl DeepSeekGenerator {
    pub fn new(config: DeepSeekConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    fn build_system_prompt(&self, commenter: &str) -> String {
        let name_rule = if self.config.add_name {
            format!("   - 用第一人称“我”，在评论里自然地带上我的昵称'{commenter}'\n")
        } else {
            String::new()
        };

        format!(
            "# 身份\n\
             你是一名B站用户，看到喜欢的UP主发起了抽奖动态，希望留言参与\n\
             # 核心目标\n\
             生成一条自然、真诚、不暴露抽奖目的的评论\n\
             # 规则清单\n\
             1. 最高优先级：如果要求评论固定内容，则你的输出只能是该固定内容\n\
             2. 次优先级：如果动态中明确要求评论特定内容或回答问题，评论需围绕该要求展开\n\
             3. 评论焦点：没有明确要求时，只围绕动态/视频内容本身或奖品本身展开\n\
             4. 绝对禁止：\n\
             \x20   - 描述自己的行为，例如“我关注了”、“已三连”\n\
             \x20   - 提及“抽奖”、“中奖”等与抽奖行为相关的词语\n\
             \x20   - 出现emoji、表情包\n\
             5. 风格要求：\n\
             {name_rule}\
             \x20   - 字数在 35-70 字之间\n\
             \x20   - 结尾可自然地加上一个语气词，如喵、哦、呢、啦、呀\n\
             # 输出\n\
             直接输出最终评论，无需任何解释"
        )
    }

    fn build_user_prompt(context: &TargetContext) -> String {
        match &context.author {
            Some(author) => format!("UP主: {author}\n\n{}", context.text),
            None => context.text.clone(),
        }
    }

    /// Strip what the platform would treat as markup or what gives the bot away.
    fn clean(raw: &str) -> String {
        let text = raw.replace('"', "");
        let text = PARENTHESISED.replace_all(&text, "");
        let text = MENTION.replace_all(&text, "");
        let text = TOPIC.replace_all(&text, "");
        text.trim().to_string()
    }
}

#[async_trait]
impl TextGenerator for DeepSeekGenerator {
    async fn generate_comment(&self, context: &TargetContext, commenter: &str) -> Result<String> {
        let system = self.build_system_prompt(commenter);
        let user = Self::build_user_prompt(context);
        let messages = [
            Message {
                role: "system",
                content: &system,
            },
            Message {
                role: "user",
                content: &user,
            },
        ];
        let body = ApiRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: self.config.temperature,
            max_tokens: MAX_TOKENS,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("DeepSeek API error ({}): {}", status, text);
        }

        let api_resp: ApiResponse = resp.json().await?;

        if let Some(usage) = &api_resp.usage {
            tracing::debug!(total_tokens = usage.total_tokens, "deepseek usage");
        }

        let content = api_resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Self::clean(&content))
    }
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message<'a>],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}
