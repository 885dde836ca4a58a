// ===============================
// src/telegram.rs
// ===============================
//
// Minimal Telegram Bot API models and URL helper. Only the fields this bot
// reads are modeled; everything else in the payload is ignored.
//
use serde::Deserialize;

pub fn api_url(base: &str, token: &str, method: &str) -> String {
    format!("{}/bot{}/{}", base.trim_end_matches('/'), token, method)
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}
