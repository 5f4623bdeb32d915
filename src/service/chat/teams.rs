//! Microsoft Teams integration over the Bot Framework REST connector.
//!
//! Inbound activities arrive on `POST /api/messages`, are acknowledged immediately and
//! processed in a spawned task. Outbound activities are posted to the conversation's
//! service URL with a client-credentials bearer token. Cards are rendered as Adaptive
//! Cards with `Action.Submit` buttons, so their data comes back as the activity `value`.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Card, CardBlock, InboundBody, InboundMessage, Outbound, Res, Void},
    },
    interaction::{self, bot::Bot},
    service::{
        auth::ClientCredentials,
        conversation::{ConversationReference, ConversationStore},
    },
};

use super::{ChatClient, GenericChatClient};

const BOT_FRAMEWORK_SCOPE: &str = "https://api.botframework.com/.default";
const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

// Extra methods on `ChatClient` applied by the teams implementation.

impl ChatClient {
    /// Creates a Teams chat client.
    pub fn teams(config: &Config, conversations: ConversationStore) -> Res<Self> {
        let client = TeamsChatClient::new(config, conversations)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

/// A Bot Framework activity (the subset the bot uses).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub channel_data: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aad_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub conversation_type: Option<String>,
}

/// A conversation member as returned by the connector.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamsChannelAccount {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
}

impl Activity {
    /// The tenant of the activity, from the conversation or the Teams channel data.
    pub fn tenant_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .and_then(|conversation| conversation.tenant_id.as_deref())
            .or_else(|| self.channel_data.as_ref().and_then(|data| data.pointer("/tenant/id")).and_then(Value::as_str))
    }

    /// Converts a message activity into the bot's inbound message and a reference to its conversation.
    pub fn to_inbound(&self) -> Option<(InboundMessage, ConversationReference)> {
        if self.kind != "message" {
            return None;
        }

        let from = self.from.as_ref()?;
        let conversation = self.conversation.as_ref()?;
        let tenant_id = self.tenant_id()?.to_string();
        let service_url = self.service_url.clone()?;

        let body = match &self.value {
            Some(value @ Value::Object(_)) => InboundBody::Submission(value.clone()),
            _ => InboundBody::Text(strip_mentions(self.text.as_deref().unwrap_or_default())),
        };

        let message = InboundMessage {
            tenant_id: tenant_id.clone(),
            user_id: from.id.clone(),
            display_name: from.name.clone().unwrap_or_else(|| from.id.clone()),
            email: None,
            conversation_id: conversation.id.clone(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            body,
        };

        let reference = ConversationReference {
            tenant_id,
            user_id: from.id.clone(),
            conversation_id: conversation.id.clone(),
            service_url,
            bot_id: self.recipient.as_ref().map(|recipient| recipient.id.clone()).unwrap_or_default(),
        };

        Some((message, reference))
    }
}

/// Removes `<at>Bot</at>` mention markup from message text.
pub fn strip_mentions(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?is)<at>.*?</at>").unwrap());

    re.replace_all(text, "").split_whitespace().collect::<Vec<_>>().join(" ")
}

// Rendering.

/// Renders a card as an Adaptive Card.
pub fn render_adaptive_card(card: &Card) -> Value {
    let mut body = vec![json!({
        "type": "TextBlock",
        "text": card.title,
        "weight": "Bolder",
        "size": "Medium",
        "wrap": true,
    })];

    for block in &card.body {
        match block {
            CardBlock::Text(text) => body.push(json!({ "type": "TextBlock", "text": text, "wrap": true })),
            CardBlock::Facts(facts) => body.push(json!({
                "type": "FactSet",
                "facts": facts.iter().map(|(title, value)| json!({ "title": title, "value": value })).collect::<Vec<_>>(),
            })),
        }
    }

    for input in &card.inputs {
        body.push(json!({
            "type": "Input.ChoiceSet",
            "id": input.id,
            "label": input.label,
            "style": "compact",
            "isRequired": false,
            "choices": input.choices.iter().map(|(title, value)| json!({ "title": title, "value": value })).collect::<Vec<_>>(),
        }));
    }

    let actions: Vec<Value> = card.actions.iter().map(|action| json!({ "type": "Action.Submit", "title": action.title, "data": action.data })).collect();

    json!({
        "type": "AdaptiveCard",
        "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
        "version": "1.4",
        "body": body,
        "actions": actions,
    })
}

/// Renders an outbound payload as a message activity.
pub fn render_activity(payload: &Outbound, reply_to_id: Option<&str>) -> Value {
    let mut activity = match payload {
        Outbound::Text(text) => json!({ "type": "message", "text": text, "textFormat": "markdown" }),
        Outbound::Card(card) => json!({
            "type": "message",
            "attachments": [{ "contentType": ADAPTIVE_CARD_CONTENT_TYPE, "content": render_adaptive_card(card) }],
        }),
    };

    if let Some(reply_to_id) = reply_to_id {
        activity["replyToId"] = json!(reply_to_id);
    }

    activity
}

// Client.

/// Teams client implementation.
pub struct TeamsChatClient {
    http: reqwest::Client,
    credentials: ClientCredentials,
    conversations: ConversationStore,
}

impl TeamsChatClient {
    #[instrument(name = "TeamsChatClient::new", skip_all)]
    pub fn new(config: &Config, conversations: ConversationStore) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(std::time::Duration::from_secs(15)).build()?;
        let credentials = ClientCredentials::new(
            http.clone(),
            ClientCredentials::microsoft_token_url(&config.bot_app_tenant_id),
            &config.bot_app_id,
            &config.bot_app_password,
            BOT_FRAMEWORK_SCOPE,
        );

        Ok(Self { http, credentials, conversations })
    }

    async fn post_activity(&self, url: &str, activity: &Value) -> Void {
        let token = self.credentials.token().await?;
        let response = self.http.post(url).bearer_auth(token).json(activity).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Connector rejected the activity with status {}.", response.status()));
        }

        Ok(())
    }
}

fn conversation_url(reference: &ConversationReference) -> String {
    format!("{}/v3/conversations/{}", reference.service_url.trim_end_matches('/'), reference.conversation_id)
}

#[async_trait]
impl GenericChatClient for TeamsChatClient {
    #[instrument(skip(self, payload))]
    async fn send_to_user(&self, tenant_id: &str, user_id: &str, payload: &Outbound) -> Void {
        let reference = self
            .conversations
            .get(tenant_id, user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No conversation reference for user `{user_id}`."))?;

        let url = format!("{}/activities", conversation_url(&reference));

        self.post_activity(&url, &render_activity(payload, None)).await
    }

    #[instrument(skip(self, payload))]
    async fn reply(&self, reference: &ConversationReference, reply_to_id: Option<String>, payload: &Outbound) -> Void {
        let url = match &reply_to_id {
            Some(id) => format!("{}/activities/{id}", conversation_url(reference)),
            None => format!("{}/activities", conversation_url(reference)),
        };

        self.post_activity(&url, &render_activity(payload, reply_to_id.as_deref())).await
    }

    #[instrument(skip(self))]
    async fn get_member_email(&self, reference: &ConversationReference, user_id: &str) -> Res<Option<String>> {
        let token = self.credentials.token().await?;
        let url = format!("{}/members/{user_id}", conversation_url(reference));

        let member: TeamsChannelAccount = self.http.get(&url).bearer_auth(token).send().await?.error_for_status()?.json().await?;

        Ok(member.email.or(member.user_principal_name).filter(|email| email.contains('@')))
    }
}

// Inbound route.

/// Shared state of the messaging route.
#[derive(Clone)]
pub struct TeamsState {
    pub bot: Bot,
    pub chat: ChatClient,
    pub conversations: ConversationStore,
}

/// The Bot Framework messaging endpoint.
pub fn routes(state: TeamsState) -> Router {
    Router::new().route("/api/messages", post(post_messages)).with_state(state)
}

#[instrument(skip_all)]
async fn post_messages(State(state): State<TeamsState>, Json(activity): Json<Activity>) -> StatusCode {
    let Some((message, reference)) = activity.to_inbound() else {
        debug!("Ignoring `{}` activity.", activity.kind);
        return StatusCode::OK;
    };

    info!("Received message activity ...");

    if let Err(err) = state.conversations.put(reference.clone()).await {
        error!("Failed to store conversation reference: {err}");
    }

    if matches!(&message.body, InboundBody::Text(text) if text.is_empty()) {
        warn!("Skipping empty message.");
        return StatusCode::ACCEPTED;
    }

    interaction::message::handle_message(message, reference, activity.id.clone(), state.bot.clone(), state.chat.clone());

    StatusCode::ACCEPTED
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::cards;

    fn message_activity(extra: Value) -> Activity {
        let mut value = json!({
            "type": "message",
            "id": "act-1",
            "serviceUrl": "https://smba.trafficmanager.net/au/",
            "channelId": "msteams",
            "from": { "id": "29:user", "name": "Sam Lee", "aadObjectId": "aad-1" },
            "conversation": { "id": "a:conv", "tenantId": "tenant-1", "conversationType": "personal" },
            "recipient": { "id": "28:bot", "name": "Checkin" },
            "text": "<at>Checkin</at> working from home"
        });

        if let (Value::Object(base), Value::Object(extra)) = (&mut value, extra) {
            base.extend(extra);
        }

        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_activity_to_inbound() {
        let (message, reference) = message_activity(json!({})).to_inbound().unwrap();

        assert_eq!(message.tenant_id, "tenant-1");
        assert_eq!(message.user_id, "29:user");
        assert_eq!(message.display_name, "Sam Lee");
        assert!(matches!(message.body, InboundBody::Text(ref text) if text == "working from home"));
        assert_eq!(reference.bot_id, "28:bot");
        assert_eq!(conversation_url(&reference), "https://smba.trafficmanager.net/au/v3/conversations/a:conv");
    }

    #[test]
    fn test_submission_activity_to_inbound() {
        let activity = message_activity(json!({ "text": null, "value": { "action": "set_location", "location": "office" } }));
        let (message, _) = activity.to_inbound().unwrap();

        assert!(matches!(message.body, InboundBody::Submission(ref value) if value["location"] == "office"));
    }

    #[test]
    fn test_tenant_from_channel_data() {
        let activity = message_activity(json!({
            "conversation": { "id": "a:conv" },
            "channelData": { "tenant": { "id": "tenant-2" } }
        }));

        assert_eq!(activity.tenant_id(), Some("tenant-2"));
    }

    #[test]
    fn test_non_message_activities_are_ignored() {
        let activity = message_activity(json!({ "type": "conversationUpdate" }));

        assert!(activity.to_inbound().is_none());
    }

    #[test]
    fn test_render_card_activity() {
        let card = cards::location_card(chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        let activity = render_activity(&Outbound::Card(card), Some("act-1"));

        let content = &activity["attachments"][0]["content"];
        assert_eq!(activity["replyToId"], "act-1");
        assert_eq!(content["version"], "1.4");
        assert_eq!(content["actions"][0]["type"], "Action.Submit");
        assert_eq!(content["actions"][0]["data"]["action"], "set_location");
        assert!(content["body"].as_array().unwrap().iter().any(|block| block["type"] == "Input.ChoiceSet"));
    }

    #[test]
    fn test_strip_mentions() {
        assert_eq!(strip_mentions("<at>Checkin Bot</at>  office "), "office");
    }
}
