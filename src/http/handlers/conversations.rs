//! Conversations, participants, messages and reactions.
//!
//! Admins may read every conversation but never take part: they cannot
//! create conversations, be invited, post or react. Members only see the
//! conversations they belong to.

use std::time::SystemTime;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::User;
use crate::chat::{ChatError, Conversation, Message, NewMessage, Reaction};
use crate::http::extract::{AdminUser, CurrentUser};
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::observability::metrics;

const MAX_TITLE_CHARS: usize = 120;
const MAX_BODY_CHARS: usize = 2000;
const MAX_EMOJI_CHARS: usize = 16;

/// Public profile fields shown next to messages and participants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
}

impl From<&User> for UserCard {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            profile_image_url: user.profile_image_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub media_id: Uuid,
    pub content_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionView {
    pub emoji: String,
    pub user: Option<UserCard>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub author: Option<UserCard>,
    pub body: Option<String>,
    pub media: Option<MediaAttachment>,
    pub created_at: String,
    pub reactions: Vec<ReactionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: Uuid,
    pub title: String,
    pub created_by_id: Uuid,
    pub created_at: String,
    pub participants: Vec<UserCard>,
    pub last_message: Option<MessageView>,
    /// The viewer's unread count; absent when the viewer is not a participant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
}

fn timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn user_card(state: &AppState, id: Uuid) -> Option<UserCard> {
    state.users.find_by_id(id).as_ref().map(UserCard::from)
}

fn reaction_views(state: &AppState, reactions: &[Reaction]) -> Vec<ReactionView> {
    reactions
        .iter()
        .map(|r| ReactionView {
            emoji: r.emoji.clone(),
            user: user_card(state, r.user_id),
            created_at: timestamp(r.created_at),
        })
        .collect()
}

fn message_view(state: &AppState, message: &Message) -> MessageView {
    let media = message.media_id.and_then(|id| state.media.get(id)).map(|record| MediaAttachment {
        media_id: record.id,
        content_type: record.format.mime_type(),
        width: record.width,
        height: record.height,
        url: format!("/api/media/{}", record.id),
    });

    let mut reactions = message.reactions.clone();
    reactions.sort_by(|a, b| a.emoji.cmp(&b.emoji).then(a.created_at.cmp(&b.created_at)));

    MessageView {
        id: message.id,
        conversation_id: message.conversation_id,
        author: user_card(state, message.author_id),
        body: message.body.clone(),
        media,
        created_at: timestamp(message.created_at),
        reactions: reaction_views(state, &reactions),
    }
}

fn conversation_view(state: &AppState, conversation: &Conversation, viewer: &User) -> ConversationView {
    ConversationView {
        id: conversation.id,
        title: conversation.title.clone(),
        created_by_id: conversation.created_by,
        created_at: timestamp(conversation.created_at),
        participants: conversation
            .participants
            .iter()
            .filter_map(|p| user_card(state, p.user_id))
            .collect(),
        last_message: conversation.last_message().map(|m| message_view(state, m)),
        unread_count: conversation.participant(viewer.id).map(|p| p.unread_count),
    }
}

fn load_conversation(state: &AppState, id: &str) -> ApiResult<Conversation> {
    Uuid::parse_str(id)
        .ok()
        .and_then(|id| state.conversations.get(id))
        .ok_or_else(|| ChatError::ConversationNotFound.into())
}

fn require_participant(conversation: &Conversation, user: &User, message: &str) -> ApiResult<()> {
    if conversation.is_participant(user.id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(message.into()))
    }
}

fn require_member(user: &User, message: &str) -> ApiResult<()> {
    if user.is_admin() {
        Err(ApiError::Forbidden(message.into()))
    } else {
        Ok(())
    }
}

/// Trimmed, non-empty, at most `max` characters.
fn bounded_text(value: &str, max: usize) -> Option<String> {
    let value = value.trim();
    let len = value.chars().count();
    (len > 0 && len <= max).then(|| value.to_string())
}

pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Value> {
    let conversations: Vec<ConversationView> = state
        .conversations
        .list()
        .iter()
        .filter(|c| user.is_admin() || c.is_participant(user.id))
        .map(|c| conversation_view(&state, c, &user))
        .collect();
    Json(json!({ "conversations": conversations }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub title: String,
    pub participant_ids: Vec<String>,
}

impl CreateConversationRequest {
    fn validated(self) -> Option<(String, Vec<String>)> {
        let title = bounded_text(&self.title, MAX_TITLE_CHARS)?;
        if self.participant_ids.is_empty() || self.participant_ids.iter().any(|id| id.is_empty()) {
            return None;
        }
        Some((title, self.participant_ids))
    }
}

pub async fn create_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_member(&user, "Admin accounts cannot create conversations.")?;

    let (title, raw_ids) = payload
        .ok()
        .and_then(|Json(body)| body.validated())
        .ok_or_else(|| ApiError::BadRequest("Invalid conversation payload.".into()))?;

    let mut participant_ids = Vec::with_capacity(raw_ids.len());
    for raw in &raw_ids {
        let member = Uuid::parse_str(raw.trim())
            .ok()
            .and_then(|id| state.users.find_by_id(id))
            .filter(|u| !u.is_admin());
        let Some(member) = member else {
            return Err(ApiError::BadRequest(
                "Some participants are invalid or are not standard users.".into(),
            ));
        };
        participant_ids.push(member.id);
    }

    let conversation = state.conversations.create(title, user.id, &participant_ids);
    tracing::info!(
        conversation_id = %conversation.id,
        created_by = %user.id,
        participants = conversation.participants.len(),
        "Conversation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "conversation": conversation_view(&state, &conversation, &user) })),
    ))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let conversation = load_conversation(&state, &id)?;
    if !user.is_admin() {
        require_participant(&conversation, &user, "Only conversation participants can view it.")?;
    }
    Ok(Json(json!({ "conversation": conversation_view(&state, &conversation, &user) })))
}

#[derive(Debug, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

pub async fn rename_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<RenameConversationRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let conversation = load_conversation(&state, &id)?;
    require_participant(&conversation, &user, "Only conversation participants can rename it.")?;

    let title = payload
        .ok()
        .and_then(|Json(body)| bounded_text(&body.title, MAX_TITLE_CHARS))
        .ok_or_else(|| ApiError::BadRequest("Invalid conversation title.".into()))?;

    let renamed = state.conversations.rename(conversation.id, title)?;
    tracing::debug!(conversation_id = %renamed.id, user_id = %user.id, "Conversation renamed");
    Ok(Json(json!({ "conversation": { "id": renamed.id, "title": renamed.title } })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteParticipantRequest {
    pub user_id: String,
}

pub async fn invite_participant(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<InviteParticipantRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let invitee_id = payload
        .ok()
        .map(|Json(body)| body.user_id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Invalid participant payload.".into()))?;

    let conversation = load_conversation(&state, &id)?;
    require_participant(&conversation, &user, "Only conversation participants can invite people.")?;

    let invitee = Uuid::parse_str(&invitee_id)
        .ok()
        .and_then(|id| state.users.find_by_id(id))
        .filter(|u| !u.is_admin())
        .ok_or_else(|| ApiError::BadRequest("Selected user is invalid.".into()))?;

    let notice = NewMessage::text(
        user.id,
        format!("{} added {} to the conversation.", user.display_name, invitee.display_name),
    );
    state.conversations.add_participant(conversation.id, invitee.id, notice)?;
    tracing::info!(
        conversation_id = %conversation.id,
        inviter = %user.id,
        invitee = %invitee.id,
        "Participant added"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "participant": { "userId": invitee.id, "user": UserCard::from(&invitee) } })),
    ))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let conversation = load_conversation(&state, &id)?;
    let user_id = Uuid::parse_str(&user_id).map_err(|_| ApiError::from(ChatError::NotParticipant))?;

    state.conversations.remove_participant(conversation.id, user_id)?;
    tracing::info!(
        conversation_id = %conversation.id,
        user_id = %user_id,
        admin_id = %admin.id,
        "Participant removed"
    );
    Ok(Json(json!({ "ok": true })))
}

pub async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let conversation = load_conversation(&state, &id)?;
    if !user.is_admin() {
        require_participant(&conversation, &user, "Only conversation participants can read messages.")?;
        state.conversations.mark_read(conversation.id, user.id)?;
    }

    let messages: Vec<MessageView> = conversation
        .messages
        .iter()
        .map(|m| message_view(&state, m))
        .collect();
    Ok(Json(json!({ "messages": messages })))
}

/// A text message, an image message, or an image with a caption.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub body: Option<String>,
    pub media_id: Option<String>,
}

impl PostMessageRequest {
    fn validated(self) -> Option<(Option<String>, Option<Uuid>)> {
        let body = match self.body.as_deref().map(str::trim) {
            Some(body) if body.chars().count() > MAX_BODY_CHARS => return None,
            Some(body) if !body.is_empty() => Some(body.to_string()),
            _ => None,
        };
        let media_id = match self.media_id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(Uuid::parse_str(raw).ok()?),
            _ => None,
        };
        if body.is_none() && media_id.is_none() {
            return None;
        }
        Some((body, media_id))
    }
}

pub async fn post_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_member(&user, "Admin accounts cannot send messages.")?;
    let conversation = load_conversation(&state, &id)?;
    require_participant(&conversation, &user, "Only conversation participants can send messages.")?;

    let (body, media_id) = payload
        .ok()
        .and_then(|Json(body)| body.validated())
        .ok_or_else(|| ApiError::BadRequest("Invalid message payload.".into()))?;

    if let Some(media_id) = media_id {
        let owned = state
            .media
            .get(media_id)
            .is_some_and(|record| record.uploader_id == user.id);
        if !owned {
            return Err(ApiError::BadRequest("Invalid media reference.".into()));
        }
    }

    let message = state.conversations.post_message(
        conversation.id,
        NewMessage {
            author_id: user.id,
            body,
            media_id,
        },
    )?;

    let kind = if message.media_id.is_some() { "media" } else { "text" };
    metrics::record_message(kind);
    tracing::debug!(
        conversation_id = %conversation.id,
        message_id = %message.id,
        kind,
        "Message posted"
    );

    Ok((StatusCode::CREATED, Json(json!({ "message": message_view(&state, &message) }))))
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

/// Checks shared by setting and clearing a reaction.
fn reaction_target(state: &AppState, user: &User, id: &str, message_id: &str) -> ApiResult<(Uuid, Uuid)> {
    require_member(user, "Admin accounts cannot react to messages.")?;
    let conversation = load_conversation(state, id)?;
    require_participant(&conversation, user, "Only conversation participants can react to messages.")?;

    let message_id = Uuid::parse_str(message_id)
        .ok()
        .filter(|id| conversation.message(*id).is_some())
        .ok_or_else(|| ApiError::from(ChatError::MessageNotFound))?;
    Ok((conversation.id, message_id))
}

pub async fn put_reaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, message_id)): Path<(String, String)>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let (conversation_id, message_id) = reaction_target(&state, &user, &id, &message_id)?;

    let emoji = payload
        .ok()
        .and_then(|Json(body)| bounded_text(&body.emoji, MAX_EMOJI_CHARS))
        .ok_or_else(|| ApiError::BadRequest("Invalid reaction payload.".into()))?;

    let reactions = state
        .conversations
        .set_reaction(conversation_id, message_id, user.id, Some(emoji))?;
    Ok(Json(json!({ "reactions": reaction_views(&state, &reactions) })))
}

pub async fn delete_reaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, message_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let (conversation_id, message_id) = reaction_target(&state, &user, &id, &message_id)?;
    let reactions = state
        .conversations
        .set_reaction(conversation_id, message_id, user.id, None)?;
    Ok(Json(json!({ "reactions": reaction_views(&state, &reactions) })))
}
