//! Organization to organization messages

use diesel::prelude::*;
use serde::Deserialize;

use super::context::UserContext;
use super::diesel_schema::messages;
use super::models::{current_timestamp, Message, MessageWithParties, NewMessage};
use super::{new_id, organizations, products};
use crate::error::MarketError;

/// Input for sending a message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub from_organization_id: String,
    pub to_organization_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub subject: String,
    pub message: String,
}

pub fn get_message(
    conn: &mut SqliteConnection,
    message_id: &str,
) -> Result<Option<Message>, MarketError> {
    messages::table
        .filter(messages::id.eq(message_id))
        .select(Message::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Messages sent by or to any of `org_ids`, newest first
pub fn list_for_organizations(
    conn: &mut SqliteConnection,
    org_ids: &[String],
) -> Result<Vec<MessageWithParties>, MarketError> {
    if org_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Message> = messages::table
        .filter(
            messages::from_organization_id
                .eq_any(org_ids)
                .or(messages::to_organization_id.eq_any(org_ids)),
        )
        .order((messages::created_at.desc(), messages::id.asc()))
        .select(Message::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;

    let org_refs: Vec<&str> = rows
        .iter()
        .flat_map(|m| [m.from_organization_id.as_str(), m.to_organization_id.as_str()])
        .collect();
    let orgs = organizations::get_organizations_by_ids(conn, &org_refs)?;

    let product_refs: Vec<&str> = rows.iter().filter_map(|m| m.product_id.as_deref()).collect();
    let names = products::product_names(conn, &product_refs)?;

    Ok(rows
        .into_iter()
        .map(|message| MessageWithParties {
            from_org: orgs.get(&message.from_organization_id).cloned(),
            to_org: orgs.get(&message.to_organization_id).cloned(),
            product_name: message.product_id.as_ref().and_then(|id| names.get(id).cloned()),
            message,
        })
        .collect())
}

pub fn insert_message(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    input: &SendMessageInput,
) -> Result<Message, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(messages::table)
        .values(&NewMessage {
            id: &id,
            from_organization_id: &input.from_organization_id,
            to_organization_id: &input.to_organization_id,
            product_id: input.product_id.as_deref(),
            subject: input.subject.trim(),
            message: input.message.trim(),
            sender_id: &ctx.user_id,
            is_read: 0,
            created_at: &now,
        })
        .execute(conn)?;

    get_message(conn, &id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve sent message".into()))
}

pub fn mark_read(conn: &mut SqliteConnection, message_id: &str) -> Result<Message, MarketError> {
    diesel::update(messages::table.filter(messages::id.eq(message_id)))
        .set(messages::is_read.eq(1))
        .execute(conn)?;

    get_message(conn, message_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Message {}", message_id)))
}
