//! Message service - messages between organizations

use std::sync::Arc;

use tracing::info;

use crate::db::messages::SendMessageInput;
use crate::db::models::{Message, MessageWithParties};
use crate::db::{messages, organizations, products, MarketDb, UserContext};
use crate::error::MarketError;

use super::events::{EventBus, MarketEvent};
use super::organization_service::require_member;
use super::validation::require_non_empty;

pub struct MessageService {
    db: Arc<MarketDb>,
    events: Arc<EventBus>,
}

impl MessageService {
    pub fn new(db: Arc<MarketDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Inbox and outbox of every organization the user belongs to
    pub fn list_for_user(&self, ctx: &UserContext) -> Result<Vec<MessageWithParties>, MarketError> {
        self.db.with_conn(|conn| {
            let org_ids = organizations::user_organization_ids(conn, &ctx.user_id)?;
            messages::list_for_organizations(conn, &org_ids)
        })
    }

    pub fn send(&self, ctx: &UserContext, input: SendMessageInput) -> Result<Message, MarketError> {
        require_non_empty("subject", &input.subject)?;
        require_non_empty("message", &input.message)?;
        if input.from_organization_id == input.to_organization_id {
            return Err(MarketError::InvalidInput(
                "An organization cannot message itself".into(),
            ));
        }

        let message = self.db.transaction(|conn| {
            require_member(conn, ctx, &input.from_organization_id)?;
            organizations::get_organization(conn, &input.to_organization_id)?.ok_or_else(|| {
                MarketError::NotFound(format!("Organization {}", input.to_organization_id))
            })?;
            if let Some(product_id) = input.product_id.as_deref() {
                products::get_product(conn, product_id)?
                    .ok_or_else(|| MarketError::NotFound(format!("Product {}", product_id)))?;
            }
            messages::insert_message(conn, ctx, &input)
        })?;

        info!(id = %message.id, from = %message.from_organization_id, to = %message.to_organization_id, "Message sent");
        self.events.emit(MarketEvent::MessageSent {
            id: message.id.clone(),
            from_organization_id: message.from_organization_id.clone(),
            to_organization_id: message.to_organization_id.clone(),
        });
        Ok(message)
    }

    /// Only members of the receiving organization mark a message read
    pub fn mark_read(&self, ctx: &UserContext, message_id: &str) -> Result<Message, MarketError> {
        let message = self.db.transaction(|conn| {
            let message = messages::get_message(conn, message_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Message {}", message_id)))?;
            if !organizations::is_member(conn, &ctx.user_id, &message.to_organization_id)? {
                return Err(MarketError::Forbidden(
                    "Only the receiving organization can mark a message read".into(),
                ));
            }
            messages::mark_read(conn, message_id)
        })?;

        self.events.emit(MarketEvent::MessageRead {
            id: message.id.clone(),
        });
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::org_types;
    use crate::db::organizations::CreateOrganizationInput;
    use crate::services::Services;

    fn org(services: &Services, user: &str, org_type: &str) -> String {
        services
            .organizations
            .create(
                &UserContext::new(user),
                CreateOrganizationInput {
                    name: format!("{} org", user),
                    org_type: org_type.into(),
                    description: None,
                    location: None,
                },
            )
            .unwrap()
            .id
    }

    fn note(from: &str, to: &str) -> SendMessageInput {
        SendMessageInput {
            from_organization_id: from.into(),
            to_organization_id: to.into(),
            product_id: None,
            subject: "Chanterelles".into(),
            message: "Do you forage?".into(),
        }
    }

    #[test]
    fn test_sender_must_belong_to_from_org() {
        let services = Services::open_in_memory().unwrap();
        let bistro = org(&services, "chef", org_types::RESTAURANT);
        let farm = org(&services, "farmer", org_types::FARM);

        assert!(matches!(
            services.messages.send(&UserContext::new("farmer"), note(&bistro, &farm)),
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            services.messages.send(&UserContext::new("chef"), note(&bistro, &bistro)),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            services.messages.send(&UserContext::new("chef"), note(&bistro, "nowhere")),
            Err(MarketError::NotFound(_))
        ));
        assert!(matches!(
            services.messages.send(
                &UserContext::new("chef"),
                SendMessageInput {
                    product_id: Some("missing".into()),
                    ..note(&bistro, &farm)
                }
            ),
            Err(MarketError::NotFound(_))
        ));
    }

    #[test]
    fn test_only_recipient_marks_read() {
        let services = Services::open_in_memory().unwrap();
        let bistro = org(&services, "chef", org_types::RESTAURANT);
        let farm = org(&services, "farmer", org_types::FARM);

        let sent = services
            .messages
            .send(&UserContext::new("chef"), note(&bistro, &farm))
            .unwrap();

        assert!(matches!(
            services.messages.mark_read(&UserContext::new("chef"), &sent.id),
            Err(MarketError::Forbidden(_))
        ));
        let read = services
            .messages
            .mark_read(&UserContext::new("farmer"), &sent.id)
            .unwrap();
        assert_eq!(read.is_read, 1);

        let farmer_inbox = services
            .messages
            .list_for_user(&UserContext::new("farmer"))
            .unwrap();
        assert_eq!(farmer_inbox.len(), 1);
        assert!(services
            .messages
            .list_for_user(&UserContext::new("stranger"))
            .unwrap()
            .is_empty());
    }
}
