use tracing::{Instrument, error, instrument, warn};

use crate::{
    base::types::{InboundMessage, Void},
    service::{chat::ChatClient, conversation::ConversationReference},
};

use super::bot::Bot;

/// Handles an inbound message in the background and sends the replies.
#[instrument(skip_all, fields(tenant = %message.tenant_id, user = %message.user_id))]
pub fn handle_message(message: InboundMessage, reference: ConversationReference, reply_to_id: Option<String>, bot: Bot, chat: ChatClient) {
    tokio::spawn(
        async move {
            // Process the message.
            let result = handle_message_internal(message, &reference, reply_to_id, &bot, &chat).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    );
}

#[instrument(skip_all)]
pub async fn handle_message_internal(mut message: InboundMessage, reference: &ConversationReference, reply_to_id: Option<String>, bot: &Bot, chat: &ChatClient) -> Void {
    // The email is only needed for directory sync, so a failed lookup is not fatal.
    if message.email.is_none() {
        match chat.get_member_email(reference, &message.user_id).await {
            Ok(email) => message.email = email,
            Err(err) => warn!("Could not look up member email: {}", err),
        }
    }

    let replies = bot.handle(&message).await;

    for reply in &replies {
        chat.reply(reference, reply_to_id.clone(), reply).await?;
    }

    Ok(())
}
