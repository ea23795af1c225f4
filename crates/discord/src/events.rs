use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    commands::{CommandError, CommandRouter, Requester},
    replies::Reply,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub sequence: u64,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    MessageCreate(ChatMessage),
    Ready(ReadyEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::MessageCreate(_) => GatewayEventType::MessageCreate,
            Self::Ready(_) => GatewayEventType::Ready,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    MessageCreate,
    Ready,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub bot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub message_id: String,
    pub channel_id: String,
    /// `None` for messages sent in a direct message channel.
    pub guild_id: Option<String>,
    pub author: ChatUser,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyEvent {
    pub session_id: String,
    pub user: ChatUser,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// A reply addressed privately to one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipient_id: String,
    pub reply: Reply,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutgoingMessage),
    Processed,
    Ignored,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(&self, envelope: &GatewayEnvelope, ctx: &EventContext) -> HandlerResult;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(&self, envelope: &GatewayEnvelope, ctx: &EventContext) -> HandlerResult {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return HandlerResult::Ignored;
        };

        handler.handle(envelope, ctx).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher(router: Arc<CommandRouter>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageCreateHandler::new(router));
    dispatcher.register(ReadyHandler);
    dispatcher
}

/// Runs `!ni` commands found in chat messages. Every outcome, including
/// failures, is answered privately to the message author.
pub struct MessageCreateHandler {
    router: Arc<CommandRouter>,
}

impl MessageCreateHandler {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for MessageCreateHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::MessageCreate
    }

    async fn handle(&self, envelope: &GatewayEnvelope, ctx: &EventContext) -> HandlerResult {
        let GatewayEvent::MessageCreate(message) = &envelope.event else {
            return HandlerResult::Ignored;
        };
        if message.author.bot {
            return HandlerResult::Ignored;
        }

        let requester =
            Requester { user_id: message.author.id.clone(), name: message.author.name.clone() };
        let Some(outcome) = self.router.respond(&message.content, &requester).await else {
            return HandlerResult::Ignored;
        };

        let reply = match outcome {
            Ok(reply) => {
                info!(
                    event_name = "ingress.discord.command_handled",
                    correlation_id = %ctx.correlation_id,
                    message_id = %message.message_id,
                    author = %requester.name,
                    "note command handled"
                );
                reply
            }
            Err(error) => {
                log_command_failure(&error, message, ctx);
                Reply::from(&error)
            }
        };

        HandlerResult::Responded(OutgoingMessage { recipient_id: requester.user_id, reply })
    }
}

fn log_command_failure(error: &CommandError, message: &ChatMessage, ctx: &EventContext) {
    match error {
        CommandError::Persistence(detail) => warn!(
            event_name = "ingress.discord.command_failed",
            correlation_id = %ctx.correlation_id,
            message_id = %message.message_id,
            author = %message.author.name,
            error = %detail,
            "note storage failed while handling command"
        ),
        other => info!(
            event_name = "ingress.discord.command_rejected",
            correlation_id = %ctx.correlation_id,
            message_id = %message.message_id,
            author = %message.author.name,
            error = %other,
            "note command rejected"
        ),
    }
}

pub struct ReadyHandler;

#[async_trait]
impl EventHandler for ReadyHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::Ready
    }

    async fn handle(&self, envelope: &GatewayEnvelope, ctx: &EventContext) -> HandlerResult {
        let GatewayEvent::Ready(ready) = &envelope.event else {
            return HandlerResult::Ignored;
        };

        info!(
            event_name = "ingress.discord.ready",
            correlation_id = %ctx.correlation_id,
            session_id = %ready.session_id,
            bot_user = %ready.user.name,
            "logged in as {}",
            ready.user.name
        );
        HandlerResult::Processed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use noteit_db::InMemoryNoteRepository;

    use super::{
        default_dispatcher, ChatMessage, ChatUser, EventContext, EventDispatcher, GatewayEnvelope,
        GatewayEvent, HandlerResult, OutgoingMessage, ReadyEvent,
    };
    use crate::commands::CommandRouter;
    use crate::replies::Reply;

    fn dispatcher() -> (EventDispatcher, Arc<InMemoryNoteRepository>) {
        let repo = Arc::new(InMemoryNoteRepository::default());
        (default_dispatcher(Arc::new(CommandRouter::new(repo.clone()))), repo)
    }

    fn message(content: &str, bot: bool) -> GatewayEnvelope {
        GatewayEnvelope {
            sequence: 7,
            event: GatewayEvent::MessageCreate(ChatMessage {
                message_id: "M1".to_owned(),
                channel_id: "C1".to_owned(),
                guild_id: Some("G1".to_owned()),
                author: ChatUser { id: "U1".to_owned(), name: "alice".to_owned(), bot },
                content: content.to_owned(),
            }),
        }
    }

    #[test]
    fn default_dispatcher_registers_handlers() {
        let (dispatcher, _repo) = dispatcher();
        assert_eq!(dispatcher.handler_count(), 2);
    }

    #[tokio::test]
    async fn help_is_sent_privately_to_the_author() {
        let (dispatcher, _repo) = dispatcher();

        let result = dispatcher.dispatch(&message("!ni:help", false), &EventContext::default()).await;

        assert_eq!(
            result,
            HandlerResult::Responded(OutgoingMessage {
                recipient_id: "U1".to_owned(),
                reply: Reply::help(),
            })
        );
    }

    #[tokio::test]
    async fn command_errors_are_replied_privately() {
        let (dispatcher, repo) = dispatcher();

        let result =
            dispatcher.dispatch(&message("!ni:add:only-title", false), &EventContext::default()).await;

        let outgoing = match result {
            HandlerResult::Responded(outgoing) => outgoing,
            other => panic!("expected an error reply, got {other:?}"),
        };
        assert_eq!(outgoing.recipient_id, "U1");
        assert!(outgoing.reply.is_error());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn bot_and_plain_messages_are_ignored() {
        let (dispatcher, repo) = dispatcher();

        let from_bot =
            dispatcher.dispatch(&message("!ni:add:a:b:c", true), &EventContext::default()).await;
        let chatter = dispatcher.dispatch(&message("hello", false), &EventContext::default()).await;

        assert_eq!(from_bot, HandlerResult::Ignored);
        assert_eq!(chatter, HandlerResult::Ignored);
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn ready_event_is_processed() {
        let (dispatcher, _repo) = dispatcher();
        let envelope = GatewayEnvelope {
            sequence: 1,
            event: GatewayEvent::Ready(ReadyEvent {
                session_id: "S1".to_owned(),
                user: ChatUser { id: "B1".to_owned(), name: "noteit".to_owned(), bot: true },
            }),
        };

        let result = dispatcher.dispatch(&envelope, &EventContext::default()).await;

        assert_eq!(result, HandlerResult::Processed);
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();

        let result = dispatcher.dispatch(&message("!ni:help", false), &EventContext::default()).await;

        assert_eq!(result, HandlerResult::Ignored);
    }
}
