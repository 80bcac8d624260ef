// src/handlers/chat.rs
use crate::chat::{ChatUser, ConversationSubscription, FeedUpdate};
use crate::middleware::auth::{auth_middleware, authenticate_token};
use crate::models::auth::{Claims, ErrorResponse};
use crate::models::chat::{
    AddParticipantRequest, ChatMessage, ConversationDetail, ConversationSummary, CreateConversationRequest,
    MessagesQuery, Participant, SendMessageRequest, SubscribeQuery,
};
use crate::store::StoreError;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn chat_routes() -> Router {
    let live_routes = Router::new().route("/api/chat/subscribe/:id", get(subscribe_handler));

    let protected_routes = Router::new()
        .route("/api/chat/conversations", get(list_conversations).post(create_conversation))
        .route("/api/chat/conversations/:id", get(get_conversation))
        .route("/api/chat/conversations/:id/participants", post(add_participant))
        .route("/api/chat/messages", get(list_messages).post(send_message))
        .route("/api/chat/read/:id", post(mark_read))
        .route_layer(axum::middleware::from_fn(auth_middleware));

    live_routes.merge(protected_routes)
}

async fn list_conversations(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConversationSummary>>, StoreError> {
    let user = ChatUser::from(&claims);
    let conversations = state.chat.list_conversations(&user).await?;
    tracing::debug!("User {} has {} conversations", user.user_id, conversations.len());
    Ok(Json(conversations))
}

async fn create_conversation(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationDetail>), StoreError> {
    let user = ChatUser::from(&claims);
    let detail = state.chat.create_conversation(&user, request).await?;
    tracing::info!(
        "💬 User {} created conversation {} with {} participants",
        user.user_id,
        detail.conversation.id,
        detail.participants.len()
    );
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_conversation(
    Path(conversation_id): Path<i64>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ConversationDetail>, StoreError> {
    let detail = state
        .chat
        .get_conversation(&ChatUser::from(&claims), conversation_id)
        .await?;
    Ok(Json(detail))
}

async fn add_participant(
    Path(conversation_id): Path<i64>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<AddParticipantRequest>,
) -> Result<Json<Participant>, StoreError> {
    let participant = state
        .chat
        .add_participant(&ChatUser::from(&claims), conversation_id, request)
        .await?;
    Ok(Json(participant))
}

async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), StoreError> {
    let message = state.chat.send_message(&ChatUser::from(&claims), request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(
    Query(query): Query<MessagesQuery>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ChatMessage>>, StoreError> {
    let messages = state
        .chat
        .list_messages(&ChatUser::from(&claims), query.conversation_id)
        .await?;
    Ok(Json(messages))
}

async fn mark_read(
    Path(conversation_id): Path<i64>,
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Participant>, StoreError> {
    let participant = state.chat.mark_read(&ChatUser::from(&claims), conversation_id).await?;
    Ok(Json(participant))
}

/// Browsers cannot set headers on a WebSocket handshake, so the token rides in the query.
async fn subscribe_handler(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<i64>,
    Query(query): Query<SubscribeQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let Some(token) = query.token.as_deref() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Missing token query parameter")),
        )
            .into_response();
    };

    let claims = match authenticate_token(token, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(rejection) => return rejection.into_response(),
    };

    // Subscribe before upgrading so access errors surface as HTTP statuses
    let subscription = match state.chat.subscribe(&ChatUser::from(&claims), conversation_id).await {
        Ok(subscription) => subscription,
        Err(e) => return e.into_response(),
    };

    let user_id = claims.sub;
    ws.on_upgrade(move |socket| stream_conversation(socket, subscription, user_id))
}

enum SocketEvent {
    Feed(Option<FeedUpdate>),
    Client(Option<Result<Message, axum::Error>>),
}

async fn stream_conversation(stream: WebSocket, mut subscription: ConversationSubscription, user_id: String) {
    let (mut sender, mut receiver) = stream.split();
    let conversation_id = subscription.conversation_id();
    tracing::info!("🔌 User {} subscribed to conversation {}", user_id, conversation_id);

    if send_frame(&mut sender, snapshot_frame(&subscription)).await.is_err() {
        tracing::warn!("Failed to send snapshot for conversation {}", conversation_id);
        return;
    }

    loop {
        let event = tokio::select! {
            update = subscription.next_update() => SocketEvent::Feed(update),
            incoming = receiver.next() => SocketEvent::Client(incoming),
        };

        match event {
            SocketEvent::Feed(Some(update)) => {
                if send_frame(&mut sender, feed_frame(&subscription, update)).await.is_err() {
                    tracing::debug!("WebSocket for conversation {} went away", conversation_id);
                    break;
                }
            }
            SocketEvent::Feed(None) => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            SocketEvent::Client(Some(Ok(Message::Close(_)))) | SocketEvent::Client(None) => break,
            SocketEvent::Client(Some(Err(e))) => {
                tracing::debug!("WebSocket receive error on conversation {}: {}", conversation_id, e);
                break;
            }
            // The feed is server-to-client only
            SocketEvent::Client(Some(Ok(_))) => {}
        }
    }

    tracing::info!("🔌 User {} left conversation {} feed", user_id, conversation_id);
}

async fn send_frame<S>(sender: &mut S, frame: Value) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    sender.send(Message::Text(frame.to_string())).await
}

fn snapshot_frame(subscription: &ConversationSubscription) -> Value {
    let mut frame = serde_json::to_value(subscription.snapshot()).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut frame {
        map.insert("type".to_string(), json!("snapshot"));
    }
    frame
}

fn feed_frame(subscription: &ConversationSubscription, update: FeedUpdate) -> Value {
    match update {
        FeedUpdate::Messages => json!({
            "type": "messages",
            "conversationId": subscription.conversation_id(),
            "messages": subscription.messages(),
            "error": subscription.messages_error(),
        }),
        FeedUpdate::Participants => json!({
            "type": "participants",
            "conversationId": subscription.conversation_id(),
            "participants": subscription.participants(),
            "error": subscription.participants_error(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::test_state;
    use crate::middleware::auth::test_support::claims;
    use crate::models::auth::UserType;
    use crate::models::chat::{ConversationType, MessageType, NewParticipant};

    async fn conversation_between(state: &Arc<AppState>, buyer: &Claims, seller: &str) -> i64 {
        let request = CreateConversationRequest {
            title: None,
            conversation_type: ConversationType::Property,
            metadata: Some(json!({"propertyId": "prop-1001"})),
            participants: vec![NewParticipant {
                user_id: seller.to_string(),
                user_type: UserType::Seller,
            }],
        };
        let (status, Json(detail)) =
            create_conversation(Extension(state.clone()), Extension(buyer.clone()), Json(request))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        detail.conversation.id
    }

    #[tokio::test]
    async fn test_conversation_flow_through_handlers() {
        let state = test_state();
        let buyer = claims("buyer-1", UserType::Buyer);
        let seller = claims("seller-1", UserType::Seller);
        let id = conversation_between(&state, &buyer, "seller-1").await;

        let request = SendMessageRequest {
            conversation_id: id,
            content: "  Is the house still available?  ".to_string(),
            message_type: MessageType::Chat,
            metadata: None,
        };
        let (status, Json(message)) = send_message(Extension(state.clone()), Extension(buyer.clone()), Json(request))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message.content, "Is the house still available?");

        let Json(summaries) = list_conversations(Extension(state.clone()), Extension(seller.clone()))
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 1);
        assert_eq!(summaries[0].conversation.title, "Property inquiry");

        let Json(participant) = mark_read(Path(id), Extension(state.clone()), Extension(seller.clone()))
            .await
            .unwrap();
        assert_eq!(participant.user_id, "seller-1");

        let Json(summaries) = list_conversations(Extension(state.clone()), Extension(seller))
            .await
            .unwrap();
        assert_eq!(summaries[0].unread_count, 0);

        let Json(messages) = list_messages(
            Query(MessagesQuery { conversation_id: id }),
            Extension(state.clone()),
            Extension(buyer),
        )
        .await
        .unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_outsiders_are_forbidden() {
        let state = test_state();
        let buyer = claims("buyer-1", UserType::Buyer);
        let id = conversation_between(&state, &buyer, "seller-1").await;

        let stranger = claims("stranger", UserType::Buyer);
        let response = get_conversation(Path(id), Extension(state.clone()), Extension(stranger))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let missing = get_conversation(Path(9999), Extension(state), Extension(buyer))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let state = test_state();
        let buyer = claims("buyer-1", UserType::Buyer);
        let id = conversation_between(&state, &buyer, "seller-1").await;

        let request = SendMessageRequest {
            conversation_id: id,
            content: "   ".to_string(),
            message_type: MessageType::Chat,
            metadata: None,
        };
        let response = send_message(Extension(state), Extension(buyer), Json(request))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_frames_carry_type_and_feed_state() {
        let state = test_state();
        let buyer = claims("buyer-1", UserType::Buyer);
        let id = conversation_between(&state, &buyer, "seller-1").await;

        let subscription = state.chat.subscribe(&ChatUser::from(&buyer), id).await.unwrap();

        let snapshot = snapshot_frame(&subscription);
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["conversationId"], id);
        assert_eq!(snapshot["participants"].as_array().unwrap().len(), 2);

        let frame = feed_frame(&subscription, FeedUpdate::Messages);
        assert_eq!(frame["type"], "messages");
        assert!(frame["messages"].as_array().unwrap().is_empty());
        assert!(frame["error"].is_null());
    }
}
