// Discord interactions webhook.
//
// Every request is signature-checked before the body is parsed. Commands
// answer inline unless they defer; deferred replies are completed from a
// spawned task through the outbox.

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use super::{json_error, AppState};
use crate::commands::{Invocation, Reply};
use crate::discord::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::discord::{
    Attachment, Interaction, InteractionResponse, Outbox, PlatformError,
    INTERACTION_APPLICATION_COMMAND, INTERACTION_PING,
};
use crate::metrics;

pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(signature), Some(timestamp)) = (header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER))
    else {
        return reject("signature", StatusCode::UNAUTHORIZED, "Missing request signature");
    };
    if !state.verifier.verify(signature, timestamp, &body) {
        return reject("signature", StatusCode::UNAUTHORIZED, "Invalid request signature");
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(i) => i,
        Err(e) => {
            tracing::warn!("Malformed interaction payload: {e}");
            return reject("malformed", StatusCode::BAD_REQUEST, "Malformed interaction");
        }
    };

    match interaction.kind {
        INTERACTION_PING => Json(InteractionResponse::pong()).into_response(),
        INTERACTION_APPLICATION_COMMAND => handle_command(state, interaction).await,
        other => {
            tracing::debug!("Ignoring interaction type {other}");
            reject("unsupported", StatusCode::BAD_REQUEST, "Unsupported interaction type")
        }
    }
}

fn reject(reason: &str, status: StatusCode, msg: &str) -> Response {
    metrics::INTERACTIONS_REJECTED_TOTAL
        .with_label_values(&[reason])
        .inc();
    json_error(status, msg)
}

async fn handle_command(state: AppState, interaction: Interaction) -> Response {
    let invocation = match Invocation::from_interaction(&interaction) {
        Ok(inv) => inv,
        Err(e) => {
            tracing::warn!(interaction = %interaction.id.0, "Unusable command payload: {e}");
            return respond_inline(e.into_reply());
        }
    };

    let guild = match state.dispatcher.authorize(&invocation).await {
        Ok(guild) => guild,
        Err(e) => return respond_inline(state.dispatcher.reject(&invocation.command, e)),
    };

    tracing::info!(
        command = invocation.command.name(),
        %guild,
        "Handling command"
    );

    if invocation.command.defers() {
        let token = interaction.token;
        tokio::spawn(async move {
            let reply = state.dispatcher.execute(guild, &invocation).await;
            complete(state.outbox.as_ref(), &token, reply).await;
        });
        return Json(InteractionResponse::deferred()).into_response();
    }

    match state.dispatcher.execute(guild, &invocation).await {
        Reply::Message { content, ephemeral } => {
            Json(InteractionResponse::message(content, ephemeral)).into_response()
        }
        reply => {
            let token = interaction.token;
            tokio::spawn(async move { complete(state.outbox.as_ref(), &token, reply).await });
            Json(InteractionResponse::deferred()).into_response()
        }
    }
}

fn respond_inline(reply: Reply) -> Response {
    match reply {
        Reply::Message { content, ephemeral } => {
            Json(InteractionResponse::message(content, ephemeral)).into_response()
        }
        // Errors and rejections are always single messages.
        _ => json_error(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected reply shape"),
    }
}

async fn complete(outbox: &dyn Outbox, token: &str, reply: Reply) {
    if let Err(e) = deliver(outbox, token, reply).await {
        tracing::error!("Failed to complete deferred interaction: {e}");
    }
}

/// Send `reply` as the completion of a deferred interaction.
///
/// The deferred placeholder is public, so an ephemeral reply replaces it with
/// a follow-up only the invoker can see.
pub async fn deliver(outbox: &dyn Outbox, token: &str, reply: Reply) -> Result<(), PlatformError> {
    match reply {
        Reply::Message {
            content,
            ephemeral: false,
        } => outbox.edit_original(token, &content, None).await,
        Reply::Message {
            content,
            ephemeral: true,
        } => {
            outbox.delete_original(token).await?;
            outbox.follow_up(token, &content, true).await
        }
        Reply::Pages(pages) => {
            let mut pages = pages.into_iter();
            if let Some(first) = pages.next() {
                outbox.edit_original(token, &first, None).await?;
            }
            for page in pages {
                outbox.follow_up(token, &page, false).await?;
            }
            Ok(())
        }
        Reply::File {
            notice,
            filename,
            body,
        } => {
            let attachment = Attachment {
                filename,
                data: body.into_bytes(),
            };
            outbox.edit_original(token, &notice, Some(attachment)).await
        }
    }
}
