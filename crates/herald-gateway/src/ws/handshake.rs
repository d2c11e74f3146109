use herald_core::config::{HeraldConfig, PROTOCOL_VERSION};
use herald_core::UserId;
use herald_notify::push::BROADCAST_GROUP;
use herald_protocol::{
    frames::EventFrame,
    handshake::{AuthPayload, ConnectChallenge, ConnectParams, HelloOk, ServerInfo},
    methods::EVENT_CHALLENGE,
};
use uuid::Uuid;

/// Random nonce for the connect challenge.
pub fn make_nonce() -> String {
    Uuid::new_v4().to_string().replace('-', "")
}

/// Serialize the `connect.challenge` event that opens every WS session.
pub fn challenge_event(nonce: &str) -> String {
    EventFrame::new(
        EVENT_CHALLENGE,
        ConnectChallenge {
            nonce: nonce.to_string(),
        },
    )
    .into_text()
}

/// Verify client auth and return the identity the connection is filed under.
///
/// `upstream` is the `x-user-id` the identity layer attached to the upgrade
/// request, trusted the same way the REST routes trust it. When present it is
/// the identity, and a `connect` claiming someone else is refused.
///
/// Without it the claimed `user_id` is only as good as the token check. With
/// `gateway.internal_token` unset any auth mode is accepted, so any client can
/// subscribe to any user's pushes, private reminders included. That setup is
/// for local development only.
pub fn verify_auth(
    params: &ConnectParams,
    upstream: Option<&UserId>,
    config: &HeraldConfig,
) -> Result<UserId, String> {
    let user_id = params.user_id.trim();
    if user_id.is_empty() {
        return Err("user_id must not be empty".to_string());
    }

    if let Some(upstream) = upstream {
        if upstream.as_str() != user_id {
            return Err("user_id does not match the authenticated caller".to_string());
        }
        return Ok(upstream.clone());
    }

    match (&config.gateway.internal_token, &params.auth) {
        (None, _) => {}
        (Some(expected), AuthPayload::Token { token }) if token == expected => {}
        (Some(_), AuthPayload::Token { .. }) => return Err("invalid token".to_string()),
        (Some(_), AuthPayload::None) => return Err("expected token auth mode".to_string()),
    }
    Ok(UserId::from(user_id))
}

/// Build the `hello-ok` response payload after successful authentication.
pub fn hello_ok_payload(user_id: &UserId) -> HelloOk {
    HelloOk {
        protocol: PROTOCOL_VERSION,
        server: ServerInfo {
            name: "herald".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        user_id: user_id.to_string(),
        groups: vec![BROADCAST_GROUP.to_string()],
    }
}
