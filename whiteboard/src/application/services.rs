use actix_web::{error::ErrorInternalServerError, get, web, Error, HttpRequest, HttpResponse};
use peer_transport::DATA_CHANNEL_LABEL;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{client, state::AppState};

#[get("/health_check")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Everything drawn so far.
#[get("/drawings")]
pub async fn drawings(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.drawings.snapshot())
}

#[get("/websocket")]
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let user_id = Uuid::new_v4();
    info!(%user_id, "New user connected");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let transport = state.transports.create(events_tx).await.map_err(|e| {
        error!(?e, "Could not create peer connection");
        ErrorInternalServerError(e)
    })?;
    let channel = match transport.create_data_channel(DATA_CHANNEL_LABEL).await {
        Ok(channel) => channel,
        Err(e) => {
            error!(?e, "Could not create data channel");
            if let Err(e) = transport.close().await {
                warn!(?e, "Could not close peer connection");
            }
            return Err(ErrorInternalServerError(e));
        }
    };

    let session = client::WsClient::new(
        user_id,
        state.get_ref().clone(),
        transport.clone(),
        channel,
        events_rx,
    );
    let res = client::start(session, &req, stream);
    if let Err(e) = &res {
        warn!(%user_id, ?e, "Websocket upgrade failed");
        if let Err(e) = transport.close().await {
            warn!(%user_id, ?e, "Could not close peer connection");
        }
    }
    res
}
