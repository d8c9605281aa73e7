use actix_web::{dev::Server, web, App, HttpServer};
use std::net::TcpListener;
use tracing::info;

use crate::settings::Settings;

pub mod broadcast;
pub mod client;
pub mod drawings;
mod error;
pub mod registry;
mod services;
pub mod sessions;
pub mod state;
pub mod writer;

pub use error::Error;
pub use state::AppState;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings, state: AppState) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();
        info!("Running on port: {port}");

        let server = create_server(listener, state)?;
        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn create_server(listener: TcpListener, state: AppState) -> Result<Server, anyhow::Error> {
    let state = web::Data::new(state);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(services::health_check)
            .service(services::drawings)
            .service(services::websocket)
    })
    .listen(listener)?
    .run())
}
