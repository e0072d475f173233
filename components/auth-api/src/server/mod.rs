// Copyright (c) 2024 The Machine-Auth Maintainers and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod error;
pub mod resources;

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::web::{self, Data};
use actix_web::{App, HttpResponse, HttpServer};

use diesel::RunQueryDsl;

use crate::db::DbPool;

use self::error::{Error, Result};

use self::resources::auth::Auth;
use self::resources::machines::Machines;

use crate::config::{Config, GatewayCfg};

// Application state
pub struct AppState {
    db: DbPool,
}

impl AppState {
    pub fn new(db: DbPool) -> AppState { AppState { db } }
}

/// Endpoint for determining availability of the service and its license
/// store.
///
/// Returns a status 200 on success. Any non-200 responses are an outage or a
/// partial outage.
pub async fn status(state: Data<AppState>) -> HttpResponse {
    let mut conn = match state.db.get_conn() {
        Ok(conn) => conn,
        Err(err) => {
            error!("Health check failed acquiring connection, err={}", err);
            return HttpResponse::build(StatusCode::SERVICE_UNAVAILABLE)
                .json(json!({ "status": "unhealthy", "database": "disconnected" }));
        }
    };

    match diesel::sql_query("SELECT 1").execute(&mut *conn) {
        Ok(_) => HttpResponse::Ok().json(json!({ "status": "healthy", "database": "connected" })),
        Err(err) => {
            error!("Health check query failed, err={}", err);
            HttpResponse::build(StatusCode::SERVICE_UNAVAILABLE)
                .json(json!({ "status": "unhealthy", "database": "disconnected" }))
        }
    }
}

pub async fn run(config: Config) -> Result<()> {
    let db_pool = DbPool::new(&config.datastore);

    {
        let mut conn = db_pool.get_conn().map_err(Error::DbError)?;
        crate::db::migration::run_pending(&mut conn).map_err(Error::DbError)?;
    }

    let cfg = Arc::new(config.clone());

    info!(
        "machine-auth-api listening on {}:{}",
        cfg.listen_addr(),
        cfg.listen_port()
    );

    HttpServer::new(move || {
        let app_state = AppState::new(db_pool.clone());

        App::new()
            .app_data(Data::new(app_state))
            .wrap(Logger::default().exclude("/v1/status"))
            .service(
                web::scope("/v1")
                    .configure(Auth::register)
                    .configure(Machines::register)
                    .route("/status", web::get().to(status))
                    .route("/status", web::head().to(status)),
            )
    })
    .workers(cfg.handler_count())
    .keep_alive(Duration::from_secs(cfg.http.keep_alive as u64))
    .bind(cfg.http.clone())?
    .run()
    .await?;

    Ok(())
}
