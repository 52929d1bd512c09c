// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use actix_web::{web, HttpResponse};
use tracing::info;
use wirepool_core::InstanceManager;
use wirepool_types::api::{AllocateClientResponse, ClientRequest, RevokeClientResponse};

use crate::error::ApiError;
use crate::extract::AllowedCaller;

async fn allocate_client(
    caller: AllowedCaller,
    manager: web::Data<InstanceManager>,
    body: web::Json<ClientRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let client = manager
        .allocate_client(&body.instance_name, &body.client_id)
        .await?;

    info!(
        caller = %caller.0,
        instance = %client.instance_name,
        address = %client.address,
        "client allocated"
    );
    Ok(HttpResponse::Ok().json(AllocateClientResponse {
        instance_name: client.instance_name,
        client_id: client.identity,
        address: client.address,
        public_key: client.public_key,
        profile: client.profile,
    }))
}

async fn revoke_client(
    caller: AllowedCaller,
    manager: web::Data<InstanceManager>,
    body: web::Json<ClientRequest>,
) -> Result<HttpResponse, ApiError> {
    let released = manager
        .revoke_client(&body.instance_name, &body.client_id)
        .await?;

    info!(
        caller = %caller.0,
        instance = %body.instance_name,
        released = ?released,
        "client revoked"
    );
    Ok(HttpResponse::Ok().json(RevokeClientResponse { released }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/client")
            .route(web::post().to(allocate_client))
            .route(web::delete().to(revoke_client)),
    );
}
