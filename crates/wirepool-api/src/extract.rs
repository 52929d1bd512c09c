use std::future::{Ready, ready};
use std::net::IpAddr;

use actix_web::dev::Payload;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use ipnetwork::IpNetwork;
use tracing::warn;

use crate::error::ApiError;

/// Ranges whose hosts may call the client endpoints.
#[derive(Debug, Clone, Default)]
pub struct AccessList(pub Vec<IpNetwork>);

impl AccessList {
    pub fn allows(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.0.iter().any(|net| net.contains(ip))
    }
}

/// A request whose peer address passed the [`AccessList`].
#[derive(Debug)]
pub struct AllowedCaller(pub IpAddr);

impl FromRequest for AllowedCaller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(check_caller(req))
    }
}

fn check_caller(req: &HttpRequest) -> Result<AllowedCaller, ApiError> {
    let access = req
        .app_data::<Data<AccessList>>()
        .ok_or(ApiError::Internal)?;

    let peer = req
        .peer_addr()
        .ok_or_else(|| ApiError::Forbidden("unknown".to_string()))?
        .ip();

    if !access.allows(peer) {
        warn!(caller = %peer, "refused caller outside allowed ranges");
        return Err(ApiError::Forbidden(peer.to_string()));
    }
    Ok(AllowedCaller(peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn access() -> AccessList {
        AccessList(vec!["127.0.0.1/32".parse().unwrap(), "10.10.0.0/16".parse().unwrap()])
    }

    #[test_case("127.0.0.1", true ; "loopback")]
    #[test_case("10.10.4.20", true ; "inside range")]
    #[test_case("10.11.0.1", false ; "outside range")]
    #[test_case("::ffff:10.10.0.7", true ; "mapped ipv4")]
    #[test_case("::1", false ; "ipv6 loopback")]
    fn access_list(ip: &str, expected: bool) {
        assert_eq!(access().allows(ip.parse().unwrap()), expected);
    }

    #[test]
    fn empty_list_refuses_everyone() {
        assert!(!AccessList::default().allows("127.0.0.1".parse().unwrap()));
    }
}
