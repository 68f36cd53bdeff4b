use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use super::ClientIp;
use crate::domains::devices::{derive_device_identifier, DeviceClass};
use crate::domains::gateway::{DeviceContext, GatewayError};
use crate::server::error::ApiError;

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const DEVICE_CLASS_HEADER: &str = "x-device-class";

/// The device a request comes from.
///
/// `X-Device-Id` wins when present; otherwise the identifier is a fingerprint of
/// User-Agent and client IP. `X-Device-Class` is optional and falls back to a
/// User-Agent guess.
#[derive(Debug, Clone)]
pub struct ClientDevice(pub DeviceContext);

impl ClientDevice {
    pub fn from_headers(headers: &HeaderMap, client_ip: Option<ClientIp>) -> Result<Self, ApiError> {
        let user_agent = header_str(headers, USER_AGENT.as_str()).unwrap_or_default();

        let identifier = match header_str(headers, DEVICE_ID_HEADER) {
            Some(id) => id.to_string(),
            None => derive_device_identifier(user_agent, client_ip.map(|ClientIp(ip)| ip)),
        };

        let class = match header_str(headers, DEVICE_CLASS_HEADER) {
            Some(raw) => raw.parse().map_err(|e: String| ApiError(GatewayError::Validation(e)))?,
            None => DeviceClass::from_user_agent(user_agent),
        };

        Ok(Self(DeviceContext { identifier, class }))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientDevice
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let client_ip = parts.extensions.get::<ClientIp>().copied();
        ClientDevice::from_headers(&parts.headers, client_ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";

    #[test]
    fn test_explicit_device_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_static("device-abc"));
        headers.insert(DEVICE_CLASS_HEADER, HeaderValue::from_static("ios"));

        let ClientDevice(device) = ClientDevice::from_headers(&headers, None).unwrap();
        assert_eq!(device.identifier, "device-abc");
        assert_eq!(device.class, DeviceClass::Ios);
    }

    #[test]
    fn test_fingerprint_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(IPHONE_UA));
        let ip = ClientIp("203.0.113.9".parse().unwrap());

        let ClientDevice(first) = ClientDevice::from_headers(&headers, Some(ip)).unwrap();
        let ClientDevice(again) = ClientDevice::from_headers(&headers, Some(ip)).unwrap();
        assert!(first.identifier.starts_with("fp_"));
        assert_eq!(first.identifier, again.identifier);
        assert_eq!(first.class, DeviceClass::Mobile);

        let other_ip = ClientIp("203.0.113.10".parse().unwrap());
        let ClientDevice(elsewhere) = ClientDevice::from_headers(&headers, Some(other_ip)).unwrap();
        assert_ne!(first.identifier, elsewhere.identifier);
    }

    #[test]
    fn test_unknown_device_class_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_CLASS_HEADER, HeaderValue::from_static("toaster"));
        assert!(ClientDevice::from_headers(&headers, None).is_err());
    }
}
