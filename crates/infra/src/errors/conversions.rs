//! Conversions from external infrastructure errors into domain errors.

use metaads_domain::MetaAdsError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MetaAdsError);

impl From<InfraError> for MetaAdsError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MetaAdsError> for InfraError {
    fn from(value: MetaAdsError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MetaAdsError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(map_http_error(value))
    }
}

/// Map a transport-level failure that produced no usable HTTP response.
///
/// Status-carrying failures are handled by the classifier, which sees the
/// error body; this conversion only covers the cases where no body exists.
fn map_http_error(err: HttpError) -> MetaAdsError {
    if err.is_timeout() {
        return MetaAdsError::TransientNetwork("HTTP request timed out".into());
    }

    if err.is_connect() {
        return MetaAdsError::TransientNetwork("HTTP connection failure".into());
    }

    if err.is_builder() || err.is_request() {
        return MetaAdsError::Internal(format!("failed to build HTTP request: {err}"));
    }

    if err.is_decode() {
        return MetaAdsError::Internal(format!("failed to decode HTTP response: {err}"));
    }

    MetaAdsError::TransientNetwork(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use metaads_domain::ErrorKind;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn timeout_maps_to_transient_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .no_proxy()
            .build()
            .unwrap();
        let error = client.get(server.uri()).send().await.unwrap_err();

        let mapped: MetaAdsError = InfraError::from(error).into();
        assert_eq!(mapped.kind(), ErrorKind::TransientNetwork);
        assert!(mapped.is_retryable());
    }

    #[tokio::test]
    async fn connection_refused_maps_to_transient_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped: MetaAdsError = InfraError::from(error).into();
        assert_eq!(mapped.kind(), ErrorKind::TransientNetwork);
    }
}
