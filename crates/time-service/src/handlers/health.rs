//! Liveness probe.

/// Returns `OK` while the process is serving requests.
///
/// Does not touch the authority: a JWKS outage must not get the pod killed.
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }
}
