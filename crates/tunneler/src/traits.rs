//! Tunnel provider trait

use async_trait::async_trait;

use crate::Endpoint;

/// A type that can open an introspective tunnel to a local port
#[async_trait]
pub trait Tunneler: Send + Sync {
    /// Error returned by provider operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create and start the tunnel, returning the public endpoints
    async fn open(&self, port: u16) -> Result<Vec<Endpoint>, Self::Error>;

    /// Close the tunnel and clean up all associated resources.
    ///
    /// Closing a tunnel that is not open succeeds.
    async fn close(&self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Never;

    impl std::fmt::Display for Never {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "never")
        }
    }

    impl std::error::Error for Never {}

    struct Loopback {
        open_port: Mutex<Option<u16>>,
    }

    #[async_trait]
    impl Tunneler for Loopback {
        type Error = Never;

        async fn open(&self, port: u16) -> Result<Vec<Endpoint>, Never> {
            *self.open_port.lock().unwrap() = Some(port);
            Ok(vec![Endpoint::new(format!("http://127.0.0.1:{}", port), false)])
        }

        async fn close(&self) -> Result<(), Never> {
            *self.open_port.lock().unwrap() = None;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let tunnel: Box<dyn Tunneler<Error = Never>> = Box::new(Loopback {
            open_port: Mutex::new(None),
        });
        let endpoints = tunnel.open(8080).await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, "http://127.0.0.1:8080");
        tunnel.close().await.unwrap();
        tunnel.close().await.unwrap();
    }
}
