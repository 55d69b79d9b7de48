use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::network::connect_tls;
use crate::{AppError, AppResult, TlsConfig};

use super::{ConnectOutcome, ConnectRequest, DisplayTarget, HookHandle, Host, Socket};

/// [`Host`] backed by the tokio runtime.
///
/// Connect attempts run as spawned tasks; `unregister` aborts the task if it
/// is still running. Status lines go to `tracing` under the
/// `matrixlink::display` target.
#[derive(Debug)]
pub struct TokioHost {
    runtime: Handle,
    next_hook: AtomicU64,
    hooks: DashMap<u64, AbortHandle>,
}

impl TokioHost {
    /// Binds to the runtime of the calling context.
    pub fn new() -> AppResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| AppError::IllegalStateError(format!("no tokio runtime: {}", e)))?;
        Ok(Self::with_runtime(runtime))
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        TokioHost {
            runtime,
            next_hook: AtomicU64::new(1),
            hooks: DashMap::new(),
        }
    }

    /// Number of registrations not yet unregistered.
    pub fn active_hooks(&self) -> usize {
        self.hooks.len()
    }
}

async fn establish(address: &str, port: u16, tls: &TlsConfig) -> ConnectOutcome {
    let stream = TcpStream::connect((address, port)).await?;
    stream.set_nodelay(true)?;
    if !tls.enabled {
        return Ok(Box::new(stream) as Socket);
    }
    let tls_stream = connect_tls(stream, address, tls).await.map_err(|e| match e {
        AppError::IoError(io_error) => io_error,
        other => io::Error::other(other.to_string()),
    })?;
    Ok(Box::new(tls_stream) as Socket)
}

impl Host for TokioHost {
    fn notify(&self, target: Option<&DisplayTarget>, line: &str) {
        let buffer = target.map(DisplayTarget::name).unwrap_or("");
        info!(target: "matrixlink::display", buffer, "{}", line);
    }

    fn create_display_target(&self, name: &str) -> DisplayTarget {
        debug!(target: "matrixlink::display", "creating display target {}", name);
        DisplayTarget::new(name)
    }

    fn register_connect(&self, request: ConnectRequest) -> HookHandle {
        let id = self.next_hook.fetch_add(1, Ordering::Relaxed);
        let ConnectRequest {
            name,
            address,
            port,
            tls,
            completion,
        } = request;
        let task = self.runtime.spawn(async move {
            let outcome = establish(&address, port, &tls).await;
            if let Err(ref e) = outcome {
                debug!(target: "matrixlink::network", "connect to {}:{} for {} failed: {}", address, port, name, e);
            }
            if completion.send(outcome).is_err() {
                debug!(target: "matrixlink::network", "connect attempt for {} abandoned", name);
            }
        });
        self.hooks.insert(id, task.abort_handle());
        HookHandle::new(id)
    }

    fn unregister(&self, handle: HookHandle) {
        if let Some((_, task)) = self.hooks.remove(&handle.id()) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::{fixture, rstest};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use crate::service::setup_local_tracing;

    use super::*;

    #[fixture]
    #[once]
    fn setup() {
        setup_local_tracing().expect("failed to setup tracing");
    }

    fn request(port: u16) -> (ConnectRequest, oneshot::Receiver<ConnectOutcome>) {
        let (tx, rx) = oneshot::channel();
        let request = ConnectRequest {
            name: "test".to_string(),
            address: "127.0.0.1".to_string(),
            port,
            tls: TlsConfig::default(),
            completion: tx,
        };
        (request, rx)
    }

    #[rstest]
    #[tokio::test]
    async fn test_connect_delivers_socket(_setup: ()) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let host = Arc::new(TokioHost::new().unwrap());

        let (request, rx) = request(port);
        let hook = host.register_connect(request);
        assert_eq!(host.active_hooks(), 1);

        let (mut accepted, _) = listener.accept().await.unwrap();
        let mut socket = rx.await.unwrap().unwrap();
        socket.write_all(b"ping").await.unwrap();
        socket.flush().await.unwrap();

        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        host.unregister(hook);
        assert_eq!(host.active_hooks(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn test_connect_refused_reports_error(_setup: ()) {
        // grab a free port, then close the listener so nothing accepts on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let host = TokioHost::new().unwrap();
        let (request, rx) = request(port);
        host.register_connect(request);

        let outcome = rx.await.unwrap();
        assert!(outcome.is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn test_unregister_unknown_handle_is_noop(_setup: ()) {
        let host = TokioHost::new().unwrap();
        host.unregister(HookHandle::new(42));
        assert_eq!(host.active_hooks(), 0);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(
            TokioHost::new(),
            Err(AppError::IllegalStateError(_))
        ));
    }
}
