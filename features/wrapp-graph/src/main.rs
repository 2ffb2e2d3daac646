use std::{future::IntoFuture, time::Duration};

use tracing_subscriber::EnvFilter;
use wrapp_graph::{AccessError, ContainerBuilder, DynError, Instance};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let container = ContainerBuilder::new()
        .add_value("name", "wrapp".to_string())
        .add_provider("server", ["name", "registry"], |resolved| {
            Ok(Server {
                name: resolved.get::<String>(0)?,
                registry: resolved.instance(1)?.clone(),
            })
        })
        .add_async_provider("registry", ["server"], |resolved| async move {
            // Simulate some async setup
            futures::future::ready(()).await;
            Ok::<_, DynError>(Registry {
                server: resolved.instance(0)?.clone(),
                timeout: Duration::from_secs(5),
            })
        })
        .build()
        .unwrap();

    let app = futures::executor::block_on((&container).into_future()).unwrap();
    println!("{:?}", container);

    let server = app["server"].downcast::<Server>().unwrap();
    println!("{} registry timeout: {:?}", server.name, server.timeout().unwrap());
}

struct Server {
    name: std::sync::Arc<String>,
    /// Circular - only read after resolution
    registry: Instance,
}
impl Server {
    fn timeout(&self) -> Result<Duration, AccessError> {
        Ok(self.registry.downcast::<Registry>()?.timeout)
    }
}

#[allow(dead_code)]
struct Registry {
    server: Instance,
    timeout: Duration,
}
