use anyhow::Context;
use clap::Parser;
use rustyvec::{
    api,
    azure::AzureSearchClient,
    config::{self, BackendKind, Config},
    embedding::{self, DEFAULT_RESERVE_PERCENTAGE, TokenCountBatchingStrategy},
    logging,
    memory::InMemoryBackend,
    qdrant::QdrantService,
    store::{SearchBackend, VectorStore, VectorStoreOptions},
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// HTTP server exposing a vector store over REST.
#[derive(Parser, Debug)]
#[command(name = "rustyvec", version, about)]
struct Cli {
    /// Port to listen on, overriding `SERVER_PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::init_config().context("Failed to load configuration")?;

    match config.backend {
        BackendKind::Azure => {
            let backend = AzureSearchClient::from_config(config)?;
            serve(backend, config, cli.port).await
        }
        BackendKind::Qdrant => {
            let backend = QdrantService::from_config(config)?;
            serve(backend, config, cli.port).await
        }
        BackendKind::Memory => serve(InMemoryBackend::new(), config, cli.port).await,
    }
}

async fn serve<B>(backend: B, config: &Config, port: Option<u16>) -> anyhow::Result<()>
where
    B: SearchBackend + 'static,
{
    let embedding_client = embedding::get_embedding_client(config)?;
    let store = VectorStore::builder(backend, embedding_client)
        .options(VectorStoreOptions {
            index_name: config.index_name.clone(),
            default_top_k: config.default_top_k,
            default_similarity_threshold: config.default_similarity_threshold,
            filter_metadata_fields: config.filter_metadata_fields.clone(),
            initialize_schema: config.initialize_schema,
        })
        .batching_strategy(TokenCountBatchingStrategy::new(
            config.embedding_max_input_tokens,
            DEFAULT_RESERVE_PERCENTAGE,
        ))
        .build()
        .await
        .context("Failed to build vector store")?;

    tracing::info!(
        provider = store.backend().provider(),
        index = %config.index_name,
        "Vector store ready"
    );
    let app = api::create_router(Arc::new(store));

    let (listener, port) = bind_listener(port.or(config.server_port))
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
