//! Embedding service client for communicating with the Python gRPC service.
//!
//! This crate is the RPC gateway of the recommendation client. It exposes
//! the remote service's four operations behind the [`EmbeddingGateway`]
//! trait:
//! - generate (and store) the embedding of a movie record
//! - store a precomputed embedding
//! - fetch the single nearest neighbor of a movie
//! - fetch the top-K nearest neighbors of a movie
//!
//! The gateway never retries. Transport and remote-side failures are
//! surfaced as [`RecsError::Transport`], wrapped with the operation name and
//! the movie identifier.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::{debug, error, info};

use catalog::{CatalogId, EmbeddingVector, MovieRecord, RecsError, Result, SimilarityResult, TopKQuery};

// Include the generated protobuf code
pub mod movie {
    tonic::include_proto!("movie");
}

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use movie::{
    embedding_service_client::EmbeddingServiceClient as GrpcEmbeddingClient,
    AddMovieRequest,
    MovieRequest,
    SimilarMovieRequest,
    SimilarMovieResponse,
    SimilarMoviesRequest,
};

/// The four operations of the remote embedding/similarity service.
///
/// Implementations must be safe to share between concurrent index workers.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Compute the embedding of `record`; the service also stores it.
    async fn generate_embedding(&self, record: &MovieRecord) -> Result<EmbeddingVector>;

    /// Store a precomputed embedding; returns the service's acknowledgement.
    async fn store_embedding(&self, id: CatalogId, embedding: EmbeddingVector) -> Result<String>;

    async fn nearest_one(&self, id: CatalogId) -> Result<SimilarityResult>;

    /// Top-K neighbors, most similar first, exactly as ranked by the service.
    async fn nearest_k(&self, query: TopKQuery) -> Result<Vec<SimilarityResult>>;
}

/// Client for the embedding service.
///
/// This wraps the auto-generated gRPC client. The generated client is a
/// cheap handle over a multiplexed [`Channel`], so every call works on its
/// own clone and `&self` is enough to call concurrently.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: GrpcEmbeddingClient<Channel>,
    service_addr: String,
}

impl EmbeddingClient {
    /// Connect to the embedding service.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    pub async fn connect(addr: impl Into<String>) -> AnyResult<Self> {
        let addr = addr.into();
        info!("Connecting to embedding service at {}", addr);

        let channel = Channel::from_shared(addr.clone())
            .context("Creating channel from address")?
            .connect()
            .await
            .context("Connecting to embedding service")?;

        Ok(Self::from_channel(channel, addr))
    }

    /// Create a client whose connection is established on first use.
    pub fn connect_lazy(addr: impl Into<String>) -> AnyResult<Self> {
        let addr = addr.into();
        let channel = Channel::from_shared(addr.clone())
            .context("Creating channel from address")?
            .connect_lazy();

        Ok(Self::from_channel(channel, addr))
    }

    fn from_channel(channel: Channel, service_addr: String) -> Self {
        Self {
            client: GrpcEmbeddingClient::new(channel),
            service_addr,
        }
    }

    /// Get the address of the embedding service this client talks to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }
}

fn wire_id(id: CatalogId) -> Result<i32> {
    i32::try_from(id).map_err(|_| {
        RecsError::InvalidArgument(format!("movie id {id} does not fit the service's id field"))
    })
}

fn neighbor_from_wire(operation: &str, id: CatalogId, neighbor: SimilarMovieResponse) -> Result<SimilarityResult> {
    let neighbor_id = CatalogId::try_from(neighbor.movie_id).map_err(|_| {
        RecsError::for_movie(
            operation,
            id,
            format!("service returned invalid movie id {}", neighbor.movie_id),
        )
    })?;
    Ok(SimilarityResult {
        id: neighbor_id,
        title: neighbor.title,
    })
}

fn rpc_error(operation: &str, id: CatalogId, status: tonic::Status) -> RecsError {
    error!("gRPC error in {} for movie {}: {}", operation, id, status);
    RecsError::for_movie(operation, id, status)
}

#[async_trait]
impl EmbeddingGateway for EmbeddingClient {
    async fn generate_embedding(&self, record: &MovieRecord) -> Result<EmbeddingVector> {
        debug!("Requesting embedding for movie {} ({:?})", record.id, record.title);
        let request = tonic::Request::new(MovieRequest {
            movie_id: wire_id(record.id)?,
            title: record.title.clone(),
            overview: record.overview.clone(),
            keywords: record.keywords.clone(),
        });

        let mut client = self.client.clone();
        let response = client
            .get_movie_embedding(request)
            .await
            .map_err(|status| rpc_error("GetMovieEmbedding", record.id, status))?;

        Ok(response.into_inner().embedding)
    }

    async fn store_embedding(&self, id: CatalogId, embedding: EmbeddingVector) -> Result<String> {
        debug!("Storing {}-dimensional embedding for movie {}", embedding.len(), id);
        let request = tonic::Request::new(AddMovieRequest {
            movie_id: wire_id(id)?,
            embedding,
        });

        let mut client = self.client.clone();
        let response = client
            .add_movie_embedding(request)
            .await
            .map_err(|status| rpc_error("AddMovieEmbedding", id, status))?;

        Ok(response.into_inner().message)
    }

    async fn nearest_one(&self, id: CatalogId) -> Result<SimilarityResult> {
        let request = tonic::Request::new(SimilarMovieRequest {
            movie_id: wire_id(id)?,
        });

        let mut client = self.client.clone();
        let response = client
            .get_similar_movie(request)
            .await
            .map_err(|status| rpc_error("GetSimilarMovie", id, status))?;

        neighbor_from_wire("GetSimilarMovie", id, response.into_inner())
    }

    async fn nearest_k(&self, query: TopKQuery) -> Result<Vec<SimilarityResult>> {
        let id = query.id();
        let limit = i32::try_from(query.limit())
            .map_err(|_| RecsError::InvalidArgument(format!("limit {} is too large", query.limit())))?;
        let request = tonic::Request::new(SimilarMoviesRequest {
            movie_id: wire_id(id)?,
            limit,
        });

        let mut client = self.client.clone();
        let response = client
            .get_similar_movies(request)
            .await
            .map_err(|status| rpc_error("GetSimilarMovies", id, status))?;

        let neighbors = response
            .into_inner()
            .movies
            .into_iter()
            .map(|neighbor| neighbor_from_wire("GetSimilarMovies", id, neighbor))
            .collect::<Result<Vec<_>>>()?;
        debug!("Received {} neighbors for movie {}", neighbors.len(), id);

        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::ErrorKind;
    use movie::embedding_service_server::{EmbeddingService, EmbeddingServiceServer};
    use movie::{AddMovieResponse, EmbeddingResponse, SimilarMoviesResponse};
    use std::collections::HashMap;
    use std::result::Result;
    use std::sync::Mutex;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;
    use tonic::{Request, Response, Status};

    // ============================================================================
    // Mock Embedding Service
    // ============================================================================

    /// Mock service that indexes titles by movie id and ranks neighbors by
    /// id distance, so results are deterministic.
    #[derive(Default)]
    struct MockEmbeddingService {
        titles: Mutex<HashMap<i32, String>>,
    }

    impl MockEmbeddingService {
        fn ranked_neighbors(&self, movie_id: i32) -> Result<Vec<SimilarMovieResponse>, Status> {
            let titles = self.titles.lock().map_err(|_| Status::internal("poisoned"))?;
            if !titles.contains_key(&movie_id) {
                return Err(Status::not_found(format!("movie {movie_id} is not indexed")));
            }
            let mut neighbors: Vec<SimilarMovieResponse> = titles
                .iter()
                .filter(|(id, _)| **id != movie_id)
                .map(|(id, title)| SimilarMovieResponse {
                    movie_id: *id,
                    title: title.clone(),
                })
                .collect();
            neighbors.sort_by_key(|n| ((n.movie_id - movie_id).abs(), n.movie_id));
            Ok(neighbors)
        }
    }

    #[tonic::async_trait]
    impl EmbeddingService for MockEmbeddingService {
        async fn get_movie_embedding(
            &self,
            request: Request<MovieRequest>,
        ) -> Result<Response<EmbeddingResponse>, Status> {
            let movie = request.into_inner();
            self.titles
                .lock()
                .map_err(|_| Status::internal("poisoned"))?
                .insert(movie.movie_id, movie.title);
            let embedding = vec![movie.movie_id as f32, movie.keywords.len() as f32, 0.5];
            Ok(Response::new(EmbeddingResponse { embedding }))
        }

        async fn add_movie_embedding(
            &self,
            request: Request<AddMovieRequest>,
        ) -> Result<Response<AddMovieResponse>, Status> {
            let add = request.into_inner();
            Ok(Response::new(AddMovieResponse {
                message: format!("stored {} values for movie {}", add.embedding.len(), add.movie_id),
            }))
        }

        async fn get_similar_movie(
            &self,
            request: Request<SimilarMovieRequest>,
        ) -> Result<Response<SimilarMovieResponse>, Status> {
            let neighbors = self.ranked_neighbors(request.get_ref().movie_id)?;
            neighbors
                .into_iter()
                .next()
                .map(Response::new)
                .ok_or_else(|| Status::not_found("no neighbors"))
        }

        async fn get_similar_movies(
            &self,
            request: Request<SimilarMoviesRequest>,
        ) -> Result<Response<SimilarMoviesResponse>, Status> {
            let SimilarMoviesRequest { movie_id, limit } = request.into_inner();
            let mut movies = self.ranked_neighbors(movie_id)?;
            movies.truncate(limit as usize);
            Ok(Response::new(SimilarMoviesResponse { movies }))
        }
    }

    /// Start a mock embedding service on a random port
    async fn start_mock_service() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock embedding service");

        let addr = listener.local_addr().expect("Failed to get local address");
        let service = EmbeddingServiceServer::new(MockEmbeddingService::default());

        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(service)
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .expect("Mock embedding service failed");
        });

        (format!("http://{}", addr), handle)
    }

    fn record(id: CatalogId, title: &str) -> MovieRecord {
        MovieRecord {
            id,
            title: title.to_string(),
            overview: String::new(),
            keywords: "sci-fi, epic".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generate_embedding_returns_vector() {
        let (addr, handle) = start_mock_service().await;
        let client = EmbeddingClient::connect(addr.clone()).await.expect("connect");

        let embedding = client
            .generate_embedding(&record(438631, "Dune"))
            .await
            .expect("embedding");

        assert_eq!(embedding, vec![438631.0, 12.0, 0.5]);
        assert_eq!(client.service_address(), addr);

        handle.abort();
    }

    #[tokio::test]
    async fn test_store_embedding_returns_acknowledgement() {
        let (addr, handle) = start_mock_service().await;
        let client = EmbeddingClient::connect(addr).await.expect("connect");

        let message = client
            .store_embedding(603, vec![0.1, 0.2, 0.3])
            .await
            .expect("store");

        assert_eq!(message, "stored 3 values for movie 603");

        handle.abort();
    }

    #[tokio::test]
    async fn test_nearest_k_preserves_service_order() {
        let (addr, handle) = start_mock_service().await;
        let client = EmbeddingClient::connect(addr).await.expect("connect");

        for (id, title) in [(10, "Ten"), (11, "Eleven"), (13, "Thirteen"), (20, "Twenty")] {
            client.generate_embedding(&record(id, title)).await.expect("index");
        }

        let neighbors = client
            .nearest_k(TopKQuery::new(10, 2).unwrap())
            .await
            .expect("neighbors");

        assert_eq!(
            neighbors,
            vec![
                SimilarityResult { id: 11, title: "Eleven".to_string() },
                SimilarityResult { id: 13, title: "Thirteen".to_string() },
            ]
        );

        let best = client.nearest_one(20).await.expect("nearest");
        assert_eq!(best.id, 13);

        handle.abort();
    }

    #[tokio::test]
    async fn test_remote_error_is_wrapped_with_operation_and_id() {
        let (addr, handle) = start_mock_service().await;
        let client = EmbeddingClient::connect(addr).await.expect("connect");

        let err = client
            .nearest_k(TopKQuery::new(999, 5).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        let message = err.to_string();
        assert!(message.contains("GetSimilarMovies"), "unexpected: {message}");
        assert!(message.contains("999"), "unexpected: {message}");

        handle.abort();
    }

    #[tokio::test]
    async fn test_out_of_range_id_is_rejected_before_sending() {
        let client = EmbeddingClient::connect_lazy("http://127.0.0.1:1").expect("lazy client");

        let err = client.nearest_one(u32::MAX).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_connect_fails_without_service() {
        let result = EmbeddingClient::connect("http://127.0.0.1:1").await;
        assert!(result.is_err(), "connect should fail when nothing is listening");
    }

    #[tokio::test]
    async fn test_connect_lazy_rejects_malformed_address() {
        assert!(EmbeddingClient::connect_lazy("not a uri").is_err());
    }
}
