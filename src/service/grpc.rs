//! gRPC front end (tonic)

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto;
use crate::proto::meta_fetcher_server::{MetaFetcher, MetaFetcherServer};
use crate::service::Lookup;

pub struct MetaFetcherService {
    lookup: Arc<Lookup>,
}

impl MetaFetcherService {
    pub fn new(lookup: Arc<Lookup>) -> Self {
        Self { lookup }
    }

    pub fn into_server(self) -> MetaFetcherServer<Self> {
        MetaFetcherServer::new(self)
    }
}

#[tonic::async_trait]
impl MetaFetcher for MetaFetcherService {
    async fn get(
        &self,
        request: Request<proto::MetaRequest>,
    ) -> Result<Response<proto::Meta>, Status> {
        let id = request.into_inner().id;
        match self.lookup.get_by_id(&id) {
            Ok(record) => Ok(Response::new(proto::Meta::from(&record))),
            Err(e) => Err(e.to_grpc_status()),
        }
    }
}
