//! Implémentation du trait StreamServiceExt pour pmoserver::Server

use crate::api::StreamHttpState;
use crate::config_ext::StreamConfigExt;
use crate::fetcher::{Fetcher, SourceResolver};
use crate::openapi::ApiDoc;
use crate::pmoserver_ext::{create_api_router, create_stream_router, StreamServiceExt};
use crate::service::StreamService;
use crate::clock::SystemClock;
use async_trait::async_trait;
use std::sync::Arc;
use utoipa::OpenApi;

#[async_trait]
impl StreamServiceExt for pmoserver::Server {
    async fn init_stream_service(
        &mut self,
        service: Arc<StreamService>,
        api_key: Option<String>,
    ) -> anyhow::Result<()> {
        let base_url = self.info().base_url;
        let state = StreamHttpState::new(service)
            .with_api_key(api_key)
            .with_base_url(Some(base_url));

        // Routes publiques: GET /youtube, /status/{id}, /stream/{id}
        self.add_router("/", create_stream_router(state.clone()))
            .await;

        // API REST: /api/streams + /swagger-ui/streams
        self.add_openapi(create_api_router(state), ApiDoc::openapi(), "streams")
            .await;

        Ok(())
    }

    async fn init_stream_service_configured(
        &mut self,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn SourceResolver>,
    ) -> anyhow::Result<Arc<StreamService>> {
        let config = pmoconfig::get_config();
        let settings = config.get_stream_settings()?;
        let service = Arc::new(StreamService::with_parts(
            settings,
            fetcher,
            resolver,
            Arc::new(SystemClock),
        )?);

        self.init_stream_service(service.clone(), config.get_streams_api_key())
            .await?;
        Ok(service)
    }
}
