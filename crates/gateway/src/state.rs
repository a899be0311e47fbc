//! Application state shared across handlers.

use ferry_core::config::GatewayConfig;
use ferry_proto::auth::v1::auth_service_client::AuthServiceClient;
use ferry_proto::v1::file_service_client::FileServiceClient;
use tonic::transport::Channel;

/// Shared gateway state. Both gRPC clients multiplex over a single
/// channel each and are cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub files: FileServiceClient<Channel>,
    pub auth: AuthServiceClient<Channel>,
    pub config: GatewayConfig,
}

impl AppState {
    /// Build state with lazy channels: connections are established on
    /// first use, so the gateway starts regardless of upstream order.
    pub fn connect_lazy(config: GatewayConfig) -> anyhow::Result<Self> {
        let files_channel = Channel::from_shared(config.file_service_url.clone())?.connect_lazy();
        let auth_channel = Channel::from_shared(config.auth_service_url.clone())?.connect_lazy();

        Ok(Self {
            files: FileServiceClient::new(files_channel),
            auth: AuthServiceClient::new(auth_channel),
            config,
        })
    }
}
