//! Capability discovery via gRPC server reflection: lists the services a
//! backend exposes without requiring a pre-supplied descriptor.

use tonic::transport::Channel;
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

pub async fn list_services(channel: Channel) -> Result<Vec<String>, tonic::Status> {
    let mut client = ServerReflectionClient::new(channel);
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };

    let mut stream = client
        .server_reflection_info(tonic_stream_request(request))
        .await?
        .into_inner();

    let mut services = Vec::new();
    if let Some(response) = tokio_stream::StreamExt::next(&mut stream).await {
        let response = response?;
        if let Some(MessageResponse::ListServicesResponse(list)) = response.message_response {
            services.extend(list.service.into_iter().map(|s| s.name));
        }
    }
    Ok(services)
}

fn tonic_stream_request(
    request: ServerReflectionRequest,
) -> tonic::Request<tokio_stream::Once<ServerReflectionRequest>> {
    tonic::Request::new(tokio_stream::once(request))
}
