#[derive(Debug, Clone)]
pub enum GrpcCredentials {
    None,
    BearerToken(String),
    Mtls {
        client_cert_pem: Vec<u8>,
        client_key_pem: Vec<u8>,
        ca_cert_pem: Vec<u8>,
    },
}
