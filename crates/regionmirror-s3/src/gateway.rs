// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! [`StorageGateway`] backed by `aws-sdk-s3`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::Client;
use dashmap::DashMap;
use regionmirror_core::{GatewayConfig, RegionId};
use regionmirror_replication::{
    Cancellation, CopyRequest, DeleteRequest, GatewayError, GatewayResult, StorageGateway,
};
use tracing::debug;

/// S3-compatible gateway with one client per (region, namespace).
pub struct S3Gateway {
    config: GatewayConfig,
    sdk_config: SdkConfig,
    credentials: Option<Credentials>,
    clients: DashMap<(RegionId, String), Client>,
}

impl S3Gateway {
    /// Create a gateway using the default credential chain from the environment.
    pub async fn new(config: GatewayConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::with_sdk_config(config, sdk_config)
    }

    /// Create a gateway from an existing SDK configuration.
    pub fn with_sdk_config(config: GatewayConfig, sdk_config: SdkConfig) -> Self {
        Self { config, sdk_config, credentials: None, clients: DashMap::new() }
    }

    /// Use static credentials instead of the SDK configuration's provider.
    pub fn with_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(access_key, secret_key, None, None, "regionmirror"));
        self.clients.clear();
        self
    }

    /// Number of cached region clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Get or build the client for a region and namespace.
    fn client(&self, region: &RegionId, namespace: &str) -> Client {
        self.clients
            .entry((region.clone(), namespace.to_string()))
            .or_insert_with(|| {
                let endpoint = self.config.endpoint(region.as_str(), namespace);
                debug!(region = %region, endpoint = %endpoint, "Creating storage client");

                let mut builder = aws_sdk_s3::config::Builder::from(&self.sdk_config)
                    .region(Region::new(region.to_string()))
                    .endpoint_url(endpoint)
                    .force_path_style(self.config.force_path_style);
                if let Some(credentials) = &self.credentials {
                    builder = builder.credentials_provider(credentials.clone());
                }
                Client::from_conf(builder.build())
            })
            .clone()
    }
}

#[async_trait]
impl StorageGateway for S3Gateway {
    async fn copy_object(&self, request: &CopyRequest, cancel: &Cancellation) -> GatewayResult<()> {
        let source = self.client(&request.source_region, &request.namespace);
        let destination = self.client(&request.destination_region, &request.namespace);

        let object = source
            .get_object()
            .bucket(&request.bucket)
            .key(&request.source_object)
            .send()
            .await
            .map_err(|e| sdk_error(&request.source_region, e))?;

        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled { region: request.destination_region.clone() });
        }

        debug!(
            source_region = %request.source_region,
            destination_region = %request.destination_region,
            object = %request.source_object,
            bytes = object.content_length.unwrap_or_default(),
            "Streaming object copy"
        );

        put_request(&destination, request, object)
            .send()
            .await
            .map_err(|e| sdk_error(&request.destination_region, e))?;

        Ok(())
    }

    async fn delete_object(&self, request: &DeleteRequest, _cancel: &Cancellation) -> GatewayResult<()> {
        self.client(&request.region, &request.namespace)
            .delete_object()
            .bucket(&request.bucket)
            .key(&request.object)
            .send()
            .await
            .map_err(|e| sdk_error(&request.region, e))?;

        Ok(())
    }
}

/// Build the destination write for a fetched object.
///
/// The body is streamed through unbuffered. User metadata and content headers
/// travel with it so the replica matches the source.
fn put_request(client: &Client, request: &CopyRequest, object: GetObjectOutput) -> PutObjectFluentBuilder {
    client
        .put_object()
        .bucket(&request.bucket)
        .key(&request.destination_object)
        .set_content_length(object.content_length)
        .set_content_type(object.content_type)
        .set_content_encoding(object.content_encoding)
        .set_content_disposition(object.content_disposition)
        .set_content_language(object.content_language)
        .set_cache_control(object.cache_control)
        .set_website_redirect_location(object.website_redirect_location)
        .set_metadata(object.metadata)
        .body(object.body)
}

/// Map an SDK error to a gateway error attributed to `region`.
fn sdk_error<E, R>(region: &RegionId, err: SdkError<E, R>) -> GatewayError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::ServiceError(context) => {
            GatewayError::service(region.clone(), DisplayErrorContext(context.into_err()).to_string())
        }
        other => GatewayError::transport(region.clone(), DisplayErrorContext(other).to_string()),
    }
}
