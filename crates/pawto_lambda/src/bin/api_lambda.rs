use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use pawto_lambda::adapters::job_api::RunpodJobLauncher;
use pawto_lambda::adapters::mailer::SesMailer;
use pawto_lambda::adapters::object_store::S3ObjectStore;
use pawto_lambda::adapters::payment_gateway::TossPaymentGateway;
use pawto_lambda::adapters::record_store::DynamoCollectionStore;
use pawto_lambda::config::{ServiceConfig, HTTP_TIMEOUT};
use pawto_lambda::handlers::response::ApiGatewayResponse;
use pawto_lambda::handlers::router::handle_api_event;
use pawto_lambda::handlers::{HandlerSettings, Services};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Adapters built once per cold start and shared by every invocation.
struct ApiRuntime {
    store: DynamoCollectionStore,
    objects: S3ObjectStore,
    mailer: SesMailer,
    payments: TossPaymentGateway,
    jobs: RunpodJobLauncher,
    settings: HandlerSettings,
}

impl ApiRuntime {
    async fn from_config(config: &ServiceConfig) -> Result<Self, Error> {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self {
            store: DynamoCollectionStore::new(
                &config.collections_table,
                aws_sdk_dynamodb::Client::new(&aws),
            ),
            objects: S3ObjectStore::new(&config.uploads_bucket, aws_sdk_s3::Client::new(&aws)),
            mailer: SesMailer::new(&config.sender_email, aws_sdk_sesv2::Client::new(&aws)),
            payments: TossPaymentGateway::new(
                &config.payment_api_base,
                &config.payment_secret_key,
                HTTP_TIMEOUT,
            )?,
            jobs: RunpodJobLauncher::new(
                &config.job_api_base,
                &config.job_endpoint_id,
                &config.job_api_key,
                HTTP_TIMEOUT,
            )?,
            settings: HandlerSettings::from_config(config),
        })
    }

    fn services(&self) -> Services<'_> {
        Services {
            store: &self.store,
            objects: &self.objects,
            mailer: &self.mailer,
            payments: &self.payments,
            jobs: &self.jobs,
            settings: &self.settings,
        }
    }
}

async fn handle_request(
    runtime: &ApiRuntime,
    event: LambdaEvent<Value>,
) -> Result<ApiGatewayResponse, Error> {
    let request_id = event.context.request_id.clone();
    let span = tracing::info_span!("request", request_id = %request_id);
    let _entered = span.enter();
    Ok(handle_api_event(event.payload, &runtime.services()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::info!(config = ?config, "starting api lambda");
    let runtime = Arc::new(ApiRuntime::from_config(&config).await?);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let runtime = Arc::clone(&runtime);
        async move { handle_request(&runtime, event).await }
    }))
    .await
}
