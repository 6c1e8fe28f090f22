use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use submission_notify_lambda::adapters::credentials::EnvCredentialSource;
use submission_notify_lambda::adapters::download::HttpDownloader;
use submission_notify_lambda::adapters::mailer::SmtpStatusMailer;
use submission_notify_lambda::adapters::object_store::GcsSubmissionStore;
use submission_notify_lambda::adapters::tracking::DynamoTrackingStore;
use submission_notify_lambda::config::NotifierConfig;
use submission_notify_lambda::handlers::submission::{
    handle_event, SubmissionDependencies, SubmissionHandlerConfig,
};
use submission_notify_lambda::logging::init_logging;

struct RuntimeDependencies {
    handler_config: SubmissionHandlerConfig,
    downloader: HttpDownloader,
    credentials: EnvCredentialSource,
    store: GcsSubmissionStore,
    mailer: SmtpStatusMailer,
    tracking: DynamoTrackingStore,
}

impl RuntimeDependencies {
    async fn load() -> Result<Self, Error> {
        let config = NotifierConfig::from_env().map_err(Error::from)?;
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let http = reqwest::Client::builder()
            .user_agent(concat!("submission-notifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| Error::from(format!("failed to build http client: {error}")))?;

        Ok(Self {
            handler_config: SubmissionHandlerConfig {
                download_root: config.download_root.clone(),
            },
            downloader: HttpDownloader::new(http.clone()),
            credentials: EnvCredentialSource::new(config.credentials_variable.clone()),
            store: GcsSubmissionStore::new(http, config.bucket.clone()),
            mailer: SmtpStatusMailer::new(&config.smtp).map_err(Error::from)?,
            tracking: DynamoTrackingStore::new(
                aws_sdk_dynamodb::Client::new(&aws_config),
                config.tracking_table.clone(),
            ),
        })
    }

    fn submission_dependencies(&self) -> SubmissionDependencies<'_> {
        SubmissionDependencies {
            downloader: &self.downloader,
            credentials: &self.credentials,
            store: &self.store,
            mailer: &self.mailer,
            tracking: &self.tracking,
        }
    }
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<Value, Error> {
    tracing::info!(request_id = %event.context.request_id, "received notification event");

    let summary = handle_event(
        event.payload,
        &deps.handler_config,
        &deps.submission_dependencies(),
    )
    .map_err(|error| Error::from(error.message))?;

    Ok(json!({
        "status": "ok",
        "processed": summary.processed,
        "rejected": summary.rejected,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();
    let deps = RuntimeDependencies::load().await?;
    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
