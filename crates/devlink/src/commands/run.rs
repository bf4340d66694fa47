//! `devlink run`: boot the device runtime and replay producer events.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use devlink_config::Config;
use devlink_core::{CloudService, Coordinator, CoordinatorHandle, EventBus};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::host::cloud::HostCloud;
use crate::host::{Host, report};
use crate::script::{self, Step};

pub async fn handle(args: RunArgs, config: &Config) -> Result<(), CliError> {
    info!(
        project = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "booting device runtime"
    );

    let core_config = config.to_coordinator_config().map_err(|source| CliError::Config {
        path: "(resolved)".into(),
        source,
    })?;
    let host = Host::new(config, &Handle::current())?;

    let bus = Arc::new(EventBus::new());
    let handle = CoordinatorHandle::new(Coordinator::new(core_config, host.services())?);
    handle.attach(&bus);
    handle.start()?;

    let shutdown = CancellationToken::new();
    let reporter = config
        .report_interval()
        .map(|every| tokio::spawn(report::run(handle.clone(), every, shutdown.clone())));

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &args.script {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let producer = tokio::spawn(produce(
        input,
        Arc::clone(&bus),
        handle.clone(),
        Arc::clone(&host.cloud),
    ));

    let outcome = tokio::select! {
        joined = producer => joined.map_err(|e| CliError::Runtime { message: e.to_string() })?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };

    shutdown.cancel();
    if let Some(reporter) = reporter {
        if let Err(e) = reporter.await {
            warn!(error = %e, "report producer ended abnormally");
        }
    }
    host.cloud.stop();

    let snapshot = handle.snapshot();
    println!("final state: {}", snapshot.state);
    println!("retry count: {}", snapshot.retry_count);
    println!("indicator: {}", host.indicator.current());
    outcome
}

/// Producer context: read the script and publish each event.
async fn produce(
    input: Box<dyn AsyncBufRead + Unpin + Send>,
    bus: Arc<EventBus>,
    handle: CoordinatorHandle,
    cloud: Arc<HostCloud>,
) -> Result<(), CliError> {
    let mut lines = input.lines();
    let mut number = 0;

    while let Some(line) = lines.next_line().await? {
        number += 1;
        let step = script::parse_line(&line).map_err(|reason| CliError::Script {
            line: number,
            reason,
        })?;
        let Some(step) = step else { continue };

        match step {
            Step::Publish(event) => {
                let delivered = bus.publish(&event);
                debug!(event = event.name(), delivered, "published");
            }
            Step::Message {
                content_type,
                payload,
            } => {
                if !cloud.deliver_message(content_type, payload.into_bytes()) {
                    warn!("cloud client not running; message dropped");
                }
            }
            Step::Method { name, payload } => {
                if !cloud.invoke_method(name, payload.to_string().into_bytes()) {
                    warn!("cloud client not running; method call dropped");
                }
            }
            Step::FactoryReset => handle.factory_reset(),
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
        }
    }

    debug!(lines = number, "event script finished");
    Ok(())
}
