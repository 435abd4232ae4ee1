use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use offload_core::derive_output_filename;
use offload_engine::{
    ensure_output_dir, AtomicFileWriter, EngineCanceller, EngineEvent, EngineHandle, FileInput,
    JobRequest, JobTicket,
};
use offload_logging::{offload_error, offload_info, offload_warn};

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Submit one job per input file and wait for all of them to settle.
pub fn run(cli: &crate::cli::Cli) -> Result<RunSummary> {
    let config = cli
        .service_config()
        .context("invalid service configuration")?;
    let inputs = cli
        .files
        .iter()
        .map(|path| FileInput::from_path(path).with_context(|| format!("cannot read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    ensure_distinct_outputs(&cli.operation, cli.files.iter().map(PathBuf::as_path).zip(&inputs))?;
    ensure_output_dir(&cli.out)
        .with_context(|| format!("cannot use output directory {}", cli.out.display()))?;

    let engine = EngineHandle::new(&config).context("failed to start job engine")?;
    watch_ctrl_c(engine.canceller());

    let options = cli.job_options();
    let mut names: HashMap<JobTicket, String> = HashMap::new();
    for (ticket, file) in (1..).zip(inputs) {
        names.insert(ticket, file.name.clone());
        let request = JobRequest::new(&cli.tool, &cli.operation, file).with_options(options.clone());
        engine.submit(ticket, request);
    }

    let writer = AtomicFileWriter::new(cli.out.clone());
    let mut summary = RunSummary::default();
    let mut remaining = names.len();
    while remaining > 0 {
        let Some(event) = engine.recv() else {
            bail!("job engine stopped with {remaining} jobs still running");
        };
        let name = names
            .get(&event.ticket())
            .map(String::as_str)
            .unwrap_or("?");
        match event {
            EngineEvent::Stage { stage, .. } => offload_info!("{name}: {stage:?}"),
            EngineEvent::Progress { percent, .. } => offload_info!("{name}: {percent}%"),
            EngineEvent::Completed { result, .. } => {
                remaining -= 1;
                let written = result
                    .map_err(anyhow::Error::from)
                    .and_then(|artifact| {
                        writer
                            .write(&artifact.filename, &artifact.blob)
                            .with_context(|| format!("cannot save {}", artifact.filename))
                    });
                match written {
                    Ok(path) => {
                        offload_info!("{name}: saved {}", path.display());
                        println!("{}", path.display());
                        summary.written.push(path);
                    }
                    Err(err) => {
                        offload_error!("{name}: {err:#}");
                        summary.failed += 1;
                    }
                }
            }
        }
    }
    Ok(summary)
}

/// Refuse inputs whose results would be saved under the same name.
fn ensure_distinct_outputs<'a>(
    operation: &str,
    inputs: impl IntoIterator<Item = (&'a Path, &'a FileInput)>,
) -> Result<()> {
    let mut claimed: HashMap<String, &Path> = HashMap::new();
    for (path, file) in inputs {
        let output = derive_output_filename(&file.name, operation);
        if let Some(previous) = claimed.insert(output.clone(), path) {
            bail!(
                "{} and {} would both be saved as {output}",
                previous.display(),
                path.display()
            );
        }
    }
    Ok(())
}

/// Cancel every running job on the first Ctrl-C.
fn watch_ctrl_c(canceller: EngineCanceller) {
    let spawned = thread::Builder::new()
        .name("offload-ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    offload_warn!("Ctrl-C handling unavailable: {err}");
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                offload_warn!("interrupted; cancelling running jobs");
                canceller.cancel_all();
            }
        });
    if let Err(err) = spawned {
        offload_warn!("Ctrl-C handling unavailable: {err}");
    }
}
