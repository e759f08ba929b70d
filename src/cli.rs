// SPDX-License-Identifier: GPL-3.0-only

//! CLI command bodies for the `run` and `list` subcommands

use lockstep::backends::camera::types::{CameraBackendType, SourceId};
use lockstep::backends::camera::{
    get_backend, BackendRuntime, RetrievalMode, SourceHandle, SynchronizedAcquirer,
};
use lockstep::config::PipelineConfig;
use lockstep::constants::source_label;
use lockstep::errors::{CaptureError, PipelineError};
use lockstep::media::FrameConverter;
use lockstep::pipelines::controller::PipelineController;
use lockstep::pipelines::display::terminal::TerminalRenderer;
use lockstep::pipelines::display::DisplaySink;
use lockstep::pipelines::video::RecordingSink;
use lockstep::pipelines::Sink;
use lockstep::storage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// List devices the given backend can attach
pub fn list_devices(backend_type: CameraBackendType) -> Result<(), Box<dyn std::error::Error>> {
    let _runtime = BackendRuntime::acquire(backend_type);
    let backend = get_backend(backend_type);
    let devices = backend.enumerate();

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("Available devices ({}):", backend.backend_type());
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device.model);
        println!("      path: {}  serial: {}", device.path, device.serial);
    }
    Ok(())
}

#[derive(Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub sources: Option<usize>,
    pub backend: Option<CameraBackendType>,
    pub output: Option<PathBuf>,
    pub frames: Option<u64>,
    pub no_display: bool,
    pub no_record: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<PipelineConfig, PipelineError> {
        let mut config = match self.config {
            Some(path) => PipelineConfig::load(&path)?,
            None => PipelineConfig::default(),
        };
        if let Some(sources) = self.sources {
            config.source_count = sources;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(output) = self.output {
            config.output_dir = Some(output);
        }
        if let Some(frames) = self.frames {
            config.frame_limit = Some(frames);
        }
        if self.no_display {
            config.display = false;
        }
        if self.no_record {
            config.record = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the pipeline to completion: Ctrl+C, the 'q' key, or the frame limit
/// ends the run.
pub fn run_pipeline(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.into_config()?;

    let _runtime = BackendRuntime::acquire(config.backend);
    let backend = get_backend(config.backend);

    let devices = backend.enumerate();
    if devices.len() < config.source_count {
        return Err(Box::new(PipelineError::Capture(
            CaptureError::NoDevicesFound {
                found: devices.len(),
                wanted: config.source_count,
            },
        )));
    }

    let format = config.capture_format();
    let sources: Vec<SourceHandle> = devices
        .iter()
        .take(config.source_count)
        .enumerate()
        .map(|(i, descriptor)| {
            SourceHandle::new(
                SourceId::new(i, source_label(i)),
                descriptor.clone(),
                format.clone(),
                config.pool_capacity,
            )
        })
        .collect();
    let labels: Vec<String> = sources.iter().map(|s| s.id().label.clone()).collect();

    let mode = if config.concurrent_retrieval {
        RetrievalMode::Concurrent
    } else {
        RetrievalMode::Sequential
    };
    let acquirer = SynchronizedAcquirer::new(sources, mode);

    let stop = Arc::new(AtomicBool::new(false));
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    if config.display {
        let renderer = TerminalRenderer::new()?;
        sinks.push(Box::new(DisplaySink::new(
            Box::new(renderer),
            Arc::clone(&stop),
        )));
    }
    if config.record {
        let dir = storage::session_dir(config.output_dir.as_deref())?;
        sinks.push(Box::new(RecordingSink::open(
            &dir,
            &labels,
            format.width,
            format.height,
            config.frame_rate,
            config.quality,
        )?));
        println!("Recording to {}", dir.display());
    }

    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })?;

    let mut controller = PipelineController::new(
        acquirer,
        FrameConverter::default(),
        sinks,
        stop,
        config.retrieve_timeout(),
        config.frame_limit,
    );
    controller.start(backend.as_ref())?;
    controller.run()?;

    info!(cycles = controller.cycles_delivered(), "Run complete");
    println!("Delivered {} complete cycles.", controller.cycles_delivered());
    Ok(())
}
