//! GStreamer pipeline reading a PipeWire node.

use std::sync::{Arc, OnceLock};

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use wcap_types::CaptureConfig;

use crate::error::CaptureError;
use crate::frame::{CropRect, RawBuffer};
use crate::slot::{latest_slot, SlotReceiver, SlotSender};
use crate::stream::{pipeline_description, VideoStream};
use crate::CaptureResult;

static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Longest wait for an asynchronous switch to PLAYING.
const PLAY_TIMEOUT_SECS: u64 = 5;

/// Elements the launch description depends on.
const REQUIRED_ELEMENTS: [&str; 3] = ["pipewiresrc", "videoconvert", "appsink"];

/// Sender shared by the appsink callbacks and the bus handler.
/// Taking it out ends the stream for the puller.
type SharedSender = Arc<Mutex<Option<SlotSender<gst::Sample>>>>;

/// Initialize GStreamer once per process.
pub fn ensure_initialized() -> CaptureResult<()> {
    GST_INIT
        .get_or_init(|| gst::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(CaptureError::PipelineConstruction)
}

fn conversion(message: impl Into<String>) -> CaptureError {
    CaptureError::FrameConversion(message.into())
}

/// [`VideoStream`] backed by `pipewiresrc ! videoconvert ! appsink`.
pub struct GstVideoStream {
    config: CaptureConfig,
    pipeline: Option<gst::Pipeline>,
    samples: Option<SlotReceiver<gst::Sample>>,
}

impl GstVideoStream {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            config: config.clone(),
            pipeline: None,
            samples: None,
        }
    }

    fn build(&self, node_id: u32) -> CaptureResult<(gst::Pipeline, SlotReceiver<gst::Sample>)> {
        ensure_initialized()?;

        for name in REQUIRED_ELEMENTS {
            if gst::ElementFactory::find(name).is_none() {
                return Err(CaptureError::MissingPlugin(name.to_string()));
            }
        }

        let description = pipeline_description(node_id, &self.config);
        debug!(%description, "Launching pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| CaptureError::PipelineConstruction(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| {
                CaptureError::PipelineConstruction("launch did not yield a pipeline".to_string())
            })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| CaptureError::PipelineConstruction("appsink not found".to_string()))?;

        let (sender, receiver) = latest_slot();
        let sender: SharedSender = Arc::new(Mutex::new(Some(sender)));

        let on_sample = Arc::clone(&sender);
        let on_eos = Arc::clone(&sender);
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    match on_sample.lock().as_ref() {
                        Some(slot) => {
                            slot.publish(sample);
                            Ok(gst::FlowSuccess::Ok)
                        }
                        None => Err(gst::FlowError::Flushing),
                    }
                })
                .eos(move |_| {
                    info!("Capture stream reached end of stream");
                    on_eos.lock().take();
                })
                .build(),
        );

        // Nobody iterates the bus, so errors are handled as they are posted.
        if let Some(bus) = pipeline.bus() {
            let on_error = Arc::clone(&sender);
            bus.set_sync_handler(move |_, message| {
                if let gst::MessageView::Error(err) = message.view() {
                    warn!("Capture pipeline error: {}", err.error());
                    on_error.lock().take();
                }
                gst::BusSyncReply::Drop
            });
        }

        play(&pipeline)?;
        Ok((pipeline, receiver))
    }
}

impl VideoStream for GstVideoStream {
    #[instrument(name = "gst_open", skip(self))]
    fn open(&mut self, node_id: u32) -> CaptureResult<()> {
        if self.pipeline.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        let (pipeline, samples) = self.build(node_id)?;
        self.pipeline = Some(pipeline);
        self.samples = Some(samples);
        info!("Pipeline playing");
        Ok(())
    }

    fn pull_with<R>(&mut self, f: impl FnOnce(&RawBuffer<'_>) -> R) -> CaptureResult<R> {
        let samples = self.samples.as_ref().ok_or(CaptureError::NotStarted)?;
        let sample = samples.recv().ok_or(CaptureError::StreamEnded)?;
        with_raw_buffer(&sample, f)
    }

    fn close(&mut self) {
        self.samples = None;
        if let Some(pipeline) = self.pipeline.take() {
            if let Some(bus) = pipeline.bus() {
                bus.unset_sync_handler();
            }
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                warn!("Failed to stop pipeline: {}", e);
            }
            debug!("Pipeline stopped");
        }
    }

    fn dropped_buffers(&self) -> u64 {
        self.samples.as_ref().map_or(0, SlotReceiver::dropped)
    }
}

impl Drop for GstVideoStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Switch `pipeline` to PLAYING, waiting out an asynchronous transition.
///
/// On failure the pipeline is set back to NULL.
fn play(pipeline: &gst::Pipeline) -> CaptureResult<()> {
    let started = match pipeline.set_state(gst::State::Playing) {
        Ok(gst::StateChangeSuccess::Async) => {
            let (result, current, pending) =
                pipeline.state(gst::ClockTime::from_seconds(PLAY_TIMEOUT_SECS));
            debug!(?current, ?pending, "Asynchronous state change settled");
            match result {
                Ok(gst::StateChangeSuccess::Async) => Err(format!(
                    "pipeline not playing after {}s",
                    PLAY_TIMEOUT_SECS
                )),
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            }
        }
        Ok(success) => {
            debug!(?success, "Pipeline state changed");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    };

    started.map_err(|reason| {
        let _ = pipeline.set_state(gst::State::Null);
        CaptureError::PipelineConstruction(format!("failed to start pipeline: {}", reason))
    })
}

/// Map `sample` and view it as a [`RawBuffer`].
///
/// Geometry comes from the buffer's video meta when present, otherwise
/// from the negotiated caps.
fn with_raw_buffer<R>(
    sample: &gst::Sample,
    f: impl FnOnce(&RawBuffer<'_>) -> R,
) -> CaptureResult<R> {
    let caps = sample.caps().ok_or_else(|| conversion("sample without caps"))?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(|e| conversion(e.to_string()))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| conversion("sample without buffer"))?;
    let map = buffer
        .map_readable()
        .map_err(|_| conversion("buffer not readable"))?;

    let (width, height, offset, stride) = match buffer.meta::<gst_video::VideoMeta>() {
        Some(meta) => (meta.width(), meta.height(), meta.offset()[0], meta.stride()[0]),
        None => (info.width(), info.height(), info.offset()[0], info.stride()[0]),
    };
    let stride =
        usize::try_from(stride).map_err(|_| conversion(format!("negative stride {}", stride)))?;
    let data = map
        .as_slice()
        .get(offset..)
        .ok_or_else(|| conversion(format!("plane offset {} past end of buffer", offset)))?;

    let crop = buffer.meta::<gst_video::VideoCropMeta>().map(|meta| {
        let (x, y, width, height) = meta.rect();
        CropRect::new(x, y, width, height)
    });

    let raw = RawBuffer::new(data, width, height, stride)?.with_crop(crop);
    Ok(f(&raw))
}
