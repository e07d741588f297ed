//! The continuous acquisition loop.
//!
//! One background worker repeatedly retrieves a raw frame from the
//! device, converts it to RGB8, and hands it to the publisher and the
//! info emitter. Retrieval, conversion, and publish are strictly
//! sequential per frame: there is no queueing between them, so publish
//! latency directly throttles the acquisition rate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use machine_vision_formats::{ImageData, Stride};
use parking_lot::Mutex;
use tracing::{debug, error};

use cam_bridge_types::{CameraInfoMessage, ImageEncoding, ImageMessage};
use cam_iface::Camera;

use crate::bus::MessageSink;
use crate::publish::{FramePublisher, InfoEmitter};

const INITIAL_FAILURE_BACKOFF: Duration = Duration::from_millis(1);
const MAX_FAILURE_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle state of the acquisition worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Running,
    /// The worker gave up after too many consecutive per-frame failures.
    Failed,
    Stopped,
}

/// Worker status snapshot, readable from the control path.
#[derive(Debug, Clone)]
pub struct AcquisitionStatus {
    pub state: AcquisitionState,
    pub frames_published: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Frame-of-reference identifier stamped on every image message.
    pub frame_id: String,
    /// Give up after this many consecutive per-frame failures.
    pub max_consecutive_failures: u32,
}

/// Control over a spawned acquisition worker.
///
/// Dropping the handle stops the worker.
pub struct AcquisitionHandle {
    control: thread_control::Control,
    join_handle: Option<std::thread::JoinHandle<()>>,
    status: Arc<Mutex<AcquisitionStatus>>,
}

fn _test_handle_is_send() {
    // Compile-time test to ensure AcquisitionHandle implements Send trait.
    fn implements<T: Send>() {}
    implements::<AcquisitionHandle>();
}

impl AcquisitionHandle {
    pub fn status(&self) -> AcquisitionStatus {
        self.status.lock().clone()
    }

    /// Request the worker to stop and block until it has exited.
    ///
    /// The stop request is only observed at the top of the loop, so the
    /// iteration in flight completes its full retrieve/convert/publish
    /// cycle first. Idempotent.
    pub fn stop(&mut self) {
        self.control.stop();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("acquisition worker panicked");
            }
            let mut status = self.status.lock();
            if status.state == AcquisitionState::Running {
                status.state = AcquisitionState::Stopped;
            }
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the acquisition worker.
///
/// Called once, after the camera session has been configured and capture
/// started.
pub fn spawn<C, FS, IS>(
    camera: Arc<Mutex<C>>,
    publisher: FramePublisher<FS>,
    info_emitter: InfoEmitter<IS>,
    options: AcquisitionOptions,
) -> std::io::Result<AcquisitionHandle>
where
    C: Camera + 'static,
    FS: MessageSink<ImageMessage> + 'static,
    IS: MessageSink<CameraInfoMessage> + 'static,
{
    let (flag, control) = thread_control::make_pair();
    let status = Arc::new(Mutex::new(AcquisitionStatus {
        state: AcquisitionState::Running,
        frames_published: 0,
        consecutive_failures: 0,
    }));
    let worker_status = status.clone();

    let thread_builder = std::thread::Builder::new().name("cam-bridge-acquisition".to_string());
    let join_handle = thread_builder.spawn(move || {
        let mut seq: u64 = 0;
        let mut consecutive_failures: u32 = 0;
        let mut backoff = INITIAL_FAILURE_BACKOFF;

        while flag.is_alive() {
            // Hold the device lock only for the retrieval itself so the
            // control path can reach the camera between iterations.
            let retrieved = {
                let mut camera = camera.lock();
                camera.retrieve_frame()
            };
            let raw = match retrieved {
                Ok(raw) => raw,
                Err(e) => {
                    if note_failure(
                        &worker_status,
                        &mut consecutive_failures,
                        &mut backoff,
                        options.max_consecutive_failures,
                        "frame retrieval",
                        e,
                    ) {
                        break;
                    }
                    continue;
                }
            };

            // The stamp reflects retrieval completion, not the hardware
            // trigger time.
            let stamp = Utc::now();

            let frame = match raw.into_rgb8() {
                Ok(frame) => frame,
                Err(e) => {
                    if note_failure(
                        &worker_status,
                        &mut consecutive_failures,
                        &mut backoff,
                        options.max_consecutive_failures,
                        "frame conversion",
                        e,
                    ) {
                        break;
                    }
                    continue;
                }
            };
            consecutive_failures = 0;
            backoff = INITIAL_FAILURE_BACKOFF;

            let image = ImageMessage {
                stamp,
                frame_id: options.frame_id.clone(),
                seq,
                width: frame.width(),
                height: frame.height(),
                stride: frame.stride() as u32,
                encoding: ImageEncoding::Rgb8,
                data: frame.into(),
            };
            let (width, height) = (image.width, image.height);

            publisher.publish(image);
            // Same dimensions and stamp as the image just published, so
            // info and frame stay correlated.
            info_emitter.emit(width, height, stamp);

            seq += 1;
            {
                let mut status = worker_status.lock();
                status.frames_published = seq;
                status.consecutive_failures = 0;
            }
        }
        debug!(
            "closing thread {:?} ({:?})",
            std::thread::current().name(),
            std::thread::current().id()
        );
    })?;

    Ok(AcquisitionHandle {
        control,
        join_handle: Some(join_handle),
        status,
    })
}

/// Record one per-frame failure. Returns true when the worker should give
/// up.
fn note_failure(
    status: &Mutex<AcquisitionStatus>,
    consecutive_failures: &mut u32,
    backoff: &mut Duration,
    max_consecutive_failures: u32,
    what: &str,
    err: impl std::fmt::Display,
) -> bool {
    *consecutive_failures += 1;
    debug!("{what} failed ({consecutive_failures} consecutive): {err}");
    status.lock().consecutive_failures = *consecutive_failures;

    if *consecutive_failures >= max_consecutive_failures {
        error!("{what} failed {consecutive_failures} times in a row, giving up: {err}");
        status.lock().state = AcquisitionState::Failed;
        return true;
    }

    std::thread::sleep(*backoff);
    *backoff = std::cmp::min(*backoff * 2, MAX_FAILURE_BACKOFF);
    false
}
