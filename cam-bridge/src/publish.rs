//! Frame publication and per-frame calibration info emission.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use cam_bridge_types::{Calibration, CameraInfoMessage, ImageMessage};

use crate::bus::MessageSink;
use crate::caminfo::CalibrationStore;

/// Hands built image messages to the transport.
pub struct FramePublisher<S> {
    sink: S,
}

impl<S> FramePublisher<S>
where
    S: MessageSink<ImageMessage>,
{
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn publish(&self, msg: ImageMessage) {
        self.sink.send(msg);
    }
}

/// Emits the calibration info paired with each published frame.
pub struct InfoEmitter<S> {
    store: Arc<CalibrationStore>,
    frame_id: String,
    sink: S,
}

impl<S> InfoEmitter<S>
where
    S: MessageSink<CameraInfoMessage>,
{
    pub fn new(store: Arc<CalibrationStore>, frame_id: String, sink: S) -> Self {
        Self {
            store,
            frame_id,
            sink,
        }
    }

    /// Emit the calibration matching a just-published frame.
    ///
    /// The emitted info always reports the frame's own dimensions, even
    /// when no real calibration is loaded.
    pub fn emit(&self, frame_width: u32, frame_height: u32, stamp: DateTime<Utc>) {
        let mut calibration = self.store.calibration();

        // Discard a calibration made for a different capture mode.
        if calibration.is_calibrated()
            && (frame_width != calibration.width || frame_height != calibration.height)
        {
            calibration = Calibration::default();
        }

        // Without a calibration, still report the image dimensions.
        if !calibration.is_calibrated() {
            calibration.width = frame_width;
            calibration.height = frame_height;
        }

        self.sink.send(CameraInfoMessage {
            stamp,
            frame_id: self.frame_id.clone(),
            calibration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChannelSink;

    fn calibrated_store(width: u32, height: u32, fx: f64) -> Arc<CalibrationStore> {
        let mut calibration = Calibration {
            width,
            height,
            distortion_model: "plumb_bob".to_string(),
            d: vec![0.1, -0.05, 0.0, 0.0, 0.0],
            ..Default::default()
        };
        calibration.k[0] = fx;
        calibration.k[4] = fx;
        calibration.k[8] = 1.0;
        Arc::new(CalibrationStore::with_calibration("camera", calibration))
    }

    fn emitter_with_store(
        store: Arc<CalibrationStore>,
    ) -> (
        InfoEmitter<ChannelSink<CameraInfoMessage>>,
        crossbeam_channel::Receiver<CameraInfoMessage>,
    ) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let emitter = InfoEmitter::new(store, "camera".to_string(), ChannelSink::new(tx));
        (emitter, rx)
    }

    #[test]
    fn mismatched_calibration_is_discarded() {
        let (emitter, rx) = emitter_with_store(calibrated_store(1280, 720, 800.0));

        emitter.emit(640, 480, Utc::now());
        let info = rx.try_recv().unwrap();
        assert!(!info.calibration.is_calibrated());
        assert_eq!(info.calibration.width, 640);
        assert_eq!(info.calibration.height, 480);
    }

    #[test]
    fn unpopulated_calibration_reports_frame_dimensions() {
        let store = Arc::new(CalibrationStore::new("camera", None));
        let (emitter, rx) = emitter_with_store(store);

        emitter.emit(640, 480, Utc::now());
        let info = rx.try_recv().unwrap();
        assert!(!info.calibration.is_calibrated());
        assert_eq!(info.calibration.width, 640);
        assert_eq!(info.calibration.height, 480);
    }

    #[test]
    fn matching_calibration_passes_through_unchanged() {
        let (emitter, rx) = emitter_with_store(calibrated_store(640, 480, 800.0));

        emitter.emit(640, 480, Utc::now());
        let info = rx.try_recv().unwrap();
        assert!(info.calibration.is_calibrated());
        assert_eq!(info.calibration.k[0], 800.0);
        assert_eq!(info.calibration.width, 640);
        assert_eq!(info.calibration.height, 480);
        assert_eq!(info.calibration.d, vec![0.1, -0.05, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn info_carries_stamp_and_frame_id() {
        let store = Arc::new(CalibrationStore::new("camera", None));
        let (tx, rx) = crossbeam_channel::unbounded();
        let emitter = InfoEmitter::new(store, "stereo_left".to_string(), ChannelSink::new(tx));

        let stamp = Utc::now();
        emitter.emit(64, 48, stamp);
        let info = rx.try_recv().unwrap();
        assert_eq!(info.stamp, stamp);
        assert_eq!(info.frame_id, "stereo_left");
    }
}
