//! The outbound message bus seam.
//!
//! The real pub/sub transport lives outside this crate; the bridge only
//! needs a fire-and-forget hand-off point for each outbound channel.

use tracing::{debug, warn};

/// A fire-and-forget outbound message channel.
///
/// Sending never fails from the caller's point of view: the stream is
/// lossy telemetry and a slow or absent consumer must not stall
/// acquisition.
pub trait MessageSink<M>: Send {
    fn send(&self, msg: M);
}

/// A sink backed by a crossbeam channel sender.
///
/// With a bounded channel, messages are dropped when the consumer falls
/// behind.
pub struct ChannelSink<M> {
    tx: crossbeam_channel::Sender<M>,
}

impl<M> ChannelSink<M> {
    pub fn new(tx: crossbeam_channel::Sender<M>) -> Self {
        Self { tx }
    }
}

impl<M: Send> MessageSink<M> for ChannelSink<M> {
    fn send(&self, msg: M) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                warn!("dropping message due to backpressure");
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                debug!("message sink listener disconnected");
            }
        }
    }
}

fn _test_channel_sink_is_send() {
    // Compile-time test to ensure ChannelSink implements Send trait.
    fn implements<T: Send>() {}
    implements::<ChannelSink<Vec<u8>>>();
}
