//! The telemetry collaborator.
//!
//! An injected trait rather than a global logger, so call sites carry
//! their sink explicitly instead of reaching for a singleton. `tracing`
//! events are emitted alongside every call; `TelemetrySink` is the
//! structured counterpart a telemetry backend (out of scope here) would
//! consume.

use crate::primitives::Hash;

/// Telemetry events emitted by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
  /// A new code blob was bound to a block.
  RuntimeUpgraded { block_hash: Hash, code_hash: Hash },
  /// A block reached finality.
  BlockFinalized { block_hash: Hash, number: u64 },
  /// An extrinsic from a discarded branch failed re-validation on reorg
  /// and was dropped.
  DroppedOnReorg { extrinsic_hash: Hash, reason: String },
}

/// A sink for telemetry events. Transport (e.g. submitting to a telemetry
/// relay) is explicitly out of scope; this trait is the seam.
pub trait TelemetrySink: Send + Sync {
  fn emit(&self, event: TelemetryEvent);
}

/// A sink that only logs via `tracing`, used when no telemetry backend is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOnlySink;

impl TelemetrySink for TracingOnlySink {
  fn emit(&self, event: TelemetryEvent) {
    match event {
      TelemetryEvent::RuntimeUpgraded { block_hash, code_hash } => {
        tracing::info!(%block_hash, %code_hash, "runtime upgraded");
      }
      TelemetryEvent::BlockFinalized { block_hash, number } => {
        tracing::info!(%block_hash, number, "block finalized");
      }
      TelemetryEvent::DroppedOnReorg { extrinsic_hash, reason } => {
        tracing::warn!(%extrinsic_hash, %reason, "extrinsic dropped on reorg revalidation");
      }
    }
  }
}

/// An in-memory sink that records every event, used by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
  events: parking_lot::Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn events(&self) -> Vec<TelemetryEvent> {
    self.events.lock().clone()
  }
}

impl TelemetrySink for RecordingSink {
  fn emit(&self, event: TelemetryEvent) {
    self.events.lock().push(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recording_sink_keeps_events_in_order() {
    let sink = RecordingSink::new();
    sink.emit(TelemetryEvent::BlockFinalized {
      block_hash: Hash::ZERO,
      number: 1,
    });
    sink.emit(TelemetryEvent::BlockFinalized {
      block_hash: Hash::ZERO,
      number: 2,
    });
    assert_eq!(sink.events().len(), 2);
  }
}
