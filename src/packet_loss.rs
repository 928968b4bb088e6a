//! Per-entity packet-loss derivation.
//!
//! While the catalog is processed, the four packet counters of every entity
//! are written into an [`EntityAccumulator`]. Once the catalog loop is done
//! the accumulator is consumed by [`aggregate`], which emits one receive-loss
//! and one transmit-loss record per entity when both inputs of a direction
//! were seen.
//!
//! ## Guarantees
//! - `total == 0` yields `0.0`, never NaN or a division error
//! - a direction with a missing input is skipped for that entity only
//! - the accumulator is owned by one cycle and consumed at its end

use std::collections::BTreeMap;

use crate::catalog::{
    self, RX_PACKETS_DROPPED, RX_PACKETS_TOTAL, RX_PACKET_LOSS, TX_PACKETS_DROPPED,
    TX_PACKETS_TOTAL, TX_PACKET_LOSS,
};
use crate::record::{DataPoint, MetricRecord};

/// The four raw inputs of the loss computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketCounter {
    RxDropped,
    RxTotal,
    TxDropped,
    TxTotal,
}

impl PacketCounter {
    /// Map a catalog metric name onto a counter slot.
    pub fn from_metric(name: &str) -> Option<Self> {
        match name {
            RX_PACKETS_DROPPED => Some(PacketCounter::RxDropped),
            RX_PACKETS_TOTAL => Some(PacketCounter::RxTotal),
            TX_PACKETS_DROPPED => Some(PacketCounter::TxDropped),
            TX_PACKETS_TOTAL => Some(PacketCounter::TxTotal),
            _ => None,
        }
    }
}

/// Traffic direction of a derived loss metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Transmit,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Receive, Direction::Transmit];

    pub fn metric_name(&self) -> &'static str {
        match self {
            Direction::Receive => RX_PACKET_LOSS,
            Direction::Transmit => TX_PACKET_LOSS,
        }
    }
}

/// Fixed-shape slot for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketCounters {
    /// Timestamp of the most recent counter written for this entity.
    pub timestamp: Option<String>,
    pub rx_dropped: Option<f64>,
    pub rx_total: Option<f64>,
    pub tx_dropped: Option<f64>,
    pub tx_total: Option<f64>,
}

impl PacketCounters {
    fn slot_mut(&mut self, counter: PacketCounter) -> &mut Option<f64> {
        match counter {
            PacketCounter::RxDropped => &mut self.rx_dropped,
            PacketCounter::RxTotal => &mut self.rx_total,
            PacketCounter::TxDropped => &mut self.tx_dropped,
            PacketCounter::TxTotal => &mut self.tx_total,
        }
    }

    /// `(dropped, total)` for `direction`, if both were recorded.
    pub fn pair(&self, direction: Direction) -> Option<(f64, f64)> {
        match direction {
            Direction::Receive => Some((self.rx_dropped?, self.rx_total?)),
            Direction::Transmit => Some((self.tx_dropped?, self.tx_total?)),
        }
    }
}

/// Cycle-scoped map from entity id to its packet counters.
#[derive(Debug, Default)]
pub struct EntityAccumulator {
    entities: BTreeMap<String, PacketCounters>,
}

impl EntityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `entity` and bump the entity's last-seen timestamp.
    pub fn record(&mut self, entity: &str, counter: PacketCounter, value: f64, timestamp: &str) {
        let slot = self.entities.entry(entity.to_string()).or_default();
        *slot.slot_mut(counter) = Some(value);
        slot.timestamp = Some(timestamp.to_string());
    }

    pub fn get(&self, entity: &str) -> Option<&PacketCounters> {
        self.entities.get(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// `dropped * 100 / total`, or `0.0` when `total` is zero.
pub fn loss_percentage(dropped: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    dropped * 100.0 / total
}

/// Render a percentage the way it appears on the wire (`5.0`, `12.5`).
pub fn format_percentage(value: f64) -> String {
    format!("{value:?}")
}

/// Consume the accumulator and derive the loss records.
///
/// Entities are visited in id order; for each, receive loss precedes
/// transmit loss.
pub fn aggregate(accumulator: EntityAccumulator) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (entity, counters) in accumulator.entities {
        let Some(timestamp) = counters.timestamp.as_deref() else {
            continue;
        };
        for direction in Direction::ALL {
            let Some((dropped, total)) = counters.pair(direction) else {
                tracing::trace!(entity = %entity, metric = direction.metric_name(), "packet counters incomplete");
                continue;
            };
            records.push(loss_record(&entity, direction, loss_percentage(dropped, total), timestamp));
        }
    }
    records
}

fn loss_record(entity: &str, direction: Direction, loss: f64, timestamp: &str) -> MetricRecord {
    let name = direction.metric_name();
    MetricRecord {
        container_id: entity.to_string(),
        record_type: name.to_string(),
        data: vec![DataPoint {
            timestamp: timestamp.to_string(),
            unit: catalog::unit_of(name).to_string(),
            kind: catalog::kind_of(name).to_string(),
            name: name.to_string(),
            value: format_percentage(loss),
        }],
    }
}
