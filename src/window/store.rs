//! Per-patient window state.
//!
//! The store owns the only shared mutable state in the controller: a map
//! from `patient_id` to the patient's current window. The map is sharded,
//! with one lock per shard, so different patients proceed in parallel while
//! all mutations to one patient's window are serialized.
//!
//! Finalization removes the window entry outright, so a reading that arrives
//! after its window was submitted finds no window and starts a fresh one;
//! a late reading can never reopen a submitted window.

use crate::NUM_SENSORS;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Number of lock shards in the window map.
const NUM_SHARDS: usize = 16;

/// Outcome of a slot update, reported to the gate and the audit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Value stored. `now_complete` is true when this was the last of the
    /// N slots, computed under the shard lock.
    Inserted {
        started_window: bool,
        now_complete: bool,
    },
    /// The slot already held an observed value; first value wins.
    DuplicateIgnored,
    /// `sensor_id` outside `0..NUM_SENSORS`; nothing stored, no window
    /// created.
    InvalidSensor,
}

/// One patient's in-progress window.
#[derive(Debug)]
pub struct PatientWindow {
    pub patient_id: u32,
    slots: [Option<u16>; NUM_SENSORS],
    /// Logical timestamp carried by the first reading of the window.
    pub window_timestamp: u64,
    /// Receipt time of the first reading; the timeout clock.
    pub first_seen_at: Instant,
    /// Receipt time of the most recent reading activity; surfaces as the
    /// data-staleness value when the window is finalized.
    pub last_update_at: Instant,
}

impl PatientWindow {
    fn new(patient_id: u32, window_timestamp: u64, now: Instant) -> Self {
        Self {
            patient_id,
            slots: [None; NUM_SENSORS],
            window_timestamp,
            first_seen_at: now,
            last_update_at: now,
        }
    }

    /// Store a value if the slot is still empty. First value wins.
    fn fill_slot(&mut self, sensor_id: usize, value: u16, now: Instant) -> bool {
        if self.slots[sensor_id].is_some() {
            return false;
        }
        self.slots[sensor_id] = Some(value);
        self.last_update_at = now;
        true
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }
}

/// Frozen contents of a window, taken at finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub patient_id: u32,
    pub window_timestamp: u64,
    /// Observed values; `None` marks a slot for imputation.
    pub slots: [Option<u16>; NUM_SENSORS],
    /// Time since the window's last update when the snapshot was taken.
    pub data_stale_for: Duration,
}

impl WindowSnapshot {
    /// Slot indices that still need imputation.
    pub fn missing_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_none().then_some(i))
            .collect()
    }

    pub fn observed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Sharded map of in-progress windows.
pub struct WindowStore {
    shards: Vec<Mutex<HashMap<u32, PatientWindow>>>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, patient_id: u32) -> &Mutex<HashMap<u32, PatientWindow>> {
        &self.shards[patient_id as usize % self.shards.len()]
    }

    /// Insert a value into the patient's current window, creating the window
    /// if absent. An already-observed slot is left untouched
    /// (`DuplicateIgnored`), which makes retransmitted sensor packets
    /// idempotent.
    pub fn update_slot(
        &self,
        patient_id: u32,
        sensor_id: u32,
        value: u16,
        timestamp: u64,
    ) -> SlotOutcome {
        if sensor_id as usize >= NUM_SENSORS {
            return SlotOutcome::InvalidSensor;
        }
        let now = Instant::now();
        let mut shard = self.shard(patient_id).lock().expect("window shard poisoned");
        let started_window = !shard.contains_key(&patient_id);
        let window = shard
            .entry(patient_id)
            .or_insert_with(|| PatientWindow::new(patient_id, timestamp, now));
        if !window.fill_slot(sensor_id as usize, value, now) {
            return SlotOutcome::DuplicateIgnored;
        }
        SlotOutcome::Inserted {
            started_window,
            now_complete: window.is_complete(),
        }
    }

    /// Whether all N slots of the patient's current window are observed.
    pub fn is_complete(&self, patient_id: u32) -> bool {
        let shard = self.shard(patient_id).lock().expect("window shard poisoned");
        shard.get(&patient_id).is_some_and(|w| w.is_complete())
    }

    /// Age of the patient's window (time since its first reading), or `None`
    /// if no window is open.
    pub fn age_of(&self, patient_id: u32) -> Option<Duration> {
        let shard = self.shard(patient_id).lock().expect("window shard poisoned");
        shard.get(&patient_id).map(|w| w.first_seen_at.elapsed())
    }

    /// Refresh `last_update_at` without storing data. Used only when
    /// heartbeat sentinels are configured to extend the staleness clock; it
    /// shortens the data staleness reported at finalization but never
    /// affects the timeout clock (`first_seen_at`).
    pub fn touch(&self, patient_id: u32) {
        let mut shard = self.shard(patient_id).lock().expect("window shard poisoned");
        if let Some(window) = shard.get_mut(&patient_id) {
            window.last_update_at = Instant::now();
        }
    }

    /// Atomically take the window's contents and remove it. Whichever
    /// trigger path calls this first consumes the window; any concurrent
    /// caller gets `None`. This is the sole finalization primitive and the
    /// exactly-once guarantee rests on it.
    pub fn snapshot_and_clear(&self, patient_id: u32) -> Option<WindowSnapshot> {
        let mut shard = self.shard(patient_id).lock().expect("window shard poisoned");
        shard.remove(&patient_id).map(|window| WindowSnapshot {
            patient_id,
            window_timestamp: window.window_timestamp,
            slots: window.slots,
            data_stale_for: window.last_update_at.elapsed(),
        })
    }

    /// Number of windows currently open.
    pub fn tracked_patients(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("window shard poisoned").len())
            .sum()
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}
