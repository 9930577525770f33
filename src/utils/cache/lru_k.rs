use std::collections::{HashMap, HashSet, VecDeque};

use crate::buffer::FrameId;

/// LRU-K replacement over buffer frames, driven by a logical access clock.
#[derive(Debug)]
pub struct LruKReplacer {
    k: usize,
    // Last k access stamps of every tracked frame, pinned or not.
    access_history: HashMap<FrameId, VecDeque<u64>>,
    // Frames with pin_count == 0.
    evictable_frames: HashSet<FrameId>,
    current_timestamp: u64,
}

impl LruKReplacer {
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "k must be greater than 0");
        LruKReplacer {
            k,
            access_history: HashMap::new(),
            evictable_frames: HashSet::new(),
            current_timestamp: 0,
        }
    }

    /// Records an access to a frame. Called whenever a page is pinned.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.current_timestamp += 1;
        let history = self.access_history.entry(frame_id).or_default();
        history.push_back(self.current_timestamp);
        if history.len() > self.k {
            history.pop_front();
        }
    }

    /// Marks a frame's eviction status. Frames without access history are ignored.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if self.access_history.contains_key(&frame_id) {
                self.evictable_frames.insert(frame_id);
            }
        } else {
            self.evictable_frames.remove(&frame_id);
        }
    }

    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable_frames.remove(&frame_id);
        self.access_history.remove(&frame_id);
    }

    /// Picks the evictable frame with the largest backward k-distance.
    /// Frames seen fewer than k times count as infinitely distant and go
    /// first, oldest first access winning among them.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .evictable_frames
            .iter()
            .filter_map(|frame_id| {
                let history = self.access_history.get(frame_id)?;
                let oldest = *history.front()?;
                let infinite = history.len() < self.k;
                Some((frame_id, infinite, oldest))
            })
            // Infinite distance beats finite, then the older stamp wins.
            .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(frame_id, _, _)| *frame_id)?;
        self.remove(victim);
        Some(victim)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable_frames.len()
    }
}
