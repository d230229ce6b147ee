use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{AccessType, FrameId, Result, StrataError, Timestamp};

/// Access history for a single tracked frame
#[derive(Debug, Default)]
struct LruKNode {
    /// Last k access timestamps, oldest at the front
    history: VecDeque<Timestamp>,
    /// Whether the pool is willing to surrender this frame
    is_evictable: bool,
}

/// Everything the replacer knows, serialized by one mutex. Timestamps are
/// drawn from the logical clock under the same lock, so "more recent" agrees
/// with causal order across threads.
#[derive(Debug, Default)]
struct ReplacerState {
    current_timestamp: Timestamp,
    curr_size: usize,
    nodes: HashMap<FrameId, LruKNode>,
}

/// LRU-K replacement policy.
///
/// The victim is the frame with the largest backward k-distance: the frame
/// whose k-th most recent access is oldest. Frames with fewer than k recorded
/// accesses count as infinitely distant and are evicted first, ordered among
/// themselves by their earliest access (classical LRU).
pub struct LruKReplacer {
    num_frames: usize,
    k: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer tracking frame ids in `[0, num_frames)` with
    /// history depth `k`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "history depth must be at least 1");
        Self {
            num_frames,
            k,
            state: Mutex::new(ReplacerState::default()),
        }
    }

    /// Records an access to the given frame at the next logical timestamp.
    /// Creates the node (non-evictable) on first access.
    ///
    /// `access_type` is reserved for future scan-resistant policies and does
    /// not affect the current behavior.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) -> Result<()> {
        self.check_frame_id(frame_id)?;

        let mut state = self.state.lock();
        state.current_timestamp += 1;
        let timestamp = state.current_timestamp;

        let node = state.nodes.entry(frame_id).or_default();
        node.history.push_back(timestamp);
        if node.history.len() > self.k {
            node.history.pop_front();
        }
        Ok(())
    }

    /// Flags a tracked frame as evictable or not, maintaining the evictable
    /// count. Idempotent when the flag already matches.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        self.check_frame_id(frame_id)?;

        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(&frame_id)
            .ok_or(StrataError::FrameNotTracked(frame_id))?;

        if node.is_evictable != evictable {
            node.is_evictable = evictable;
            if evictable {
                state.curr_size += 1;
            } else {
                state.curr_size -= 1;
            }
        }
        Ok(())
    }

    /// Selects and removes the eviction victim, or returns None when no
    /// frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        // Victim = minimum of (mature, oldest-retained-timestamp, frame id):
        // any node with fewer than k accesses beats every mature node, then
        // the oldest front timestamp wins. The front of a full history is the
        // k-th most recent access, so this is exactly largest backward
        // k-distance. Frame id settles (theoretical) ties deterministically.
        let mut victim: Option<(bool, Timestamp, FrameId)> = None;
        for (&frame_id, node) in &state.nodes {
            if !node.is_evictable {
                continue;
            }
            let Some(&oldest) = node.history.front() else {
                continue;
            };
            let key = (node.history.len() >= self.k, oldest, frame_id);
            if victim.map_or(true, |best| key < best) {
                victim = Some(key);
            }
        }

        let (_, _, frame_id) = victim?;
        state.nodes.remove(&frame_id);
        state.curr_size -= 1;
        Some(frame_id)
    }

    /// Drops a frame's history entirely. Untracked frames are a silent no-op;
    /// removing a non-evictable frame is a contract violation.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.check_frame_id(frame_id)?;

        let mut state = self.state.lock();
        let Some(node) = state.nodes.get(&frame_id) else {
            return Ok(());
        };
        if !node.is_evictable {
            return Err(StrataError::FrameNotEvictable(frame_id));
        }
        state.nodes.remove(&frame_id);
        state.curr_size -= 1;
        Ok(())
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Whether the replacer currently has history for the frame.
    pub(crate) fn tracks(&self, frame_id: FrameId) -> bool {
        self.state.lock().nodes.contains_key(&frame_id)
    }

    fn check_frame_id(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.num_frames {
            return Err(StrataError::InvalidFrameId(frame_id));
        }
        Ok(())
    }
}
