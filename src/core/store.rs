//! Ordered segment collections with collision queries.

use crate::core::segment::{Placed, Placement, SegmentId};
use crate::core::time::Frame;
use crate::core::track::{TrackId, TrackIndex};

/// The placed segments of one kind, in insertion order.
///
/// Insertion order is irrelevant to semantics; it only keeps rendering
/// stable. All lookups are linear scans; segment counts stay small.
pub struct SegmentStore<S: Placed> {
    segments: Vec<S>,
}

impl<S: Placed> Default for SegmentStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Placed> SegmentStore<S> {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.segments.iter()
    }

    pub fn get(&self, id: SegmentId) -> Option<&S> {
        self.segments.iter().find(|s| s.id() == id)
    }

    pub fn get_mut(&mut self, id: SegmentId) -> Option<&mut S> {
        self.segments.iter_mut().find(|s| s.id() == id)
    }

    pub fn insert(&mut self, segment: S) {
        self.segments.push(segment);
    }

    pub fn remove(&mut self, id: SegmentId) -> Option<S> {
        let pos = self.segments.iter().position(|s| s.id() == id)?;
        Some(self.segments.remove(pos))
    }

    /// Remove every segment matching the predicate; returns how many.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&S) -> bool) -> usize {
        let before = self.segments.len();
        self.segments.retain(|s| !pred(s));
        before - self.segments.len()
    }

    /// Segment on `track` whose interval contains `frame`, if any.
    pub fn active_at(&self, track: TrackId, frame: Frame) -> Option<&S> {
        self.segments
            .iter()
            .find(|s| s.placement().track == track && s.placement().contains(frame))
    }

    /// First segment on any track whose interval contains `frame`.
    ///
    /// No priority between tracks; first match in insertion order wins.
    pub fn first_active(&self, frame: Frame) -> Option<&S> {
        self.segments.iter().find(|s| s.placement().contains(frame))
    }

    /// Whether `candidate` intersects any stored segment on its track,
    /// ignoring the segment with id `exclude`.
    pub fn collides(&self, candidate: &Placement, exclude: SegmentId) -> bool {
        self.segments
            .iter()
            .any(|s| s.id() != exclude && s.placement().overlaps(candidate))
    }

    /// Whether the stored segment `id` currently intersects a track-mate.
    pub fn is_colliding(&self, id: SegmentId) -> bool {
        match self.get(id) {
            Some(seg) => self.collides(seg.placement(), id),
            None => false,
        }
    }
}

/// Among the segments active at `frame`, the one on the highest-position
/// track. Video compositing is topmost-wins: later/higher tracks occlude
/// lower ones.
pub fn topmost_active<'a, S: Placed>(
    store: &'a SegmentStore<S>,
    index: &TrackIndex,
    frame: Frame,
) -> Option<&'a S> {
    store
        .iter()
        .filter(|s| s.placement().contains(frame))
        .max_by_key(|s| index.position_of(s.placement().track))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare {
        id: SegmentId,
        placement: Placement,
    }

    impl Placed for Bare {
        fn id(&self) -> SegmentId {
            self.id
        }
        fn placement(&self) -> &Placement {
            &self.placement
        }
        fn placement_mut(&mut self) -> &mut Placement {
            &mut self.placement
        }
    }

    fn seg(id: u64, track: TrackId, position: Frame, length: Frame) -> Bare {
        Bare {
            id: SegmentId(id),
            placement: Placement {
                source_start: 0,
                source_duration: length,
                position,
                length,
                track,
            },
        }
    }

    #[test]
    fn test_active_at() {
        let mut store = SegmentStore::new();
        store.insert(seg(1, TrackId(0), 0, 100));
        store.insert(seg(2, TrackId(0), 100, 100));

        assert_eq!(store.active_at(TrackId(0), 50).map(|s| s.id()), Some(SegmentId(1)));
        // Boundary frame belongs to the successor.
        assert_eq!(store.active_at(TrackId(0), 100).map(|s| s.id()), Some(SegmentId(2)));
        assert!(store.active_at(TrackId(0), 200).is_none());
        assert!(store.active_at(TrackId(1), 50).is_none());
    }

    #[test]
    fn test_collides_excludes_self() {
        let mut store = SegmentStore::new();
        store.insert(seg(1, TrackId(0), 0, 100));

        let own = *store.get(SegmentId(1)).unwrap().placement();
        assert!(!store.collides(&own, SegmentId(1)));
        assert!(store.collides(&own, SegmentId(99)));
    }

    #[test]
    fn test_is_colliding() {
        let mut store = SegmentStore::new();
        store.insert(seg(1, TrackId(0), 0, 100));
        store.insert(seg(2, TrackId(0), 100, 100));
        assert!(!store.is_colliding(SegmentId(1)));

        store.get_mut(SegmentId(2)).unwrap().placement_mut().position = 50;
        assert!(store.is_colliding(SegmentId(1)));
        assert!(store.is_colliding(SegmentId(2)));
    }

    #[test]
    fn test_topmost_wins() {
        let mut index = TrackIndex::new();
        let bottom = index.insert(None, false);
        let top = index.insert(None, false);

        let mut store = SegmentStore::new();
        store.insert(seg(1, bottom, 0, 100));
        store.insert(seg(2, top, 50, 100));

        assert_eq!(topmost_active(&store, &index, 60).map(|s| s.id()), Some(SegmentId(2)));
        assert_eq!(topmost_active(&store, &index, 10).map(|s| s.id()), Some(SegmentId(1)));
        assert!(topmost_active(&store, &index, 200).is_none());
    }

    #[test]
    fn test_remove_where() {
        let mut store = SegmentStore::new();
        store.insert(seg(1, TrackId(0), 0, 10));
        store.insert(seg(2, TrackId(1), 0, 10));
        store.insert(seg(3, TrackId(0), 20, 10));

        let removed = store.remove_where(|s| s.placement().track == TrackId(0));
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(SegmentId(2)).is_some());
    }
}
