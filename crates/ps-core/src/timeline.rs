//! Authored keyframes and the playback clock.
//!
//! Each group owns at most one `KeyframeTrack`: transforms at strictly
//! increasing times. Poses between keyframes are interpolated; before the
//! first and after the last the nearest keyframe is held.

use crate::id::GroupId;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Two keyframe times closer than this are the same time.
pub const TIME_EPSILON: f64 = 1e-6;

/// Authored transform of a group at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f64,
    pub transform: Transform,
}

/// Keyframes of a single group, sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeTrack {
    keys: SmallVec<[Keyframe; 4]>,
}

impl KeyframeTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.keys.iter().map(|k| k.time)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.keys.last().map(|k| k.time)
    }

    /// `Ok(index)` of a keyframe at `time`, or `Err(insertion point)`.
    fn search(&self, time: f64) -> Result<usize, usize> {
        let at = self.keys.partition_point(|k| k.time < time - TIME_EPSILON);
        match self.keys.get(at) {
            Some(k) if (k.time - time).abs() <= TIME_EPSILON => Ok(at),
            _ => Err(at),
        }
    }

    pub fn get(&self, time: f64) -> Option<&Transform> {
        self.search(time).ok().map(|i| &self.keys[i].transform)
    }

    /// Insert or overwrite, returning the transform that was replaced.
    pub fn insert(&mut self, time: f64, transform: Transform) -> Option<Transform> {
        match self.search(time) {
            Ok(i) => Some(std::mem::replace(&mut self.keys[i].transform, transform)),
            Err(i) => {
                self.keys.insert(i, Keyframe { time, transform });
                None
            }
        }
    }

    pub fn remove(&mut self, time: f64) -> Option<Transform> {
        let i = self.search(time).ok()?;
        Some(self.keys.remove(i).transform)
    }

    /// Authored pose at `time`: held outside the keyed range, interpolated
    /// inside it.
    pub fn pose_at(&self, time: f64) -> Option<Transform> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time <= first.time {
            return Some(first.transform);
        }
        if time >= last.time {
            return Some(last.transform);
        }
        match self.search(time) {
            Ok(i) => Some(self.keys[i].transform),
            Err(i) => {
                let (a, b) = (&self.keys[i - 1], &self.keys[i]);
                let t = (time - a.time) / (b.time - a.time);
                Some(a.transform.lerp(&b.transform, t))
            }
        }
    }
}

/// All keyframe tracks plus the playback clock.
#[derive(Debug, Clone)]
pub struct Timeline {
    tracks: HashMap<GroupId, KeyframeTrack>,
    time: f64,
    playing: bool,
    recording: bool,
    min_duration: f64,
    extension: f64,
}

impl Timeline {
    pub fn new(min_duration: f64) -> Self {
        Self {
            tracks: HashMap::new(),
            time: 0.0,
            playing: false,
            recording: false,
            min_duration: min_duration.max(0.0),
            extension: 0.0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// `max(minimum, last keyframe, user extension)`.
    pub fn duration(&self) -> f64 {
        self.tracks
            .values()
            .filter_map(KeyframeTrack::last_time)
            .fold(self.min_duration.max(self.extension), f64::max)
    }

    /// Grow the timeline to at least `duration`. Never shrinks below keyframes.
    pub fn extend_to(&mut self, duration: f64) {
        if duration.is_finite() {
            self.extension = self.extension.max(duration);
        }
    }

    /// Move the clock, clamped to `[0, duration]`. Returns the new time.
    pub fn set_time(&mut self, time: f64) -> f64 {
        let time = if time.is_nan() { 0.0 } else { time };
        self.time = time.clamp(0.0, self.duration());
        self.time
    }

    pub fn track(&self, group: GroupId) -> Option<&KeyframeTrack> {
        self.tracks.get(&group)
    }

    pub fn has_keyframes(&self, group: GroupId) -> bool {
        self.tracks.get(&group).is_some_and(|t| !t.is_empty())
    }

    /// Groups with at least one keyframe, in unspecified order.
    pub fn keyed_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.tracks.iter().filter(|(_, t)| !t.is_empty()).map(|(id, _)| *id)
    }

    /// Returns the transform previously stored at that time, if any.
    pub fn record_keyframe(&mut self, group: GroupId, time: f64, transform: Transform) -> Option<Transform> {
        log::debug!("keyframe {group} at {time:.3}");
        self.tracks.entry(group).or_default().insert(time, transform)
    }

    pub fn remove_keyframe(&mut self, group: GroupId, time: f64) -> Option<Transform> {
        let track = self.tracks.get_mut(&group)?;
        let removed = track.remove(time);
        if track.is_empty() {
            self.tracks.remove(&group);
        }
        removed
    }

    pub fn pose_at(&self, group: GroupId, time: f64) -> Option<Transform> {
        self.tracks.get(&group)?.pose_at(time)
    }

    /// Detach a group's whole track (group deleted).
    pub fn take_track(&mut self, group: GroupId) -> Option<KeyframeTrack> {
        self.tracks.remove(&group)
    }

    pub fn restore_track(&mut self, group: GroupId, track: KeyframeTrack) {
        if !track.is_empty() {
            self.tracks.insert(group, track);
        }
    }

    /// Drop tracks of groups for which `keep` is false.
    pub fn retain_groups(&mut self, mut keep: impl FnMut(GroupId) -> bool) {
        self.tracks.retain(|id, _| keep(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;
    use pretty_assertions::assert_eq;

    fn at_x(x: f64) -> Transform {
        Transform::IDENTITY.translated(Vec2::new(x, 0.0))
    }

    #[test]
    fn keyframe_scenario() {
        let g = GroupId::intern("ball");
        let mut timeline = Timeline::new(1.0);
        timeline.record_keyframe(g, 0.0, Transform::IDENTITY);
        timeline.record_keyframe(g, 2.0, at_x(10.0));

        assert_eq!(timeline.pose_at(g, 1.0).unwrap().translation, Vec2::new(5.0, 0.0));
        assert_eq!(timeline.pose_at(g, -1.0).unwrap(), Transform::IDENTITY);
        assert_eq!(timeline.pose_at(g, 3.0).unwrap(), at_x(10.0));
        assert_eq!(timeline.duration(), 2.0);
    }

    #[test]
    fn record_overwrites_within_epsilon() {
        let g = GroupId::intern("overwrite");
        let mut timeline = Timeline::new(5.0);
        assert_eq!(timeline.record_keyframe(g, 1.0, at_x(1.0)), None);
        assert_eq!(timeline.record_keyframe(g, 1.0 + 1e-8, at_x(2.0)), Some(at_x(1.0)));
        assert_eq!(timeline.track(g).unwrap().len(), 1);
        assert_eq!(timeline.pose_at(g, 1.0), Some(at_x(2.0)));
    }

    #[test]
    fn keys_stay_sorted() {
        let mut track = KeyframeTrack::new();
        for t in [3.0, 1.0, 2.0, 0.5] {
            track.insert(t, at_x(t));
        }
        let times: Vec<f64> = track.times().collect();
        assert_eq!(times, vec![0.5, 1.0, 2.0, 3.0]);
        assert_eq!(track.remove(2.0), Some(at_x(2.0)));
        assert_eq!(track.remove(2.0), None);
    }

    #[test]
    fn pose_is_continuous_at_keyframes() {
        let mut track = KeyframeTrack::new();
        track.insert(0.0, at_x(0.0));
        track.insert(1.0, at_x(4.0));
        track.insert(2.0, at_x(-2.0));
        for t in [1.0, 2.0] {
            let before = track.pose_at(t - 1e-9).unwrap().translation.x;
            let at = track.pose_at(t).unwrap().translation.x;
            let after = track.pose_at(t + 1e-9).unwrap().translation.x;
            assert!((before - at).abs() < 1e-6);
            assert!((after - at).abs() < 1e-6);
        }
    }

    #[test]
    fn set_time_clamps_to_duration() {
        let mut timeline = Timeline::new(3.0);
        assert_eq!(timeline.set_time(10.0), 3.0);
        assert_eq!(timeline.set_time(-1.0), 0.0);
        timeline.extend_to(8.0);
        assert_eq!(timeline.set_time(10.0), 8.0);
    }

    #[test]
    fn take_and_restore_track() {
        let g = GroupId::intern("gc");
        let mut timeline = Timeline::new(1.0);
        timeline.record_keyframe(g, 4.0, at_x(1.0));
        let track = timeline.take_track(g).unwrap();
        assert!(!timeline.has_keyframes(g));
        assert_eq!(timeline.duration(), 1.0);
        timeline.restore_track(g, track);
        assert_eq!(timeline.duration(), 4.0);

        timeline.retain_groups(|id| id != g);
        assert_eq!(timeline.keyed_groups().count(), 0);
    }
}
