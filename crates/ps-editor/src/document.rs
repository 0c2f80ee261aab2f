//! The editable document: group tree plus keyframe timeline.

use kurbo::{Affine, Point};
use ps_core::{CoreResult, DetachedGroup, GroupId, GroupTree, KeyframeTrack, Timeline, Transform};
use serde::{Deserialize, Serialize};

/// A removed subtree together with the keyframe tracks of its groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedGroup {
    pub detached: DetachedGroup,
    pub tracks: Vec<(GroupId, KeyframeTrack)>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub tree: GroupTree,
    pub timeline: Timeline,
}

impl Document {
    pub fn new(min_duration: f64) -> Self {
        Self {
            tree: GroupTree::new(),
            timeline: Timeline::new(min_duration),
        }
    }

    /// Authored local transform at `time`: the keyframed pose if the group
    /// has keyframes, otherwise its current transform.
    pub fn authored_transform(&self, id: GroupId, time: f64) -> Option<Transform> {
        self.timeline
            .pose_at(id, time)
            .or_else(|| self.tree.get(id).map(|g| g.transform))
    }

    /// World transform built from authored poses of the group and all its
    /// ancestors at `time`.
    pub fn authored_world_transform(&self, id: GroupId, time: f64) -> Option<Affine> {
        let mut world = Affine::IDENTITY;
        let mut current = Some(id);
        while let Some(g) = current {
            world = self.authored_transform(g, time)?.to_affine() * world;
            current = self.tree.parent(g);
        }
        Some(world)
    }

    /// Overwrite the transforms of keyed groups with their authored pose at
    /// `time`, except those for which `skip` returns true.
    pub fn apply_authored_poses(&mut self, time: f64, mut skip: impl FnMut(GroupId) -> bool) {
        for id in self.tree.preorder() {
            if skip(id) {
                continue;
            }
            if let Some(pose) = self.timeline.pose_at(id, time) {
                let _ = self.tree.set_transform(id, pose);
            }
        }
    }

    /// World positions of the group's pivot at each of its keyframe times.
    pub fn motion_path(&self, id: GroupId) -> Vec<Point> {
        let Some(track) = self.timeline.track(id).filter(|_| self.tree.contains(id)) else {
            return Vec::new();
        };
        track
            .keyframes()
            .iter()
            .filter_map(|k| {
                let world = self.authored_world_transform(id, k.time)?;
                Some(world * k.transform.pivot)
            })
            .collect()
    }

    /// Replace (or clear) a group's whole keyframe track.
    pub fn set_track(&mut self, id: GroupId, track: Option<KeyframeTrack>) {
        self.timeline.take_track(id);
        if let Some(track) = track {
            self.timeline.restore_track(id, track);
        }
    }

    /// Remove a subtree and collect the keyframe tracks of every group in it.
    pub fn remove_group(&mut self, id: GroupId) -> CoreResult<RemovedGroup> {
        let detached = self.tree.remove(id)?;
        let tracks = detached
            .subtree
            .ids()
            .into_iter()
            .filter_map(|gid| self.timeline.take_track(gid).map(|t| (gid, t)))
            .collect();
        Ok(RemovedGroup { detached, tracks })
    }

    pub fn restore_group(&mut self, removed: &RemovedGroup) -> CoreResult<()> {
        self.tree.restore(&removed.detached)?;
        for (gid, track) in &removed.tracks {
            self.timeline.restore_track(*gid, track.clone());
        }
        Ok(())
    }
}
