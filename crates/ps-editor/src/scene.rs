//! Scene composer: the single entry point for the UI.
//!
//! The composer owns the document, physics bridge, history, selection,
//! manipulator and pen. The UI feeds it `Intent`s, either synchronously via
//! `dispatch` or queued via `enqueue`, and calls `tick` once per frame:
//!
//! ```text
//! queued intents → (playing) rebuild physics if dirty
//!                → authored poses at t + dt for non-simulated groups
//!                → drive kinematic bodies → step → advance time
//!                → snapshot
//! ```

use crate::commands::{self, Command, CommandStack};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::{EditorError, EditorResult};
use crate::hit::{hit_test, hit_test_rect, top_level_ancestor};
use crate::manipulator::{ManipulationDelta, Manipulator};
use crate::pen::{PenStyle, PenTool};
use crate::selection::Selection;
use crate::snapshot::{GroupSnapshot, MotionPath, SceneSnapshot};
use kurbo::{Affine, Point, Rect};
use ps_core::timeline::TIME_EPSILON;
use ps_core::{BodyType, Color, DetachedGroup, DrawingGroup, GroupId, GroupSubtree, Material, Timeline, Transform};
use ps_physics::{PhysicsBridge, PhysicsError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A discrete user action forwarded by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    BeginStroke(Point),
    AppendPoint(Point),
    EndStroke,
    CancelStroke,
    SetPen { color: Color, width: f64 },
    Select(Vec<GroupId>),
    SelectAt(Point),
    SelectInRect(Rect),
    ClearSelection,
    BeginManipulation { pivot: Option<Point> },
    UpdateManipulation(ManipulationDelta),
    EndManipulation { commit: bool },
    Group,
    Ungroup(GroupId),
    SetVisible(GroupId, bool),
    Delete,
    Undo,
    Redo,
    Play,
    Pause,
    Scrub(f64),
    BindPhysics {
        id: GroupId,
        body_type: BodyType,
        material: Material,
    },
    UnbindPhysics(GroupId),
    RecordKeyframe,
    SetRecording(bool),
    ExtendTimeline(f64),
}

/// What a successfully dispatched intent did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied,
    /// A new group (stroke or grouping node) was added.
    Created(GroupId),
    Selected(Vec<GroupId>),
    /// Undo/redo description, `None` when the stack was empty.
    History(Option<String>),
}

/// Result of one `tick`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub snapshot: SceneSnapshot,
    /// Queued intents that were rejected, with the reason.
    pub rejected: Vec<(Intent, EditorError)>,
}

pub struct SceneComposer {
    config: EditorConfig,
    doc: Document,
    bridge: PhysicsBridge,
    /// Bindings, visibility or structure changed since physics was built.
    physics_dirty: bool,
    history: CommandStack,
    selection: Selection,
    manipulator: Manipulator,
    pen: PenTool,
    queue: VecDeque<Intent>,
}

impl SceneComposer {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            doc: Document::new(config.min_duration),
            bridge: PhysicsBridge::new(config.physics),
            physics_dirty: false,
            history: CommandStack::new(config.history_depth),
            selection: Selection::new(),
            manipulator: Manipulator::Idle,
            pen: PenTool::new(config.default_pen, config.pen_min_spacing),
            queue: VecDeque::new(),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn timeline(&self) -> &Timeline {
        &self.doc.timeline
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    pub fn bridge(&self) -> &PhysicsBridge {
        &self.bridge
    }

    pub fn manipulator(&self) -> &Manipulator {
        &self.manipulator
    }

    /// Pose shown for `id` at `time`. A group driven by a moving body shows
    /// its physics writeback, which only exists for the current clock time;
    /// any other time gets the authored pose.
    pub fn pose_at(&self, id: GroupId, time: f64) -> Option<Transform> {
        let now = self.doc.timeline.time();
        if self.bridge.is_simulated(id) && (time - now).abs() <= TIME_EPSILON {
            return self.doc.tree.get(id).map(|g| g.transform);
        }
        self.doc.authored_transform(id, time)
    }

    // ─── Frame loop ──────────────────────────────────────────────────────

    /// Queue an intent for the next `tick`.
    pub fn enqueue(&mut self, intent: Intent) {
        self.queue.push_back(intent);
    }

    /// Apply queued intents, advance playback by `dt` seconds, and return
    /// the frame to draw.
    pub fn tick(&mut self, dt: f64) -> Frame {
        let mut rejected = Vec::new();
        while let Some(intent) = self.queue.pop_front() {
            if let Err(err) = self.dispatch(intent.clone()) {
                log::debug!("rejected {intent:?}: {err}");
                rejected.push((intent, err));
            }
        }
        if self.doc.timeline.is_playing() && dt.is_finite() && dt > 0.0 {
            self.advance(dt);
        }
        Frame {
            snapshot: self.snapshot(),
            rejected,
        }
    }

    fn advance(&mut self, dt: f64) {
        if !self.bridge.is_built() || self.physics_dirty {
            self.rebuild_physics();
        }

        let time = self.doc.timeline.time();
        let duration = self.doc.timeline.duration();
        let end = (time + dt).min(duration);
        let step = end - time;

        if step > 0.0 {
            let bridge = &self.bridge;
            self.doc.apply_authored_poses(end, |id| bridge.is_simulated(id));

            let doc = &self.doc;
            self.bridge.drive_kinematic(step, |id| {
                let parent = doc.tree.parent_world_transform(id);
                Some(parent * doc.authored_transform(id, end)?.to_affine())
            });

            match self.bridge.step(&mut self.doc.tree, step) {
                Ok(_) => {}
                Err(PhysicsError::SimulationRebuildRequired) => {
                    self.rebuild_physics();
                }
                Err(err) => log::warn!("physics step failed: {err}"),
            }
            self.doc.timeline.set_time(end);
        }

        if end >= duration {
            log::debug!("playback reached the end at t={end:.3}");
            self.doc.timeline.set_playing(false);
        }
    }

    fn rebuild_physics(&mut self) {
        self.bridge.build(&self.doc.tree, self.doc.timeline.time());
        self.physics_dirty = false;
    }

    /// The frame as it stands, without advancing time.
    pub fn snapshot(&self) -> SceneSnapshot {
        let tree = &self.doc.tree;
        let groups = tree
            .preorder()
            .into_iter()
            .filter_map(|id| {
                let group = tree.get(id)?;
                Some(GroupSnapshot {
                    id,
                    parent: tree.parent(id),
                    world: tree.world_transform(id).unwrap_or(Affine::IDENTITY),
                    visible: tree.effective_visible(id),
                    simulated: self.bridge.is_simulated(id),
                    strokes: group.strokes.clone(),
                })
            })
            .collect();
        let motion_paths = self
            .selection
            .ids()
            .iter()
            .map(|id| MotionPath {
                group: *id,
                points: self.doc.motion_path(*id),
            })
            .filter(|p| !p.points.is_empty())
            .collect();

        SceneSnapshot {
            time: self.doc.timeline.time(),
            duration: self.doc.timeline.duration(),
            playing: self.doc.timeline.is_playing(),
            recording: self.doc.timeline.is_recording(),
            groups,
            selection: self.selection.ids().to_vec(),
            motion_paths,
            pending_stroke: self.pen.points().to_vec(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    // ─── Intents ─────────────────────────────────────────────────────────

    /// Apply one intent now. On error nothing has changed.
    pub fn dispatch(&mut self, intent: Intent) -> EditorResult<Outcome> {
        if self.manipulator.is_active() && blocked_while_manipulating(&intent) {
            return Err(EditorError::ManipulationInProgress);
        }

        match intent {
            Intent::BeginStroke(p) => {
                self.pen.begin(p);
                Ok(Outcome::Applied)
            }
            Intent::AppendPoint(p) => self.pen.append(p).map(|_| Outcome::Applied),
            Intent::EndStroke => self.end_stroke(),
            Intent::CancelStroke => {
                self.pen.cancel();
                Ok(Outcome::Applied)
            }
            Intent::SetPen { color, width } => {
                self.pen.set_style(PenStyle { color, width });
                Ok(Outcome::Applied)
            }
            Intent::Select(ids) => {
                self.selection.set(ids);
                self.selection.prune(&self.doc.tree);
                Ok(Outcome::Selected(self.selection.ids().to_vec()))
            }
            Intent::SelectAt(p) => {
                let hit = hit_test(&self.doc.tree, p, self.config.hit_tolerance)
                    .and_then(|id| top_level_ancestor(&self.doc.tree, id));
                self.selection.set(hit);
                Ok(Outcome::Selected(self.selection.ids().to_vec()))
            }
            Intent::SelectInRect(rect) => {
                self.selection.set(hit_test_rect(&self.doc.tree, rect));
                Ok(Outcome::Selected(self.selection.ids().to_vec()))
            }
            Intent::ClearSelection => {
                self.selection.clear();
                Ok(Outcome::Selected(Vec::new()))
            }
            Intent::BeginManipulation { pivot } => {
                self.manipulator.begin(&self.doc.tree, self.selection.ids(), pivot)?;
                self.doc.timeline.set_playing(false);
                Ok(Outcome::Applied)
            }
            Intent::UpdateManipulation(delta) => {
                self.manipulator.update(&mut self.doc.tree, &delta)?;
                Ok(Outcome::Applied)
            }
            Intent::EndManipulation { commit } => self.end_manipulation(commit),
            Intent::Group => {
                let record = commands::grouping(&self.doc, self.selection.ids())?;
                let id = record.group.id;
                self.history.execute(&mut self.doc, Command::Group(record), "Group")?;
                self.selection.set([id]);
                self.physics_dirty = true;
                Ok(Outcome::Created(id))
            }
            Intent::Ungroup(id) => {
                let record = commands::ungrouping(&self.doc, id)?;
                let members: Vec<GroupId> = record.members.iter().map(|m| m.id).collect();
                self.history.execute(&mut self.doc, Command::Ungroup(record), "Ungroup")?;
                self.bridge.remove_group(id);
                self.selection.set(members.clone());
                self.physics_dirty = true;
                Ok(Outcome::Selected(members))
            }
            Intent::SetVisible(id, visible) => {
                let before = self
                    .doc
                    .tree
                    .get(id)
                    .map(|g| g.visible)
                    .ok_or(ps_core::CoreError::UnknownGroup(id))?;
                if before != visible {
                    let label = if visible { "Show" } else { "Hide" };
                    self.history.execute(
                        &mut self.doc,
                        Command::Visibility {
                            id,
                            before,
                            after: visible,
                        },
                        label,
                    )?;
                    self.physics_dirty = true;
                }
                Ok(Outcome::Applied)
            }
            Intent::Delete => self.delete_selection(),
            Intent::Undo => {
                let desc = self.history.undo(&mut self.doc);
                self.after_history_move();
                Ok(Outcome::History(desc))
            }
            Intent::Redo => {
                let desc = self.history.redo(&mut self.doc);
                self.after_history_move();
                Ok(Outcome::History(desc))
            }
            Intent::Play => {
                self.play();
                Ok(Outcome::Applied)
            }
            Intent::Pause => {
                self.doc.timeline.set_playing(false);
                Ok(Outcome::Applied)
            }
            Intent::Scrub(time) => {
                self.scrub(time);
                Ok(Outcome::Applied)
            }
            Intent::BindPhysics {
                id,
                body_type,
                material,
            } => {
                let before =
                    self.doc
                        .tree
                        .bind_physics(id, body_type, material, &self.config.simplify)?;
                let after = self.doc.tree.get(id).and_then(|g| g.physics.clone());
                self.history
                    .push(Command::Bind { id, before, after }, "Bind physics");
                self.physics_dirty = true;
                Ok(Outcome::Applied)
            }
            Intent::UnbindPhysics(id) => {
                let before = self.doc.tree.unbind_physics(id)?;
                if before.is_some() {
                    self.history.push(
                        Command::Bind {
                            id,
                            before,
                            after: None,
                        },
                        "Unbind physics",
                    );
                    self.bridge.remove_group(id);
                    self.physics_dirty = true;
                }
                Ok(Outcome::Applied)
            }
            Intent::RecordKeyframe => {
                let ids = self.selection.top_level(&self.doc.tree);
                if ids.is_empty() {
                    return Err(EditorError::NothingSelected);
                }
                let keys = self.keyframe_commands(&ids);
                self.history
                    .execute(&mut self.doc, Command::Batch(keys), "Record keyframe")?;
                Ok(Outcome::Applied)
            }
            Intent::SetRecording(recording) => {
                self.doc.timeline.set_recording(recording);
                Ok(Outcome::Applied)
            }
            Intent::ExtendTimeline(duration) => {
                self.doc.timeline.extend_to(duration);
                Ok(Outcome::Applied)
            }
        }
    }

    fn end_stroke(&mut self) -> EditorResult<Outcome> {
        let Some(stroke) = self.pen.finish()? else {
            return Ok(Outcome::Applied);
        };
        let root = self.doc.tree.root();
        let group = DrawingGroup::from_stroke(GroupId::generate(), stroke);
        let id = group.id;
        let detached = DetachedGroup {
            parent: root,
            position: self.doc.tree.children(root).len(),
            subtree: GroupSubtree::leaf(group),
        };
        self.history
            .execute(&mut self.doc, Command::AddGroup(detached), "Draw stroke")?;
        Ok(Outcome::Created(id))
    }

    fn end_manipulation(&mut self, commit: bool) -> EditorResult<Outcome> {
        if !commit {
            self.manipulator.cancel(&mut self.doc.tree)?;
            return Ok(Outcome::Applied);
        }
        let ids: Vec<GroupId> = self
            .manipulator
            .session()
            .map(|s| s.ids().collect())
            .unwrap_or_default();
        let Some(command) = self.manipulator.commit(&self.doc.tree)? else {
            return Ok(Outcome::Applied);
        };
        for id in &ids {
            self.bridge.forget_rest_pose(*id);
        }

        if self.doc.timeline.is_recording() {
            // Transforms are already live; only the keyframes still need applying.
            let keys = self.keyframe_commands(&ids);
            for key in &keys {
                key.apply(&mut self.doc)?;
            }
            let mut batch = vec![command];
            batch.extend(keys);
            self.history.push(Command::Batch(batch), "Transform");
        } else {
            self.history.push(command, "Transform");
        }
        self.physics_dirty = true;
        Ok(Outcome::Applied)
    }

    /// Keyframe commands capturing the current transform of each group at
    /// the current time.
    fn keyframe_commands(&self, ids: &[GroupId]) -> Vec<Command> {
        let time = self.doc.timeline.time();
        ids.iter()
            .filter_map(|id| {
                let transform = self.doc.tree.get(*id)?.transform;
                let before = self.doc.timeline.track(*id).and_then(|t| t.get(time)).copied();
                Some(Command::Keyframe {
                    group: *id,
                    time,
                    before,
                    after: Some(transform),
                })
            })
            .collect()
    }

    fn delete_selection(&mut self) -> EditorResult<Outcome> {
        let ids = self.selection.top_level(&self.doc.tree);
        if ids.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            let r = self.doc.remove_group(id)?;
            for gid in r.detached.subtree.ids() {
                self.bridge.remove_group(gid);
            }
            removed.push(r);
        }
        self.history.push(Command::RemoveGroups(removed), "Delete");
        self.selection.clear();
        self.physics_dirty = true;
        Ok(Outcome::Applied)
    }

    fn after_history_move(&mut self) {
        self.selection.prune(&self.doc.tree);
        let tree = &self.doc.tree;
        self.bridge.retain_groups(|id| tree.contains(id));
        self.physics_dirty = true;
    }

    fn play(&mut self) {
        if self.doc.timeline.is_playing() {
            return;
        }
        if self.doc.timeline.time() >= self.doc.timeline.duration() {
            self.scrub(0.0);
        }
        if !self.bridge.is_built() || self.physics_dirty {
            self.rebuild_physics();
        }
        self.doc.timeline.set_playing(true);
        log::debug!("play from t={:.3}", self.doc.timeline.time());
    }

    /// Pause, drop the simulation (restoring rest poses) and show the
    /// authored scene at `time`.
    fn scrub(&mut self, time: f64) {
        self.doc.timeline.set_playing(false);
        self.bridge.teardown(&mut self.doc.tree, true);
        self.physics_dirty = false;
        let time = self.doc.timeline.set_time(time);
        self.doc.apply_authored_poses(time, |_| false);
    }
}

impl Default for SceneComposer {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

fn blocked_while_manipulating(intent: &Intent) -> bool {
    matches!(
        intent,
        Intent::Group
            | Intent::Ungroup(_)
            | Intent::SetVisible(..)
            | Intent::Delete
            | Intent::Undo
            | Intent::Redo
            | Intent::Play
            | Intent::Scrub(_)
            | Intent::BindPhysics { .. }
            | Intent::UnbindPhysics(_)
            | Intent::RecordKeyframe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;
    use pretty_assertions::assert_eq;

    fn draw(composer: &mut SceneComposer, points: &[(f64, f64)]) -> GroupId {
        let (x, y) = points[0];
        composer.dispatch(Intent::BeginStroke(Point::new(x, y))).unwrap();
        for &(x, y) in &points[1..] {
            composer.dispatch(Intent::AppendPoint(Point::new(x, y))).unwrap();
        }
        match composer.dispatch(Intent::EndStroke).unwrap() {
            Outcome::Created(id) => id,
            other => panic!("expected a new group, got {other:?}"),
        }
    }

    #[test]
    fn drawing_adds_an_undoable_group() {
        let mut composer = SceneComposer::default();
        let id = draw(&mut composer, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let frame = composer.tick(0.0);
        assert!(frame.snapshot.group(id).is_some());
        assert!(frame.snapshot.can_undo);

        composer.dispatch(Intent::Undo).unwrap();
        assert!(!composer.document().tree.contains(id));
        composer.dispatch(Intent::Redo).unwrap();
        assert!(composer.document().tree.contains(id));
    }

    #[test]
    fn select_at_picks_top_level_group() {
        let mut composer = SceneComposer::default();
        let a = draw(&mut composer, &[(0.0, 0.0), (100.0, 0.0)]);
        let b = draw(&mut composer, &[(0.0, 50.0), (100.0, 50.0)]);
        composer.dispatch(Intent::Select(vec![a, b])).unwrap();
        let Outcome::Created(group) = composer.dispatch(Intent::Group).unwrap() else {
            panic!("group was not created");
        };

        let outcome = composer.dispatch(Intent::SelectAt(Point::new(50.0, 1.0))).unwrap();
        assert_eq!(outcome, Outcome::Selected(vec![group]));
        let outcome = composer.dispatch(Intent::SelectAt(Point::new(50.0, 25.0))).unwrap();
        assert_eq!(outcome, Outcome::Selected(vec![]));
    }

    #[test]
    fn queued_rejections_are_reported() {
        let mut composer = SceneComposer::default();
        composer.enqueue(Intent::Delete);
        composer.enqueue(Intent::EndStroke);
        let frame = composer.tick(1.0 / 60.0);
        assert_eq!(
            frame.rejected,
            vec![
                (Intent::Delete, EditorError::NothingSelected),
                (Intent::EndStroke, EditorError::NoActiveStroke),
            ]
        );
    }

    #[test]
    fn structural_edits_wait_for_manipulation() {
        let mut composer = SceneComposer::default();
        let a = draw(&mut composer, &[(0.0, 0.0), (10.0, 10.0)]);
        composer.dispatch(Intent::Select(vec![a])).unwrap();
        composer
            .dispatch(Intent::BeginManipulation { pivot: None })
            .unwrap();
        composer
            .dispatch(Intent::UpdateManipulation(ManipulationDelta::translate(Vec2::new(5.0, 0.0))))
            .unwrap();
        assert_eq!(composer.dispatch(Intent::Delete), Err(EditorError::ManipulationInProgress));
        assert_eq!(composer.dispatch(Intent::Undo), Err(EditorError::ManipulationInProgress));
        composer
            .dispatch(Intent::EndManipulation { commit: true })
            .unwrap();
        composer.dispatch(Intent::Delete).unwrap();
        assert!(!composer.document().tree.contains(a));
    }

    #[test]
    fn recording_keys_the_manipulation() {
        let mut composer = SceneComposer::default();
        let a = draw(&mut composer, &[(0.0, 0.0), (10.0, 10.0)]);
        composer.dispatch(Intent::Select(vec![a])).unwrap();
        composer.dispatch(Intent::SetRecording(true)).unwrap();
        composer.dispatch(Intent::Scrub(3.0)).unwrap();
        composer
            .dispatch(Intent::BeginManipulation { pivot: None })
            .unwrap();
        composer
            .dispatch(Intent::UpdateManipulation(ManipulationDelta::translate(Vec2::new(20.0, 0.0))))
            .unwrap();
        composer
            .dispatch(Intent::EndManipulation { commit: true })
            .unwrap();
        assert!(composer.timeline().track(a).unwrap().get(3.0).is_some());

        // One undo removes both the move and its keyframe.
        composer.dispatch(Intent::Undo).unwrap();
        assert!(!composer.timeline().has_keyframes(a));
        assert_eq!(composer.document().tree.get(a).unwrap().transform.translation, Vec2::ZERO);
    }

    #[test]
    fn motion_path_follows_keyframes() {
        let mut composer = SceneComposer::default();
        let a = draw(&mut composer, &[(0.0, 0.0), (10.0, 10.0)]);
        composer.dispatch(Intent::Select(vec![a])).unwrap();
        composer.dispatch(Intent::RecordKeyframe).unwrap();
        composer.dispatch(Intent::Scrub(2.0)).unwrap();
        composer
            .dispatch(Intent::BeginManipulation { pivot: None })
            .unwrap();
        composer
            .dispatch(Intent::UpdateManipulation(ManipulationDelta::translate(Vec2::new(0.0, 40.0))))
            .unwrap();
        composer
            .dispatch(Intent::EndManipulation { commit: true })
            .unwrap();
        composer.dispatch(Intent::RecordKeyframe).unwrap();

        let snapshot = composer.snapshot();
        assert_eq!(snapshot.motion_paths.len(), 1);
        let path = &snapshot.motion_paths[0].points;
        assert_eq!(path.len(), 2);
        assert!((path[1].y - path[0].y - 40.0).abs() < 1e-9);
    }
}
