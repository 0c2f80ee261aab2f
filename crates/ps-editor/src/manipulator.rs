//! Scale / rotate / translate manipulation of selected groups.
//!
//! A session fixes a world-space pivot, then accumulates incremental deltas
//! from the gesture recogniser. Every update re-derives each group's local
//! transform from its pre-session value:
//!
//! ```text
//! L' = P⁻¹ · D · P · L₀
//! ```
//!
//! where `P` is the parent's world transform and `D` the accumulated delta
//! about the pivot. History is untouched until `commit`.

use crate::commands::{Command, TransformChange};
use crate::error::{EditorError, EditorResult};
use crate::selection::top_level;
use kurbo::{Affine, Point, Rect, Vec2};
use ps_core::{GroupId, GroupTree, Transform};
use serde::{Deserialize, Serialize};

/// An incremental (or accumulated) world-space manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManipulationDelta {
    pub translation: Vec2,
    /// Radians, counter-clockwise.
    pub rotation: f64,
    pub scale: Vec2,
}

impl ManipulationDelta {
    pub const IDENTITY: ManipulationDelta = ManipulationDelta {
        translation: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::new(1.0, 1.0),
    };

    pub fn translate(offset: Vec2) -> Self {
        Self {
            translation: offset,
            ..Self::IDENTITY
        }
    }

    pub fn rotate(angle: f64) -> Self {
        Self {
            rotation: angle,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            scale: Vec2::new(sx, sy),
            ..Self::IDENTITY
        }
    }

    /// Translations and rotations add, scales multiply.
    pub fn accumulate(&mut self, other: &ManipulationDelta) {
        self.translation += other.translation;
        self.rotation += other.rotation;
        self.scale = Vec2::new(self.scale.x * other.scale.x, self.scale.y * other.scale.y);
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Scale and rotate about `pivot`, then translate.
    pub fn to_affine(&self, pivot: Point) -> Affine {
        Affine::translate(self.translation + pivot.to_vec2())
            * Affine::rotate(self.rotation)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(-pivot.to_vec2())
    }
}

impl Default for ManipulationDelta {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// State of an active manipulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulationSession {
    pub pivot: Point,
    pub accumulated: ManipulationDelta,
    /// Affected groups with their pre-session transforms.
    pub before: Vec<(GroupId, Transform)>,
}

impl ManipulationSession {
    pub fn ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.before.iter().map(|(id, _)| *id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Manipulator {
    #[default]
    Idle,
    Active(ManipulationSession),
}

impl Manipulator {
    pub fn is_active(&self) -> bool {
        matches!(self, Manipulator::Active(_))
    }

    pub fn session(&self) -> Option<&ManipulationSession> {
        match self {
            Manipulator::Active(s) => Some(s),
            Manipulator::Idle => None,
        }
    }

    /// Start manipulating the top-level subset of `ids`. The pivot defaults
    /// to the centre of their combined world bounds.
    pub fn begin(&mut self, tree: &GroupTree, ids: &[GroupId], pivot: Option<Point>) -> EditorResult<()> {
        if self.is_active() {
            return Err(EditorError::ManipulationInProgress);
        }
        let ids = top_level(tree, ids);
        if ids.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let pivot = pivot.unwrap_or_else(|| default_pivot(tree, &ids));
        let before = ids
            .iter()
            .filter_map(|id| tree.get(*id).map(|g| (*id, g.transform)))
            .collect();
        log::debug!("manipulation begin: {} groups about {pivot:?}", ids.len());
        *self = Manipulator::Active(ManipulationSession {
            pivot,
            accumulated: ManipulationDelta::IDENTITY,
            before,
        });
        Ok(())
    }

    /// Fold in `delta` and re-pose every affected group.
    pub fn update(&mut self, tree: &mut GroupTree, delta: &ManipulationDelta) -> EditorResult<()> {
        let Manipulator::Active(session) = self else {
            return Err(EditorError::NoActiveManipulation);
        };
        session.accumulated.accumulate(delta);

        let d = session.accumulated.to_affine(session.pivot);
        let identity = session.accumulated.is_identity();
        for (id, before) in &session.before {
            let local = if identity {
                *before
            } else {
                let parent = tree.parent_world_transform(*id);
                Transform::from_affine(parent.inverse() * d * parent * before.to_affine(), before.pivot)
            };
            tree.set_transform(*id, local)?;
        }
        Ok(())
    }

    /// End the session, returning the command describing the net change
    /// (`None` if nothing moved).
    pub fn commit(&mut self, tree: &GroupTree) -> EditorResult<Option<Command>> {
        let Manipulator::Active(session) = std::mem::take(self) else {
            return Err(EditorError::NoActiveManipulation);
        };
        let changes: Vec<TransformChange> = session
            .before
            .iter()
            .filter_map(|(id, before)| {
                let after = tree.get(*id)?.transform;
                (after != *before).then_some(TransformChange {
                    id: *id,
                    before: *before,
                    after,
                })
            })
            .collect();
        log::debug!("manipulation commit: {} changed", changes.len());
        Ok((!changes.is_empty()).then_some(Command::Transform(changes)))
    }

    /// End the session, restoring every pre-session transform exactly.
    pub fn cancel(&mut self, tree: &mut GroupTree) -> EditorResult<()> {
        let Manipulator::Active(session) = std::mem::take(self) else {
            return Err(EditorError::NoActiveManipulation);
        };
        for (id, before) in session.before {
            tree.set_transform(id, before)?;
        }
        log::debug!("manipulation cancelled");
        Ok(())
    }
}

fn default_pivot(tree: &GroupTree, ids: &[GroupId]) -> Point {
    let bounds = ids
        .iter()
        .filter_map(|id| tree.world_bounds(*id))
        .reduce(|a: Rect, b| a.union(b));
    match bounds {
        Some(b) => b.center(),
        None => ids
            .first()
            .and_then(|id| {
                let group = tree.get(*id)?;
                Some(tree.world_transform(*id)? * group.transform.pivot)
            })
            .unwrap_or(Point::ORIGIN),
    }
}
