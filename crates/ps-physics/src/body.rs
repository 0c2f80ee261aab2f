//! Body descriptions and their conversion to rapier bodies and colliders.

use kurbo::Point;
use ps_core::simplify::{convex_hull, is_degenerate_shape, polygon_centroid};
use ps_core::{BodyType, Material};
use rapier2d::na::Point2;
use rapier2d::prelude::*;

pub use rapier2d::prelude::RigidBodyHandle;

/// Everything needed to create a body.
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub body_type: BodyType,
    pub material: Material,
    /// Convex hull, counter-clockwise, relative to `position`.
    pub vertices: Vec<Point>,
    pub position: Point,
    pub angle: f64,
}

impl BodyDesc {
    /// A body whose outline is the hull of `points` in world space, placed
    /// at the hull's centroid. `None` for degenerate outlines.
    pub fn from_world_points(body_type: BodyType, material: Material, points: &[Point]) -> Option<Self> {
        let hull = convex_hull(points);
        if is_degenerate_shape(&hull) {
            return None;
        }
        let centroid = polygon_centroid(&hull)?;
        Some(Self {
            body_type,
            material,
            vertices: hull.iter().map(|p| (*p - centroid).to_point()).collect(),
            position: centroid,
            angle: 0.0,
        })
    }

    pub fn rigid_body_type(&self) -> RigidBodyType {
        match self.body_type {
            BodyType::Static => RigidBodyType::Fixed,
            BodyType::Dynamic => RigidBodyType::Dynamic,
            BodyType::Kinematic => RigidBodyType::KinematicVelocityBased,
        }
    }

    pub fn rigid_body(&self) -> RigidBody {
        RigidBodyBuilder::new(self.rigid_body_type())
            .translation(vector![self.position.x as Real, self.position.y as Real])
            .rotation(self.angle as Real)
            .build()
    }

    /// Convex collider carrying the material. `None` when rapier cannot
    /// hull the vertices.
    pub fn collider(&self) -> Option<Collider> {
        let points: Vec<Point2<Real>> = self
            .vertices
            .iter()
            .map(|p| point![p.x as Real, p.y as Real])
            .collect();
        let builder = ColliderBuilder::convex_hull(&points)?;
        Some(
            builder
                .density(self.material.density.max(f64::EPSILON) as Real)
                .friction(self.material.friction as Real)
                .restitution(self.material.restitution as Real)
                .restitution_combine_rule(CoefficientCombineRule::Max)
                .build(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(body_type: BodyType) -> BodyDesc {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(1.0, 1.0),
        ];
        BodyDesc::from_world_points(body_type, Material::default(), &points).unwrap()
    }

    #[test]
    fn desc_is_centred_on_hull_centroid() {
        let desc = square(BodyType::Dynamic);
        assert_eq!(desc.position, Point::new(1.0, 1.0));
        assert_eq!(desc.vertices.len(), 4);
        assert!(desc.vertices.contains(&Point::new(-1.0, -1.0)));
    }

    #[test]
    fn body_types_map_onto_rapier() {
        assert_eq!(square(BodyType::Static).rigid_body_type(), RigidBodyType::Fixed);
        assert_eq!(square(BodyType::Dynamic).rigid_body_type(), RigidBodyType::Dynamic);
        assert_eq!(
            square(BodyType::Kinematic).rigid_body_type(),
            RigidBodyType::KinematicVelocityBased
        );
        assert!(square(BodyType::Dynamic).collider().is_some());
    }

    #[test]
    fn collinear_points_have_no_body() {
        let line = [Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 10.0)];
        assert!(BodyDesc::from_world_points(BodyType::Dynamic, Material::default(), &line).is_none());
    }
}
