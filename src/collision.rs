// Copyright 2017 Matthew Plant. This file is part of MGF.
//
// MGF is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// MGF is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with MGF. If not, see <http://www.gnu.org/licenses/>.

//! Narrow-phase contact generation between collision primitives.
//!
//! Every detector writes into a CollisionData and returns the number of
//! contacts it wrote. Nothing is written once the arena is full. Touching
//! primitives with zero penetration produce no contact.

use cgmath::{InnerSpace, Vector2};
use smallvec::SmallVec;

use crate::arena::*;
use crate::body::*;
use crate::contact::*;
use crate::core::*;
use crate::error::*;
use crate::geom::*;

/// Axes closer to parallel than this are skipped by the separating axis test.
const PARALLEL_EPSILON: Real = 0.0001;

/// The contacts generated during one frame, plus the friction and
/// restitution given to every contact the detectors write.
#[derive(Clone, Debug)]
pub struct CollisionData {
    contacts: ContactArena<Contact>,
    pub friction: Real,
    pub restitution: Real,
}

impl CollisionData {
    pub fn new(max_contacts: usize, friction: Real, restitution: Real) -> Result<Self> {
        Ok(CollisionData {
            contacts: ContactArena::new(max_contacts)?,
            friction,
            restitution,
        })
    }

    /// Forgets every contact. Called at the start of contact generation.
    pub fn reset(&mut self) {
        self.contacts.reset();
    }

    pub fn capacity(&self) -> usize {
        self.contacts.capacity()
    }

    pub fn contacts_left(&self) -> usize {
        self.contacts.contacts_left()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.is_full()
    }

    pub fn contacts(&self) -> &[Contact] {
        self.contacts.as_slice()
    }

    pub fn contacts_mut(&mut self) -> &mut [Contact] {
        self.contacts.as_mut_slice()
    }

    /// Stores a fully described contact. Returns false if the arena is full.
    pub fn push(&mut self, contact: Contact) -> bool {
        self.contacts.push(contact)
    }

    /// Stores a contact carrying the default friction and restitution.
    pub fn add_contact(
        &mut self,
        first: BodyHandle,
        second: Option<BodyHandle>,
        contact_point: Vec2,
        contact_normal: Vec2,
        penetration: Real,
    ) -> bool {
        let (friction, restitution) = (self.friction, self.restitution);
        match self.contacts.next_slot() {
            Some(contact) => {
                contact.contact_point = contact_point;
                contact.contact_normal = contact_normal;
                contact.penetration = penetration;
                contact.set_body_data(Some(first), second, friction, restitution);
                true
            }
            None => false,
        }
    }

    fn last_mut(&mut self) -> Option<&mut Contact> {
        self.contacts.as_mut_slice().last_mut()
    }
}

/// Contact generation between pairs of primitives.
pub struct CollisionDetector;

impl CollisionDetector {
    /// The normal points from the second sphere's center toward the first's,
    /// and the contact point lies on the second sphere's surface.
    pub fn sphere_and_sphere(
        one: &CollisionSphere,
        two: &CollisionSphere,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let (p1, p2) = match (bodies.get(one.body), bodies.get(two.body)) {
            (Some(a), Some(b)) => (a.position, b.position),
            _ => return 0,
        };
        let v = p1 - p2;
        let d = v.magnitude();
        let penetration = one.radius + two.radius - d;
        if d == 0.0 || penetration <= 0.0 {
            return 0;
        }
        let normal = v.unit();
        let point = p1 - normal * (one.radius - penetration);
        data.add_contact(one.body, Some(two.body), point, normal, penetration) as usize
    }

    /// Treats the plane as solid behind its normal.
    pub fn sphere_and_half_space(
        sphere: &CollisionSphere,
        plane: &CollisionPlane,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let position = match bodies.get(sphere.body) {
            Some(body) => body.position,
            None => return 0,
        };
        let normal = plane.normal.unit();
        let penetration = plane.offset + sphere.radius - position.dot(normal);
        if penetration <= 0.0 {
            return 0;
        }
        let point = position - normal * (sphere.radius - penetration);
        data.add_contact(sphere.body, None, point, normal, penetration) as usize
    }

    /// Treats the plane as a thin wall that can be hit from either side.
    pub fn sphere_and_true_plane(
        sphere: &CollisionSphere,
        plane: &CollisionPlane,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let position = match bodies.get(sphere.body) {
            Some(body) => body.position,
            None => return 0,
        };
        let mut normal = plane.normal.unit();
        let distance = position.dot(normal) - plane.offset;
        let penetration = sphere.radius - distance.abs();
        if penetration <= 0.0 {
            return 0;
        }
        if distance < 0.0 {
            normal = -normal;
        }
        let point = position - normal * distance.abs();
        data.add_contact(sphere.body, None, point, normal, penetration) as usize
    }

    /// One contact per corner behind the plane, with the contact point
    /// projected onto the plane.
    pub fn box_and_half_space(
        cbox: &CollisionBox,
        plane: &CollisionPlane,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let body = match bodies.get(cbox.body) {
            Some(body) => body,
            None => return 0,
        };
        let normal = plane.normal.unit();

        let mut penetrating = SmallVec::<[(Vec2, Real); 4]>::new();
        for &corner in cbox.corners().iter() {
            let vertex = body.point_in_world_space(corner);
            let penetration = plane.offset - vertex.dot(normal);
            if penetration > 0.0 {
                penetrating.push((vertex, penetration));
            }
        }

        let mut used = 0;
        for (vertex, penetration) in penetrating {
            let point = vertex + normal * penetration;
            if !data.add_contact(cbox.body, None, point, normal, penetration) {
                break;
            }
            used += 1;
        }
        used
    }

    /// Clamps the sphere's center into the box to find the closest point.
    /// A sphere whose center is inside the box produces no contact.
    pub fn box_and_sphere(
        cbox: &CollisionBox,
        sphere: &CollisionSphere,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let (body, center) = match (bodies.get(cbox.body), bodies.get(sphere.body)) {
            (Some(b), Some(s)) => (b, s.position),
            _ => return 0,
        };
        let rel_center = body.point_in_local_space(center);
        let size_x = cbox.half_size.x.abs();
        let size_y = cbox.half_size.y.abs();
        if rel_center.x.abs() - sphere.radius > size_x || rel_center.y.abs() - sphere.radius > size_y {
            return 0;
        }

        let closest = Vector2::new(
            rel_center.x.min(size_x).max(-size_x),
            rel_center.y.min(size_y).max(-size_y),
        );
        let distance = (closest - rel_center).magnitude();
        let penetration = sphere.radius - distance;
        if distance == 0.0 || penetration <= 0.0 {
            return 0;
        }

        let closest_world = body.point_in_world_space(closest);
        let normal = (closest_world - center).unit();
        data.add_contact(cbox.body, Some(sphere.body), closest_world, normal, penetration) as usize
    }

    /// A world space point inside the box, pushed out along the axis of
    /// least penetration. The contact has no second body.
    pub fn box_and_point(
        cbox: &CollisionBox,
        point: Vec2,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let body = match bodies.get(cbox.body) {
            Some(body) => body,
            None => return 0,
        };
        let rel = body.point_in_local_space(point);

        let depth_x = cbox.half_size.x - rel.x.abs();
        if depth_x <= 0.0 {
            return 0;
        }
        let depth_y = cbox.half_size.y - rel.y.abs();
        if depth_y <= 0.0 {
            return 0;
        }

        let axes = body.transform();
        let (normal, penetration) = if depth_y < depth_x {
            let sign = if rel.y < 0.0 { 1.0 } else { -1.0 };
            (axes.axis(1) * sign, depth_y)
        } else {
            let sign = if rel.x < 0.0 { 1.0 } else { -1.0 };
            (axes.axis(0) * sign, depth_x)
        };
        data.add_contact(cbox.body, None, point, normal, penetration) as usize
    }

    /// Separating axis test over the face normals of both boxes. Emits a
    /// single vertex-face contact on the axis of least penetration; the
    /// first axis scanned wins ties.
    pub fn box_and_box(
        one: &CollisionBox,
        two: &CollisionBox,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let (a, b) = match (bodies.get(one.body), bodies.get(two.body)) {
            (Some(a), Some(b)) => (a.transform(), b.transform()),
            _ => return 0,
        };
        let to_centre = b.axis(2) - a.axis(2);

        let axes = [(a.axis(0), 0), (a.axis(1), 1), (b.axis(0), 3), (b.axis(1), 4)];
        let mut best: Option<(usize, Real)> = None;
        for &(axis, index) in axes.iter() {
            if axis.magnitude2() < PARALLEL_EPSILON {
                continue;
            }
            let axis = axis.unit();
            let penetration = penetration_on_axis(one, a, two, b, axis, to_centre);
            if penetration <= 0.0 {
                return 0;
            }
            match best {
                Some((_, smallest)) if penetration >= smallest => (),
                _ => best = Some((index, penetration)),
            }
        }

        let (first, second, point, normal, penetration) = match best {
            Some((index, penetration)) if index < 3 => {
                let (point, normal) = point_face(a, two, b, to_centre, index);
                (one.body, two.body, point, normal, penetration)
            }
            Some((index, penetration)) => {
                let (point, normal) = point_face(b, one, a, -to_centre, index - 3);
                (two.body, one.body, point, normal, penetration)
            }
            None => return 0,
        };
        data.add_contact(first, Some(second), point, normal, penetration) as usize
    }

    /// Tests each corner of either box against the other box. May emit up
    /// to eight contacts, each between the box that was hit and the box
    /// whose corner hit it.
    pub fn box_and_box_by_points(
        one: &CollisionBox,
        two: &CollisionBox,
        bodies: &RigidBodySet,
        data: &mut CollisionData,
    ) -> usize {
        if data.is_full() {
            return 0;
        }
        let mut used = 0;
        for &(hit, corners_of) in [(two, one), (one, two)].iter() {
            let body = match bodies.get(corners_of.body) {
                Some(body) => body,
                None => return used,
            };
            for &corner in corners_of.corners().iter() {
                let vertex = body.point_in_world_space(corner);
                if CollisionDetector::box_and_point(hit, vertex, bodies, data) == 1 {
                    if let Some(contact) = data.last_mut() {
                        contact.bodies[1] = Some(corners_of.body);
                    }
                    used += 1;
                }
            }
        }
        used
    }
}

/// Half the extent of a box projected onto `axis`.
#[inline]
fn transform_to_axis(cbox: &CollisionBox, transform: &Transform2, axis: Vec2) -> Real {
    cbox.half_size.x * axis.dot(transform.axis(0)).abs() + cbox.half_size.y * axis.dot(transform.axis(1)).abs()
}

/// Overlap of the two boxes along `axis`. Negative means separated.
#[inline]
fn penetration_on_axis(
    one: &CollisionBox,
    one_transform: &Transform2,
    two: &CollisionBox,
    two_transform: &Transform2,
    axis: Vec2,
    to_centre: Vec2,
) -> Real {
    let one_project = transform_to_axis(one, one_transform, axis);
    let two_project = transform_to_axis(two, two_transform, axis);
    let distance = to_centre.dot(axis).abs();
    one_project + two_project - distance
}

/// Contact point and normal for a vertex of box two resting on face `best`
/// of box one.
fn point_face(
    one_transform: &Transform2,
    two: &CollisionBox,
    two_transform: &Transform2,
    to_centre: Vec2,
    best: usize,
) -> (Vec2, Vec2) {
    let mut normal = one_transform.axis(best);
    if normal.dot(to_centre) > 0.0 {
        normal = -normal;
    }

    // The vertex of box two furthest along the normal.
    let mut vertex = two.half_size;
    if two_transform.axis(0).dot(normal) < 0.0 {
        vertex.x = -vertex.x;
    }
    if two_transform.axis(1).dot(normal) < 0.0 {
        vertex.y = -vertex.y;
    }

    (two_transform.transform(vertex), normal)
}

/// A primitive that can generate contacts against another.
///
/// Collide is implemented for every pair of primitives the detector
/// handles, in both argument orders, and for `Collider` against itself.
pub trait Collide<RHS> {
    /// Writes contacts between `self` and `rhs`, returning how many were
    /// written.
    fn collide(&self, rhs: &RHS, bodies: &RigidBodySet, data: &mut CollisionData) -> usize;
}

macro_rules! impl_collide {
    (
        $lhs:ident, $rhs:ident, $detect:ident
    ) => {
        impl Collide<$rhs> for $lhs {
            fn collide(&self, rhs: &$rhs, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
                CollisionDetector::$detect(self, rhs, bodies, data)
            }
        }
    };
    (
        $lhs:ident, $rhs:ident, $detect:ident, reversed
    ) => {
        impl Collide<$rhs> for $lhs {
            fn collide(&self, rhs: &$rhs, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
                CollisionDetector::$detect(rhs, self, bodies, data)
            }
        }
    };
}

impl_collide!(CollisionSphere, CollisionSphere, sphere_and_sphere);
impl_collide!(CollisionSphere, CollisionPlane, sphere_and_half_space);
impl_collide!(CollisionPlane, CollisionSphere, sphere_and_half_space, reversed);
impl_collide!(CollisionBox, CollisionSphere, box_and_sphere);
impl_collide!(CollisionSphere, CollisionBox, box_and_sphere, reversed);
impl_collide!(CollisionBox, CollisionPlane, box_and_half_space);
impl_collide!(CollisionPlane, CollisionBox, box_and_half_space, reversed);
impl_collide!(CollisionBox, CollisionBox, box_and_box);

impl Collide<Collider> for Collider {
    /// Planes never collide with each other.
    fn collide(&self, rhs: &Collider, bodies: &RigidBodySet, data: &mut CollisionData) -> usize {
        match (self, rhs) {
            (&Collider::Sphere(ref a), &Collider::Sphere(ref b)) => a.collide(b, bodies, data),
            (&Collider::Sphere(ref a), &Collider::Box(ref b)) => a.collide(b, bodies, data),
            (&Collider::Sphere(ref a), &Collider::Plane(ref b)) => a.collide(b, bodies, data),
            (&Collider::Box(ref a), &Collider::Sphere(ref b)) => a.collide(b, bodies, data),
            (&Collider::Box(ref a), &Collider::Box(ref b)) => a.collide(b, bodies, data),
            (&Collider::Box(ref a), &Collider::Plane(ref b)) => a.collide(b, bodies, data),
            (&Collider::Plane(ref a), &Collider::Sphere(ref b)) => a.collide(b, bodies, data),
            (&Collider::Plane(ref a), &Collider::Box(ref b)) => a.collide(b, bodies, data),
            (&Collider::Plane(_), &Collider::Plane(_)) => 0,
        }
    }
}
