mod aabb;
mod color;
mod ray;

pub use aabb::AABB;
pub use color::{hex_rgb, scale_rgb};
pub use ray::{intersect_aabb, moller_trumbore_intersect, Ray, TriangleIntersection};
