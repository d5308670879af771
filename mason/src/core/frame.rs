//! Translation between agent-relative ("local") and world coordinates.
//!
//! Local space: `+z` is the reference facing (forward), `+x` is to its right,
//! `+y` is up. The frame origin is local `(0, 0, 0)`.

use serde::{Deserialize, Serialize};

use crate::core::types::{Facing, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    pub origin: Vec3,
    pub facing: Facing,
}

impl ReferenceFrame {
    pub fn new(origin: Vec3, facing: Facing) -> Self {
        Self { origin, facing }
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        let forward = self.facing.unit();
        let right = self.facing.right().unit();
        self.origin + right.scale(local.x) + Vec3::UP.scale(local.y) + forward.scale(local.z)
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        let rel = world - self.origin;
        let forward = self.facing.unit();
        let right = self.facing.right().unit();
        Vec3::new(dot(rel, right), rel.y, dot(rel, forward))
    }

    /// World facing for a facing expressed relative to the frame (north = forward).
    pub fn facing_to_world(&self, local: Facing) -> Facing {
        Facing::North
            .turns_to(local)
            .iter()
            .fold(self.facing, |facing, turn| turn.apply(facing))
    }
}

fn dot(a: Vec3, b: Vec3) -> i32 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

/// Which side of the agent the structure extends to from the start corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Right,
    Left,
}

impl Orientation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "right" | "r" => Some(Orientation::Right),
            "left" | "l" => Some(Orientation::Left),
            _ => None,
        }
    }

    /// Sign applied to the schema x extent.
    pub fn x_sign(self) -> i32 {
        match self {
            Orientation::Right => 1,
            Orientation::Left => -1,
        }
    }
}
