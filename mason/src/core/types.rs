//! Shared deterministic types for the agent core.
//!
//! These types define stable contracts between subsystems. They carry no
//! host state and must behave identically across runs.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Integer cell coordinate. Used for world positions, local (frame-relative)
/// positions and schema cells alike; the owning field says which space it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0, y: 0, z: 0 };
    pub const UP: Vec3 = Vec3 { x: 0, y: 1, z: 0 };
    pub const DOWN: Vec3 = Vec3 { x: 0, y: -1, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component along `axis`.
    pub fn get(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn scale(self, k: i32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Manhattan distance, i.e. the number of unit moves between two cells.
    pub fn manhattan(self, other: Vec3) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y) + self.z.abs_diff(other.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Cardinal horizontal orientation. North is -z, east is +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    pub const ALL: [Facing; 4] = [Facing::North, Facing::East, Facing::South, Facing::West];

    /// Quarter turns clockwise from north.
    fn index(self) -> u8 {
        match self {
            Facing::North => 0,
            Facing::East => 1,
            Facing::South => 2,
            Facing::West => 3,
        }
    }

    fn from_index(index: u8) -> Self {
        Self::ALL[usize::from(index % 4)]
    }

    pub fn right(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn left(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    pub fn unit(self) -> Vec3 {
        match self {
            Facing::North => Vec3::new(0, 0, -1),
            Facing::East => Vec3::new(1, 0, 0),
            Facing::South => Vec3::new(0, 0, 1),
            Facing::West => Vec3::new(-1, 0, 0),
        }
    }

    /// Facing whose unit vector points along `axis` with the sign of `delta`.
    /// Returns `None` for the vertical axis or a zero delta.
    pub fn toward(axis: Axis, delta: i32) -> Option<Self> {
        match (axis, delta.signum()) {
            (Axis::X, 1) => Some(Facing::East),
            (Axis::X, -1) => Some(Facing::West),
            (Axis::Z, 1) => Some(Facing::South),
            (Axis::Z, -1) => Some(Facing::North),
            _ => None,
        }
    }

    /// Shortest turn sequence from `self` to `target`.
    ///
    /// Opposite facings need two quarter turns; the tie is broken toward right turns.
    pub fn turns_to(self, target: Facing) -> &'static [Turn] {
        match (target.index() + 4 - self.index()) % 4 {
            0 => NO_TURNS,
            1 => RIGHT,
            2 => AROUND,
            _ => LEFT,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Some(Facing::North),
            "east" | "e" => Some(Facing::East),
            "south" | "s" => Some(Facing::South),
            "west" | "w" => Some(Facing::West),
            _ => None,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facing::North => "north",
            Facing::East => "east",
            Facing::South => "south",
            Facing::West => "west",
        };
        f.write_str(name)
    }
}

const NO_TURNS: &[Turn] = &[];
const LEFT: &[Turn] = &[Turn::Left];
const RIGHT: &[Turn] = &[Turn::Right];
const AROUND: &[Turn] = &[Turn::Right, Turn::Right];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turn {
    Left,
    Right,
}

impl Turn {
    pub fn apply(self, facing: Facing) -> Facing {
        match self {
            Turn::Left => facing.left(),
            Turn::Right => facing.right(),
        }
    }
}

/// Elementary motion primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Forward,
    Back,
    Up,
    Down,
}

impl Motion {
    /// World delta produced by a successful motion while facing `facing`.
    pub fn delta(self, facing: Facing) -> Vec3 {
        match self {
            Motion::Forward => facing.unit(),
            Motion::Back => -facing.unit(),
            Motion::Up => Vec3::UP,
            Motion::Down => Vec3::DOWN,
        }
    }

    /// Side the motion pushes into, if the host can sense it.
    pub fn side(self) -> Option<Side> {
        match self {
            Motion::Forward => Some(Side::Front),
            Motion::Up => Some(Side::Up),
            Motion::Down => Some(Side::Down),
            Motion::Back => None,
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Motion::Forward => "forward",
            Motion::Back => "back",
            Motion::Up => "up",
            Motion::Down => "down",
        };
        f.write_str(name)
    }
}

/// Side of the agent an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Up,
    Down,
}

impl Side {
    /// World offset of the targeted cell relative to the agent.
    pub fn offset(self, facing: Facing) -> Vec3 {
        match self {
            Side::Front => facing.unit(),
            Side::Up => Vec3::UP,
            Side::Down => Vec3::DOWN,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "front" | "forward" | "horizontal" => Some(Side::Front),
            "up" | "top" => Some(Side::Up),
            "down" | "bottom" => Some(Side::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Front => "front",
            Side::Up => "up",
            Side::Down => "down",
        };
        f.write_str(name)
    }
}

/// Direction relative to the agent used to look for storage containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeDir {
    Front,
    Up,
    Down,
    Left,
    Right,
    Back,
}

impl RelativeDir {
    /// Side to act on plus the quarter turns needed to face the direction first.
    pub fn approach(self) -> (Side, &'static [Turn]) {
        match self {
            RelativeDir::Front => (Side::Front, NO_TURNS),
            RelativeDir::Up => (Side::Up, NO_TURNS),
            RelativeDir::Down => (Side::Down, NO_TURNS),
            RelativeDir::Left => (Side::Front, LEFT),
            RelativeDir::Right => (Side::Front, RIGHT),
            RelativeDir::Back => (Side::Front, AROUND),
        }
    }
}

impl From<Side> for RelativeDir {
    fn from(side: Side) -> Self {
        match side {
            Side::Front => RelativeDir::Front,
            Side::Up => RelativeDir::Up,
            Side::Down => RelativeDir::Down,
        }
    }
}

/// Material identifier (e.g. `minecraft:stone`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(String);

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Air and blank identifiers denote "no required content".
    pub fn is_air(&self) -> bool {
        let name = self.0.trim();
        name.is_empty()
            || name.eq_ignore_ascii_case("air")
            || name.ends_with(":air")
            || name.ends_with(":cave_air")
            || name.ends_with(":void_air")
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Material {
    fn from(name: &str) -> Self {
        Material::new(name)
    }
}

/// Item stack as reported by the host for one inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: Material,
    pub count: u32,
}

impl ItemStack {
    pub fn new(material: impl Into<Material>, count: u32) -> Self {
        Self {
            material: material.into(),
            count,
        }
    }
}

/// Host fuel reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelLevel {
    Unlimited,
    Level(u32),
}

impl FuelLevel {
    /// True when the level satisfies `threshold`; unlimited always does.
    pub fn meets(self, threshold: u32) -> bool {
        match self {
            FuelLevel::Unlimited => true,
            FuelLevel::Level(level) => level >= threshold,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, FuelLevel::Level(0))
    }
}

impl fmt::Display for FuelLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuelLevel::Unlimited => f.write_str("unlimited"),
            FuelLevel::Level(level) => write!(f, "{level}"),
        }
    }
}

/// Build or excavate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Build,
    Mine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_table_is_cyclic() {
        for facing in Facing::ALL {
            assert_eq!(facing.right().left(), facing);
            assert_eq!(facing.right().right(), facing.opposite());
            assert_eq!(facing.left().left().left().left(), facing);
        }
        assert_eq!(Facing::North.right(), Facing::East);
        assert_eq!(Facing::North.left(), Facing::West);
    }

    #[test]
    fn turns_to_prefers_single_turns_and_breaks_ties_right() {
        assert!(Facing::North.turns_to(Facing::North).is_empty());
        assert_eq!(Facing::North.turns_to(Facing::East), &[Turn::Right]);
        assert_eq!(Facing::North.turns_to(Facing::West), &[Turn::Left]);
        assert_eq!(
            Facing::East.turns_to(Facing::West),
            &[Turn::Right, Turn::Right]
        );
    }

    #[test]
    fn turns_to_always_lands_on_target() {
        for from in Facing::ALL {
            for to in Facing::ALL {
                let landed = from
                    .turns_to(to)
                    .iter()
                    .fold(from, |facing, turn| turn.apply(facing));
                assert_eq!(landed, to, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn toward_maps_horizontal_axes_only() {
        assert_eq!(Facing::toward(Axis::X, 3), Some(Facing::East));
        assert_eq!(Facing::toward(Axis::Z, -1), Some(Facing::North));
        assert_eq!(Facing::toward(Axis::Y, 1), None);
        assert_eq!(Facing::toward(Axis::X, 0), None);
    }

    #[test]
    fn air_detection_covers_namespaced_ids() {
        assert!(Material::from("minecraft:air").is_air());
        assert!(Material::from("air").is_air());
        assert!(Material::from("  ").is_air());
        assert!(!Material::from("minecraft:stone").is_air());
        assert!(!Material::from("minecraft:airship_hull").is_air());
    }

    #[test]
    fn fuel_unlimited_always_meets_threshold() {
        assert!(FuelLevel::Unlimited.meets(u32::MAX));
        assert!(FuelLevel::Level(10).meets(10));
        assert!(!FuelLevel::Level(9).meets(10));
        assert!(FuelLevel::Level(0).is_empty());
        assert!(!FuelLevel::Unlimited.is_empty());
    }
}
