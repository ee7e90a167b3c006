use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const MAX_HP: u8 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, delta: Position) -> Position {
        Position::new(self.x + delta.x, self.y + delta.y, self.z + delta.z)
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Position {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Position::new(x, y, z)
    }
}

/// View direction in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    pub pitch: f64,
    pub yaw: f64,
}

impl Angle {
    pub fn new(pitch: f64, yaw: f64) -> Self {
        Self { pitch, yaw }
    }

    pub fn offset(&self, delta: Angle) -> Angle {
        Angle::new(self.pitch + delta.pitch, self.yaw + delta.yaw)
    }
}

/// What the client knows about its own character.
///
/// Updated from the server's MOVE_PLAYER and HP messages, and optimistically
/// by local movement before the server has confirmed it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Position,
    pub angle: Angle,
    pub hp: u8,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerState {
    /// HP is assumed full until the server says otherwise.
    pub fn new() -> Self {
        Self {
            position: Position::default(),
            angle: Angle::default(),
            hp: MAX_HP,
        }
    }

    pub fn apply_server_move(&mut self, position: [f64; 3], pitch: f64, yaw: f64) {
        self.position = position.into();
        self.angle = Angle::new(pitch, yaw);
    }

    pub fn set_hp(&mut self, hp: u8) {
        self.hp = hp;
    }

    /// Target of a relative move.
    pub fn moved(&self, delta_position: Position, delta_angle: Angle) -> (Position, Angle) {
        (
            self.position.offset(delta_position),
            self.angle.offset(delta_angle),
        )
    }

    pub fn turned(&self, degrees: f64) -> Angle {
        Angle::new(self.angle.pitch, self.angle.yaw + degrees)
    }

    /// Horizontal displacement for walking `distance` blocks the way the
    /// character is facing. Yaw 0 faces +z.
    pub fn walk_delta(&self, distance: f64) -> Position {
        let heading = (90.0 + self.angle.yaw) / 180.0 * PI;
        Position::new(distance * heading.cos(), 0.0, distance * heading.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_player_state_creation() {
        let state = PlayerState::new();
        assert_eq!(state.hp, MAX_HP);
        assert_eq!(state.position, Position::default());
        assert_eq!(state.angle, Angle::default());
    }

    #[test]
    fn test_apply_server_move() {
        let mut state = PlayerState::new();
        state.apply_server_move([1.0, 2.0, 3.0], 10.0, 20.0);

        assert_eq!(state.position, Position::new(1.0, 2.0, 3.0));
        assert_eq!(state.angle, Angle::new(10.0, 20.0));
    }

    #[test]
    fn test_relative_move() {
        let mut state = PlayerState::new();
        state.apply_server_move([10.0, 5.0, -3.0], 0.0, 45.0);

        let (position, angle) =
            state.moved(Position::new(1.0, -1.0, 0.5), Angle::new(5.0, -45.0));
        assert_eq!(position, Position::new(11.0, 4.0, -2.5));
        assert_eq!(angle, Angle::new(5.0, 0.0));
    }

    #[test]
    fn test_turn_changes_only_yaw() {
        let mut state = PlayerState::new();
        state.apply_server_move([0.0, 0.0, 0.0], 12.0, 30.0);

        assert_eq!(state.turned(90.0), Angle::new(12.0, 120.0));
        assert_eq!(state.turned(-45.0), Angle::new(12.0, -15.0));
    }

    #[test]
    fn test_walk_delta_follows_yaw() {
        let mut state = PlayerState::new();

        let forward = state.walk_delta(2.0);
        assert_approx_eq!(forward.x, 0.0, 1e-5);
        assert_approx_eq!(forward.z, 2.0, 1e-5);
        assert_eq!(forward.y, 0.0);

        state.angle.yaw = 90.0;
        let turned = state.walk_delta(1.0);
        assert_approx_eq!(turned.x, -1.0, 1e-5);
        assert_approx_eq!(turned.z, 0.0, 1e-5);
    }

    #[test]
    fn test_state_json_roundtrip() {
        let mut state = PlayerState::new();
        state.apply_server_move([1.5, 2.0, -3.25], 10.0, 20.0);
        state.set_hp(7);

        let json = serde_json::to_string(&state).unwrap();
        let restored: PlayerState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
