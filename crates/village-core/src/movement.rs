//! Movement primitives: pure geometry with no decision-state side effects.

use crate::components::Position;

/// Euclidean distance between two positions
pub fn distance(a: Position, b: Position) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Step from `from` toward `to` by at most `speed`, never overshooting
pub fn move_towards(from: Position, to: Position, speed: f32) -> Position {
    let d = distance(from, to);
    if d <= speed || d <= f32::EPSILON {
        return to;
    }
    let ratio = speed / d;
    Position::new(from.x + (to.x - from.x) * ratio, from.y + (to.y - from.y) * ratio)
}

/// Step directly away from `threat` by `speed`
pub fn move_away(from: Position, threat: Position, speed: f32) -> Position {
    let d = distance(from, threat);
    if d <= f32::EPSILON {
        return Position::new(from.x + speed, from.y);
    }
    let ratio = speed / d;
    Position::new(
        from.x + (from.x - threat.x) * ratio,
        from.y + (from.y - threat.y) * ratio,
    )
}

/// Keep a position inside a square map of side `size`
pub fn clamp_to_map(pos: Position, size: f32) -> Position {
    Position::new(pos.x.clamp(0.0, size), pos.y.clamp(0.0, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let d = distance(Position::new(0.0, 0.0), Position::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_move_towards_does_not_overshoot() {
        let target = Position::new(2.0, 0.0);
        assert_eq!(move_towards(Position::new(0.0, 0.0), target, 5.0), target);

        let stepped = move_towards(Position::new(0.0, 0.0), Position::new(10.0, 0.0), 3.0);
        assert!((stepped.x - 3.0).abs() < 1e-6);
        assert!(stepped.y.abs() < 1e-6);
    }

    #[test]
    fn test_move_away_increases_distance() {
        let threat = Position::new(5.0, 5.0);
        let start = Position::new(6.0, 5.0);
        let after = move_away(start, threat, 2.0);
        assert!(distance(after, threat) > distance(start, threat));
    }

    #[test]
    fn test_clamp_to_map() {
        let p = clamp_to_map(Position::new(-3.0, 140.0), 100.0);
        assert_eq!(p, Position::new(0.0, 100.0));
    }
}
