//! Route editing on the map.
//!
//! Each click places a waypoint with the current target role, then the
//! target advances:
//!
//! | Placed | Next target |
//! |---|---|
//! | `Start` | `Checkpoint` |
//! | `Checkpoint` | `End` if the route has no end yet, else `Checkpoint` |
//! | `End` | unchanged |
//!
//! A route holds at most one start and one end; placing another replaces
//! the old one.

use orinx_types::{LatLng, Waypoint, WaypointRole};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WaypointEditor {
    points: Vec<Waypoint>,
    target: WaypointRole,
}

impl Default for WaypointEditor {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            target: WaypointRole::Start,
        }
    }
}

impl WaypointEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_role(&self) -> WaypointRole {
        self.target
    }

    /// Override the role the next placed point gets.
    pub fn select_role(&mut self, role: WaypointRole) {
        self.target = role;
    }

    /// Place a point with the current target role and advance the target.
    pub fn place_point(&mut self, coordinates: LatLng) -> Waypoint {
        let role = self.target;
        let waypoint = Waypoint {
            id: Uuid::new_v4(),
            role,
            coordinates,
            label: format!("{role} {}", self.points.len() + 1),
        };

        if role != WaypointRole::Checkpoint {
            self.points.retain(|p| p.role != role);
        }
        self.points.push(waypoint.clone());

        self.target = match role {
            WaypointRole::Start => WaypointRole::Checkpoint,
            WaypointRole::Checkpoint if !self.has(WaypointRole::End) => WaypointRole::End,
            other => other,
        };
        debug!(label = %waypoint.label, at = %coordinates, next = %self.target, "waypoint placed");
        waypoint
    }

    /// Remove the waypoint with `id`.  The target role is left alone.
    pub fn remove_waypoint(&mut self, id: Uuid) -> Option<Waypoint> {
        let index = self.points.iter().position(|p| p.id == id)?;
        Some(self.points.remove(index))
    }

    /// Every waypoint in placement order.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.points
    }

    /// Waypoints in travel order: start, checkpoints as placed, end.
    pub fn route(&self) -> Vec<&Waypoint> {
        let of = |role: WaypointRole| self.points.iter().filter(move |p| p.role == role);
        of(WaypointRole::Start)
            .chain(of(WaypointRole::Checkpoint))
            .chain(of(WaypointRole::End))
            .collect()
    }

    /// Drop every waypoint and start over from `Start`.
    pub fn clear(&mut self) {
        self.points.clear();
        self.target = WaypointRole::Start;
    }

    fn has(&self, role: WaypointRole) -> bool {
        self.points.iter().any(|p| p.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(n: f64) -> LatLng {
        LatLng::new(40.0 + n, -3.0 - n)
    }

    fn roles(editor: &WaypointEditor) -> Vec<WaypointRole> {
        editor.waypoints().iter().map(|p| p.role).collect()
    }

    #[test]
    fn roles_advance_start_checkpoint_end() {
        let mut editor = WaypointEditor::new();
        assert_eq!(editor.target_role(), WaypointRole::Start);

        let start = editor.place_point(at(0.0));
        assert_eq!(start.label, "Start 1");
        assert_eq!(editor.target_role(), WaypointRole::Checkpoint);

        let cp = editor.place_point(at(1.0));
        assert_eq!(cp.label, "Checkpoint 2");
        assert_eq!(editor.target_role(), WaypointRole::End);

        let end = editor.place_point(at(2.0));
        assert_eq!(end.label, "End 3");
        assert_eq!(editor.target_role(), WaypointRole::End);
    }

    #[test]
    fn checkpoints_keep_the_target_once_an_end_exists() {
        let mut editor = WaypointEditor::new();
        editor.place_point(at(0.0));
        editor.select_role(WaypointRole::End);
        editor.place_point(at(1.0));
        editor.select_role(WaypointRole::Checkpoint);
        editor.place_point(at(2.0));
        assert_eq!(editor.target_role(), WaypointRole::Checkpoint);
        editor.place_point(at(3.0));
        assert_eq!(
            roles(&editor),
            vec![
                WaypointRole::Start,
                WaypointRole::End,
                WaypointRole::Checkpoint,
                WaypointRole::Checkpoint,
            ]
        );
    }

    #[test]
    fn start_and_end_replace_their_predecessor() {
        let mut editor = WaypointEditor::new();
        let first = editor.place_point(at(0.0));
        editor.select_role(WaypointRole::Start);
        let second = editor.place_point(at(1.0));

        let starts: Vec<Uuid> = editor
            .waypoints()
            .iter()
            .filter(|p| p.role == WaypointRole::Start)
            .map(|p| p.id)
            .collect();
        assert_eq!(starts, vec![second.id]);
        assert_ne!(first.id, second.id);
        assert_eq!(second.label, "Start 2", "label counts points before the old start is evicted");

        editor.select_role(WaypointRole::End);
        editor.place_point(at(2.0));
        editor.select_role(WaypointRole::End);
        let end = editor.place_point(at(3.0));
        assert_eq!(editor.waypoints().len(), 2);
        assert_eq!(editor.waypoints()[1].id, end.id);
    }

    #[test]
    fn remove_does_not_touch_the_target() {
        let mut editor = WaypointEditor::new();
        let start = editor.place_point(at(0.0));
        assert_eq!(editor.remove_waypoint(start.id).map(|p| p.id), Some(start.id));
        assert_eq!(editor.target_role(), WaypointRole::Checkpoint);
        assert!(editor.remove_waypoint(start.id).is_none());
        assert!(editor.waypoints().is_empty());
    }

    #[test]
    fn route_orders_start_checkpoints_end() {
        let mut editor = WaypointEditor::new();
        editor.select_role(WaypointRole::End);
        let end = editor.place_point(at(0.0));
        editor.select_role(WaypointRole::Checkpoint);
        let a = editor.place_point(at(1.0));
        let b = editor.place_point(at(2.0));
        editor.select_role(WaypointRole::Start);
        let start = editor.place_point(at(3.0));

        let ids: Vec<Uuid> = editor.route().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![start.id, a.id, b.id, end.id]);

        editor.clear();
        assert!(editor.route().is_empty());
        assert_eq!(editor.target_role(), WaypointRole::Start);
    }
}
