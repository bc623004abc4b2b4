//! Per-session intent buffering

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::ws::protocol::{InputState, MoveDelta};

use super::error::GameError;
use super::world::World;

/// Latest directional/aim/attack state of one session
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub attacking: bool,
    /// Aim angle in radians
    pub angle: f32,
}

impl From<InputState> for Intent {
    fn from(input: InputState) -> Self {
        Self {
            up: input.up,
            down: input.down,
            left: input.left,
            right: input.right,
            attacking: input.shooting,
            angle: input.angle,
        }
    }
}

impl Intent {
    /// Translate a legacy `{dx, dy}` delta into held directions, keeping the
    /// previous aim and attack state. Magnitude is ignored.
    pub fn from_delta(delta: MoveDelta, previous: Option<&Intent>) -> Self {
        let base = previous.copied().unwrap_or_default();
        Self {
            up: delta.dy < 0.0,
            down: delta.dy > 0.0,
            left: delta.dx < 0.0,
            right: delta.dx > 0.0,
            ..base
        }
    }
}

/// Last-write-wins intent store.
///
/// Intents stay in effect across ticks until replaced, so a held key keeps
/// moving the player; they never queue.
#[derive(Debug, Default)]
pub struct IntentBuffer {
    latest: HashMap<Uuid, Intent>,
    /// Sessions that reported a petal strike since the last tick
    attack_hints: HashSet<Uuid>,
    dropped: u64,
}

impl IntentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffered intent for `session`
    pub fn submit(&mut self, world: &World, session: Uuid, intent: Intent) -> Result<(), GameError> {
        if !intent.angle.is_finite() {
            self.dropped += 1;
            return Err(GameError::Protocol("non-finite aim angle".into()));
        }
        self.check_session(world, session)?;
        self.latest.insert(session, intent);
        Ok(())
    }

    /// Legacy `move` variant
    pub fn submit_delta(
        &mut self,
        world: &World,
        session: Uuid,
        delta: MoveDelta,
    ) -> Result<(), GameError> {
        if !delta.dx.is_finite() || !delta.dy.is_finite() {
            self.dropped += 1;
            return Err(GameError::Protocol("non-finite move delta".into()));
        }
        let intent = Intent::from_delta(delta, self.latest.get(&session));
        self.submit(world, session, intent)
    }

    /// Treat the session as attacking for the next tick
    pub fn hint_attack(&mut self, session: Uuid) {
        self.attack_hints.insert(session);
    }

    pub fn get(&self, session: &Uuid) -> Option<&Intent> {
        self.latest.get(session)
    }

    /// Whether the session attacks this tick, by intent or by hint
    pub fn is_attacking(&self, session: &Uuid) -> bool {
        self.attack_hints.contains(session) || self.latest.get(session).is_some_and(|i| i.attacking)
    }

    /// Called at the end of each tick
    pub fn clear_hints(&mut self) {
        self.attack_hints.clear();
    }

    /// Drop everything buffered for a session (death or disconnect)
    pub fn forget(&mut self, session: &Uuid) {
        self.latest.remove(session);
        self.attack_hints.remove(session);
    }

    /// Intents discarded since startup
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    fn check_session(&mut self, world: &World, session: Uuid) -> Result<(), GameError> {
        match world.players.get(&session) {
            None => {
                self.dropped += 1;
                Err(GameError::SessionLost(session))
            }
            Some(player) if player.dead => {
                self.dropped += 1;
                Err(GameError::validation("dead players cannot move"))
            }
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameConfig;

    fn world_with_player() -> (World, Uuid) {
        let mut world = World::new(&GameConfig::default());
        let id = Uuid::new_v4();
        world.add_player(id);
        (world, id)
    }

    #[test]
    fn last_write_wins() {
        let (world, id) = world_with_player();
        let mut buffer = IntentBuffer::new();

        let first = Intent {
            up: true,
            ..Intent::default()
        };
        let second = Intent {
            left: true,
            angle: 1.0,
            ..Intent::default()
        };
        buffer.submit(&world, id, first).unwrap();
        buffer.submit(&world, id, second).unwrap();

        assert_eq!(buffer.get(&id), Some(&second));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn drops_malformed_and_orphaned_intents() {
        let (world, id) = world_with_player();
        let mut buffer = IntentBuffer::new();

        let bad_angle = Intent {
            angle: f32::NAN,
            ..Intent::default()
        };
        assert!(matches!(
            buffer.submit(&world, id, bad_angle),
            Err(GameError::Protocol(_))
        ));

        let stranger = Uuid::new_v4();
        assert_eq!(
            buffer.submit(&world, stranger, Intent::default()),
            Err(GameError::SessionLost(stranger))
        );

        assert!(buffer
            .submit_delta(&world, id, MoveDelta { dx: f32::INFINITY, dy: 0.0 })
            .is_err());

        assert_eq!(buffer.dropped(), 3);
        assert!(buffer.get(&id).is_none());
    }

    #[test]
    fn dead_players_cannot_submit() {
        let (mut world, id) = world_with_player();
        world.players.get_mut(&id).unwrap().dead = true;
        let mut buffer = IntentBuffer::new();

        assert!(matches!(
            buffer.submit(&world, id, Intent::default()),
            Err(GameError::Validation(_))
        ));
    }

    #[test]
    fn move_delta_keeps_aim() {
        let (world, id) = world_with_player();
        let mut buffer = IntentBuffer::new();
        buffer
            .submit(
                &world,
                id,
                Intent {
                    angle: 2.0,
                    attacking: true,
                    ..Intent::default()
                },
            )
            .unwrap();

        buffer
            .submit_delta(&world, id, MoveDelta { dx: -3.0, dy: 5.0 })
            .unwrap();

        let intent = buffer.get(&id).unwrap();
        assert!(intent.left && intent.down);
        assert!(!intent.right && !intent.up);
        assert_eq!(intent.angle, 2.0);
        assert!(intent.attacking);
    }

    #[test]
    fn attack_hint_lasts_one_tick() {
        let (_, id) = world_with_player();
        let mut buffer = IntentBuffer::new();
        buffer.hint_attack(id);
        assert!(buffer.is_attacking(&id));
        buffer.clear_hints();
        assert!(!buffer.is_attacking(&id));
    }
}
