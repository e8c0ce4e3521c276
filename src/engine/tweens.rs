//! Tween entities and the per-frame active-set pass.

use bevy_ecs::prelude::*;
use log::{debug, warn};

use super::Engine;
use crate::components::tween::Tween;
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, names};
use crate::resources::tweens::ActiveTweens;
use crate::systems::tween::{TweenStep, step_tween};

impl Engine {
    /// A tween on `target` using the configured default easing.
    pub fn new_tween(&self, target: Entity, duration: f32) -> Tween {
        Tween::new(target, duration).with_easing(self.config().default_easing)
    }

    /// Spawn a stopped tween entity.
    pub fn create_tween(&mut self, tween: Tween) -> Entity {
        self.world.spawn(tween).id()
    }

    pub fn tween(&self, tween: Entity) -> Option<&Tween> {
        self.world.get::<Tween>(tween)
    }

    fn ensure_tween(&self, tween: Entity) -> EngineResult<()> {
        self.ensure_alive(tween)?;
        if self.world.get::<Tween>(tween).is_some() {
            Ok(())
        } else {
            warn!("entity {} is not a tween", tween);
            Err(EngineError::usage(format!("entity {tween} is not a tween")))
        }
    }

    /// Start or stop a tween. Starting a tween that already ran to the end
    /// rewinds it. Stopping never fires `finished`.
    pub fn set_tween_running(&mut self, tween: Entity, running: bool) -> EngineResult<()> {
        self.ensure_tween(tween)?;
        if running {
            if let Some(mut t) = self.world.get_mut::<Tween>(tween) {
                if t.time >= t.duration {
                    t.time = 0.0;
                }
            }
            self.world.resource_mut::<ActiveTweens>().insert(tween);
        } else {
            self.world.resource_mut::<ActiveTweens>().remove(tween);
        }
        Ok(())
    }

    pub fn tween_running(&self, tween: Entity) -> bool {
        self.world.resource::<ActiveTweens>().contains(tween)
    }

    pub fn active_tween_count(&self) -> usize {
        self.world.resource::<ActiveTweens>().len()
    }

    pub fn destroy_tween(&mut self, tween: Entity) -> EngineResult<()> {
        self.ensure_tween(tween)?;
        self.world.resource_mut::<ActiveTweens>().remove(tween);
        self.scheduler.cancel_all(tween);
        self.listeners.remove(&tween);
        self.handlers.remove(&tween);
        self.world.despawn(tween);
        Ok(())
    }

    /// Step every running tween once. A tween that completes fires `finished`
    /// on itself and is destroyed unless a listener restarted it; a tween
    /// without a live target node or without properties is dropped silently.
    pub fn process_active_tweens(&mut self, dt: f32, unscaled_dt: f32) {
        let snapshot = self.world.resource::<ActiveTweens>().snapshot();
        for entity in snapshot {
            if !self.tween_running(entity) {
                continue;
            }
            let Some(mut tween) = self.world.get::<Tween>(entity).cloned() else {
                self.world.resource_mut::<ActiveTweens>().remove(entity);
                continue;
            };

            let target = tween.target.filter(|t| self.is_node(*t));
            let mut writes = Vec::with_capacity(tween.properties.len());
            let step = match target {
                Some(_) => step_tween(&mut tween, dt, unscaled_dt, |name, value| {
                    writes.push((name.to_string(), value));
                }),
                None => TweenStep::Invalid,
            };
            if let Some(target) = target {
                for (name, value) in writes {
                    if let Err(err) = self.set_property(target, &name, value) {
                        debug!("tween {} could not write '{}': {}", entity, name, err);
                    }
                }
            }
            if let Some(mut stored) = self.world.get_mut::<Tween>(entity) {
                *stored = tween;
            }

            match step {
                TweenStep::Continue => {}
                TweenStep::Finished => {
                    self.world.resource_mut::<ActiveTweens>().remove(entity);
                    let mut event = Event::new(names::FINISHED).tracked_by(&self.event_stack);
                    self.deliver(entity, &mut event, false);
                    if self.is_alive(entity) && !self.tween_running(entity) {
                        if let Err(err) = self.destroy_tween(entity) {
                            debug!("finished tween {} not destroyed: {}", entity, err);
                        }
                    }
                }
                TweenStep::Invalid => {
                    debug!("dropping tween {} without target or properties", entity);
                    if self.is_alive(entity) {
                        if let Err(err) = self.destroy_tween(entity) {
                            debug!("invalid tween {} not destroyed: {}", entity, err);
                        }
                    }
                }
            }
        }
    }
}
