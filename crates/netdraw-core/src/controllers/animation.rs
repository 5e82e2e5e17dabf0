// ── Viewport animations ──
//
// A jump is two animations stepped together on the animation tick: one
// for scale, one for the virtual point at the canvas center. Each has
// its own small FSM so frames show up in the transition trace.

use tracing::debug;

use crate::fsm::{Fsm, FsmTrace, Machine, StateId};
use crate::geometry::{Point, lerp};
use crate::states;
use crate::workspace::{View, Workspace};

states! {
    pub enum AnimationState {
        Start => [Running, Cancelled],
        Running => [Completed, Cancelled],
        Completed => [],
        Cancelled => [],
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationKind {
    /// Interpolated in log space so zooming feels uniform.
    Scale { from: f64, to: f64 },
    /// Virtual point kept at the canvas center.
    Pan { from: Point, to: Point },
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub id: u64,
    machine: Machine<AnimationState>,
    pub frame: u32,
    pub steps: u32,
    pub kind: AnimationKind,
}

impl Fsm for Animation {
    type State = AnimationState;
    type Context = FsmTrace;

    fn machine(&self) -> &Machine<AnimationState> {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut Machine<AnimationState> {
        &mut self.machine
    }
}

impl Animation {
    pub fn new(id: u64, steps: u32, kind: AnimationKind) -> Self {
        Self {
            id,
            machine: Machine::new("animation_fsm", AnimationState::Start),
            frame: 0,
            steps: steps.max(1),
            kind,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(
            self.state(),
            AnimationState::Completed | AnimationState::Cancelled
        )
    }

    /// Advance one frame. Returns `true` when the scale changed.
    pub fn tick(&mut self, trace: &mut FsmTrace, view: &mut View) -> bool {
        if self.state() == AnimationState::Start {
            self.change_state(trace, AnimationState::Running);
        }
        if self.state() != AnimationState::Running {
            return false;
        }

        self.frame += 1;
        let t = f64::from(self.frame) / f64::from(self.steps);
        let scaled = match self.kind {
            AnimationKind::Scale { from, to } => {
                view.scale = if from > 0.0 && to > 0.0 {
                    lerp(from.ln(), to.ln(), t).exp()
                } else {
                    lerp(from, to, t)
                };
                view.update_scaled();
                true
            }
            AnimationKind::Pan { from, to } => {
                let center = Point::new(lerp(from.x, to.x, t), lerp(from.y, to.y, t));
                let pan = view.pan_for_center(center, view.scale);
                view.pan_x = pan.x;
                view.pan_y = pan.y;
                view.update_scaled();
                false
            }
        };

        if self.frame >= self.steps {
            self.change_state(trace, AnimationState::Completed);
        }
        scaled
    }

    pub fn cancel(&mut self, trace: &mut FsmTrace) {
        if !self.is_done() {
            self.change_state(trace, AnimationState::Cancelled);
        }
    }
}

/// Frames for a jump over virtual distance `d`: 30, 60, 90 or 120.
pub fn frames_for_distance(d: f64) -> u32 {
    let bands = (1.0 + 4.0 * d / (d + 3000.0)).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bands = bands.max(1.0) as u32;
    30 * bands
}

/// Animate the viewport so `target` ends at the canvas center at `scale`.
pub fn jump_to_animation(ws: &mut Workspace, target: Point, scale: f64) {
    ws.cancel_animations();
    let from = ws.view.virtual_center();
    let steps = frames_for_distance(from.distance(target));
    debug!(
        to_x = target.x,
        to_y = target.y,
        scale,
        steps,
        "jump"
    );

    let id = ws.next_animation_id();
    ws.animations.push(Animation::new(
        id,
        steps,
        AnimationKind::Scale {
            from: ws.view.scale,
            to: scale,
        },
    ));
    let id = ws.next_animation_id();
    ws.animations
        .push(Animation::new(id, steps, AnimationKind::Pan { from, to: target }));
}

/// Step every running animation one frame and drop finished ones.
pub fn step_animations(ws: &mut Workspace) {
    let mut scaled = false;
    for a in &mut ws.animations {
        scaled |= a.tick(&mut ws.trace, &mut ws.view);
    }
    ws.animations.retain(|a| !a.is_done());
    if scaled {
        ws.post_scale_changed();
    }
}
