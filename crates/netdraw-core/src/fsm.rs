// ── Finite-state-machine engine ──
//
// Every interaction concern is a closed enum of states plus a handler
// that matches on (state, event). States declare their legal successors
// as data; `change_state` checks them, records the transition and runs
// the optional end/start hooks in order.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;

use serde::Serialize;
use tracing::{error, trace};

// ── StateId ──────────────────────────────────────────────────────────

/// A state discriminant with a declared transition set.
pub trait StateId: Copy + Eq + Debug + Into<&'static str> + 'static {
    /// States this state may legally change to.
    fn transitions(self) -> &'static [Self];

    fn name(self) -> &'static str {
        self.into()
    }

    fn can_transition_to(self, to: Self) -> bool {
        self.transitions().contains(&to)
    }
}

/// Declare a state enum together with its legal transitions.
///
/// ```rust,ignore
/// states! {
///     pub enum DoorState {
///         Closed => [Open],
///         Open => [Closed],
///     }
/// }
/// ```
#[macro_export]
macro_rules! states {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($state:ident => [$($to:ident),* $(,)?]),* $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            strum::IntoStaticStr, strum::EnumIter,
        )]
        $vis enum $name {
            $($state),*
        }

        impl $crate::fsm::StateId for $name {
            fn transitions(self) -> &'static [Self] {
                match self {
                    $(Self::$state => &[$(Self::$to),*]),*
                }
            }
        }
    };
}

// ── Machine ──────────────────────────────────────────────────────────

/// Current state of one FSM instance.
#[derive(Debug, Clone)]
pub struct Machine<S: StateId> {
    name: &'static str,
    initial: S,
    state: S,
}

impl<S: StateId> Machine<S> {
    pub fn new(name: &'static str, initial: S) -> Self {
        Self {
            name,
            initial,
            state: initial,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn is(&self, state: S) -> bool {
        self.state == state
    }

    /// Jump back to the initial state without running hooks or tracing.
    pub fn reset(&mut self) {
        self.state = self.initial;
    }

    fn set(&mut self, state: S) {
        self.state = state;
    }
}

// ── Fsm ──────────────────────────────────────────────────────────────

/// Behavior shared by every state machine: hooks plus a checked,
/// traced `change_state`.
pub trait Fsm {
    type State: StateId;
    /// Whatever the hooks mutate. Must expose the transition trace.
    type Context: AsMut<FsmTrace> + ?Sized;

    fn machine(&self) -> &Machine<Self::State>;
    fn machine_mut(&mut self) -> &mut Machine<Self::State>;

    /// Runs after entering `state`.
    fn on_start(&mut self, _cx: &mut Self::Context, _state: Self::State) {}

    /// Runs before leaving `state`.
    fn on_end(&mut self, _cx: &mut Self::Context, _state: Self::State) {}

    fn state(&self) -> Self::State {
        self.machine().state()
    }

    /// end(old) → trace → switch → start(new).
    ///
    /// Transitions outside the declared set are still performed, but are
    /// recorded as illegal and logged.
    fn change_state(&mut self, cx: &mut Self::Context, to: Self::State) {
        let from = self.machine().state();
        self.on_end(cx, from);
        cx.as_mut()
            .record(self.machine().name(), from.name(), to.name(), from.can_transition_to(to));
        self.machine_mut().set(to);
        self.on_start(cx, to);
    }
}

// ── Trace ────────────────────────────────────────────────────────────

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub order: u64,
    pub fsm: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    /// Name of the event being handled when the change happened.
    pub message: &'static str,
    pub legal: bool,
}

/// Bounded log of transitions plus the set of distinct edges ever taken.
#[derive(Debug, Clone)]
pub struct FsmTrace {
    capacity: usize,
    next_order: u64,
    message: &'static str,
    transitions: VecDeque<Transition>,
    coverage: BTreeSet<(&'static str, &'static str, &'static str)>,
    illegal: Vec<Transition>,
    streaming: bool,
    unsent: Vec<Transition>,
}

impl FsmTrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_order: 0,
            message: "",
            transitions: VecDeque::new(),
            coverage: BTreeSet::new(),
            illegal: Vec::new(),
            streaming: false,
            unsent: Vec::new(),
        }
    }

    /// Name the event that subsequent transitions are attributed to.
    pub fn set_message(&mut self, message: &'static str) {
        self.message = message;
    }

    pub fn record(&mut self, fsm: &'static str, from: &'static str, to: &'static str, legal: bool) {
        let t = Transition {
            order: self.next_order,
            fsm,
            from,
            to,
            message: self.message,
            legal,
        };
        self.next_order += 1;

        if legal {
            trace!(fsm, from, to, message = self.message, "transition");
        } else {
            error!(fsm, from, to, message = self.message, "illegal transition");
            self.illegal.push(t.clone());
        }

        self.coverage.insert((fsm, from, to));
        if self.streaming {
            self.unsent.push(t.clone());
        }
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(t);
    }

    /// Keep transitions for [`take_unsent`](Self::take_unsent) while on.
    pub fn set_streaming(&mut self, on: bool) {
        self.streaming = on;
        if !on {
            self.unsent.clear();
        }
    }

    pub fn take_unsent(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.unsent)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Every transition that was not in its state's declared set.
    pub fn illegal(&self) -> &[Transition] {
        &self.illegal
    }

    pub fn coverage(&self) -> impl Iterator<Item = &(&'static str, &'static str, &'static str)> {
        self.coverage.iter()
    }

    pub fn reset_coverage(&mut self) {
        self.coverage.clear();
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
        self.illegal.clear();
        self.unsent.clear();
    }
}

impl AsMut<FsmTrace> for FsmTrace {
    fn as_mut(&mut self) -> &mut FsmTrace {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    states! {
        enum Door {
            Closed => [Open],
            Open => [Closed, Locked],
            Locked => [],
        }
    }

    struct DoorFsm {
        machine: Machine<Door>,
        log: Vec<String>,
    }

    impl Fsm for DoorFsm {
        type State = Door;
        type Context = FsmTrace;

        fn machine(&self) -> &Machine<Door> {
            &self.machine
        }
        fn machine_mut(&mut self) -> &mut Machine<Door> {
            &mut self.machine
        }
        fn on_start(&mut self, _cx: &mut FsmTrace, state: Door) {
            self.log.push(format!("start {}", state.name()));
        }
        fn on_end(&mut self, _cx: &mut FsmTrace, state: Door) {
            self.log.push(format!("end {}", state.name()));
        }
    }

    fn door() -> DoorFsm {
        DoorFsm {
            machine: Machine::new("door", Door::Closed),
            log: Vec::new(),
        }
    }

    #[test]
    fn hooks_run_end_then_start() {
        let mut trace = FsmTrace::new(16);
        let mut fsm = door();
        trace.set_message("Push");
        fsm.change_state(&mut trace, Door::Open);

        assert_eq!(fsm.log, vec!["end Closed", "start Open"]);
        assert_eq!(fsm.state(), Door::Open);
        let t = trace.transitions().next().unwrap();
        assert_eq!((t.fsm, t.from, t.to, t.message, t.legal), ("door", "Closed", "Open", "Push", true));
    }

    #[test]
    fn illegal_transition_is_recorded_not_fatal() {
        let mut trace = FsmTrace::new(16);
        let mut fsm = door();
        fsm.change_state(&mut trace, Door::Locked);

        assert_eq!(fsm.state(), Door::Locked);
        assert_eq!(trace.illegal().len(), 1);
        assert!(!trace.illegal()[0].legal);
    }

    #[test]
    fn trace_is_bounded_but_coverage_is_not() {
        let mut trace = FsmTrace::new(2);
        let mut fsm = door();
        fsm.change_state(&mut trace, Door::Open);
        fsm.change_state(&mut trace, Door::Closed);
        fsm.change_state(&mut trace, Door::Open);

        assert_eq!(trace.transitions().count(), 2);
        assert_eq!(trace.coverage().count(), 2);
        assert_eq!(trace.transitions().next().unwrap().order, 1);
    }

    #[test]
    fn streaming_collects_unsent() {
        let mut trace = FsmTrace::new(8);
        let mut fsm = door();
        fsm.change_state(&mut trace, Door::Open);
        assert!(trace.take_unsent().is_empty());

        trace.set_streaming(true);
        fsm.change_state(&mut trace, Door::Closed);
        assert_eq!(trace.take_unsent().len(), 1);
        assert!(trace.take_unsent().is_empty());
    }

    #[test]
    fn declared_transitions_are_data() {
        let all: Vec<Door> = Door::iter().collect();
        assert_eq!(all.len(), 3);
        assert!(Door::Locked.transitions().is_empty());
        assert!(Door::Open.can_transition_to(Door::Locked));
        let mut machine = Machine::new("door", Door::Closed);
        machine.set(Door::Open);
        machine.reset();
        assert!(machine.is(Door::Closed));
    }
}
