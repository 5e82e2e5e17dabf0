// ── Controller pipeline ──
//
// The delegation chain as data: an ordered list of stages, each owning
// one controller. An event enters at the head and moves down until a
// stage consumes it. Handlers never dispatch; they return a `Flow` and
// queue follow-up events on the workspace, which the pipeline delivers
// once the handler has returned.

use strum::{EnumIter, IntoStaticStr};
use tracing::{trace, warn};

use crate::controllers::{
    buttons::ButtonsController, connector::ConnectorController, container::ContainerController,
    details_panel::DetailsPanelController, group::GroupController, hotkeys::HotkeysController,
    keybindings::KeybindingsController, mode::ModeController, moving::MoveController,
    test_runner::TestRunner, time::TimeController, toolbox::ToolboxController,
    view::ViewController,
};
use crate::error::CoreError;
use crate::event::Event;
use crate::model::{GroupType, ToolboxKind};
use crate::workspace::Workspace;

/// Upper bound on handler invocations for one top-level dispatch.
pub const MAX_STEPS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr, EnumIter)]
pub enum Stage {
    Test,
    Mode,
    SiteToolbox,
    RackToolbox,
    InventoryToolbox,
    AppToolbox,
    Time,
    Buttons,
    Site,
    Rack,
    Group,
    Stream,
    Link,
    Move,
    DetailsPanel,
    View,
    Keybindings,
    Hotkeys,
}

/// Head-first order of the standard editor.
pub const DEFAULT_CHAIN: &[Stage] = &[
    Stage::Test,
    Stage::Mode,
    Stage::SiteToolbox,
    Stage::RackToolbox,
    Stage::InventoryToolbox,
    Stage::AppToolbox,
    Stage::Time,
    Stage::Buttons,
    Stage::Site,
    Stage::Rack,
    Stage::Group,
    Stage::Stream,
    Stage::Link,
    Stage::Move,
    Stage::DetailsPanel,
    Stage::View,
    Stage::Keybindings,
    Stage::Hotkeys,
];

impl Stage {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// A fresh controller for this stage, in its `Start` state.
    pub fn build(self) -> Box<dyn Controller> {
        match self {
            Self::Test => Box::new(TestRunner::new()),
            Self::Mode => Box::new(ModeController::new()),
            Self::SiteToolbox => Box::new(ToolboxController::new(ToolboxKind::Site)),
            Self::RackToolbox => Box::new(ToolboxController::new(ToolboxKind::Rack)),
            Self::InventoryToolbox => Box::new(ToolboxController::new(ToolboxKind::Inventory)),
            Self::AppToolbox => Box::new(ToolboxController::new(ToolboxKind::App)),
            Self::Time => Box::new(TimeController::new()),
            Self::Buttons => Box::new(ButtonsController::new()),
            Self::Site => Box::new(ContainerController::new(GroupType::Site)),
            Self::Rack => Box::new(ContainerController::new(GroupType::Rack)),
            Self::Group => Box::new(GroupController::new()),
            Self::Stream => Box::new(ConnectorController::stream()),
            Self::Link => Box::new(ConnectorController::link()),
            Self::Move => Box::new(MoveController::new()),
            Self::DetailsPanel => Box::new(DetailsPanelController::new()),
            Self::View => Box::new(ViewController::new()),
            Self::Keybindings => Box::new(KeybindingsController::new()),
            Self::Hotkeys => Box::new(HotkeysController::new()),
        }
    }
}

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Handled; stop here.
    Consumed,
    /// Not handled; pass it to the next stage unchanged.
    Forward,
    /// The handler changed state; handle the same event again here.
    Redispatch,
}

/// One stage of the chain.
pub trait Controller: Send + std::fmt::Debug {
    fn stage(&self) -> Stage;

    fn state_name(&self) -> &'static str;

    /// Back to `Start` without hooks, dropping any local progress.
    fn reset(&mut self);

    /// Leave `Start` for the stage's initial working state.
    fn start(&mut self, ws: &mut Workspace);

    fn handle(&mut self, ws: &mut Workspace, event: &Event) -> Result<Flow, CoreError>;
}

// ── Pipeline ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Box<dyn Controller>>,
}

impl Pipeline {
    pub fn new(chain: &[Stage]) -> Self {
        Self {
            stages: chain.iter().map(|s| s.build()).collect(),
        }
    }

    /// Append a host-supplied controller at the tail, ahead of the sink.
    pub fn push(&mut self, controller: Box<dyn Controller>) {
        self.stages.push(controller);
    }

    pub fn chain(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().map(|c| c.stage())
    }

    pub fn state_of(&self, stage: Stage) -> Option<&'static str> {
        self.stages
            .iter()
            .find(|c| c.stage() == stage)
            .map(|c| c.state_name())
    }

    /// Run every stage's start hook, then deliver what they raised.
    pub fn start_all(&mut self, ws: &mut Workspace) -> Result<(), CoreError> {
        ws.trace.set_message("Start");
        for c in &mut self.stages {
            c.start(ws);
        }
        let mut steps = 0;
        let result = self
            .after_handler(ws, &mut steps)
            .and_then(|()| self.drain_injected(ws, &mut steps));
        if result.is_err() {
            ws.queues.clear();
        }
        result
    }

    /// Feed one event from the head, then everything it injected.
    ///
    /// On error the queues are dropped; controller states stay wherever
    /// the failing handler left them.
    pub fn dispatch(&mut self, ws: &mut Workspace, event: &Event) -> Result<(), CoreError> {
        let mut steps = 0;
        let result = self
            .run_from_head(ws, event, &mut steps)
            .and_then(|()| self.drain_injected(ws, &mut steps));
        if result.is_err() {
            ws.queues.clear();
        }
        result
    }

    /// Deliver `event` straight to `stage`, as a directed event.
    pub fn dispatch_to(&mut self, ws: &mut Workspace, stage: Stage, event: &Event) -> Result<(), CoreError> {
        let mut steps = 0;
        let result = self
            .deliver(ws, stage, event, &mut steps)
            .and_then(|()| self.drain_injected(ws, &mut steps));
        if result.is_err() {
            ws.queues.clear();
        }
        result
    }

    fn drain_injected(&mut self, ws: &mut Workspace, steps: &mut usize) -> Result<(), CoreError> {
        while let Some(next) = ws.queues.pop_injected() {
            self.run_from_head(ws, &next, steps)?;
        }
        Ok(())
    }

    fn run_from_head(&mut self, ws: &mut Workspace, event: &Event, steps: &mut usize) -> Result<(), CoreError> {
        for index in 0..self.stages.len() {
            ws.trace.set_message(event.name());
            if self.handle_at(index, ws, event, steps)? == Flow::Consumed {
                return Ok(());
            }
        }
        trace!(event = event.name(), "unhandled event dropped");
        Ok(())
    }

    /// Run one stage, repeating while it asks for redispatch.
    fn handle_at(
        &mut self,
        index: usize,
        ws: &mut Workspace,
        event: &Event,
        steps: &mut usize,
    ) -> Result<Flow, CoreError> {
        loop {
            *steps += 1;
            if *steps > MAX_STEPS {
                return Err(CoreError::DispatchLoop {
                    steps: *steps,
                    event: event.name(),
                });
            }
            let flow = self.stages[index].handle(ws, event)?;
            self.after_handler(ws, steps)?;
            if flow != Flow::Redispatch {
                return Ok(flow);
            }
            ws.trace.set_message(event.name());
        }
    }

    /// Restart stages if asked, then hand out directed events.
    fn after_handler(&mut self, ws: &mut Workspace, steps: &mut usize) -> Result<(), CoreError> {
        if ws.queues.reset_stages {
            ws.queues.reset_stages = false;
            for c in self.stages.iter_mut().filter(|c| c.stage() != Stage::Test) {
                c.reset();
            }
            for c in self.stages.iter_mut().filter(|c| c.stage() != Stage::Test) {
                c.start(ws);
            }
        }
        while let Some((stage, event)) = ws.queues.pop_directed() {
            self.deliver(ws, stage, &event, steps)?;
        }
        Ok(())
    }

    fn deliver(&mut self, ws: &mut Workspace, stage: Stage, event: &Event, steps: &mut usize) -> Result<(), CoreError> {
        let Some(index) = self.stages.iter().position(|c| c.stage() == stage) else {
            warn!(stage = stage.name(), event = event.name(), "directed event for a stage not in the chain");
            return Ok(());
        };
        ws.trace.set_message(event.name());
        if self.handle_at(index, ws, event, steps)? == Flow::Forward {
            trace!(stage = stage.name(), event = event.name(), "directed event ignored");
        }
        Ok(())
    }
}
