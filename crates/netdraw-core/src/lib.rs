// netdraw-core: State-machine core of the collaborative topology editor (shared by CLI and hosts).

pub mod config;
pub mod controllers;
pub mod editor;
pub mod error;
pub mod event;
pub mod fsm;
pub mod geometry;
pub mod message;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod stream;
pub mod workspace;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{EditorConfig, SessionConfig, TlsVerification};
pub use editor::Editor;
pub use error::CoreError;
pub use event::{Event, Key, Wheel};
pub use fsm::{Fsm, FsmTrace, Machine, StateId, Transition};
pub use pipeline::{Controller, DEFAULT_CHAIN, Flow, Pipeline, Stage};
pub use session::{ConnectionState, Input, Session, SessionHandle};
pub use stream::DocumentStream;
pub use workspace::{Effect, Item, Workspace};

pub use message::{Envelope, Message, Modifiers, TestCase, TestOutcome, TestResult};
pub use model::{
    Device, DeviceType, Document, Group, GroupType, Link, Snapshot, Stream, Template, ToolboxKind,
};
