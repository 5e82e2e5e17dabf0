// ── Recording ──
//
// While recording, normalized input and every FSM transition stream to
// the test channel, bracketed by a pre and a post snapshot. A recording
// is exactly what the test runner later replays.

use tracing::info;

use super::Workspace;
use crate::message::{FsmTraceRecord, Message, RecordingMarker, ViewPort};
use crate::model::{Snapshot, Template};

impl Workspace {
    /// Start or stop a recording.
    pub fn toggle_recording(&mut self) {
        self.flags.recording = !self.flags.recording;
        if self.flags.recording {
            let trace_id = self.next_trace_id();
            self.trace.set_streaming(true);
            let view = ViewPort {
                scale: self.view.scale,
                pan_x: self.view.pan_x,
                pan_y: self.view.pan_y,
                graph_width: self.view.graph_width,
                graph_height: self.view.graph_height,
                trace_id,
            };
            let pre = self.recording_snapshot(0);
            self.send_test_message(Message::batch(vec![
                Message::StartRecording(RecordingMarker { trace_id }),
                Message::ViewPort(view),
                Message::Snapshot(pre),
            ]));
            info!(trace_id, "recording started");
        } else {
            let post = self.recording_snapshot(1);
            self.send_test_message(Message::batch(vec![
                Message::Snapshot(post),
                Message::StopRecording(RecordingMarker {
                    trace_id: self.trace_id,
                }),
            ]));
            self.trace.set_streaming(false);
            info!(trace_id = self.trace_id, "recording stopped");
        }
    }

    fn recording_snapshot(&self, order: u64) -> Snapshot {
        let mut snapshot = self.doc.to_snapshot();
        snapshot.inventory_toolbox = Some(
            self.toolboxes
                .inventory
                .items
                .iter()
                .filter_map(|t| match t {
                    Template::Device(d) => Some(d.clone()),
                    _ => None,
                })
                .collect(),
        );
        snapshot.order = Some(order);
        snapshot.trace_id = Some(self.trace_id);
        snapshot
    }

    /// Send a normalized input message when recording.
    pub fn record_input(&mut self, message: Message) {
        if self.flags.recording {
            self.send_test_message(message);
        }
    }

    /// Emit transitions recorded since the last call as `FSMTrace`.
    pub fn stream_transitions(&mut self) {
        let trace_id = self.trace_id;
        for t in self.trace.take_unsent() {
            self.send_test_message(Message::FsmTrace(FsmTraceRecord {
                order: t.order,
                fsm_name: t.fsm.to_owned(),
                from_state: t.from.to_owned(),
                to_state: t.to.to_owned(),
                recv_message_type: t.message.to_owned(),
                trace_id,
            }));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::message::{MouseEvent, MouseKind};
    use pretty_assertions::assert_eq;

    fn names(m: &Message) -> Vec<&'static str> {
        let Message::MultipleMessage(batch) = m else {
            panic!("expected a batch");
        };
        batch.messages.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn recording_is_bracketed_by_snapshots() {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.toggle_recording();
        assert!(ws.flags.recording);
        ws.record_input(Message::MouseEvent(MouseEvent {
            x: 1.0,
            y: 2.0,
            kind: MouseKind::MouseMove,
            trace_id: ws.trace_id,
        }));
        ws.toggle_recording();
        ws.record_input(Message::StartReplay);

        let sent = ws.outbox.take_test();
        assert_eq!(sent.len(), 3);
        assert_eq!(names(&sent[0].message), vec!["StartRecording", "ViewPort", "Snapshot"]);
        assert_eq!(sent[1].name(), "MouseEvent");
        assert_eq!(names(&sent[2].message), vec!["Snapshot", "StopRecording"]);
    }

    #[test]
    fn transitions_stream_only_while_recording() {
        let mut ws = Workspace::new(EditorConfig::default());
        ws.trace.record("move_fsm", "Ready", "Selected1", true);
        ws.stream_transitions();
        assert!(ws.outbox.test.is_empty());

        ws.toggle_recording();
        ws.outbox.take_test();
        ws.trace.set_message("MouseDown");
        ws.trace.record("move_fsm", "Ready", "Selected1", true);
        ws.stream_transitions();
        let sent = ws.outbox.take_test();
        let Message::FsmTrace(t) = &sent[0].message else {
            panic!("expected a trace record");
        };
        assert_eq!(t.recv_message_type, "MouseDown");
        assert_eq!(t.trace_id, 1);
    }
}
