#![allow(clippy::unwrap_used)]

// The session loop over in-process sockets.

use std::time::Duration;

use netdraw_api::{SocketEvent, TopologySocket};
use netdraw_core::{ConnectionState, DeviceType, Editor, EditorConfig, Event, Input, Modifiers, Session};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Wire {
    events: mpsc::Sender<SocketEvent>,
    outbound: mpsc::Receiver<String>,
}

fn socket(cancel: &CancellationToken) -> (TopologySocket, Wire) {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (out_tx, out_rx) = mpsc::channel(64);
    (
        TopologySocket::from_channels(event_rx, out_tx, cancel.child_token()),
        Wire {
            events: event_tx,
            outbound: out_rx,
        },
    )
}

async fn next_frame(wire: &mut Wire, prefix: &str) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), wire.outbound.recv())
            .await
            .expect("no frame within 5s")
            .expect("outbound closed");
        if frame.starts_with(prefix) {
            return frame;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn frames_flow_both_ways_and_the_document_is_published() {
    let cancel = CancellationToken::new();
    let (topology, mut wire) = socket(&cancel);
    let editor = Editor::new(EditorConfig::default()).unwrap();
    let handle = Session::attach(editor, topology, None, cancel.clone());
    let mut state = handle.connection_state();
    let mut docs = handle.document();

    wire.events.send(SocketEvent::Connected).await.unwrap();
    state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();

    wire.events.send(SocketEvent::Frame(r#"["id", 4]"#.into())).await.unwrap();
    wire.events
        .send(SocketEvent::Frame(
            r#"["DeviceCreate", {"sender": 9, "id": 1, "name": "Router1", "x": 300, "y": 300, "type": "router"}]"#
                .into(),
        ))
        .await
        .unwrap();
    let doc = loop {
        let doc = docs.changed().await.unwrap();
        if !doc.devices.is_empty() {
            break doc;
        }
    };
    assert_eq!(doc.devices[0].name, "Router1");

    handle
        .input(Input::MouseMove {
            x: 500.0,
            y: 300.0,
            modifiers: Modifiers::default(),
        })
        .await
        .unwrap();
    handle.send(Event::NewDevice(DeviceType::Switch)).await.unwrap();
    let frame = next_frame(&mut wire, r#"["DeviceCreate""#).await;
    assert!(frame.contains(r#""sender":4"#));
    assert!(frame.contains(r#""name":"Switch2""#));

    let editor = handle.shutdown().await.unwrap();
    assert_eq!(editor.workspace().doc.devices().count(), 2);
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn edits_while_reconnecting_wait_for_the_next_client_id() {
    let cancel = CancellationToken::new();
    let (topology, mut wire) = socket(&cancel);
    let handle = Session::attach(Editor::new(EditorConfig::default()).unwrap(), topology, None, cancel.clone());
    let mut state = handle.connection_state();

    wire.events.send(SocketEvent::Connected).await.unwrap();
    wire.events.send(SocketEvent::Frame(r#"["id", 1]"#.into())).await.unwrap();
    wire.events.send(SocketEvent::Disconnected).await.unwrap();
    state
        .wait_for(|s| *s == ConnectionState::Reconnecting { attempt: 1 })
        .await
        .unwrap();

    handle
        .input(Input::MouseMove {
            x: 500.0,
            y: 300.0,
            modifiers: Modifiers::default(),
        })
        .await
        .unwrap();
    handle.send(Event::NewDevice(DeviceType::Router)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(wire.outbound.try_recv().is_err());

    wire.events.send(SocketEvent::Connected).await.unwrap();
    wire.events.send(SocketEvent::Frame(r#"["id", 2]"#.into())).await.unwrap();
    let frame = next_frame(&mut wire, r#"["DeviceCreate""#).await;
    assert!(frame.contains(r#""sender":2"#));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_surfaced() {
    let cancel = CancellationToken::new();
    let (topology, wire) = socket(&cancel);
    let handle = Session::attach(Editor::new(EditorConfig::default()).unwrap(), topology, None, cancel.clone());
    let mut docs = handle.document();

    wire.events
        .send(SocketEvent::Frame(r#"["Error", "inventory not found"]"#.into()))
        .await
        .unwrap();
    docs.changed().await.unwrap();
    let err = handle.last_error().unwrap();
    assert!(err.contains("inventory not found"), "{err}");

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn socket_loss_ends_the_session_as_failed() {
    let cancel = CancellationToken::new();
    let (topology, wire) = socket(&cancel);
    let handle = Session::attach(Editor::new(EditorConfig::default()).unwrap(), topology, None, cancel.clone());
    let mut state = handle.connection_state();

    drop(wire);
    state.wait_for(|s| *s == ConnectionState::Failed).await.unwrap();
    handle.shutdown().await.unwrap();
    assert_eq!(*state.borrow(), ConnectionState::Failed);
}
