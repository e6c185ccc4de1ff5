use super::*;
use crate::game::ChannelMarker;
use crate::utils::test_utils::{
    create_test_session, reply_to, system_message, LoginScript, ScriptedConnector,
};
use std::sync::atomic::Ordering;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn ready_session(mode: Mode) -> (Arc<MinecraftSession>, Arc<ScriptedConnector>) {
    let connector = ScriptedConnector::new();
    let session = Arc::new(create_test_session(mode, connector.clone()));
    session.connect().await.unwrap();
    (session, connector)
}

#[tokio::test(start_paused = true)]
async fn connect_reaches_ready_and_reports_status() {
    let (session, _connector) = ready_session(Mode::Creative).await;

    let status = session.status().await;
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(status.mode, Mode::Creative);
    assert_eq!(status.host, "mc.test");
    assert_eq!(status.port, 25565);
    assert_eq!(status.username, "mcp-bot");
    assert_eq!(status.health, Some(20.0));
    assert_eq!(status.food, Some(18.0));
    assert_eq!(status.position, Some(Vec3::new(10.46, 64.0, -3.0)));
    assert!(status.recent_messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_while_disconnected_has_no_telemetry() {
    let session = create_test_session(Mode::Survival, ScriptedConnector::new());
    let status = session.status().await;

    assert_eq!(status.state, SessionState::Disconnected);
    assert_eq!(status.health, None);
    assert_eq!(status.position, None);
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["mode"], "survival");
    assert!(json["recentMessages"].as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn connect_from_ready_is_rejected() {
    let (session, connector) = ready_session(Mode::Creative).await;

    let err = session.connect().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidState {
            action: "connect",
            state: SessionState::Ready
        }
    );
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_when_disconnected_is_an_error() {
    let session = create_test_session(Mode::Creative, ScriptedConnector::new());
    assert_eq!(
        session.disconnect().await,
        Err(SessionError::AlreadyDisconnected)
    );
}

#[tokio::test(start_paused = true)]
async fn kick_during_login_fails_connect() {
    let connector = ScriptedConnector::with_script(vec![LoginScript::Kick("banned".into())]);
    let session = create_test_session(Mode::Creative, connector.clone());

    let err = session.connect().await.unwrap_err();
    assert_eq!(err, SessionError::KickedDuringLogin("banned".into()));
    assert_eq!(session.state().await, SessionState::Disconnected);
    assert!(connector.last_client().was_quit());
}

#[tokio::test(start_paused = true)]
async fn end_and_error_during_login_fail_connect() {
    let connector = ScriptedConnector::with_script(vec![
        LoginScript::End("socket closed".into()),
        LoginScript::Error("handshake failed".into()),
    ]);
    let session = create_test_session(Mode::Creative, connector);

    assert_eq!(
        session.connect().await,
        Err(SessionError::ConnectionEndedDuringLogin("socket closed".into()))
    );
    assert_eq!(
        session.connect().await,
        Err(SessionError::Protocol("handshake failed".into()))
    );
    assert_eq!(session.state().await, SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn refused_open_surfaces_protocol_error() {
    let connector =
        ScriptedConnector::with_script(vec![LoginScript::Refuse("connection refused".into())]);
    let session = create_test_session(Mode::Creative, connector);

    assert_eq!(
        session.connect().await,
        Err(SessionError::Protocol("connection refused".into()))
    );
    assert_eq!(session.state().await, SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn silent_login_times_out_after_thirty_seconds() {
    let connector = ScriptedConnector::with_script(vec![LoginScript::Silent]);
    let session = create_test_session(Mode::Creative, connector.clone());

    let started = tokio::time::Instant::now();
    let err = session.connect().await.unwrap_err();

    assert_eq!(err, SessionError::SpawnTimeout(SPAWN_TIMEOUT));
    assert!(started.elapsed() >= SPAWN_TIMEOUT);
    assert_eq!(session.state().await, SessionState::Disconnected);
    assert!(connector.last_client().was_quit());

    // the session is reusable afterwards
    session.connect().await.unwrap();
    assert_eq!(session.state().await, SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn messages_before_spawn_are_not_buffered() {
    let connector = ScriptedConnector::with_script(vec![LoginScript::Silent]);
    let session = Arc::new(create_test_session(Mode::Creative, connector.clone()));

    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect().await }
    });
    settle().await;
    assert_eq!(session.state().await, SessionState::Connecting);

    let client = connector.last_client();
    client.emit(system_message("Welcome to the server"));
    client.emit(GameEvent::Spawn);

    connecting.await.unwrap().unwrap();
    settle().await;
    assert!(session.status().await.recent_messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_connecting_aborts_login() {
    let connector = ScriptedConnector::with_script(vec![LoginScript::Silent]);
    let session = Arc::new(create_test_session(Mode::Creative, connector.clone()));

    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect().await }
    });
    settle().await;

    session.disconnect().await.unwrap();
    let outcome = connecting.await.unwrap();

    assert_eq!(
        outcome,
        Err(SessionError::ConnectionEndedDuringLogin(
            "disconnected by request".into()
        ))
    );
    assert_eq!(session.state().await, SessionState::Disconnected);
    assert!(connector.last_client().was_quit());
}

#[tokio::test(start_paused = true)]
async fn gamemode_command_round_trip_is_success() {
    let connector = ScriptedConnector::new();
    connector.set_responder(reply_to(
        "/gamemode creative",
        "Your game mode has been updated to Creative Mode",
    ));
    let session = create_test_session(Mode::Creative, connector.clone());
    session.connect().await.unwrap();

    let result = session.execute_command("gamemode creative").await.unwrap();

    assert_eq!(result.command, "/gamemode creative");
    assert_eq!(result.category, CommandCategory::Success);
    assert!(result.executed);
    assert!(!result.timed_out);
    assert_eq!(
        result.matched_response.as_deref(),
        Some("Your game mode has been updated to Creative Mode")
    );
    assert_eq!(connector.last_client().sent_lines(), vec!["/gamemode creative"]);
    assert_eq!(session.pending_waiters().await, 0);
}

#[tokio::test(start_paused = true)]
async fn permission_feedback_is_classified() {
    let connector = ScriptedConnector::new();
    connector.set_responder(reply_to(
        "/op mcp-bot",
        "I'm sorry, but you do not have permission to perform this command.",
    ));
    let session = create_test_session(Mode::Creative, connector);
    session.connect().await.unwrap();

    let result = session.execute_command("/op mcp-bot").await.unwrap();
    assert_eq!(result.category, CommandCategory::PermissionDenied);
    assert!(!result.executed);
}

#[tokio::test(start_paused = true)]
async fn silent_server_times_out_command() {
    let (session, _connector) = ready_session(Mode::Creative).await;

    let started = tokio::time::Instant::now();
    let result = session.execute_command("/save-all").await.unwrap();

    assert!(result.timed_out);
    assert_eq!(result.category, CommandCategory::Timeout);
    assert!(started.elapsed() >= COMMAND_TIMEOUT);
    assert_eq!(session.pending_waiters().await, 0);
}

#[tokio::test(start_paused = true)]
async fn player_chat_does_not_answer_commands() {
    let connector = ScriptedConnector::new();
    connector.set_responder(Arc::new(|_text: &str| {
        vec![GameEvent::Chat {
            sender: "Steve".into(),
            text: "teleported lol".into(),
        }]
    }));
    let session = create_test_session(Mode::Creative, connector);
    session.connect().await.unwrap();

    let result = session.execute_command("/tp 0 64 0").await.unwrap();
    assert!(result.timed_out);

    let recent = session.status().await.recent_messages;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].sender, "Steve");
}

#[tokio::test(start_paused = true)]
async fn command_requires_ready_and_non_empty_text() {
    let session = create_test_session(Mode::Creative, ScriptedConnector::new());
    assert_eq!(
        session.execute_command("/time set day").await,
        Err(SessionError::NotReady(SessionState::Disconnected))
    );

    session.connect().await.unwrap();
    assert_eq!(
        session.execute_command("   ").await,
        Err(SessionError::EmptyCommand)
    );
}

#[tokio::test(start_paused = true)]
async fn kick_after_spawn_releases_waiters_and_tears_down() {
    let (session, connector) = ready_session(Mode::Creative).await;

    let started = tokio::time::Instant::now();
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.execute_command("/weather clear").await }
    });
    settle().await;
    assert_eq!(session.pending_waiters().await, 1);

    connector.last_client().emit(GameEvent::Kicked("Server closed".into()));
    let result = pending.await.unwrap().unwrap();

    assert!(result.timed_out);
    assert!(started.elapsed() < COMMAND_TIMEOUT);
    let status = session.status().await;
    assert_eq!(status.state, SessionState::Disconnected);
    assert_eq!(
        status.recent_messages.last().map(|entry| entry.text.as_str()),
        Some("[Kicked] Server closed")
    );
}

#[tokio::test(start_paused = true)]
async fn end_tears_down_but_error_does_not() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let client = connector.last_client();

    client.emit(GameEvent::Error("bad packet".into()));
    settle().await;
    assert_eq!(session.state().await, SessionState::Ready);

    client.emit(GameEvent::End("socketClosed".into()));
    settle().await;
    let status = session.status().await;
    assert_eq!(status.state, SessionState::Disconnected);
    let texts: Vec<_> = status
        .recent_messages
        .iter()
        .map(|entry| entry.text.as_str())
        .collect();
    assert_eq!(texts, vec!["[Error] bad packet", "[Disconnected] socketClosed"]);
}

#[tokio::test(start_paused = true)]
async fn reconnect_runs_a_fresh_cycle() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let first = connector.last_client();
    first.emit(system_message("Saved the game"));
    settle().await;
    assert_eq!(session.status().await.recent_messages.len(), 1);

    session.reconnect().await.unwrap();

    assert!(first.was_quit());
    assert_eq!(connector.open_count(), 2);
    assert_eq!(session.state().await, SessionState::Ready);
    assert!(session.status().await.recent_messages.is_empty());

    // events from the old connection are ignored
    first.emit(GameEvent::Kicked("late".into()));
    settle().await;
    assert_eq!(session.state().await, SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn reconnect_from_disconnected_just_connects() {
    let connector = ScriptedConnector::new();
    let session = create_test_session(Mode::Creative, connector.clone());

    session.reconnect().await.unwrap();
    assert_eq!(connector.open_count(), 1);
    assert_eq!(session.state().await, SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn message_classification_feeds_waiters() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let patterns = Arc::new(PatternSet::case_insensitive(&["^done"]).unwrap());

    let waiting = tokio::spawn({
        let session = session.clone();
        let patterns = patterns.clone();
        async move {
            session
                .await_message(patterns, Duration::from_secs(2), true)
                .await
        }
    });
    settle().await;

    let client = connector.last_client();
    // player-position marker keeps this out of a system-only waiter
    client.emit(GameEvent::Message {
        text: "done?".into(),
        marker: Some(ChannelMarker::Legacy(0)),
        sender: None,
    });
    client.emit(GameEvent::Message {
        text: "Done.".into(),
        marker: Some(ChannelMarker::Legacy(1)),
        sender: None,
    });

    let entry = waiting.await.unwrap().unwrap();
    assert_eq!(entry.text, "Done.");
    assert_eq!(session.status().await.recent_messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn buffer_keeps_latest_fifty_messages() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let client = connector.last_client();
    for i in 1..=55 {
        client.emit(GameEvent::Chat {
            sender: "Alex".into(),
            text: format!("line {i}"),
        });
    }
    settle().await;

    let recent = session.status().await.recent_messages;
    assert_eq!(recent.len(), MAX_CHAT_BUFFER);
    assert_eq!(recent[0].text, "line 6");
    assert_eq!(recent[49].text, "line 55");
}

#[tokio::test(start_paused = true)]
async fn position_is_rounded() {
    let (session, _connector) = ready_session(Mode::Creative).await;

    let readout = session.position().await.unwrap();
    assert_eq!(
        readout,
        PositionReadout {
            x: 10.46,
            y: 64.0,
            z: -3.0,
            yaw: 1.23,
            pitch: -0.5,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn replacing_a_timed_control_keeps_only_the_newest_timer() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let client = connector.last_client();

    session
        .set_control(ControlDirection::Jump, true, Some(Duration::from_millis(100)))
        .await
        .unwrap();
    session
        .set_control(ControlDirection::Jump, true, Some(Duration::from_millis(50)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        client.control_log(),
        vec![
            (ControlDirection::Jump, true),
            (ControlDirection::Jump, true),
            (ControlDirection::Jump, false),
        ]
    );
    assert!(!session.control_pending(ControlDirection::Jump).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.control_log().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn untimed_control_stays_active() {
    let (session, connector) = ready_session(Mode::Creative).await;

    session
        .set_control(ControlDirection::Sneak, true, None)
        .await
        .unwrap();
    session
        .set_control(ControlDirection::Sprint, true, Some(Duration::ZERO))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(
        connector.last_client().control_log(),
        vec![
            (ControlDirection::Sneak, true),
            (ControlDirection::Sprint, true)
        ]
    );
    assert_eq!(session.pending_controls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_all_controls_cancels_timers() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let client = connector.last_client();

    session
        .set_control(ControlDirection::Forward, true, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    session
        .set_control(ControlDirection::Left, true, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    session.stop_all_controls().await.unwrap();

    assert_eq!(client.clear_count.load(Ordering::SeqCst), 1);
    assert_eq!(session.pending_controls().await, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(client.control_log().iter().all(|(_, active)| *active));
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_control_timers() {
    let (session, connector) = ready_session(Mode::Creative).await;
    let client = connector.last_client();

    session
        .set_control(ControlDirection::Back, true, Some(Duration::from_millis(500)))
        .await
        .unwrap();
    session.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(client.control_log(), vec![(ControlDirection::Back, true)]);
    assert_eq!(session.pending_controls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn controls_require_ready() {
    let session = create_test_session(Mode::Creative, ScriptedConnector::new());
    assert_eq!(
        session
            .set_control(ControlDirection::Jump, true, None)
            .await,
        Err(SessionError::NotReady(SessionState::Disconnected))
    );
    assert_eq!(
        session.stop_all_controls().await,
        Err(SessionError::NotReady(SessionState::Disconnected))
    );
}
