mod common;

use std::sync::Arc;

use common::{drain, frames_named, join_user, test_state};

#[tokio::test]
async fn joining_notifies_the_room_and_the_lobby() {
    let state = test_state();
    let mut ana = join_user(&state, "c1", "ana").await;
    drain(&mut ana);

    let mut bob = join_user(&state, "c2", "bob").await;

    let joined = frames_named(&mut ana, "user-joined");
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0]["data"]["username"], "bob");
    assert_eq!(joined[0]["data"]["activeUsers"].as_array().unwrap().len(), 2);

    let success = frames_named(&mut bob, "join-success");
    assert_eq!(success.len(), 1);
    assert_eq!(success[0]["data"]["roomId"], "general");
    assert_eq!(success[0]["data"]["rooms"][0]["userCount"], 2);
}

#[tokio::test]
async fn messages_fan_out_with_read_counts() {
    let state = test_state();
    let mut ana = join_user(&state, "c1", "ana").await;
    let mut bob = join_user(&state, "c2", "bob").await;
    drain(&mut ana);
    drain(&mut bob);

    let events = state
        .chat
        .lock()
        .await
        .chat_message(&Arc::from("c1"), "hello".into(), vec![]);
    state.deliver(events).await;

    // Author and room-mate both see the message, read only by the author.
    let to_ana = frames_named(&mut ana, "new-message");
    let to_bob = frames_named(&mut bob, "new-message");
    assert_eq!(to_ana.len(), 1);
    assert_eq!(to_bob.len(), 1);
    assert_eq!(to_bob[0]["data"]["body"], "hello");
    assert_eq!(to_bob[0]["data"]["readCount"], 1);
    let message_id = to_bob[0]["data"]["id"].as_str().unwrap().to_string();

    let events = state
        .chat
        .lock()
        .await
        .mark_read(&Arc::from("c2"), vec![message_id]);
    state.deliver(events).await;

    let receipts = frames_named(&mut ana, "read-receipts-updated");
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["data"][0]["readCount"], 2);
    assert_eq!(
        receipts[0]["data"][0]["readBy"],
        serde_json::json!(["ana", "bob"])
    );
    assert_eq!(frames_named(&mut bob, "read-receipts-updated").len(), 1);
}

#[tokio::test]
async fn switching_rooms_moves_frames_with_the_user() {
    let state = test_state();
    let mut ana = join_user(&state, "c1", "ana").await;
    let mut bob = join_user(&state, "c2", "bob").await;
    drain(&mut ana);
    drain(&mut bob);

    let team = {
        let mut chat = state.chat.lock().await;
        let (team, events) = chat.create_room("Team", "", None, "ana").unwrap();
        let switch = chat.switch_room(&Arc::from("c1"), team.clone());
        drop(chat);
        state.deliver(events).await;
        state.deliver(switch).await;
        team
    };

    // Bob stays behind and sees the departure.
    let left = frames_named(&mut bob, "user-left");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0]["data"]["username"], "ana");
    assert_eq!(left[0]["data"]["activeUsers"].as_array().unwrap().len(), 1);

    let switched = frames_named(&mut ana, "room-switched");
    assert_eq!(switched.len(), 1);
    assert_eq!(switched[0]["data"]["roomId"], team.as_ref());

    // Room chatter no longer crosses over.
    let events = state
        .chat
        .lock()
        .await
        .chat_message(&Arc::from("c1"), "team only".into(), vec![]);
    state.deliver(events).await;

    assert_eq!(frames_named(&mut ana, "new-message").len(), 1);
    assert!(frames_named(&mut bob, "new-message").is_empty());
}

#[tokio::test]
async fn typing_indicators_skip_the_typist() {
    let state = test_state();
    let mut ana = join_user(&state, "c1", "ana").await;
    let mut bob = join_user(&state, "c2", "bob").await;
    drain(&mut ana);
    drain(&mut bob);

    let events = state.chat.lock().await.set_typing(&Arc::from("c1"), true);
    state.deliver(events).await;

    let updates = frames_named(&mut bob, "user-typing-update");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["data"]["username"], "ana");
    assert_eq!(updates[0]["data"]["isTyping"], true);
    assert!(frames_named(&mut ana, "user-typing-update").is_empty());
}

#[tokio::test]
async fn disconnect_announces_the_departure() {
    let state = test_state();
    let mut ana = join_user(&state, "c1", "ana").await;
    let _bob = join_user(&state, "c2", "bob").await;
    drain(&mut ana);

    state.unregister_connection("c2").await;
    let events = state.chat.lock().await.remove_connection(&Arc::from("c2"));
    state.deliver(events).await;

    let left = frames_named(&mut ana, "user-left");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0]["data"]["username"], "bob");
    assert_eq!(left[0]["data"]["activeUsers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reconnection_with_the_same_session_takes_over_delivery() {
    let state = test_state();
    let mut old = join_user(&state, "c1", "ana").await;
    let token = frames_named(&mut old, "join-success")[0]["data"]["sessionId"]
        .as_str()
        .unwrap()
        .to_string();

    // Same session, new connection.
    let (tx, mut fresh) = tokio::sync::mpsc::unbounded_channel();
    state.register_connection(Arc::from("c2"), tx).await;
    let events = state.chat.lock().await.join(
        &Arc::from("c2"),
        roomcast::events::JoinRequest {
            username: "ana".into(),
            session_token: Some(token.parse().unwrap()),
            room_id: None,
        },
    );
    state.deliver(events).await;

    let success = frames_named(&mut fresh, "join-success");
    assert_eq!(success.len(), 1);
    assert_eq!(success[0]["data"]["sessionId"], token);

    // A message now reaches the fresh connection, not the stale one.
    drain(&mut old);
    drain(&mut fresh);
    let events = state
        .chat
        .lock()
        .await
        .chat_message(&Arc::from("c2"), "back".into(), vec![]);
    state.deliver(events).await;

    assert_eq!(frames_named(&mut fresh, "new-message").len(), 1);
    assert!(frames_named(&mut old, "new-message").is_empty());
}
