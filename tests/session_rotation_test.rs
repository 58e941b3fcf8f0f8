mod common;

use common::Harness;
use slotpay::error::{AuthFailure, EngineError};

#[tokio::test]
async fn test_stolen_token_replay_revokes_family() {
    let harness = Harness::new().await;
    let user = harness.add_user("ravi").await;
    let sessions = &harness.engine.sessions;

    let first = sessions.issue_session(user.id).await.unwrap();
    let second = sessions.rotate(&first.refresh_token).await.unwrap();

    // An attacker replays the spent token.
    let replay = sessions.rotate(&first.refresh_token).await;
    assert!(matches!(
        replay,
        Err(EngineError::Auth(AuthFailure::ReuseDetected))
    ));

    // The legitimate holder's fresh token died with the family.
    let legit = sessions.rotate(&second.refresh_token).await;
    assert!(matches!(
        legit,
        Err(EngineError::Auth(AuthFailure::ReuseDetected))
    ));

    // A new login still works.
    let again = sessions.issue_session(user.id).await.unwrap();
    assert!(sessions.rotate(&again.refresh_token).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_single_winner() {
    let harness = Harness::new().await;
    let user = harness.add_user("ravi").await;
    let tokens = harness.engine.sessions.issue_session(user.id).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = harness.engine.clone();
        let token = tokens.refresh_token.clone();
        handles.push(tokio::spawn(
            async move { engine.sessions.rotate(&token).await },
        ));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(EngineError::Auth(AuthFailure::ReuseDetected)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_unknown_token() {
    let harness = Harness::new().await;
    assert!(matches!(
        harness.engine.sessions.rotate("not-a-token").await,
        Err(EngineError::Auth(AuthFailure::InvalidToken))
    ));
}

#[tokio::test]
async fn test_access_token_round_trip() {
    let harness = Harness::new().await;
    let user = harness.add_user("ravi").await;
    let sessions = &harness.engine.sessions;

    let tokens = sessions.issue_session(user.id).await.unwrap();
    let claims = sessions.verify_access(&tokens.access_token).unwrap();
    assert_eq!(claims.sub, user.id);
    assert!(sessions.verify_access(&tokens.refresh_token).is_err());
}
