mod helpers;

use arena_ledger::models::*;
use arena_ledger::AppError;
use chrono::{Local, NaiveDate};
use helpers::*;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
async fn test_account_created_on_first_touch() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    assert_eq!(app.balance(user).await, 0);
    assert!(app.state.ledger.history(user, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_credit_and_debit() {
    let app = TestApp::new();
    let user = Uuid::new_v4();

    let account = assert_ok!(app.state.ledger.credit(user, 300, "welcome bonus").await);
    assert_eq!(account.balance, 300);
    let account = assert_ok!(app.state.ledger.debit(user, 120, "shop purchase").await);
    assert_eq!(account.balance, 180);

    let history = app.state.ledger.history(user, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, -120);
    assert!(!history[0].is_credit());
    assert_eq!(history[1].description, "welcome bonus");

    assert_eq!(app.state.ledger.history(user, 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_debit_never_goes_negative() {
    let app = TestApp::new();
    let user = app.funded_user(100).await;

    let err = assert_err!(app.state.ledger.debit(user, 101, "too much").await);
    assert!(matches!(err, AppError::InsufficientFunds { available: 100, required: 101 }));
    assert_eq!(err.status_code(), 402);
    assert_eq!(app.balance(user).await, 100);

    assert_ok!(app.state.ledger.debit(user, 100, "everything").await);
    assert_eq!(app.balance(user).await, 0);
}

#[tokio::test]
async fn test_amounts_must_be_positive() {
    let app = TestApp::new();
    let user = app.funded_user(100).await;

    for amount in [0, -5] {
        assert!(matches!(
            app.state.ledger.credit(user, amount, "bad").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            app.state.ledger.debit(user, amount, "bad").await,
            Err(AppError::Validation(_))
        ));
    }
    assert_eq!(app.balance(user).await, 100);
}

#[tokio::test]
async fn test_credit_overflow_is_rejected() {
    let app = TestApp::new();
    let user = app.funded_user(10).await;

    let err = assert_err!(app.state.ledger.credit(user, i64::MAX, "huge").await);
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.status_code(), 400);
    assert_eq!(app.balance(user).await, 10);
    assert_eq!(app.state.ledger.history(user, 10).await.unwrap().len(), 1);

    // the largest credit that still fits is accepted
    assert_ok!(app.state.ledger.credit(user, i64::MAX - 10, "fits").await);
    assert_eq!(app.balance(user).await, i64::MAX);
}

#[tokio::test]
async fn test_keyed_postings_apply_once() {
    let app = TestApp::new();
    let user = app.funded_user(100).await;

    let first = app.state.ledger.credit_once(user, 50, "refund", "refund:1").await.unwrap();
    assert!(first.is_applied());
    let second = app.state.ledger.credit_once(user, 50, "refund", "refund:1").await.unwrap();
    assert!(matches!(second, PostingOutcome::Duplicate(ref a) if a.balance == 150));

    let debit = app.state.ledger.debit_once(user, 30, "stake", "stake:1").await.unwrap();
    assert_eq!(debit.account().balance, 120);
    let repeat = app.state.ledger.debit_once(user, 30, "stake", "stake:1").await.unwrap();
    assert!(!repeat.is_applied());
    assert_eq!(app.balance(user).await, 120);
}

// ============================================================================
// Rewards
// ============================================================================

#[tokio::test]
async fn test_daily_reward_granted_once_per_day() {
    let app = TestApp::new();
    let user = Uuid::new_v4();

    let first = app.state.rewards.grant(user, "dailyquiz", "participation").await.unwrap();
    assert_eq!(first, GrantOutcome::Granted(50));
    let second = app.state.rewards.grant(user, "dailyquiz", "participation").await.unwrap();
    assert_eq!(second, GrantOutcome::AlreadyGranted);
    assert_eq!(app.balance(user).await, 50);

    let history = app.state.ledger.history(user, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "dailyquiz | participation");
}

#[tokio::test]
async fn test_reward_granted_again_next_day() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let tuesday = monday.succ_opt().unwrap();
    let rewards = &app.state.rewards;

    assert_eq!(
        rewards.grant_on(user, "dailyquiz", "participation", monday).await.unwrap(),
        GrantOutcome::Granted(50)
    );
    assert_eq!(
        rewards.grant_on(user, "dailyquiz", "participation", monday).await.unwrap(),
        GrantOutcome::AlreadyGranted
    );
    assert_eq!(
        rewards.grant_on(user, "dailyquiz", "participation", tuesday).await.unwrap(),
        GrantOutcome::Granted(50)
    );
    assert_eq!(app.balance(user).await, 100);

    // different reward types on the same day are independent
    assert_eq!(
        rewards.grant_on(user, "dailyquiz", "weekly_winner", monday).await.unwrap(),
        GrantOutcome::Granted(250)
    );
}

#[tokio::test]
async fn test_unknown_reward_is_noop() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let today = Local::now().date_naive();

    let outcome = app.state.rewards.grant_on(user, "cards", "participation", today).await.unwrap();
    assert_eq!(outcome, GrantOutcome::UnknownReward);
    assert_eq!(app.balance(user).await, 0);
}

#[tokio::test]
async fn test_concurrent_same_day_grants_credit_once() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let rewards = &app.state.rewards;

    let (a, b) = tokio::join!(
        rewards.grant(user, "dailyquiz", "participation"),
        rewards.grant(user, "dailyquiz", "participation"),
    );
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, GrantOutcome::Granted(_)));
    assert_eq!(outcomes, vec![GrantOutcome::AlreadyGranted, GrantOutcome::Granted(50)]);

    assert_eq!(app.balance(user).await, 50);
    assert_eq!(app.state.ledger.history(user, 10).await.unwrap().len(), 1);
}
