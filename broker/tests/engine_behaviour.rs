//! End-to-end behaviour tests for the engines over the in-memory store.
//!
//! These exercise the full service surface the conversational collaborator
//! sees (claims, submissions, approvals, withdrawals, enrollment) with
//! every port backed by `InMemoryBroker`, whose single lock mirrors the
//! per-operation transactions of the Diesel adapters.

use std::collections::HashSet;
use std::sync::Arc;

use broker::domain::ports::ClaimOutcome;
use broker::domain::{
    AllocationService, Amount, ApprovalService, Enrollment, ErrorCode, ItemDraft, LedgerService,
    NotificationEvent, PaymentInfo, SettingsService, UserId, WithdrawalOutcome, WithdrawalService,
    WithdrawalStatus,
};
use broker::test_support::{InMemoryBroker, cents};

struct Harness {
    store: Arc<InMemoryBroker>,
    allocation: AllocationService<InMemoryBroker>,
    approval:
        ApprovalService<InMemoryBroker, InMemoryBroker, InMemoryBroker, InMemoryBroker>,
    withdrawal: WithdrawalService<InMemoryBroker>,
    ledger: LedgerService<InMemoryBroker, InMemoryBroker>,
    settings: SettingsService<InMemoryBroker>,
}

fn harness() -> Harness {
    // Subscriber install fails after the first test in the binary; that is
    // fine, one is enough.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let store = Arc::new(InMemoryBroker::new());
    Harness {
        allocation: AllocationService::new(Arc::clone(&store)),
        approval: ApprovalService::new(
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&store),
        ),
        withdrawal: WithdrawalService::new(Arc::clone(&store)),
        ledger: LedgerService::new(Arc::clone(&store), Arc::clone(&store)),
        settings: SettingsService::new(Arc::clone(&store)),
        store,
    }
}

fn drafts(count: usize) -> Vec<ItemDraft> {
    (0..count)
        .map(|n| ItemDraft::new(format!("account-{n}@example.com"), format!("secret-{n}")))
        .collect()
}

async fn enroll(h: &Harness, user: i64) {
    h.ledger
        .enroll(Enrollment::new(UserId(user), format!("user-{user}")))
        .await
        .expect("enrollment succeeds");
}

/// Claim, submit, and approve one item for the user, leaving the price on
/// their available balance.
async fn earn_available(h: &Harness, user: i64) -> Amount {
    let outcome = h
        .allocation
        .claim(UserId(user))
        .await
        .expect("claim succeeds");
    let ClaimOutcome::Claimed(item) = outcome else {
        panic!("expected a fresh claim, got {outcome:?}");
    };
    let record = h
        .allocation
        .submit(UserId(user))
        .await
        .expect("submit succeeds");
    h.approval
        .approve_item(item.id)
        .await
        .expect("approve succeeds");
    record.price
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_double_allocate() {
    let h = harness();
    let items: usize = 5;
    let users: i64 = 8;
    h.allocation
        .stock(&drafts(items))
        .await
        .expect("stock succeeds");

    let mut tasks = Vec::new();
    for user in 1..=users {
        let allocation = h.allocation.clone();
        tasks.push(tokio::spawn(async move {
            allocation.claim(UserId(user)).await.expect("claim runs")
        }));
    }

    let mut bound = HashSet::new();
    let mut empty_handed: usize = 0;
    for task in tasks {
        match task.await.expect("task completes") {
            ClaimOutcome::Claimed(item) => {
                assert!(
                    bound.insert(item.id),
                    "item {} bound to two users",
                    item.id
                );
            }
            ClaimOutcome::NoneAvailable => empty_handed += 1,
            ClaimOutcome::AlreadyHeld(item) => {
                panic!("fresh users cannot already hold {}", item.id)
            }
        }
    }

    assert_eq!(bound.len(), items);
    assert_eq!(empty_handed, usize::try_from(users).expect("small count") - items);
}

#[tokio::test]
async fn claim_is_idempotent_for_the_holder() {
    let h = harness();
    h.allocation.stock(&drafts(2)).await.expect("stock");

    let first = h.allocation.claim(UserId(1)).await.expect("claim");
    let ClaimOutcome::Claimed(item) = first else {
        panic!("expected a fresh claim");
    };

    let second = h.allocation.claim(UserId(1)).await.expect("re-claim");
    assert_eq!(second, ClaimOutcome::AlreadyHeld(item));
}

#[tokio::test]
async fn submitted_items_can_no_longer_be_cancelled() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;

    h.allocation.claim(UserId(1)).await.expect("claim");
    h.allocation.submit(UserId(1)).await.expect("submit");

    let error = h
        .allocation
        .cancel(UserId(1))
        .await
        .expect_err("submitted item is out of reach");
    assert_eq!(error.code(), ErrorCode::InvalidState);
}

#[tokio::test]
async fn cancelled_claims_return_to_the_pool_for_others() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");

    let ClaimOutcome::Claimed(item) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    let released = h.allocation.cancel(UserId(1)).await.expect("cancel");
    assert_eq!(released.id, item.id);
    assert_eq!(released.assigned_to, None);

    let ClaimOutcome::Claimed(reclaimed) =
        h.allocation.claim(UserId(2)).await.expect("second claim")
    else {
        panic!("released item should be claimable again");
    };
    assert_eq!(reclaimed.id, item.id);
}

#[tokio::test]
async fn pool_is_served_fifo_by_intake_order() {
    let h = harness();
    h.allocation.stock(&drafts(3)).await.expect("stock");

    let ClaimOutcome::Claimed(first) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    assert_eq!(first.login, "account-0@example.com");

    let ClaimOutcome::Claimed(second) = h.allocation.claim(UserId(2)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    assert_eq!(second.login, "account-1@example.com");
}

#[tokio::test]
async fn approval_conserves_balances_and_credits_the_referrer() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 9).await;
    h.ledger
        .enroll(Enrollment::new(UserId(1), "referee").with_referrer(UserId(9)))
        .await
        .expect("enrollment succeeds");

    let ClaimOutcome::Claimed(item) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    let record = h.allocation.submit(UserId(1)).await.expect("submit");

    let before = h.ledger.balances(UserId(1)).await.expect("balances");
    assert_eq!(before.hold, record.price);
    assert_eq!(before.available, Amount::ZERO);

    let resolution = h.approval.approve_item(item.id).await.expect("approve");
    assert_eq!(resolution.user_id, UserId(1));

    let after = h.ledger.balances(UserId(1)).await.expect("balances");
    assert_eq!(after.hold, Amount::ZERO);
    assert_eq!(after.available, record.price);

    let referrer = h.ledger.balances(UserId(9)).await.expect("balances");
    assert_eq!(referrer.available, cents(5), "bonus 0.05 credited");

    let outbox = h.store.outbox_snapshot();
    assert!(outbox.iter().any(|n| {
        n.recipient == UserId(1) && matches!(n.event, NotificationEvent::ItemApproved { .. })
    }));
    assert!(outbox.iter().any(|n| {
        n.recipient == UserId(9)
            && matches!(n.event, NotificationEvent::ReferralBonusEarned { .. })
    }));
}

#[tokio::test]
async fn approval_without_a_referrer_touches_one_user_only() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;
    enroll(&h, 2).await;

    let ClaimOutcome::Claimed(item) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    h.allocation.submit(UserId(1)).await.expect("submit");
    let resolution = h.approval.approve_item(item.id).await.expect("approve");

    assert!(resolution.referral.is_none());
    let bystander = h.ledger.balances(UserId(2)).await.expect("balances");
    assert_eq!(bystander.available, Amount::ZERO);
}

#[tokio::test]
async fn zero_bonus_skips_the_referral_credit() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    h.settings
        .set_referral_bonus("0")
        .await
        .expect("bonus update");
    enroll(&h, 9).await;
    h.ledger
        .enroll(Enrollment::new(UserId(1), "referee").with_referrer(UserId(9)))
        .await
        .expect("enrollment succeeds");

    let ClaimOutcome::Claimed(item) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    h.allocation.submit(UserId(1)).await.expect("submit");
    let resolution = h.approval.approve_item(item.id).await.expect("approve");

    assert!(resolution.referral.is_none());
    let referrer = h.ledger.balances(UserId(9)).await.expect("balances");
    assert_eq!(referrer.available, Amount::ZERO);
}

#[tokio::test]
async fn rejection_reverses_the_submission_credit() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;

    let ClaimOutcome::Claimed(item) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    h.allocation.submit(UserId(1)).await.expect("submit");
    h.approval.reject_item(item.id).await.expect("reject");

    let balances = h.ledger.balances(UserId(1)).await.expect("balances");
    assert_eq!(balances.hold, Amount::ZERO);
    assert_eq!(balances.available, Amount::ZERO);

    let snapshot = h.store.item_snapshot(item.id).expect("item exists");
    assert_eq!(snapshot.status.as_str(), "rejected");
}

#[tokio::test]
async fn submit_self_heals_a_missing_ledger_row() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");

    // No enrollment: the user claims and submits with no ledger row.
    h.allocation.claim(UserId(41)).await.expect("claim");
    let record = h.allocation.submit(UserId(41)).await.expect("submit");

    assert!(record.ledger_repaired);
    let account = h.store.user_snapshot(UserId(41)).expect("row recreated");
    assert_eq!(account.display_name, "Unknown");
    assert_eq!(account.hold, record.price);
}

#[tokio::test]
async fn withdrawal_reserves_then_refunds_on_rejection() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;
    h.settings.set_price("10.00").await.expect("price update");
    earn_available(&h, 1).await;

    let withdrawal = h
        .withdrawal
        .request(UserId(1), cents(1000), "paypal", "user@example.com")
        .await
        .expect("request succeeds");
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(
        h.ledger.balances(UserId(1)).await.expect("balances").available,
        Amount::ZERO
    );

    let resolved = h
        .approval
        .resolve_withdrawal(withdrawal.id, WithdrawalOutcome::Rejected)
        .await
        .expect("resolve succeeds");
    assert!(resolved.refunded);
    assert_eq!(resolved.withdrawal.status, WithdrawalStatus::Rejected);
    assert_eq!(
        h.ledger.balances(UserId(1)).await.expect("balances").available,
        cents(1000)
    );
}

#[tokio::test]
async fn paid_withdrawal_leaves_the_balance_spent() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;
    h.settings.set_price("10.00").await.expect("price update");
    earn_available(&h, 1).await;

    let withdrawal = h
        .withdrawal
        .request(UserId(1), cents(1000), "paypal", "user@example.com")
        .await
        .expect("request succeeds");
    let resolved = h
        .approval
        .resolve_withdrawal(withdrawal.id, WithdrawalOutcome::Paid)
        .await
        .expect("resolve succeeds");

    assert!(!resolved.refunded);
    assert_eq!(resolved.withdrawal.status, WithdrawalStatus::Paid);
    assert_eq!(
        h.ledger.balances(UserId(1)).await.expect("balances").available,
        Amount::ZERO
    );

    let outbox = h.store.outbox_snapshot();
    assert!(outbox.iter().any(|n| {
        matches!(n.event, NotificationEvent::WithdrawalPaid { .. })
    }));
}

#[tokio::test]
async fn over_budget_withdrawal_fails_and_changes_nothing() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;
    h.settings.set_price("10.00").await.expect("price update");
    earn_available(&h, 1).await;

    let error = h
        .withdrawal
        .request(UserId(1), cents(1500), "paypal", "user@example.com")
        .await
        .expect_err("over budget");

    assert_eq!(error.code(), ErrorCode::InsufficientFunds);
    assert_eq!(
        error.details().expect("details")["available"],
        serde_json::json!("10.00")
    );
    assert_eq!(
        h.ledger.balances(UserId(1)).await.expect("balances").available,
        cents(1000)
    );
    assert!(h.approval.pending_withdrawals().await.expect("queue").is_empty());
}

#[tokio::test]
async fn concurrent_withdrawals_cannot_double_spend() {
    let h = harness();
    h.allocation.stock(&drafts(1)).await.expect("stock");
    enroll(&h, 1).await;
    h.settings.set_price("10.00").await.expect("price update");
    earn_available(&h, 1).await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let withdrawal = h.withdrawal.clone();
        tasks.push(tokio::spawn(async move {
            withdrawal
                .request(UserId(1), cents(1000), "paypal", "acct")
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("task completes").is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1, "only one request can reserve the balance");
    assert_eq!(
        h.ledger.balances(UserId(1)).await.expect("balances").available,
        Amount::ZERO
    );
}

#[tokio::test]
async fn self_referral_is_stored_as_no_referrer() {
    let h = harness();

    h.ledger
        .enroll(Enrollment::new(UserId(5), "five").with_referrer(UserId(5)))
        .await
        .expect("enrollment succeeds");

    let account = h
        .ledger
        .account(UserId(5))
        .await
        .expect("lookup succeeds")
        .expect("account exists");
    assert_eq!(account.referred_by, None);
}

#[tokio::test]
async fn duplicate_logins_are_skipped_at_intake() {
    let h = harness();

    let first = h.allocation.stock(&drafts(3)).await.expect("stock");
    assert_eq!((first.added, first.skipped), (3, 0));

    let mut second = drafts(2);
    second.push(ItemDraft::new("fresh@example.com", "secret"));
    let report = h.allocation.stock(&second).await.expect("restock");
    assert_eq!((report.added, report.skipped), (1, 2));
}

#[tokio::test]
async fn payment_info_merge_preserves_unmentioned_keys() {
    let h = harness();
    enroll(&h, 1).await;

    let mut first = PaymentInfo::new();
    first.insert("paypal".to_owned(), "old@example.com".to_owned());
    first.insert("usdt".to_owned(), "TR123".to_owned());
    h.ledger
        .merge_payment_info(UserId(1), first)
        .await
        .expect("first merge");

    let mut second = PaymentInfo::new();
    second.insert("paypal".to_owned(), "new@example.com".to_owned());
    h.ledger
        .merge_payment_info(UserId(1), second)
        .await
        .expect("second merge");

    let info = h.ledger.payment_info(UserId(1)).await.expect("lookup");
    assert_eq!(info.get("paypal").map(String::as_str), Some("new@example.com"));
    assert_eq!(info.get("usdt").map(String::as_str), Some("TR123"));
}

#[tokio::test]
async fn queues_surface_records_in_insertion_order() {
    let h = harness();
    h.allocation.stock(&drafts(3)).await.expect("stock");
    for user in 1..=3 {
        enroll(&h, user).await;
        h.allocation.claim(UserId(user)).await.expect("claim");
        h.allocation.submit(UserId(user)).await.expect("submit");
    }

    let queue = h.approval.pending_items().await.expect("queue");
    let logins: Vec<&str> = queue.iter().map(|item| item.login.as_str()).collect();
    assert_eq!(
        logins,
        [
            "account-0@example.com",
            "account-1@example.com",
            "account-2@example.com",
        ]
    );
}

#[tokio::test]
async fn stats_and_history_reflect_resolutions() {
    let h = harness();
    h.allocation.stock(&drafts(2)).await.expect("stock");
    enroll(&h, 1).await;

    let ClaimOutcome::Claimed(item) = h.allocation.claim(UserId(1)).await.expect("claim") else {
        panic!("expected a fresh claim");
    };
    h.allocation.submit(UserId(1)).await.expect("submit");
    h.approval.approve_item(item.id).await.expect("approve");

    let stats = h.ledger.stats().await.expect("stats");
    assert_eq!((stats.available, stats.sold, stats.users), (1, 1, 1));

    let history = h.ledger.history(UserId(1)).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, item.id);
}

#[tokio::test]
async fn admin_roster_is_a_persistent_allowlist() {
    let h = harness();

    assert!(!h.approval.is_admin(UserId(50)).await.expect("check"));
    assert!(h.approval.grant_admin(UserId(50)).await.expect("grant"));
    assert!(!h.approval.grant_admin(UserId(50)).await.expect("re-grant"));
    assert!(h.approval.is_admin(UserId(50)).await.expect("check"));
    assert_eq!(h.approval.admins().await.expect("list"), vec![UserId(50)]);
}
