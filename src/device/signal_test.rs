use super::*;

#[test]
fn notify_without_subscribers_reaches_nobody() {
    let signal = AuthSignal::new();
    assert_eq!(signal.notify(AuthChange::TokensChanged), 0);
}

#[test]
fn drain_counts_pending_changes() {
    let signal = AuthSignal::new();
    let mut sub = signal.subscribe();

    assert_eq!(sub.drain(), 0);
    signal.notify(AuthChange::TokensChanged);
    signal.notify(AuthChange::SessionExpired);
    assert_eq!(sub.drain(), 2);
    assert_eq!(sub.drain(), 0);
}

#[test]
fn drain_counts_changes_lost_to_lag() {
    let signal = AuthSignal::new();
    let mut sub = signal.subscribe();

    for _ in 0..(SIGNAL_CAPACITY + 4) {
        signal.notify(AuthChange::TokensChanged);
    }
    assert_eq!(sub.drain(), SIGNAL_CAPACITY + 4);
}

#[test]
fn dropping_subscription_unsubscribes() {
    let signal = AuthSignal::new();
    let sub = signal.subscribe();
    assert_eq!(signal.subscriber_count(), 1);
    drop(sub);
    assert_eq!(signal.subscriber_count(), 0);
}

#[tokio::test]
async fn recv_yields_next_change() {
    let signal = AuthSignal::new();
    let mut sub = signal.subscribe();

    signal.notify(AuthChange::SessionExpired);
    assert_eq!(sub.recv().await, Some(AuthChange::SessionExpired));
}

#[tokio::test]
async fn recv_ends_when_signal_dropped() {
    let signal = AuthSignal::new();
    let mut sub = signal.subscribe();
    drop(signal);
    assert_eq!(sub.recv().await, None);
}
