use axum_orders_api::models::OrderStatus;

#[test]
fn pending_moves_to_confirmed_or_cancelled_only() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
}

#[test]
fn shipped_orders_can_only_be_delivered() {
    assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    assert_eq!(OrderStatus::Shipped.allowed_next(), &[OrderStatus::Delivered]);
}

#[test]
fn delivered_and_cancelled_are_terminal() {
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
    for to in OrderStatus::ALL {
        assert!(!OrderStatus::Delivered.can_transition_to(to));
        assert!(!OrderStatus::Cancelled.can_transition_to(to));
    }
}

#[test]
fn every_pair_matches_the_transition_table() {
    let table = [
        (
            OrderStatus::Pending,
            vec![OrderStatus::Confirmed, OrderStatus::Cancelled],
        ),
        (
            OrderStatus::Confirmed,
            vec![OrderStatus::Processing, OrderStatus::Cancelled],
        ),
        (
            OrderStatus::Processing,
            vec![OrderStatus::Shipped, OrderStatus::Cancelled],
        ),
        (OrderStatus::Shipped, vec![OrderStatus::Delivered]),
        (OrderStatus::Delivered, vec![]),
        (OrderStatus::Cancelled, vec![]),
    ];

    for (from, allowed) in table {
        for to in OrderStatus::ALL {
            assert_eq!(
                from.can_transition_to(to),
                allowed.contains(&to),
                "{from} -> {to}"
            );
        }
    }
}

#[test]
fn cancellation_is_reachable_until_shipment() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
    assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
    assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
}

#[test]
fn parse_round_trips_every_status() {
    for status in OrderStatus::ALL {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("paid"), None);
    assert_eq!(OrderStatus::parse(""), None);
}
