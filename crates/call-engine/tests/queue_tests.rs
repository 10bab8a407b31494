//! Queue priority, FIFO, and assignment-atomicity tests.

use std::collections::HashSet;
use std::sync::Arc;

use roadcall_call_engine::{Agent, AgentId, AgentStatus, QueueManager};
use roadcall_call_ledger::{CallId, Party, PartyKind};

async fn manager_with_agents(count: usize) -> Arc<QueueManager> {
    let queue = Arc::new(QueueManager::new(100));
    for i in 0..count {
        let agent = Agent::new(format!("agent-{i}"), format!("Agent {i}"));
        queue.register_agent(agent).await;
        queue
            .set_agent_status(&AgentId::new(format!("agent-{i}")), AgentStatus::Available)
            .await
            .unwrap();
    }
    queue
}

#[tokio::test]
async fn partner_entries_sort_ahead_of_customers() {
    let queue = manager_with_agents(0).await;

    let customer_call = CallId::new();
    let partner_call = CallId::new();
    queue
        .enqueue(customer_call, Party::customer("cust-1"))
        .await
        .unwrap();
    queue
        .enqueue(partner_call, Party::partner("part-1"))
        .await
        .unwrap();

    // The partner joined later but sits at the head.
    queue.register_agent(Agent::new("agent-0", "Agent 0")).await;
    queue
        .set_agent_status(&AgentId::new("agent-0"), AgentStatus::Available)
        .await
        .unwrap();

    let assignment = queue.try_assign().await.expect("an agent was free");
    assert_eq!(assignment.entry.call_id, partner_call);
    assert_eq!(assignment.entry.caller.kind, PartyKind::Partner);

    // The customer is still waiting; no second agent, no second assignment.
    assert!(queue.try_assign().await.is_none());
    assert_eq!(queue.depth().await, 1);
}

#[tokio::test]
async fn fifo_holds_within_each_priority_class() {
    let queue = manager_with_agents(6).await;

    let partners: Vec<CallId> = (0..3).map(|_| CallId::new()).collect();
    let customers: Vec<CallId> = (0..3).map(|_| CallId::new()).collect();

    // Interleave enqueues: c0, p0, c1, p1, c2, p2.
    for i in 0..3 {
        queue
            .enqueue(customers[i], Party::customer(format!("cust-{i}")))
            .await
            .unwrap();
        queue
            .enqueue(partners[i], Party::partner(format!("part-{i}")))
            .await
            .unwrap();
    }

    let mut order = Vec::new();
    while let Some(assignment) = queue.try_assign().await {
        order.push(assignment.entry.call_id);
    }

    // All partners first (their enqueue order), then all customers (theirs).
    let expected: Vec<CallId> = partners.iter().chain(customers.iter()).copied().collect();
    assert_eq!(order, expected);
}

#[tokio::test]
async fn duplicate_enqueue_is_a_no_op() {
    let queue = manager_with_agents(0).await;
    let call_id = CallId::new();

    queue
        .enqueue(call_id, Party::customer("cust-1"))
        .await
        .unwrap();
    queue
        .enqueue(call_id, Party::customer("cust-1"))
        .await
        .unwrap();

    assert_eq!(queue.depth().await, 1);
}

#[tokio::test]
async fn cancel_removes_waiting_entry_only() {
    let queue = manager_with_agents(1).await;
    let waiting = CallId::new();
    let assigned = CallId::new();

    queue
        .enqueue(assigned, Party::partner("part-1"))
        .await
        .unwrap();
    queue
        .enqueue(waiting, Party::customer("cust-1"))
        .await
        .unwrap();

    let assignment = queue.try_assign().await.unwrap();
    assert_eq!(assignment.entry.call_id, assigned);

    // Cancelling the assigned call is a no-op; the waiting one goes away.
    assert!(!queue.cancel(assigned).await);
    assert!(queue.cancel(waiting).await);
    assert_eq!(queue.depth().await, 0);
}

#[tokio::test]
async fn queue_capacity_is_enforced() {
    let queue = QueueManager::new(2);
    queue
        .enqueue(CallId::new(), Party::customer("cust-1"))
        .await
        .unwrap();
    queue
        .enqueue(CallId::new(), Party::customer("cust-2"))
        .await
        .unwrap();
    assert!(queue
        .enqueue(CallId::new(), Party::customer("cust-3"))
        .await
        .is_err());
}

#[tokio::test]
async fn assignment_prefers_longest_available_agent() {
    let queue = Arc::new(QueueManager::new(100));
    queue.register_agent(Agent::new("agent-a", "A")).await;
    queue.register_agent(Agent::new("agent-b", "B")).await;

    queue
        .set_agent_status(&AgentId::new("agent-a"), AgentStatus::Available)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    queue
        .set_agent_status(&AgentId::new("agent-b"), AgentStatus::Available)
        .await
        .unwrap();

    queue
        .enqueue(CallId::new(), Party::customer("cust-1"))
        .await
        .unwrap();

    let assignment = queue.try_assign().await.unwrap();
    assert_eq!(assignment.agent.id.as_str(), "agent-a");
    assert_eq!(assignment.agent.status, AgentStatus::Busy);
}

/// Many concurrent triggers, limited agents: every entry and every agent is
/// used at most once.
#[tokio::test]
async fn concurrent_assignment_never_double_assigns() {
    let queue = manager_with_agents(2).await;

    let calls: Vec<CallId> = (0..5).map(|_| CallId::new()).collect();
    for (i, call_id) in calls.iter().enumerate() {
        queue
            .enqueue(*call_id, Party::customer(format!("cust-{i}")))
            .await
            .unwrap();
    }

    // Fire a burst of assignment triggers, as agent-free and new-entry
    // events would in production.
    let mut handles = Vec::new();
    for _ in 0..16 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move { queue.try_assign().await }));
    }

    let mut assigned_calls = HashSet::new();
    let mut assigned_agents = HashSet::new();
    let mut wins = 0;
    for handle in handles {
        if let Some(assignment) = handle.await.unwrap() {
            wins += 1;
            assert!(
                assigned_calls.insert(assignment.entry.call_id),
                "entry assigned twice"
            );
            assert!(
                assigned_agents.insert(assignment.agent.id.as_str().to_string()),
                "agent assigned twice"
            );
        }
    }

    // Two agents, so exactly two of the sixteen triggers won.
    assert_eq!(wins, 2);
    assert_eq!(queue.depth().await, 3);
}

#[tokio::test]
async fn stats_report_depth_and_waits() {
    let queue = manager_with_agents(0).await;
    queue
        .enqueue(CallId::new(), Party::partner("part-1"))
        .await
        .unwrap();
    queue
        .enqueue(CallId::new(), Party::customer("cust-1"))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    let stats = queue.stats().await;
    assert_eq!(stats.depth, 2);
    assert_eq!(stats.partner_depth, 1);
    assert!(stats.longest_wait_seconds >= stats.average_wait_seconds);
}
