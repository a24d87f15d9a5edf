//! Property-based tests for the session state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::*;
use crate::transcript::{Role, TranscriptStore};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::new("prop-session", Backoff::default())
}

/// A step whose generation stamp is resolved against the state it is applied to
#[derive(Debug, Clone)]
enum Step {
    Opened,
    Frame(String),
    Closed,
    Errored,
    ReconnectDue,
    Submit(String),
    Reset,
}

#[derive(Debug, Clone)]
struct StepPlan {
    step: Step,
    /// How many generations behind the current one the event is stamped
    lag: u64,
}

impl StepPlan {
    fn to_event(&self, state: &SessionState) -> Event {
        let generation = state.generation.saturating_sub(self.lag);
        match &self.step {
            Step::Opened => Event::Opened { generation },
            Step::Frame(text) => Event::Frame {
                generation,
                text: text.clone(),
            },
            Step::Closed => Event::Closed { generation },
            Step::Errored => Event::Errored {
                generation,
                message: "reset by peer".to_string(),
            },
            Step::ReconnectDue => Event::ReconnectDue { generation },
            Step::Submit(text) => Event::Submit { text: text.clone() },
            Step::Reset => Event::Reset,
        }
    }
}

/// Apply an event, treating a rejected submit as "nothing happened"
fn step(state: &SessionState, event: Event) -> (SessionState, Vec<Effect>) {
    match transition(state, &test_context(), event) {
        Ok(result) => (result.new_state, result.effects),
        Err(_) => (state.clone(), vec![]),
    }
}

fn activated() -> SessionState {
    step(&SessionState::new(), Event::Activate).0
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_frame_text() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z ]{1,16}".prop_map(|content| {
            serde_json::json!({ "type": "complete", "content": content }).to_string()
        }),
        1 => Just(r#"{"type":"typing"}"#.to_string()),
        1 => "[a-z{}:\"]{0,10}",
    ]
}

fn arb_submit_text() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z][a-z ]{0,15}",
        1 => Just(String::new()),
        1 => Just("   ".to_string()),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Opened),
        3 => arb_frame_text().prop_map(Step::Frame),
        2 => Just(Step::Closed),
        1 => Just(Step::Errored),
        3 => Just(Step::ReconnectDue),
        4 => arb_submit_text().prop_map(Step::Submit),
        1 => Just(Step::Reset),
    ]
}

fn arb_step_plan() -> impl Strategy<Value = StepPlan> {
    (arb_step(), prop_oneof![5 => Just(0u64), 1 => 1u64..4])
        .prop_map(|(step, lag)| StepPlan { step, lag })
}

fn arb_connection_state() -> impl Strategy<Value = ConnectionState> {
    prop_oneof![
        Just(ConnectionState::Connecting),
        Just(ConnectionState::Open),
        Just(ConnectionState::Closed),
    ]
}

fn arb_live_state() -> impl Strategy<Value = SessionState> {
    (arb_connection_state(), 0u32..10, 4u64..50, any::<bool>()).prop_map(
        |(connection, retry_count, generation, waiting)| SessionState {
            connection,
            retry_count,
            generation,
            waiting,
            deactivated: false,
        },
    )
}

fn arb_connection_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Opened),
        arb_frame_text().prop_map(Step::Frame),
        Just(Step::Closed),
        Just(Step::Errored),
        Just(Step::ReconnectDue),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_backoff_is_capped_exponential(n in 0u32..200) {
        let expected_ms: u128 = if n >= 5 { 30_000 } else { (1000u128 << n).min(30_000) };
        prop_assert_eq!(Backoff::default().delay(n).as_millis(), expected_ms);
    }

    #[test]
    fn prop_backoff_never_exceeds_max(base_ms in 1u64..5000, max_ms in 5000u64..120_000, n in any::<u32>()) {
        let backoff = Backoff {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
        };
        let delay = backoff.delay(n);
        prop_assert!(delay <= backoff.max);
        prop_assert!(delay >= backoff.base.min(backoff.max));
    }

    #[test]
    fn prop_at_most_one_turn_in_flight(plans in proptest::collection::vec(arb_step_plan(), 0..80)) {
        let mut state = activated();
        let mut in_flight = false;

        for plan in &plans {
            let event = plan.to_event(&state);
            let is_reset = matches!(event, Event::Reset);
            let (next, effects) = step(&state, event);

            if is_reset && state.waiting {
                in_flight = false;
            }
            for effect in &effects {
                match effect {
                    Effect::Send { .. } => {
                        prop_assert!(!in_flight, "second send while a turn was in flight");
                        in_flight = true;
                    }
                    Effect::AppendMessage(message) if message.role == Role::Assistant => {
                        in_flight = false;
                    }
                    _ => {}
                }
            }
            prop_assert_eq!(next.waiting, in_flight);
            state = next;
        }
    }

    #[test]
    fn prop_stale_events_never_mutate(
        state in arb_live_state(),
        connection_step in arb_connection_step(),
        lag in 1u64..4,
    ) {
        let plan = StepPlan { step: connection_step, lag };
        let result = transition(&state, &test_context(), plan.to_event(&state)).unwrap();
        prop_assert_eq!(result.ignored, Some(Ignored::Stale));
        prop_assert_eq!(result.new_state, state);
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_transcript_only_grows(plans in proptest::collection::vec(arb_step_plan(), 0..80)) {
        let mut state = activated();
        let mut transcript = TranscriptStore::new();
        transcript.seed(Vec::new()).unwrap();
        let mut sends = 0usize;

        for plan in &plans {
            let before = transcript.snapshot().to_vec();
            let (next, effects) = step(&state, plan.to_event(&state));
            for effect in effects {
                match effect {
                    Effect::AppendMessage(message) => transcript.append(message),
                    Effect::Send { .. } => sends += 1,
                    _ => {}
                }
            }
            prop_assert!(transcript.len() >= before.len());
            prop_assert_eq!(&transcript.snapshot()[..before.len()], before.as_slice());
            state = next;
        }

        let user_messages = transcript
            .snapshot()
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
        prop_assert_eq!(user_messages, sends);
    }

    #[test]
    fn prop_generation_and_retry_bookkeeping(plans in proptest::collection::vec(arb_step_plan(), 0..80)) {
        let mut state = activated();

        for plan in &plans {
            let (next, effects) = step(&state, plan.to_event(&state));

            prop_assert!(next.generation >= state.generation);
            if next.connection == ConnectionState::Open && state.connection != ConnectionState::Open {
                prop_assert_eq!(next.retry_count, 0);
            }
            if next.connection == ConnectionState::Closed && state.connection != ConnectionState::Closed {
                prop_assert_eq!(next.retry_count, state.retry_count + 1);
                let expected = Effect::ScheduleReconnect {
                    generation: state.generation,
                    delay: Backoff::default().delay(state.retry_count),
                    retry_count: next.retry_count,
                };
                prop_assert!(effects.contains(&expected));
            }
            // A new physical attempt always gets a fresh generation
            for effect in &effects {
                if let Effect::Connect { generation } = effect {
                    prop_assert_eq!(*generation, next.generation);
                    prop_assert!(*generation > state.generation);
                }
            }
            state = next;
        }
    }
}
