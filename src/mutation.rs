//! Write operations with cache-synchronizing lifecycle hooks.
//!
//! A [`Mutation`] wraps one write (the mutation function) with hooks that
//! run in a fixed order:
//!
//! 1. `validate`: reject bad input before anything else happens
//! 2. `on_mutate`: runs before the request; returns a context value, e.g.
//!    a snapshot for rollback after an optimistic cache write
//! 3. the mutation function itself
//! 4. `on_success` or `on_error`
//! 5. `on_settled`, whatever the outcome
//!
//! The lifecycle is tracked as [`MutationState`]:
//! `Idle → Pending → (Committed | RolledBack) → Settled`, and published on a
//! watch channel so observers can follow it while `mutate` runs.

use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::QueryClient;
use crate::error::{ApiError, ValidationError};
use crate::query::BoxFuture;

/// How a mutation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// The server accepted the write and success hooks ran
  Committed,
  /// The write failed and error hooks (including any rollback) ran
  RolledBack,
}

/// Lifecycle state of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
  /// Never run
  Idle,
  /// `on_mutate` has run and the request is in flight
  Pending,
  Committed,
  RolledBack,
  /// `on_settled` has run
  Settled(Outcome),
}

impl MutationState {
  pub fn can_transition_to(self, next: MutationState) -> bool {
    use MutationState::*;
    matches!(
      (self, next),
      (Idle | Settled(_), Pending)
        | (Pending, Committed | RolledBack)
        | (Committed, Settled(Outcome::Committed))
        | (RolledBack, Settled(Outcome::RolledBack))
    )
  }

  pub fn is_pending(self) -> bool {
    self == MutationState::Pending
  }

  pub fn outcome(self) -> Option<Outcome> {
    match self {
      MutationState::Committed | MutationState::Settled(Outcome::Committed) => {
        Some(Outcome::Committed)
      }
      MutationState::RolledBack | MutationState::Settled(Outcome::RolledBack) => {
        Some(Outcome::RolledBack)
      }
      MutationState::Idle | MutationState::Pending => None,
    }
  }
}

type MutationFn<V, R> = Box<dyn Fn(&V) -> BoxFuture<R> + Send + Sync>;
type ValidateFn<V> = Box<dyn Fn(&V) -> Result<(), ValidationError> + Send + Sync>;
type OnMutateFn<V, C> = Box<dyn Fn(&QueryClient, &V) -> C + Send + Sync>;
type OnSuccessFn<V, R, C> = Box<dyn Fn(&QueryClient, &R, &V, &C) + Send + Sync>;
type OnErrorFn<V, C> = Box<dyn Fn(&QueryClient, &ApiError, &V, &C) + Send + Sync>;
type OnSettledFn<V, R> = Box<dyn Fn(&QueryClient, Result<&R, &ApiError>, &V) + Send + Sync>;

/// A write operation bound to a [`QueryClient`].
///
/// `V` is the input, `R` the server's answer and `C` the context produced
/// by `on_mutate` and handed to the later hooks.
pub struct Mutation<V, R, C = ()> {
  client: QueryClient,
  mutation_fn: MutationFn<V, R>,
  validate: Option<ValidateFn<V>>,
  on_mutate: OnMutateFn<V, C>,
  on_success: Option<OnSuccessFn<V, R, C>>,
  on_error: Option<OnErrorFn<V, C>>,
  on_settled: Option<OnSettledFn<V, R>>,
  state: watch::Sender<MutationState>,
}

impl<V, R> Mutation<V, R, ()>
where
  V: Send + 'static,
  R: Send + 'static,
{
  /// Create a mutation without an `on_mutate` step.
  pub fn new<F, Fut>(client: QueryClient, mutation_fn: F) -> Self
  where
    F: Fn(&V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
  {
    Self::with_context(client, mutation_fn, |_, _| ())
  }
}

impl<V, R, C> Mutation<V, R, C>
where
  V: Send + 'static,
  R: Send + 'static,
  C: Send + 'static,
{
  /// Create a mutation whose `on_mutate` hook produces a context value.
  pub fn with_context<F, Fut, M>(client: QueryClient, mutation_fn: F, on_mutate: M) -> Self
  where
    F: Fn(&V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    M: Fn(&QueryClient, &V) -> C + Send + Sync + 'static,
  {
    Self {
      client,
      mutation_fn: Box::new(move |variables: &V| -> BoxFuture<R> {
        Box::pin(mutation_fn(variables))
      }),
      validate: None,
      on_mutate: Box::new(on_mutate),
      on_success: None,
      on_error: None,
      on_settled: None,
      state: watch::channel(MutationState::Idle).0,
    }
  }

  pub fn validate<F>(mut self, f: F) -> Self
  where
    F: Fn(&V) -> Result<(), ValidationError> + Send + Sync + 'static,
  {
    self.validate = Some(Box::new(f));
    self
  }

  pub fn on_success<F>(mut self, f: F) -> Self
  where
    F: Fn(&QueryClient, &R, &V, &C) + Send + Sync + 'static,
  {
    self.on_success = Some(Box::new(f));
    self
  }

  pub fn on_error<F>(mut self, f: F) -> Self
  where
    F: Fn(&QueryClient, &ApiError, &V, &C) + Send + Sync + 'static,
  {
    self.on_error = Some(Box::new(f));
    self
  }

  pub fn on_settled<F>(mut self, f: F) -> Self
  where
    F: Fn(&QueryClient, Result<&R, &ApiError>, &V) + Send + Sync + 'static,
  {
    self.on_settled = Some(Box::new(f));
    self
  }

  pub fn state(&self) -> MutationState {
    *self.state.borrow()
  }

  /// Follow state changes, e.g. to show progress while a request is out.
  pub fn subscribe(&self) -> watch::Receiver<MutationState> {
    self.state.subscribe()
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  /// Run the mutation through its full lifecycle.
  ///
  /// Validation failures return immediately: no hook runs, no request is
  /// sent and the state is left as it was.
  pub async fn mutate(&mut self, variables: V) -> Result<R, ApiError> {
    if let Some(validate) = &self.validate {
      validate(&variables)?;
    }

    self.transition(MutationState::Pending);
    let context = (self.on_mutate)(&self.client, &variables);

    let request = (self.mutation_fn)(&variables);
    let result = request.await;

    match &result {
      Ok(data) => {
        if let Some(on_success) = &self.on_success {
          on_success(&self.client, data, &variables, &context);
        }
        self.transition(MutationState::Committed);
      }
      Err(err) => {
        if let Some(on_error) = &self.on_error {
          on_error(&self.client, err, &variables, &context);
        }
        self.transition(MutationState::RolledBack);
      }
    }

    if let Some(on_settled) = &self.on_settled {
      on_settled(&self.client, result.as_ref(), &variables);
    }
    let outcome = if result.is_ok() {
      Outcome::Committed
    } else {
      Outcome::RolledBack
    };
    self.transition(MutationState::Settled(outcome));

    result
  }

  fn transition(&self, next: MutationState) {
    let current = self.state();
    if !current.can_transition_to(next) {
      // Only reachable if a previous mutate() future was dropped mid-flight
      warn!(from = ?current, to = ?next, "unexpected mutation state transition");
    }
    debug!(from = ?current, to = ?next, "mutation state");
    self.state.send_replace(next);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryKey;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::{Arc, Mutex};
  use tokio::sync::oneshot;

  #[test]
  fn test_state_transitions() {
    use MutationState::*;
    assert!(Idle.can_transition_to(Pending));
    assert!(Pending.can_transition_to(Committed));
    assert!(Pending.can_transition_to(RolledBack));
    assert!(Committed.can_transition_to(Settled(Outcome::Committed)));
    assert!(RolledBack.can_transition_to(Settled(Outcome::RolledBack)));
    assert!(Settled(Outcome::RolledBack).can_transition_to(Pending));

    assert!(!Idle.can_transition_to(Committed));
    assert!(!Pending.can_transition_to(Settled(Outcome::Committed)));
    assert!(!Committed.can_transition_to(Settled(Outcome::RolledBack)));
  }

  #[tokio::test]
  async fn test_hooks_run_in_order_on_success() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());

    let mut mutation = Mutation::with_context(
      QueryClient::new(),
      move |n: &u32| {
        l1.lock().unwrap().push("request");
        let n = *n;
        async move { Ok::<_, ApiError>(n * 2) }
      },
      move |_, _| {
        l2.lock().unwrap().push("mutate");
        "ctx"
      },
    )
    .on_success(move |_, result, vars, ctx| {
      assert_eq!((*result, *vars, *ctx), (42, 21, "ctx"));
      l3.lock().unwrap().push("success");
    })
    .on_error(|_, _, _, _| panic!("on_error must not run"))
    .on_settled(move |_, result, _| {
      assert_eq!(result.ok(), Some(&42));
      l4.lock().unwrap().push("settled");
    });

    assert_eq!(mutation.state(), MutationState::Idle);
    assert_eq!(mutation.mutate(21).await.unwrap(), 42);
    assert_eq!(
      *log.lock().unwrap(),
      vec!["mutate", "request", "success", "settled"]
    );
    assert_eq!(mutation.state(), MutationState::Settled(Outcome::Committed));
  }

  #[tokio::test]
  async fn test_failure_rolls_back_and_settles() {
    let client = QueryClient::new();
    let key = QueryKey::new("counter");
    client.set_query_data(key.clone(), 1u32);

    let k = key.clone();
    let mut mutation = Mutation::with_context(
      client.clone(),
      |_: &u32| async {
        Err::<u32, _>(ApiError::Http {
          status: 500,
          body: String::new(),
        })
      },
      move |client, next| {
        let previous = client.get_query_data::<u32>(&k);
        client.set_query_data(k.clone(), *next);
        previous
      },
    )
    .on_error({
      let key = key.clone();
      move |client, _, _, previous| {
        if let Some(previous) = previous {
          client.set_query_data(key.clone(), *previous);
        }
      }
    });

    let err = mutation.mutate(5).await.unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 500, .. }));
    assert_eq!(client.get_query_data::<u32>(&key), Some(1));
    assert_eq!(
      mutation.state(),
      MutationState::Settled(Outcome::RolledBack)
    );
  }

  #[tokio::test]
  async fn test_validation_failure_skips_lifecycle() {
    let calls = Arc::new(AtomicU32::new(0));
    let c1 = calls.clone();
    let c2 = calls.clone();

    let mut mutation = Mutation::with_context(
      QueryClient::new(),
      move |_: &String| {
        c1.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, ApiError>(()) }
      },
      move |_, _| {
        c2.fetch_add(1, Ordering::SeqCst);
      },
    )
    .validate(|name: &String| {
      if name.is_empty() {
        Err(ValidationError::new("name", "must not be empty"))
      } else {
        Ok(())
      }
    });

    let err = mutation.mutate(String::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(ref v) if v.field == "name"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(mutation.state(), MutationState::Idle);
  }

  #[tokio::test]
  async fn test_state_is_pending_while_request_in_flight() {
    let (tx, rx) = oneshot::channel::<()>();
    let rx = Arc::new(Mutex::new(Some(rx)));

    let mut mutation = Mutation::new(QueryClient::new(), move |_: &()| {
      let rx = rx.lock().unwrap().take();
      async move {
        if let Some(rx) = rx {
          let _ = rx.await;
        }
        Ok::<_, ApiError>("done")
      }
    });
    let mut states = mutation.subscribe();
    assert_eq!(*states.borrow(), MutationState::Idle);

    let handle = tokio::spawn(async move {
      let result = mutation.mutate(()).await;
      (result, mutation.state())
    });

    let observed = tokio::time::timeout(
      std::time::Duration::from_secs(2),
      states.wait_for(|state| state.is_pending()),
    )
    .await
    .expect("mutation never became pending")
    .map(|state| *state)
    .unwrap();
    assert_eq!(observed, MutationState::Pending);
    assert!(!handle.is_finished());
    assert_eq!(*states.borrow(), MutationState::Pending);

    tx.send(()).unwrap();

    let (result, state) = handle.await.unwrap();
    assert_eq!(result.unwrap(), "done");
    assert_eq!(state, MutationState::Settled(Outcome::Committed));
    assert_eq!(
      *states.borrow(),
      MutationState::Settled(Outcome::Committed)
    );
  }

  #[tokio::test]
  async fn test_mutation_can_run_again_after_settling() {
    let mut mutation = Mutation::new(QueryClient::new(), |n: &u32| {
      let n = *n;
      async move {
        if n == 0 {
          Err(ApiError::NotFound)
        } else {
          Ok(n)
        }
      }
    });

    assert!(mutation.mutate(0).await.is_err());
    assert_eq!(mutation.state().outcome(), Some(Outcome::RolledBack));

    assert_eq!(mutation.mutate(3).await.unwrap(), 3);
    assert_eq!(mutation.state().outcome(), Some(Outcome::Committed));
  }
}
