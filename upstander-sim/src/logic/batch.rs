use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use upstander_engine::{
    DecisionPolicy, JourneyRecord, JourneyStore, Node, Persona, PolicyError, TraversalEngine,
    TraversalError,
};

use super::pacing::{PacingProfile, SeededStepClock};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub run_seed: u64,
    pub policy_timeout: Duration,
    pub concurrency: usize,
    pub pacing: PacingProfile,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            run_seed: 1337,
            policy_timeout: Duration::from_secs(5),
            concurrency: 8,
            pacing: PacingProfile::default(),
        }
    }
}

/// Journeys gathered from one batch, in roster order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub store: JourneyStore,
    /// Journeys that were still running when the batch was cancelled.
    pub abandoned: usize,
}

/// Walk every persona concurrently and gather the finished journeys.
///
/// Each policy call runs on the blocking pool under `policy_timeout`; a slow
/// or panicking policy only truncates its own journey. Setting `cancel` to
/// `true` aborts journeys still in flight and keeps those already finished.
///
/// # Errors
///
/// Returns an error if any traversal hits a missing node or a journey task
/// panics.
pub async fn run_batch(
    engine: &TraversalEngine,
    personas: Vec<Persona>,
    policy: Arc<dyn DecisionPolicy>,
    config: &BatchConfig,
    mut cancel: watch::Receiver<bool>,
) -> Result<BatchOutcome> {
    let total = personas.len();
    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, persona) in personas.into_iter().enumerate() {
        let task = JourneyTask {
            index,
            engine: engine.clone(),
            persona: Arc::new(persona),
            policy: Arc::clone(&policy),
            config: config.clone(),
        };
        let permits = Arc::clone(&permits);
        set.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|err| anyhow!("journey permits closed: {err}"))?;
            task.run().await.map_err(anyhow::Error::from)
        });
    }

    let mut finished: Vec<(usize, JourneyRecord)> = Vec::with_capacity(total);
    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            () = cancellation(&mut cancel), if !cancelled => {
                log::warn!("batch cancelled with {} of {total} journeys finished", finished.len());
                cancelled = true;
                set.abort_all();
            }
            joined = set.join_next() => {
                let Some(joined) = joined else { break };
                match joined {
                    Ok(result) => {
                        let (index, record) = result.context("journey failed")?;
                        log::info!(
                            "[{}/{total}] {} {}",
                            finished.len() + 1,
                            record.persona_id(),
                            record.outcome()
                        );
                        finished.push((index, record));
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => return Err(anyhow!("journey task panicked: {err}")),
                }
            }
        }
    }

    finished.sort_by_key(|(index, _)| *index);
    let abandoned = total - finished.len();
    Ok(BatchOutcome {
        store: finished.into_iter().map(|(_, record)| record).collect(),
        abandoned,
    })
}

/// Resolves once the flag is raised; never resolves if the sender is gone.
async fn cancellation(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

struct JourneyTask {
    index: usize,
    engine: TraversalEngine,
    persona: Arc<Persona>,
    policy: Arc<dyn DecisionPolicy>,
    config: BatchConfig,
}

impl JourneyTask {
    async fn run(self) -> Result<(usize, JourneyRecord), TraversalError> {
        let clock = SeededStepClock::new(
            self.config.run_seed,
            &self.persona.id,
            self.config.pacing.clone(),
        );
        let graph = self.engine.graph();
        let mut walker = self
            .engine
            .begin(graph.entry(), &self.persona.id, Box::new(clock))?;
        while let Some(node) = walker.decision_point() {
            let decision = decide(
                Arc::clone(&self.policy),
                node.clone(),
                Arc::clone(&self.persona),
                self.config.policy_timeout,
            )
            .await;
            walker.resolve(decision)?;
        }
        Ok((self.index, walker.finish()))
    }
}

async fn decide(
    policy: Arc<dyn DecisionPolicy>,
    node: Node,
    persona: Arc<Persona>,
    limit: Duration,
) -> Result<String, PolicyError> {
    let call = tokio::task::spawn_blocking(move || policy.choose(&node, &persona));
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(decision)) => decision,
        Ok(Err(err)) => Err(PolicyError::Failed(format!("policy task failed: {err}"))),
        Err(_) => Err(PolicyError::TimedOut(limit)),
    }
}
