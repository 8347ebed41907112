use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    agent::{Agent, NextAction},
    context::Context,
    error::{GraphError, Result},
};

/// Upper bound on agent runs inside one turn; protects against handoff cycles
pub const MAX_AGENT_RUNS_PER_TURN: usize = 8;

/// Type alias for handoff condition functions
pub type HandoffCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Declared handoff between two agents
#[derive(Clone)]
pub struct Handoff {
    pub from: String,
    pub to: String,
    pub condition: Option<HandoffCondition>,
}

/// A set of agents and the handoffs allowed between them
pub struct AgentGraph {
    pub id: String,
    agents: HashMap<String, Arc<dyn Agent>>,
    handoffs: Vec<Handoff>,
    entry_agent: Option<String>,
}

impl AgentGraph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agents: HashMap::new(),
            handoffs: Vec::new(),
            entry_agent: None,
        }
    }

    /// Add an agent to the graph; the first agent added becomes the entry agent
    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) -> &mut Self {
        let name = agent.name().to_string();
        if self.agents.is_empty() {
            self.entry_agent = Some(name.clone());
        }
        self.agents.insert(name, agent);
        self
    }

    /// Set the entry agent. Unknown names are ignored.
    pub fn set_entry_agent(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if self.agents.contains_key(&name) {
            self.entry_agent = Some(name);
        }
        self
    }

    /// Declare an unconditional handoff
    pub fn add_handoff(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.handoffs.push(Handoff {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    /// Declare a handoff taken only when `condition` holds for the turn's context
    pub fn add_conditional_handoff<F>(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> &mut Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.handoffs.push(Handoff {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        });
        self
    }

    /// Run one turn starting at `initial_agent`, following handoffs until an
    /// agent ends the turn or waits for input.
    ///
    /// Only the agent that ends the turn contributes the visible response;
    /// anything a delegating agent returned alongside a handoff is dropped.
    pub async fn execute_turn(&self, initial_agent: &str, context: Context) -> Result<TurnResult> {
        let mut current = initial_agent.to_string();
        let mut path: Vec<String> = Vec::new();

        loop {
            if path.len() >= MAX_AGENT_RUNS_PER_TURN {
                return Err(GraphError::HandoffLimitExceeded(MAX_AGENT_RUNS_PER_TURN));
            }

            let agent = self
                .get_agent(&current)
                .ok_or_else(|| GraphError::AgentNotFound(current.clone()))?;

            debug!(graph = %self.id, agent = %current, "Running agent");
            path.push(current.clone());

            let result = agent
                .run(context.clone())
                .await
                .map_err(|e| e.attributed_to(&current))?;

            match result.next_action {
                NextAction::Handoff => {
                    let next = self
                        .find_next_agent(&current, &context)
                        .ok_or_else(|| GraphError::NoHandoffTarget(current.clone()))?;
                    if result.response.is_some() {
                        debug!(agent = %current, "Discarding response of delegating agent");
                    }
                    info!(from = %current, to = %next, status = ?result.status_message, "Handoff");
                    current = next;
                }
                NextAction::HandoffTo(target) => {
                    if !self.can_hand_off(&current, &target) {
                        return Err(GraphError::HandoffNotAllowed {
                            from: current,
                            to: target,
                        });
                    }
                    info!(from = %current, to = %target, status = ?result.status_message, "Handoff");
                    current = target;
                }
                NextAction::WaitForInput => {
                    return Ok(TurnResult {
                        responding_agent: current,
                        response: result.response,
                        status_message: result.status_message,
                        status: TurnStatus::WaitingForInput,
                        path,
                    });
                }
                NextAction::End => {
                    return Ok(TurnResult {
                        responding_agent: current,
                        response: result.response,
                        status_message: result.status_message,
                        status: TurnStatus::Completed,
                        path,
                    });
                }
            }
        }
    }

    /// Find the next agent based on declared handoffs and their conditions
    pub fn find_next_agent(&self, current_agent: &str, context: &Context) -> Option<String> {
        self.handoffs
            .iter()
            .filter(|handoff| handoff.from == current_agent)
            .find(|handoff| match &handoff.condition {
                Some(condition) => condition(context),
                None => true,
            })
            .map(|handoff| handoff.to.clone())
    }

    pub fn can_hand_off(&self, from: &str, to: &str) -> bool {
        self.handoffs.iter().any(|h| h.from == from && h.to == to)
    }

    pub fn entry_agent(&self) -> Option<&str> {
        self.entry_agent.as_deref()
    }

    pub fn get_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }
}

/// Builder for creating graphs
pub struct AgentGraphBuilder {
    graph: AgentGraph,
}

impl AgentGraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: AgentGraph::new(id),
        }
    }

    pub fn add_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.graph.add_agent(agent);
        self
    }

    pub fn add_handoff(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.graph.add_handoff(from, to);
        self
    }

    pub fn add_conditional_handoff<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.graph.add_conditional_handoff(from, to, condition);
        self
    }

    pub fn set_entry_agent(mut self, name: impl Into<String>) -> Self {
        self.graph.set_entry_agent(name);
        self
    }

    pub fn build(self) -> AgentGraph {
        self.graph
    }
}

/// Outcome of one routing pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// The agent whose output is the turn's terminal answer
    pub responding_agent: String,
    pub response: Option<String>,
    pub status_message: Option<String>,
    pub status: TurnStatus,
    /// Agents that ran during the turn, in order
    pub path: Vec<String>,
}

impl TurnResult {
    /// Terminal result for a turn that failed with an error
    pub fn failed(agent: impl Into<String>, message: impl Into<String>, reason: impl Into<String>) -> Self {
        let agent = agent.into();
        Self {
            responding_agent: agent.clone(),
            response: Some(message.into()),
            status_message: None,
            status: TurnStatus::Failed(reason.into()),
            path: vec![agent],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TurnStatus::Failed(_))
    }

    pub fn final_text(&self) -> &str {
        self.response.as_deref().unwrap_or_default()
    }

    pub fn visited(&self, agent: &str) -> bool {
        self.path.iter().any(|a| a == agent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    /// The responding agent expects more input from the user
    WaitingForInput,
    /// The turn produced a final answer
    Completed,
    /// The turn was aborted by an error
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentResult;
    use async_trait::async_trait;

    struct Scripted {
        name: &'static str,
        action: NextAction,
        response: Option<&'static str>,
    }

    #[async_trait]
    impl Agent for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, context: Context) -> Result<AgentResult> {
            let mut seen: Vec<String> = context.get("seen").await.unwrap_or_default();
            seen.push(self.name.to_string());
            context.set("seen", seen).await;
            Ok(AgentResult::new(
                self.response.map(str::to_string),
                self.action.clone(),
            ))
        }
    }

    fn scripted(name: &'static str, action: NextAction, response: Option<&'static str>) -> Arc<dyn Agent> {
        Arc::new(Scripted {
            name,
            action,
            response,
        })
    }

    #[tokio::test]
    async fn conditional_handoff_picks_first_matching_target() {
        let graph = AgentGraphBuilder::new("routing")
            .add_agent(scripted("entry", NextAction::Handoff, Some("ignored")))
            .add_agent(scripted("left", NextAction::End, Some("from left")))
            .add_agent(scripted("right", NextAction::End, Some("from right")))
            .add_conditional_handoff("entry", "left", |ctx| {
                ctx.get_sync::<String>("side").as_deref() == Some("left")
            })
            .add_conditional_handoff("entry", "right", |ctx| {
                ctx.get_sync::<String>("side").as_deref() == Some("right")
            })
            .build();

        let context = Context::new();
        context.set("side", "right").await;
        let result = graph.execute_turn("entry", context).await.unwrap();

        assert_eq!(result.responding_agent, "right");
        assert_eq!(result.final_text(), "from right");
        assert_eq!(result.status, TurnStatus::Completed);
        assert_eq!(result.path, vec!["entry", "right"]);
        assert!(!result.visited("left"));
    }

    #[tokio::test]
    async fn handoff_without_matching_condition_is_an_error() {
        let graph = AgentGraphBuilder::new("routing")
            .add_agent(scripted("entry", NextAction::Handoff, None))
            .add_agent(scripted("left", NextAction::End, None))
            .add_conditional_handoff("entry", "left", |_| false)
            .build();

        let err = graph.execute_turn("entry", Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::NoHandoffTarget(ref a) if a == "entry"));
        assert_eq!(err.agent(), Some("entry"));
    }

    #[tokio::test]
    async fn explicit_handoff_must_be_declared() {
        let graph = AgentGraphBuilder::new("routing")
            .add_agent(scripted("entry", NextAction::HandoffTo("other".into()), None))
            .add_agent(scripted("other", NextAction::End, None))
            .build();

        let err = graph.execute_turn("entry", Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::HandoffNotAllowed { .. }));
    }

    #[tokio::test]
    async fn wait_for_input_keeps_the_turn_with_the_agent() {
        let graph = AgentGraphBuilder::new("routing")
            .add_agent(scripted("entry", NextAction::HandoffTo("intake".into()), None))
            .add_agent(scripted("intake", NextAction::WaitForInput, Some("send it over")))
            .add_handoff("entry", "intake")
            .build();

        let result = graph.execute_turn("entry", Context::new()).await.unwrap();
        assert_eq!(result.responding_agent, "intake");
        assert_eq!(result.status, TurnStatus::WaitingForInput);
    }

    #[tokio::test]
    async fn handoff_cycles_are_cut_off() {
        let graph = AgentGraphBuilder::new("cycle")
            .add_agent(scripted("a", NextAction::Handoff, None))
            .add_agent(scripted("b", NextAction::Handoff, None))
            .add_handoff("a", "b")
            .add_handoff("b", "a")
            .build();

        let context = Context::new();
        let err = graph.execute_turn("a", context.clone()).await.unwrap_err();
        assert!(matches!(err, GraphError::HandoffLimitExceeded(MAX_AGENT_RUNS_PER_TURN)));
        let seen: Vec<String> = context.get("seen").await.unwrap();
        assert_eq!(seen.len(), MAX_AGENT_RUNS_PER_TURN);
    }

    #[tokio::test]
    async fn first_agent_added_is_the_entry_agent() {
        let graph = AgentGraphBuilder::new("entry")
            .add_agent(scripted("first", NextAction::End, None))
            .add_agent(scripted("second", NextAction::End, None))
            .build();
        assert_eq!(graph.entry_agent(), Some("first"));

        let graph = AgentGraphBuilder::new("entry")
            .add_agent(scripted("first", NextAction::End, None))
            .add_agent(scripted("second", NextAction::End, None))
            .set_entry_agent("second")
            .set_entry_agent("missing")
            .build();
        assert_eq!(graph.entry_agent(), Some("second"));
    }
}
