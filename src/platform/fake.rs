//! In-memory platform used by orchestration and cleanup tests.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::types::{
    AgentDefinition, Citation, MessageRole, RemoteAgent, Run, RunError, RunStatus, Thread,
    ThreadMessage,
};
use super::{AgentPlatform, PlatformError};

#[derive(Default)]
struct State {
    next_id: usize,
    agents: BTreeMap<String, AgentDefinition>,
    threads: BTreeMap<String, Vec<ThreadMessage>>,
    runs: BTreeMap<String, VecDeque<RunStatus>>,
    create_agent_calls: usize,
    delete_calls: Vec<String>,
    posted_messages: Vec<String>,
    run_calls: usize,
}

/// Failure injection and scripted run behaviour
pub struct FakePlatform {
    state: Mutex<State>,
    /// 1-based index of the create_agent call that fails
    pub fail_agent_create_at: Option<usize>,
    pub fail_thread_create: bool,
    pub fail_list: bool,
    pub fail_list_messages: bool,
    pub fail_get_run: bool,
    /// Ids whose deletion is rejected
    pub undeletable: HashSet<String>,
    /// Statuses reported by successive polls after the run is created
    pub run_script: Vec<RunStatus>,
    pub run_error: Option<RunError>,
    pub reply: Option<String>,
    /// Created agents come back without a name
    pub blank_names: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fail_agent_create_at: None,
            fail_thread_create: false,
            fail_list: false,
            fail_list_messages: false,
            fail_get_run: false,
            undeletable: HashSet::new(),
            run_script: vec![RunStatus::InProgress, RunStatus::Completed],
            run_error: None,
            reply: Some("Here is your campaign.".into()),
            blank_names: false,
        }
    }

    /// Pre-existing agent, not created through `create_agent`
    pub fn seed_agent(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "asst");
        state.agents.insert(
            id.clone(),
            AgentDefinition {
                model: "gpt-4o".into(),
                name: name.into(),
                instructions: String::new(),
                description: None,
                tools: vec![],
            },
        );
        id
    }

    pub fn seed_thread(&self) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "thread");
        state.threads.insert(id.clone(), Vec::new());
        id
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().agents.keys().cloned().collect()
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().threads.keys().cloned().collect()
    }

    pub fn agent(&self, id: &str) -> Option<AgentDefinition> {
        self.state.lock().unwrap().agents.get(id).cloned()
    }

    pub fn create_agent_calls(&self) -> usize {
        self.state.lock().unwrap().create_agent_calls
    }

    /// Every id a delete was attempted on, in call order
    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    pub fn posted_messages(&self) -> Vec<String> {
        self.state.lock().unwrap().posted_messages.clone()
    }

    pub fn run_calls(&self) -> usize {
        self.state.lock().unwrap().run_calls
    }
}

fn next_id(state: &mut State, prefix: &str) -> String {
    state.next_id += 1;
    format!("{}_{}", prefix, state.next_id)
}

fn not_found(id: &str) -> PlatformError {
    PlatformError::Api {
        status: 404,
        message: format!("{} not found", id),
    }
}

#[async_trait]
impl AgentPlatform for FakePlatform {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.create_agent_calls += 1;
        if self.fail_agent_create_at == Some(state.create_agent_calls) {
            return Err(PlatformError::Api {
                status: 500,
                message: format!("cannot create {}", definition.name),
            });
        }
        let id = next_id(&mut state, "asst");
        state.agents.insert(id.clone(), definition.clone());
        let name = if self.blank_names {
            String::new()
        } else {
            definition.name.clone()
        };
        Ok(RemoteAgent { id, name })
    }

    async fn list_agents(&self) -> Result<Vec<RemoteAgent>, PlatformError> {
        if self.fail_list {
            return Err(PlatformError::Request("connection reset".into()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .agents
            .iter()
            .map(|(id, definition)| RemoteAgent {
                id: id.clone(),
                name: definition.name.clone(),
            })
            .collect())
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(agent_id.to_string());
        if self.undeletable.contains(agent_id) {
            return Err(PlatformError::Api {
                status: 409,
                message: "agent is locked".into(),
            });
        }
        state
            .agents
            .remove(agent_id)
            .map(|_| ())
            .ok_or_else(|| not_found(agent_id))
    }

    async fn create_thread(&self) -> Result<Thread, PlatformError> {
        if self.fail_thread_create {
            return Err(PlatformError::Api {
                status: 503,
                message: "threads unavailable".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "thread");
        state.threads.insert(id.clone(), Vec::new());
        Ok(Thread {
            id,
            created_at: Some(Utc::now()),
        })
    }

    async fn list_threads(&self) -> Result<Vec<Thread>, PlatformError> {
        if self.fail_list {
            return Err(PlatformError::Request("connection reset".into()));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .threads
            .keys()
            .map(|id| Thread {
                id: id.clone(),
                created_at: None,
            })
            .collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(thread_id.to_string());
        if self.undeletable.contains(thread_id) {
            return Err(PlatformError::Api {
                status: 409,
                message: "thread is locked".into(),
            });
        }
        state
            .threads
            .remove(thread_id)
            .map(|_| ())
            .ok_or_else(|| not_found(thread_id))
    }

    async fn create_message(&self, thread_id: &str, content: &str) -> Result<String, PlatformError> {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "msg");
        state.posted_messages.push(content.to_string());
        let messages = state
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| not_found(thread_id))?;
        messages.insert(
            0,
            ThreadMessage {
                id: id.clone(),
                role: MessageRole::User,
                text: vec![content.to_string()],
                citations: vec![],
            },
        );
        Ok(id)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, PlatformError> {
        if self.fail_list_messages {
            return Err(PlatformError::Request("timed out".into()));
        }
        let state = self.state.lock().unwrap();
        state
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| not_found(thread_id))
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.run_calls += 1;
        if !state.agents.contains_key(agent_id) {
            return Err(not_found(agent_id));
        }
        if !state.threads.contains_key(thread_id) {
            return Err(not_found(thread_id));
        }
        let id = next_id(&mut state, "run");
        state
            .runs
            .insert(id.clone(), self.run_script.iter().cloned().collect());
        Ok(Run {
            id,
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, PlatformError> {
        if self.fail_get_run {
            return Err(PlatformError::Request("connection reset".into()));
        }
        let mut state = self.state.lock().unwrap();
        let script = state.runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        let status = if script.len() > 1 {
            script.pop_front().unwrap_or(RunStatus::InProgress)
        } else {
            script.front().cloned().unwrap_or(RunStatus::InProgress)
        };

        if status == RunStatus::Completed {
            if let Some(reply) = &self.reply {
                let id = next_id(&mut state, "msg");
                if let Some(messages) = state.threads.get_mut(thread_id) {
                    let already_replied = messages
                        .first()
                        .map(|m| m.role == MessageRole::Assistant)
                        .unwrap_or(false);
                    if !already_replied {
                        messages.insert(
                            0,
                            ThreadMessage {
                                id,
                                role: MessageRole::Assistant,
                                text: vec![reply.clone()],
                                citations: vec![Citation {
                                    title: "Hero image".into(),
                                    url: "https://images.test/hero.png".into(),
                                }],
                            },
                        );
                    }
                }
            }
        }

        let last_error = if status == RunStatus::Failed {
            self.run_error.clone()
        } else {
            None
        };
        Ok(Run {
            id: run_id.to_string(),
            status,
            last_error,
        })
    }
}
