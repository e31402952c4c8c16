use crate::domain::tts::{JobState, SynthesisJob};
use serde::{Deserialize, Serialize};

/// Provider answer to the client-credentials grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Response for POST /tts/createTask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}

/// Response for POST /tts/queryTask, same shape as the provider's
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQueryResponse {
    #[serde(default)]
    pub tasks_info: Vec<TaskInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub task_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_result: Option<TaskResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl TaskInfo {
    pub fn into_job(self) -> SynthesisJob {
        let state = JobState::from_provider(&self.task_status);
        let result = self.task_result.unwrap_or_default();
        SynthesisJob {
            job_id: self.task_id,
            state,
            audio_url: result.speech_url.filter(|_| state == JobState::Succeeded),
            error: result.err_msg.filter(|_| state == JobState::Failed),
        }
    }
}
