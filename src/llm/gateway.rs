// src/llm/gateway.rs
// Task-to-backend routing with per-tier timeout and fallback chaining

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::provider::{Completion, CompletionBackend, ImageInput};
use crate::config::ExcellyConfig;
use crate::llm::provider::{GeminiBackend, OpenAiBackend};

/// Logical backend tiers. Each maps to one configured model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    GeminiPro,
    GeminiFlash,
    GeminiFlashLite,
    OpenAi,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::GeminiPro => "gemini_pro",
            BackendId::GeminiFlash => "gemini_flash",
            BackendId::GeminiFlashLite => "gemini_flash_lite",
            BackendId::OpenAi => "openai",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logical tasks the gateway routes. Each has a preferred tier and a
/// descending fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Planning,
    Coding,
    Analysis,
    Simple,
    Debugging,
    ImageDescription,
    Clarification,
    Understanding,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Planning => "planning",
            TaskKind::Coding => "coding",
            TaskKind::Analysis => "analysis",
            TaskKind::Simple => "simple",
            TaskKind::Debugging => "debugging",
            TaskKind::ImageDescription => "image_description",
            TaskKind::Clarification => "clarification",
            TaskKind::Understanding => "understanding",
        }
    }

    /// Fallback chain, preferred tier first. Heavy reasoning tasks start
    /// at the flagship model; short utility calls start at the cheap tier.
    pub fn fallback_chain(&self) -> &'static [BackendId] {
        match self {
            TaskKind::Planning | TaskKind::Coding | TaskKind::Analysis => &[
                BackendId::GeminiPro,
                BackendId::GeminiFlash,
                BackendId::GeminiFlashLite,
                BackendId::OpenAi,
            ],
            TaskKind::Debugging | TaskKind::ImageDescription => &[
                BackendId::OpenAi,
                BackendId::GeminiPro,
                BackendId::GeminiFlash,
            ],
            TaskKind::Simple | TaskKind::Clarification | TaskKind::Understanding => &[
                BackendId::GeminiFlashLite,
                BackendId::GeminiFlash,
                BackendId::OpenAi,
            ],
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{backend} timed out after {timeout_secs}s")]
    Timeout { backend: BackendId, timeout_secs: u64 },

    #[error("{backend} call failed: {message}")]
    Transport { backend: BackendId, message: String },

    #[error("all backends failed for {task}: {detail}")]
    Exhausted { task: TaskKind, detail: String },
}

struct Tier {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

/// Routes completion requests to backend tiers with bounded latency.
///
/// Constructed once at startup and injected; holds the only live handles
/// to the backend clients. A timed-out or failed tier triggers the next
/// tier with the same prompt; a tier is never re-invoked within one call.
pub struct ModelGateway {
    tiers: HashMap<BackendId, Tier>,
}

impl ModelGateway {
    pub fn from_config(config: &ExcellyConfig) -> Self {
        let mut tiers = HashMap::new();

        let gemini = &config.gemini;
        tiers.insert(
            BackendId::GeminiPro,
            Tier {
                backend: Arc::new(GeminiBackend::new(
                    gemini.api_key.clone(),
                    gemini.pro_model.clone(),
                    gemini.base_url.clone(),
                    "gemini_pro",
                )) as Arc<dyn CompletionBackend>,
                timeout: Duration::from_secs(gemini.pro_timeout_secs),
            },
        );
        tiers.insert(
            BackendId::GeminiFlash,
            Tier {
                backend: Arc::new(GeminiBackend::new(
                    gemini.api_key.clone(),
                    gemini.flash_model.clone(),
                    gemini.base_url.clone(),
                    "gemini_flash",
                )),
                timeout: Duration::from_secs(gemini.flash_timeout_secs),
            },
        );
        tiers.insert(
            BackendId::GeminiFlashLite,
            Tier {
                backend: Arc::new(GeminiBackend::new(
                    gemini.api_key.clone(),
                    gemini.flash_lite_model.clone(),
                    gemini.base_url.clone(),
                    "gemini_flash_lite",
                )),
                timeout: Duration::from_secs(gemini.flash_timeout_secs),
            },
        );
        tiers.insert(
            BackendId::OpenAi,
            Tier {
                backend: Arc::new(OpenAiBackend::new(
                    config.openai.api_key.clone(),
                    config.openai.model.clone(),
                    config.openai.base_url.clone(),
                )),
                timeout: Duration::from_secs(config.openai.timeout_secs),
            },
        );

        Self { tiers }
    }

    /// Build a gateway over arbitrary backends. Used by tests to inject
    /// fakes; production code goes through `from_config`.
    pub fn with_backends(
        backends: Vec<(BackendId, Arc<dyn CompletionBackend>, Duration)>,
    ) -> Self {
        let tiers = backends
            .into_iter()
            .map(|(id, backend, timeout)| (id, Tier { backend, timeout }))
            .collect();
        Self { tiers }
    }

    /// True if at least one registered backend has credentials.
    pub fn any_available(&self) -> bool {
        self.tiers.values().any(|t| t.backend.is_available())
    }

    /// Availability per tier, for the status endpoint.
    pub fn availability(&self) -> Vec<(BackendId, bool)> {
        let mut out: Vec<_> = self
            .tiers
            .iter()
            .map(|(id, t)| (*id, t.backend.is_available()))
            .collect();
        out.sort_by_key(|(id, _)| id.as_str());
        out
    }

    /// One call to one tier, bounded by that tier's timeout.
    pub async fn call(
        &self,
        backend_id: BackendId,
        prompt: &str,
        temperature: f32,
    ) -> Result<Completion, GatewayError> {
        let tier = self.tiers.get(&backend_id).ok_or(GatewayError::Transport {
            backend: backend_id,
            message: "backend not registered".to_string(),
        })?;
        Self::call_tier(backend_id, tier, prompt, None, temperature).await
    }

    /// Walk the task's fallback chain until one tier answers.
    pub async fn complete(
        &self,
        task: TaskKind,
        prompt: &str,
        temperature: f32,
    ) -> Result<Completion, GatewayError> {
        self.complete_inner(task, prompt, None, temperature).await
    }

    /// Image-capable variant of `complete`. Tiers that cannot take an
    /// image fail over like any other tier failure.
    pub async fn complete_with_image(
        &self,
        task: TaskKind,
        prompt: &str,
        image: &ImageInput,
        temperature: f32,
    ) -> Result<Completion, GatewayError> {
        self.complete_inner(task, prompt, Some(image), temperature).await
    }

    async fn complete_inner(
        &self,
        task: TaskKind,
        prompt: &str,
        image: Option<&ImageInput>,
        temperature: f32,
    ) -> Result<Completion, GatewayError> {
        let mut failures: Vec<String> = Vec::new();

        for backend_id in task.fallback_chain() {
            let Some(tier) = self.tiers.get(backend_id) else {
                continue;
            };
            if !tier.backend.is_available() {
                failures.push(format!("{}: not configured", backend_id));
                continue;
            }

            match Self::call_tier(*backend_id, tier, prompt, image, temperature).await {
                Ok(completion) => {
                    debug!(
                        task = %task,
                        backend = %backend_id,
                        latency_ms = completion.latency_ms,
                        "gateway completion"
                    );
                    return Ok(completion);
                }
                Err(err) => {
                    warn!(task = %task, backend = %backend_id, error = %err, "tier failed, falling back");
                    failures.push(err.to_string());
                }
            }
        }

        Err(GatewayError::Exhausted {
            task,
            detail: failures.join("; "),
        })
    }

    async fn call_tier(
        backend_id: BackendId,
        tier: &Tier,
        prompt: &str,
        image: Option<&ImageInput>,
        temperature: f32,
    ) -> Result<Completion, GatewayError> {
        let fut = async {
            match image {
                Some(img) => tier.backend.complete_with_image(prompt, img, temperature).await,
                None => tier.backend.complete(prompt, temperature).await,
            }
        };

        match tokio::time::timeout(tier.timeout, fut).await {
            Ok(Ok(completion)) => Ok(completion),
            Ok(Err(err)) => Err(GatewayError::Transport {
                backend: backend_id,
                message: err.to_string(),
            }),
            Err(_) => Err(GatewayError::Timeout {
                backend: backend_id,
                timeout_secs: tier.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chains_end_in_cross_provider_tier() {
        // Every chain must cross providers so a single-vendor outage
        // cannot exhaust it.
        for task in [
            TaskKind::Planning,
            TaskKind::Coding,
            TaskKind::Analysis,
            TaskKind::Simple,
            TaskKind::Debugging,
            TaskKind::ImageDescription,
            TaskKind::Clarification,
            TaskKind::Understanding,
        ] {
            let chain = task.fallback_chain();
            assert!(!chain.is_empty());
            let has_openai = chain.contains(&BackendId::OpenAi);
            let has_gemini = chain.iter().any(|b| *b != BackendId::OpenAi);
            assert!(has_openai && has_gemini, "chain for {task} is single-provider");
        }
    }

    #[test]
    fn test_no_duplicate_tiers_in_chain() {
        for task in [TaskKind::Planning, TaskKind::Debugging, TaskKind::Simple] {
            let chain = task.fallback_chain();
            let mut seen = std::collections::HashSet::new();
            for id in chain {
                assert!(seen.insert(id), "duplicate tier {id} in {task} chain");
            }
        }
    }
}
