pub mod classifier;
pub mod config;
pub mod error;
pub mod eval;
pub mod model;
pub mod resolver;
pub mod storage;

pub use classifier::{parse_nlu_payload, IntentClassifier, NluClassifier};
pub use config::{
    ResolverConfig, DEFAULT_CLASSIFIER_TIMEOUT, DEFAULT_NLU_URL, DEFAULT_REQUIRED_PASS_RATE,
    DEFAULT_STORE_TIMEOUT, DEFAULT_THRESHOLD,
};
pub use error::{KbError, Result};
pub use eval::{evaluate_cases, EvalCase, EvalOutcome, EvalSummary};
pub use model::{
    deserialize_optional_nullable_string, ChatReply, ClassificationResult, KnowledgeEntry,
    KnowledgePatch, NewKnowledge, OutcomeKind, ResolutionOutcome,
};
pub use resolver::AnswerResolver;
pub use storage::{JsonlKnowledgeStore, KnowledgeRepository, MemoryKnowledgeStore};
