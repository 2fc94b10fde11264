use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use kb_core::{
    KnowledgePatch, NewKnowledge, ResolverConfig, DEFAULT_NLU_URL, DEFAULT_REQUIRED_PASS_RATE,
    DEFAULT_THRESHOLD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "kb",
    version,
    about = "Answer questions from an intent-keyed knowledge base"
)]
pub struct Cli {
    /// JSONL file holding the knowledge entries.
    #[arg(long, global = true, env = "KB_STORE", default_value = "knowledge.jsonl")]
    pub store: PathBuf,

    /// NLU parse endpoint receiving `{"text": ...}`.
    #[arg(long, global = true, env = "NLU_PARSE_URL", default_value = DEFAULT_NLU_URL)]
    pub nlu_url: String,

    /// Minimum classifier confidence for a knowledge lookup.
    #[arg(long, global = true, env = "KB_CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,

    #[arg(long, global = true, env = "NLU_TIMEOUT", default_value = "10s")]
    pub nlu_timeout: humantime::Duration,

    #[arg(long, global = true, env = "KB_STORE_TIMEOUT", default_value = "5s")]
    pub store_timeout: humantime::Duration,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve one question and print the outcome.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Manage knowledge entries.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeCommand,
    },
    /// Run labelled cases through the resolver and report the pass rate.
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value_t = DEFAULT_REQUIRED_PASS_RATE)]
        min_pass_rate: f32,
    },
    /// Serve the answer and knowledge endpoints over HTTP.
    Serve {
        #[arg(long, env = "KB_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
}

#[derive(Debug, Subcommand)]
pub enum KnowledgeCommand {
    Add {
        #[arg(long)]
        intent: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        #[arg(long)]
        faq: bool,
        #[arg(long)]
        category: Option<String>,
    },
    List {
        #[arg(long)]
        active_only: bool,
    },
    Update {
        id: u64,
        #[arg(long)]
        intent: Option<String>,
        #[arg(long)]
        question: Option<String>,
        #[arg(long)]
        answer: Option<String>,
        #[arg(long)]
        faq: Option<bool>,
        #[arg(long, conflicts_with = "clear_category")]
        category: Option<String>,
        /// Remove the FAQ category from the entry.
        #[arg(long)]
        clear_category: bool,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete {
        id: u64,
    },
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err("threshold must be within [0, 1]".to_string());
        }

        if self.nlu_timeout.as_ref().is_zero() {
            return Err("nlu-timeout must be > 0".to_string());
        }

        if self.store_timeout.as_ref().is_zero() {
            return Err("store-timeout must be > 0".to_string());
        }

        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            nlu_url: self.nlu_url.clone(),
            threshold: self.threshold,
            classifier_timeout: self.nlu_timeout.into(),
            store_timeout: self.store_timeout.into(),
        }
    }
}

impl KnowledgeCommand {
    pub fn new_knowledge(&self) -> Option<NewKnowledge> {
        match self {
            Self::Add {
                intent,
                question,
                answer,
                faq,
                category,
            } => Some(NewKnowledge {
                is_faq: *faq,
                faq_category: category.clone(),
                ..NewKnowledge::new(intent.as_str(), question.as_str(), answer.as_str())
            }),
            _ => None,
        }
    }

    pub fn patch(&self) -> Option<KnowledgePatch> {
        match self {
            Self::Update {
                intent,
                question,
                answer,
                faq,
                category,
                clear_category,
                active,
                ..
            } => Some(KnowledgePatch {
                intent: intent.clone(),
                question: question.clone(),
                answer: answer.clone(),
                is_faq: *faq,
                faq_category: if *clear_category {
                    Some(None)
                } else {
                    category.clone().map(Some)
                },
                is_active: *active,
            }),
            _ => None,
        }
    }
}
