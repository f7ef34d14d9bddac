pub mod capsule_graph;
pub mod capsule_stats;
pub mod check_similarity;
pub mod get_capsule;
pub mod invalidate_capsule;
pub mod link_commits;
pub mod list_capsules;
pub mod list_tags;
pub mod recall_capsules;
pub mod store_capsule;

use capsule_graph::CapsuleGraphParams;
use capsule_stats::CapsuleStatsParams;
use check_similarity::CheckSimilarityParams;
use get_capsule::GetCapsuleParams;
use invalidate_capsule::InvalidateCapsuleParams;
use link_commits::LinkCommitsParams;
use list_capsules::ListCapsulesParams;
use list_tags::ListTagsParams;
use recall_capsules::RecallCapsulesParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use store_capsule::StoreCapsuleParams;

use capsules::capsule::graph::{build_graph, DependencyGraph, Direction};
use capsules::capsule::recall::{format_context, RecallEngine, RecallQuery};
use capsules::capsule::similarity::{Proposal, SimilarityChecker, SimilarityResult};
use capsules::capsule::store::{CapsuleStore, ListFilter, StoreCapsuleResult};
use capsules::capsule::types::Capsule;
use capsules::config::CapsulesConfig;

const DEFAULT_LIST_LIMIT: usize = 50;

/// Response from store_capsule.
#[derive(Debug, Serialize)]
struct StoreCapsuleResponse {
    #[serde(flatten)]
    stored: StoreCapsuleResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity: Option<SimilarityResult>,
}

/// Response from list_capsules.
#[derive(Debug, Serialize)]
struct ListCapsulesResponse {
    capsules: Vec<Capsule>,
    total_matched: usize,
}

/// Response from capsule_graph.
#[derive(Debug, Serialize)]
struct GraphResponse {
    #[serde(flatten)]
    graph: DependencyGraph,
    rendered: String,
}

/// Response from recall_capsules in context format.
#[derive(Debug, Serialize)]
struct RecallContextResponse {
    context: String,
    total_matched: usize,
    token_estimate: usize,
}

/// The capsules MCP tool handler. Holds the store, recall engine, similarity
/// checker and config, and exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct CapsuleTools {
    tool_router: ToolRouter<Self>,
    store: CapsuleStore,
    recall: RecallEngine,
    similarity: Arc<SimilarityChecker>,
    config: Arc<CapsulesConfig>,
}

/// Run sync store work on the blocking pool and stringify both error layers.
async fn blocking<T, F>(what: &'static str, f: F) -> Result<T, String>
where
    F: FnOnce() -> capsules::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("{what} task failed: {e}"))?
        .map_err(|e| format!("{what} failed: {e}"))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

fn parse_opt<T: FromStr<Err = String>>(value: Option<&str>) -> Result<Option<T>, String> {
    value.map(str::parse).transpose()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[tool_router]
impl CapsuleTools {
    pub fn new(
        store: CapsuleStore,
        recall: RecallEngine,
        similarity: Arc<SimilarityChecker>,
        config: Arc<CapsulesConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
            recall,
            similarity,
            config,
        }
    }

    /// Record a decision or finding.
    #[tool(description = "Store a decision or finding capsule. Re-storing the same question in the same session and phase updates it. Reports similar or contradicting capsules.")]
    async fn store_capsule(
        &self,
        Parameters(params): Parameters<StoreCapsuleParams>,
    ) -> Result<String, String> {
        // 1. Validate inputs
        if params.question.trim().is_empty() {
            return Err("question must not be empty".into());
        }
        let mut capsule = Capsule::new(
            params.session.trim(),
            params.phase.trim(),
            params.question.trim(),
            params.choice.trim(),
        );
        if let Some(kind) = parse_opt(params.r#type.as_deref())? {
            capsule.kind = kind;
        }
        if let Some(origin) = parse_opt(params.origin.as_deref())? {
            capsule.origin = origin;
        }
        capsule.confirmation = parse_opt(params.confirmation.as_deref())?;
        capsule.rationale = params.rationale.unwrap_or_default();
        capsule.alternatives = params.alternatives.unwrap_or_default();
        capsule.tags = params.tags.unwrap_or_default();
        capsule.repos = params.repos.unwrap_or_default();
        if capsule.repos.is_empty() {
            capsule.repos.extend(self.config.recall.default_repo.clone());
        }
        capsule.enabled_by = non_empty(params.enabled_by);
        capsule.constrains = params.constrains.unwrap_or_default();
        capsule.supersedes = params.supersedes.unwrap_or_default();

        tracing::info!(
            session = %capsule.session_id,
            phase = %capsule.phase,
            id = %capsule.id,
            "store_capsule called"
        );

        // 2. Similarity report against what is already there
        let check = params.check_similarity.unwrap_or(true);
        let store = self.store.clone();
        let checker = Arc::clone(&self.similarity);
        let proposal = Proposal::from(&capsule);
        let own_id = capsule.id.clone();
        let similarity = if check {
            blocking("similarity check", move || {
                let existing: Vec<Capsule> = store
                    .list(&ListFilter::default())?
                    .into_iter()
                    .filter(|c| c.id != own_id)
                    .collect();
                Ok(checker.check(&existing, &proposal))
            })
            .await?
        } else {
            None
        };

        // 3. Write (sync file I/O → spawn_blocking)
        let store = self.store.clone();
        let stored = blocking("store", move || store.store(capsule)).await?;

        tracing::info!(id = %stored.id, created = stored.created, "capsule stored");
        to_json(&StoreCapsuleResponse { stored, similarity })
    }

    /// Fetch one capsule.
    #[tool(description = "Get a capsule by ID, optionally with its supersession chain.")]
    async fn get_capsule(
        &self,
        Parameters(params): Parameters<GetCapsuleParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "get_capsule called");
        let store = self.store.clone();
        let id = params.id;
        if params.include_chain.unwrap_or(false) {
            let chain = blocking("get", move || store.get_chain(&id)).await?;
            to_json(&chain)
        } else {
            let capsule = blocking("get", move || store.get(&id)).await?;
            to_json(&capsule)
        }
    }

    /// List capsules with composable filters.
    #[tool(description = "List capsules filtered by session, repo, phase, tag, file path, status or type. Newest first, latest phase per question unless show_evolution is set.")]
    async fn list_capsules(
        &self,
        Parameters(params): Parameters<ListCapsulesParams>,
    ) -> Result<String, String> {
        let filter = ListFilter {
            session: non_empty(params.session),
            repo: non_empty(params.repo),
            phase: non_empty(params.phase),
            tag: non_empty(params.tag),
            file_path: non_empty(params.file_path),
            status: parse_opt(params.status.as_deref())?,
            kind: parse_opt(params.r#type.as_deref())?,
            include_invalidated: params.include_invalidated.unwrap_or(false),
            show_evolution: params.show_evolution.unwrap_or(false),
        };
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        tracing::info!(?filter, limit, "list_capsules called");

        let store = self.store.clone();
        let mut capsules = blocking("list", move || store.list(&filter)).await?;
        let total_matched = capsules.len();
        capsules.truncate(limit);
        to_json(&ListCapsulesResponse {
            capsules,
            total_matched,
        })
    }

    /// Invalidate a capsule.
    #[tool(description = "Mark a capsule invalidated with a reason, optionally what was learned and which capsule replaces it.")]
    async fn invalidate_capsule(
        &self,
        Parameters(params): Parameters<InvalidateCapsuleParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, superseded_by = ?params.superseded_by, "invalidate_capsule called");
        let store = self.store.clone();
        let updated = blocking("invalidate", move || {
            store.invalidate(
                &params.id,
                &params.reason,
                params.learned.as_deref(),
                params.superseded_by.as_deref(),
            )
        })
        .await?;
        to_json(&updated)
    }

    /// Walk the dependency graph.
    #[tool(description = "Show what led to a capsule and what it led to: enables, constrains and supersedes relations, breadth-first up to a depth.")]
    async fn capsule_graph(
        &self,
        Parameters(params): Parameters<CapsuleGraphParams>,
    ) -> Result<String, String> {
        let direction: Direction = parse_opt(params.direction.as_deref())?.unwrap_or_default();
        let depth = params.depth.unwrap_or(self.config.graph.default_depth);
        tracing::info!(id = %params.id, depth, %direction, "capsule_graph called");

        let store = self.store.clone();
        let id = params.id;
        let graph = blocking("graph", move || build_graph(&store, &id, depth, direction)).await?;
        let rendered = graph.render();
        to_json(&GraphResponse { graph, rendered })
    }

    /// Tiered recall.
    #[tool(description = "Recall capsules relevant to files, tags, text or a repo. Ranked file > git history > tag > text > repo; with no filters returns the most recent.")]
    async fn recall_capsules(
        &self,
        Parameters(params): Parameters<RecallCapsulesParams>,
    ) -> Result<String, String> {
        let query = RecallQuery {
            files: params.files.unwrap_or_default(),
            tags: params.tags.unwrap_or_default(),
            text: non_empty(params.text),
            repo: non_empty(params.repo).or_else(|| self.config.recall.default_repo.clone()),
            limit: params.limit,
        };
        let as_context = match params.format.as_deref() {
            None | Some("json") => false,
            Some("context") => true,
            Some(other) => return Err(format!("unknown format: {other} (expected json or context)")),
        };
        tracing::info!(?query, as_context, "recall_capsules called");

        let engine = self.recall.clone();
        let result = blocking("recall", move || engine.query(&query)).await?;

        if as_context {
            let budget = params.token_budget.unwrap_or(self.config.recall.token_budget);
            let context = format_context(&result, budget);
            let token_estimate = capsules::capsule::recall::estimate_tokens(&context);
            to_json(&RecallContextResponse {
                context,
                total_matched: result.total_matched,
                token_estimate,
            })
        } else {
            to_json(&result)
        }
    }

    /// Pre-flight duplicate and contradiction check.
    #[tool(description = "Check a proposed question/choice against existing active capsules. Suggests create, duplicate_of:<id> or supersedes:<id>.")]
    async fn check_similarity(
        &self,
        Parameters(params): Parameters<CheckSimilarityParams>,
    ) -> Result<String, String> {
        tracing::info!(question = %params.question, "check_similarity called");
        let store = self.store.clone();
        let checker = Arc::clone(&self.similarity);
        let session = non_empty(params.session);
        let proposal = Proposal::new(params.question, params.choice);
        let result = blocking("similarity check", move || {
            let existing = store.list(&ListFilter {
                session,
                ..ListFilter::default()
            })?;
            Ok(checker.check(&existing, &proposal))
        })
        .await?;
        match result {
            Some(r) => to_json(&r),
            None => Ok(serde_json::json!({
                "similar": [],
                "contradicting": [],
                "suggested_action": "create"
            })
            .to_string()),
        }
    }

    /// Tag usage.
    #[tool(description = "List tags on active capsules with usage counts, most used first.")]
    async fn list_tags(
        &self,
        Parameters(params): Parameters<ListTagsParams>,
    ) -> Result<String, String> {
        tracing::info!(prefix = ?params.prefix, "list_tags called");
        let store = self.store.clone();
        let prefix = non_empty(params.prefix);
        let tags = blocking("list tags", move || store.list_tags(prefix.as_deref())).await?;
        to_json(&tags)
    }

    /// Attach git commits.
    #[tool(description = "Attach git commit SHAs to a capsule (id) or to every active capsule of a session (session).")]
    async fn link_commits(
        &self,
        Parameters(params): Parameters<LinkCommitsParams>,
    ) -> Result<String, String> {
        if params.commits.is_empty() {
            return Err("commits must not be empty".into());
        }
        let store = self.store.clone();
        let commits = params.commits;
        let result = match (non_empty(params.id), non_empty(params.session)) {
            (Some(id), None) => {
                tracing::info!(%id, count = commits.len(), "link_commits called");
                blocking("link commits", move || store.link_commits(&id, &commits)).await?
            }
            (None, Some(session)) => {
                tracing::info!(%session, count = commits.len(), "link_commits called");
                blocking("link commits", move || {
                    store.link_commits_for_session(&session, &commits)
                })
                .await?
            }
            _ => return Err("provide exactly one of id or session".into()),
        };
        to_json(&result)
    }

    /// Store statistics.
    #[tool(description = "Get capsule statistics: counts by type, phase and status, session count, time range.")]
    async fn capsule_stats(
        &self,
        Parameters(params): Parameters<CapsuleStatsParams>,
    ) -> Result<String, String> {
        tracing::info!(session = ?params.session, "capsule_stats called");
        let store = self.store.clone();
        let session = non_empty(params.session);
        let stats = blocking("stats", move || {
            capsules::capsule::stats::capsule_stats(&store, session.as_deref())
        })
        .await?;
        to_json(&stats)
    }
}

#[tool_handler]
impl ServerHandler for CapsuleTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Decision capsule knowledge base. Use recall_capsules before changing code, \
                 check_similarity before recording, store_capsule to record decisions and \
                 findings, and invalidate_capsule when one no longer holds."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
