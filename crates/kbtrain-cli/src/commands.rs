//! Subcommand implementations.

use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use kbtrain_core::knowledge::filter::filter;
use kbtrain_core::{
    AcceptedUrls, Config, EventBus, FileStorage, HttpKnowledgeService, ImportSelection,
    KnowledgeEvent, KnowledgeManager, KnowledgeSource, Notice, NoticeLevel, RemovalOutcome,
    SelectionCommand, SharedRegistry, SourceId, SourceRegistry, SyncCoordinator,
    TrainingOrchestrator, TrainingOutcome, TreeNode,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::render;

pub struct Session {
    config: Config,
    agent_id: String,
    manager: KnowledgeManager<FileStorage>,
}

impl Session {
    pub fn open(config: Config, agent: Option<&str>) -> Result<Self> {
        let manager = KnowledgeManager::new(FileStorage::with_config(config.storage.clone()));
        let agent_id = manager.resolve_agent(agent.or(config.service.agent_id.as_deref()))?;
        Ok(Self {
            config,
            agent_id,
            manager,
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub async fn sources(&mut self, refresh: bool) -> Result<()> {
        let registry = if refresh {
            let service = self.service()?;
            let shared = SourceRegistry::new().into_shared();
            let sync = self.sync(service, &shared, &EventBus::default());
            let count = sync.refresh().await?;
            sync.teardown();
            tracing::info!(count, agent_id = %self.agent_id, "Fetched knowledge sources");
            self.save(&shared).await?;
            let registry = shared.lock().await.clone();
            registry
        } else {
            self.manager.load_registry(&self.agent_id)?
        };

        if registry.is_empty() {
            println!(
                "No knowledge sources for agent {}. Use 'kbtrain sources --refresh' to fetch them.",
                self.agent_id
            );
            return Ok(());
        }
        let marked = registry.training_set();
        for source in registry.sources() {
            let mark = if marked.contains(&source.id) { "*" } else { " " };
            println!("{mark}{}", render::source_line(source));
        }
        Ok(())
    }

    pub fn show(&self, source_id: SourceId) -> Result<()> {
        let source = self.local_source(source_id)?;
        println!("{}", render::source_header(&source));
        print_forests(&source, |forest| forest.to_vec());
        Ok(())
    }

    pub fn filter(&self, source_id: SourceId, query: &str) -> Result<()> {
        let source = self.local_source(source_id)?;
        println!("{}", render::source_header(&source));
        print_forests(&source, |forest| filter(forest, query));
        Ok(())
    }

    pub fn select(
        &mut self,
        source_id: SourceId,
        node: Option<u64>,
        on: bool,
        toggle: bool,
    ) -> Result<()> {
        let command = if toggle {
            SelectionCommand::Toggle(node.ok_or_else(|| eyre!("--toggle needs --node <id>"))?)
        } else {
            SelectionCommand::Set { node, selected: on }
        };
        let updated = self
            .manager
            .apply_selection(&self.agent_id, source_id, command)?;
        println!("{}", render::source_header(&updated));
        Ok(())
    }

    pub fn mark(&mut self, source_ids: &[SourceId], marked: bool) -> Result<()> {
        let mut working_set = Vec::new();
        for &id in source_ids {
            working_set = self.manager.mark_for_training(&self.agent_id, id, marked)?;
        }
        if working_set.is_empty() {
            println!("No sources marked for training");
        } else {
            let ids: Vec<String> = working_set.iter().map(ToString::to_string).collect();
            println!("Marked for training: {}", ids.join(", "));
        }
        Ok(())
    }

    pub async fn train(&mut self, source_id: SourceId, selected_only: bool) -> Result<()> {
        let service = self.service()?;
        let events = EventBus::default();
        let registry = self.shared_registry(&service, &events).await?;
        let orchestrator = self.orchestrator(service, &registry, &events);

        let bar = progress_bar(format!("Training source {source_id}"))?;
        let mut notices = events.subscribe();
        let display = spawn_progress(events.subscribe(), bar.clone(), Some(source_id));

        let result = if selected_only {
            orchestrator.retrain_with_selection(source_id).await
        } else {
            orchestrator.train_source(source_id).await
        };
        display.abort();
        bar.finish_and_clear();
        print_notices(&mut notices);

        let outcome = result?;
        self.save(&registry).await?;
        match outcome {
            TrainingOutcome::Succeeded => Ok(()),
            TrainingOutcome::AlreadyTraining => {
                println!("Source {source_id} is already training");
                Ok(())
            }
            TrainingOutcome::Failed { message, .. } => bail!("Training failed: {message}"),
            TrainingOutcome::Abandoned => bail!("Training was interrupted"),
        }
    }

    pub async fn train_all(&mut self, source_ids: Vec<SourceId>) -> Result<()> {
        let service = self.service()?;
        let events = EventBus::default();
        let registry = self.shared_registry(&service, &events).await?;
        let ids = if source_ids.is_empty() {
            registry.lock().await.training_set()
        } else {
            source_ids
        };
        let orchestrator = self.orchestrator(service, &registry, &events);

        let bar = progress_bar(format!("Training {} sources", ids.len()))?;
        let mut notices = events.subscribe();
        let display = spawn_progress(events.subscribe(), bar.clone(), None);

        let result = orchestrator.train_all_sources(&ids).await;
        display.abort();
        bar.finish_and_clear();
        print_notices(&mut notices);

        let report = result?;
        self.save(&registry).await?;
        for member in &report.members {
            let status = match &member.outcome {
                TrainingOutcome::Succeeded => "trained".to_string(),
                TrainingOutcome::Failed { message, .. } => format!("failed: {message}"),
                TrainingOutcome::AlreadyTraining => "already training".to_string(),
                TrainingOutcome::Abandoned => "interrupted".to_string(),
            };
            println!("{:>6}  {status}", member.source_id);
        }
        for (id, reason) in &report.skipped {
            println!("{id:>6}  skipped: {reason}");
        }
        let progress = report.progress;
        println!(
            "{} of {} sources trained, {} failed",
            progress.succeeded(),
            progress.total,
            progress.failed
        );
        if progress.failed > 0 {
            bail!("{} source(s) failed to train", progress.failed);
        }
        Ok(())
    }

    pub async fn remove(&mut self, source_ids: &[SourceId]) -> Result<()> {
        let service = self.service()?;
        let events = EventBus::default();
        let registry = self.shared_registry(&service, &events).await?;
        let sync = self.sync(service, &registry, &events);
        let mut notices = events.subscribe();

        let result = sync.remove_sources(source_ids).await;
        sync.teardown();
        print_notices(&mut notices);
        // A failed removal re-fetched the registry, so it is saved either way.
        self.save(&registry).await?;

        if let RemovalOutcome::Removed { ids } = result? {
            if ids.len() < source_ids.len() {
                tracing::warn!(
                    requested = source_ids.len(),
                    removed = ids.len(),
                    "Some sources were not in the local registry"
                );
            }
        }
        Ok(())
    }

    pub async fn import(&mut self, catalog: &Path, accept: &[String]) -> Result<()> {
        let json = std::fs::read_to_string(catalog)
            .wrap_err_with(|| format!("Failed to read catalog {}", catalog.display()))?;
        let sources: Vec<KnowledgeSource> =
            serde_json::from_str(&json).wrap_err("Catalog must be a JSON array of sources")?;
        let selection = ImportSelection {
            sources,
            accepted_urls: parse_accepted(accept)?,
        };

        let service = self.service()?;
        let events = EventBus::default();
        let registry = self.shared_registry(&service, &events).await?;
        let sync = self.sync(service, &registry, &events);
        let mut notices = events.subscribe();

        let result = sync.import(selection).await;
        sync.teardown();
        print_notices(&mut notices);

        let added = result?;
        self.save(&registry).await?;
        let guard = registry.lock().await;
        for source in added.iter().filter_map(|id| guard.get(*id)) {
            println!("{}", render::source_line(source));
        }
        Ok(())
    }

    fn service(&self) -> Result<Arc<HttpKnowledgeService>> {
        Ok(Arc::new(HttpKnowledgeService::from_config(&self.config.service)?))
    }

    fn sync(
        &self,
        service: Arc<HttpKnowledgeService>,
        registry: &SharedRegistry,
        events: &EventBus,
    ) -> SyncCoordinator<HttpKnowledgeService> {
        SyncCoordinator::new(
            service,
            Arc::clone(registry),
            events.clone(),
            self.agent_id.as_str(),
            &self.config.sync,
        )
    }

    fn orchestrator(
        &self,
        service: Arc<HttpKnowledgeService>,
        registry: &SharedRegistry,
        events: &EventBus,
    ) -> TrainingOrchestrator<HttpKnowledgeService> {
        TrainingOrchestrator::new(
            service,
            Arc::clone(registry),
            events.clone(),
            self.agent_id.as_str(),
            self.config.training.clone(),
        )
    }

    /// The saved registry, fetched from the service when nothing is saved.
    async fn shared_registry(
        &self,
        service: &Arc<HttpKnowledgeService>,
        events: &EventBus,
    ) -> Result<SharedRegistry> {
        let shared = self.manager.load_registry(&self.agent_id)?.into_shared();
        if shared.lock().await.is_empty() {
            let sync = self.sync(Arc::clone(service), &shared, events);
            sync.refresh().await?;
            sync.teardown();
        }
        Ok(shared)
    }

    fn local_source(&self, source_id: SourceId) -> Result<KnowledgeSource> {
        self.manager
            .load_registry(&self.agent_id)?
            .get(source_id)
            .cloned()
            .ok_or_else(|| {
                eyre!("Knowledge source {source_id} not found for agent {}", self.agent_id)
            })
    }

    async fn save(&mut self, registry: &SharedRegistry) -> Result<()> {
        let registry = registry.lock().await;
        self.manager.save_registry(&self.agent_id, &registry)?;
        Ok(())
    }
}

fn print_forests<F>(source: &KnowledgeSource, mut view: F)
where
    F: FnMut(&[TreeNode]) -> Vec<TreeNode>,
{
    let forests = [
        ("Documents", &source.documents),
        ("Links", &source.inside_links),
        ("Pages", &source.children),
    ];
    for (heading, forest) in forests {
        let Some(forest) = forest.as_deref() else {
            continue;
        };
        let lines = render::tree_lines(&view(forest));
        if lines.is_empty() {
            continue;
        }
        println!("{heading}:");
        for line in lines {
            println!("{line}");
        }
    }
}

/// Parses `--accept <source>=<url>` values.
fn parse_accepted(values: &[String]) -> Result<AcceptedUrls> {
    let mut accepted = AcceptedUrls::new();
    for value in values {
        let (id, url) = value
            .split_once('=')
            .ok_or_else(|| eyre!("Expected <source>=<url>, got {value:?}"))?;
        let id: SourceId = id
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid source id in {value:?}"))?;
        accepted.entry(id).or_default().insert(url.trim().to_string());
    }
    Ok(accepted)
}

fn progress_bar(message: String) -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos:>3}%")?
            .progress_chars("=> "),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

/// Moves the bar from training events: one source's status, or the batch
/// aggregate when `source` is `None`.
fn spawn_progress(
    mut rx: broadcast::Receiver<KnowledgeEvent>,
    bar: ProgressBar,
    source: Option<SourceId>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(KnowledgeEvent::TrainingStatusChanged { source_id, status })
                    if Some(source_id) == source =>
                {
                    bar.set_position(u64::from(status.progress));
                }
                Ok(KnowledgeEvent::BatchProgress(progress)) if source.is_none() => {
                    bar.set_position(u64::from(progress.progress));
                    bar.set_message(format!(
                        "{}/{} done, {} failed",
                        progress.completed, progress.total, progress.failed
                    ));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress display lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_notices(rx: &mut broadcast::Receiver<KnowledgeEvent>) {
    for notice in drain_notices(rx) {
        print_notice(&notice);
    }
}

/// Collects every notice still buffered, skipping past lag so a burst of
/// progress events cannot hide the notices behind it.
fn drain_notices(rx: &mut broadcast::Receiver<KnowledgeEvent>) -> Vec<Notice> {
    let mut notices = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(KnowledgeEvent::Notice(notice)) => notices.push(notice),
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Notice receiver lagged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    notices
}

fn print_notice(notice: &Notice) {
    let prefix = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    eprintln!("{prefix}: {}", notice.message);
}
