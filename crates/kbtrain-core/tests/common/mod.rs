#![allow(dead_code)]

use async_trait::async_trait;
use kbtrain_core::{
    ImportSelection, KnowledgeService, KnowledgeSource, NodeId, ServiceError, SourceId,
    SourceKind, TrainReceipt, TreeNode,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory knowledge service with scripted responses.
#[derive(Default)]
pub struct FakeService {
    pub sources: Mutex<Vec<KnowledgeSource>>,
    pub train_delay: Mutex<Duration>,
    pub list_delay: Mutex<Duration>,
    pub import_delay: Mutex<Duration>,
    pub train_results: Mutex<VecDeque<Result<TrainReceipt, ServiceError>>>,
    pub remove_error: Mutex<Option<ServiceError>>,
    pub trained: Mutex<Vec<Vec<NodeId>>>,
    pub list_calls: AtomicUsize,
    pub remove_calls: AtomicUsize,
}

impl FakeService {
    pub fn with_sources(sources: Vec<KnowledgeSource>) -> Self {
        let fake = Self::default();
        *fake.sources.lock().unwrap() = sources;
        fake
    }

    pub fn delay_training(&self, delay: Duration) {
        *self.train_delay.lock().unwrap() = delay;
    }

    pub fn delay_listing(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn delay_import(&self, delay: Duration) {
        *self.import_delay.lock().unwrap() = delay;
    }

    pub fn push_train_result(&self, result: Result<TrainReceipt, ServiceError>) {
        self.train_results.lock().unwrap().push_back(result);
    }

    pub fn fail_removal(&self, err: ServiceError) {
        *self.remove_error.lock().unwrap() = Some(err);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeService for FakeService {
    async fn list_knowledge_sources(
        &self,
        _agent_id: &str,
    ) -> Result<Vec<KnowledgeSource>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        Ok(self.sources.lock().unwrap().clone())
    }

    async fn remove_knowledge_sources(
        &self,
        _agent_id: &str,
        ids: &[SourceId],
    ) -> Result<(), ServiceError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if let Some(err) = self.remove_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.sources.lock().unwrap().retain(|s| !ids.contains(&s.id));
        Ok(())
    }

    async fn import_sources(
        &self,
        _agent_id: &str,
        selection: &ImportSelection,
    ) -> Result<Vec<KnowledgeSource>, ServiceError> {
        let delay = *self.import_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.sources
            .lock()
            .unwrap()
            .extend(selection.sources.iter().cloned());
        Ok(selection.sources.clone())
    }

    async fn train_agent(
        &self,
        _agent_id: &str,
        leaf_ids: &[NodeId],
    ) -> Result<TrainReceipt, ServiceError> {
        self.trained.lock().unwrap().push(leaf_ids.to_vec());
        let delay = *self.train_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let scripted = self.train_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(TrainReceipt::default()))
    }
}

/// A website with two pages under a root plus one standalone page.
pub fn website(id: SourceId) -> KnowledgeSource {
    let base = id * 100;
    KnowledgeSource::new(id, format!("Site {id}"), SourceKind::Website).with_inside_links(vec![
        TreeNode::url(base, format!("https://site{id}.io"), "Home").with_children(vec![
            TreeNode::url(base + 1, format!("https://site{id}.io/a"), "A").with_char_count(100),
            TreeNode::url(base + 2, format!("https://site{id}.io/b"), "B").with_char_count(50),
        ]),
        TreeNode::url(base + 3, format!("https://site{id}.io/c"), "C").with_char_count(25),
    ])
}

pub fn empty_source(id: SourceId) -> KnowledgeSource {
    KnowledgeSource::new(id, format!("Empty {id}"), SourceKind::Document)
}
