//! Topology service
//!
//! Walks the project tree from the configured roots and assembles a fresh
//! `TopologySnapshot`. Any fetch error aborts the walk; the caller keeps
//! the previously published snapshot.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use tcwatch_client::CiBackend;
use tcwatch_core::domain::project::{Project, ProjectId};
use tcwatch_core::topology::{CascadeMode, TopologySnapshot};

use crate::error::Result;

/// Builds topology snapshots for a fixed set of roots
pub struct TopologyService {
    backend: Arc<dyn CiBackend>,
    root_project_ids: Vec<ProjectId>,
    cascade_mode: CascadeMode,
}

impl TopologyService {
    /// Creates a new topology service
    ///
    /// # Arguments
    /// * `backend` - The CI server to query
    /// * `root_project_ids` - Roots to start from; empty means the server-wide root
    /// * `cascade_mode` - Whether to descend into child projects
    pub fn new(
        backend: Arc<dyn CiBackend>,
        root_project_ids: Vec<ProjectId>,
        cascade_mode: CascadeMode,
    ) -> Self {
        Self {
            backend,
            root_project_ids,
            cascade_mode,
        }
    }

    /// Fetches the project tree and returns a complete snapshot
    pub async fn refresh(&self) -> Result<TopologySnapshot> {
        debug!("Start check project structure");

        let mut snapshot = TopologySnapshot::new();
        let mut visited: HashSet<ProjectId> = HashSet::new();
        let mut frontier = self.roots().await?;

        while !frontier.is_empty() {
            debug!("Fill {} project(s)", frontier.len());
            let mut next = Vec::new();

            for project in frontier {
                if !visited.insert(project.id.clone()) {
                    continue;
                }

                let configurations = match self.cascade_mode {
                    CascadeMode::OnlyRoot => {
                        self.backend.get_build_configurations(&project).await?
                    }
                    CascadeMode::Recursive => {
                        let contents = self.backend.get_project_contents(&project).await?;
                        next.extend(contents.children);
                        contents.configurations
                    }
                };

                snapshot.insert(project, configurations);
            }

            frontier = next;
        }

        debug!(
            "End check project structure: {} project(s), {} configuration(s)",
            snapshot.project_count(),
            snapshot.configuration_count()
        );
        Ok(snapshot)
    }

    async fn roots(&self) -> Result<Vec<Project>> {
        if self.root_project_ids.is_empty() {
            return Ok(self.backend.list_root_projects().await?);
        }

        let mut roots = Vec::with_capacity(self.root_project_ids.len());
        for id in &self.root_project_ids {
            roots.push(self.backend.get_project(id).await?);
        }
        Ok(roots)
    }
}
